//! Crate-wide error type for fallible kernel operations.
//!
//! Every fallible entry point below the panic path returns [`KResult`] rather than a C-style
//! boolean or null-sentinel: callers propagate with `?` instead of manual `if` chains. The one
//! exception is the panic path itself, which by construction has nowhere left to propagate to.

use core::fmt;

/// The crate-wide error enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KError {
	/// The physical frame allocator has no frames left to give out.
	OutOfMemory,
	/// A page table could not be installed, because [`KError::OutOfMemory`] occurred while
	/// allocating it.
	MapFailure,
	/// The kernel heap could not satisfy an allocation, including after attempting to grow.
	HeapExhausted,
	/// A caller-supplied argument was invalid (for example, an unaligned address where one must
	/// be page-aligned).
	InvalidArgument,
	/// The Multiboot information structure failed a sanity check (bad magic, missing flags).
	BadMultiboot,
	/// The boot command line was malformed (too long, or an unrecognized bare flag).
	BadCmdline,
}

impl fmt::Display for KError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Self::OutOfMemory => "out of physical memory",
			Self::MapFailure => "page mapping failed",
			Self::HeapExhausted => "kernel heap exhausted",
			Self::InvalidArgument => "invalid argument",
			Self::BadMultiboot => "invalid Multiboot information",
			Self::BadCmdline => "invalid boot command line",
		};
		f.write_str(msg)
	}
}

/// Alias matching the shape of the old C boolean/null-sentinel returns: `Ok` on success, `Err`
/// carrying the reason on failure.
pub type KResult<T> = Result<T, KError>;

/// The 32 CPU exception names, indexed by interrupt vector.
///
/// Vectors without an architecturally-defined meaning (or reserved by Intel for future use) read
/// "Reserved".
pub static EXCEPTION_NAMES: [&str; 32] = [
	"Divide-by-zero Error",
	"Debug",
	"Non-maskable Interrupt",
	"Breakpoint",
	"Overflow",
	"Bound Range Exceeded",
	"Invalid Opcode",
	"Device Not Available",
	"Double Fault",
	"Coprocessor Segment Overrun",
	"Invalid TSS",
	"Segment Not Present",
	"Stack-Segment Fault",
	"General Protection Fault",
	"Page Fault",
	"Reserved",
	"x87 Floating-Point Exception",
	"Alignment Check",
	"Machine Check",
	"SIMD Floating-Point Exception",
	"Virtualization Exception",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Security Exception",
	"Reserved",
];
