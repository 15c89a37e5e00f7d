//! The panic path: banner, optional register dump, halt.
//!
//! Reachable two ways: a Rust `panic!`/assertion failure (via the `#[panic_handler]` in
//! [`crate::kernel`], which has no [`crate::idt::TrapFrame`] to hand over), or an unhandled CPU
//! exception dispatched by [`crate::idt`] (which does). Neither path returns; both `cli` first so
//! nothing can re-enter while the banner is being written.
//!
//! `println!` already fans out to every enabled diagnostic sink and mirrors into the log ring
//! (see [`crate::logger`]), and `core::fmt` formatting doesn't touch the heap, so there is no
//! separate minimal formatter here the way the implementation this is descended from needed one.

use crate::idt::TrapFrame;
use crate::{println, tty};
use core::arch::asm;
use core::fmt;

fn halt() -> ! {
	loop {
		unsafe {
			asm!("hlt");
		}
	}
}

fn banner(args: fmt::Arguments) {
	tty::set_earlycon(true);
	println!();
	println!("--- KERNEL PANIC ---");
	println!("{args}");
}

/// Disables interrupts, prints the panic banner and message to every sink, and halts forever.
///
/// Used where no [`TrapFrame`] is available, chiefly the `#[panic_handler]` for ordinary Rust
/// panics.
pub fn panic(args: fmt::Arguments) -> ! {
	unsafe {
		asm!("cli");
	}
	banner(args);
	halt();
}

/// Same as [`panic`], but additionally dumps `frame`'s registers. Used by the exception
/// dispatcher, which always has the frame the faulting instruction left behind.
pub fn panic_regs(frame: &TrapFrame, args: fmt::Arguments) -> ! {
	unsafe {
		asm!("cli");
	}
	banner(args);
	dump_registers(frame);
	halt();
}

/// Prints every field of `frame`, read one at a time to avoid taking a reference into the packed
/// struct.
fn dump_registers(frame: &TrapFrame) {
	let (eip, cs, eflags) = ({ frame.eip }, { frame.cs }, { frame.eflags });
	let (eax, ebx, ecx, edx) = ({ frame.eax }, { frame.ebx }, { frame.ecx }, { frame.edx });
	let (esp, ebp, esi, edi) = ({ frame.esp }, { frame.ebp }, { frame.esi }, { frame.edi });
	let (ds, ss) = ({ frame.ds }, { frame.ss });
	let (int_no, err_code) = ({ frame.int_no }, { frame.err_code });

	println!();
	println!("EIP={eip:#010x} CS={cs:#06x} EFLAGS={eflags:#010x}");
	println!("EAX={eax:#010x} EBX={ebx:#010x} ECX={ecx:#010x} EDX={edx:#010x}");
	println!("ESP={esp:#010x} EBP={ebp:#010x} ESI={esi:#010x} EDI={edi:#010x}");
	println!("DS={ds:#06x} SS={ss:#06x}");
	println!("INT={int_no} ERR={err_code:#010x}");
}

/// Decodes a page-fault error code's bit 0/1/2/3/4 (present/write/user/reserved/fetch) into a
/// human cause string.
///
/// Cascading on purpose: a fault on a present page is classified by whichever of
/// write/user/reserved/fetch is checked first, so a fault that happens to set more than one of
/// those bits only ever reports the first match. The full dump in [`dump_registers`] still shows
/// every bit regardless of which string won.
fn decode_cause(err_code: u32) -> &'static str {
	let not_present = err_code & 0x1 == 0;
	let write = err_code & 0x2 != 0;
	let user = err_code & 0x4 != 0;
	let reserved = err_code & 0x8 != 0;
	let fetch = err_code & 0x10 != 0;

	if not_present && write {
		"Write to non-present page"
	} else if not_present {
		"Read from non-present page"
	} else if write {
		"Page protection violation (write)"
	} else if user {
		"User mode access violation"
	} else if reserved {
		"Reserved bit set in page table"
	} else if fetch {
		"Instruction fetch from non-executable page"
	} else {
		"Unknown page fault cause"
	}
}

/// Registered for vector 14. Reads CR2 for the faulting address, decodes the cause from the
/// error code, and panics with both.
pub fn page_fault_handler(frame: &mut TrapFrame) {
	let addr = crate::memory::paging::fault_address();
	let err_code = { frame.err_code };
	let cause = decode_cause(err_code);
	panic_regs(frame, format_args!("Page Fault at {addr:#010X} - {cause}"));
}
