//! Under the x86 architecture, the GDT (Global Descriptor Table) is a table
//! of structures that describes the segments of memory.
//!
//! It is a deprecated structure that still must be used in order to switch to protected mode and
//! handle privilege rings. This kernel only ever runs in ring 0, but still installs ring-3
//! descriptors so a future user-mode process could use them; nothing in v1 loads them into a
//! segment register.

use core::arch::asm;
use core::mem::size_of;

/// The selector of the kernel code segment.
pub const KERNEL_CS: u16 = 0x08;
/// The selector of the kernel data segment.
pub const KERNEL_DS: u16 = 0x10;
/// The selector of the user code segment (RPL 3).
pub const USER_CS: u16 = 0x1b;
/// The selector of the user data segment (RPL 3).
pub const USER_DS: u16 = 0x23;

/// Number of entries in the table: null, kernel code, kernel data, user code, user data.
const ENTRIES_COUNT: usize = 5;

/// Access byte: segment is present.
const ACCESS_PRESENT: u8 = 1 << 7;
/// Access byte: descriptor privilege level, shifted into place.
const fn access_dpl(ring: u8) -> u8 {
	(ring & 0b11) << 5
}
/// Access byte: this is a code/data segment descriptor (as opposed to a system one).
const ACCESS_SEGMENT: u8 = 1 << 4;
/// Access byte: segment is executable.
const ACCESS_EXECUTABLE: u8 = 1 << 3;
/// Access byte: segment is readable (code) / writable (data).
const ACCESS_RW: u8 = 1 << 1;

/// Flags nibble: limit is in 4 KiB pages rather than bytes.
const FLAGS_GRANULARITY: u8 = 1 << 3;
/// Flags nibble: segment is 32-bit protected mode.
const FLAGS_SIZE_32: u8 = 1 << 2;

/// A single 8-byte GDT entry, in the packed layout the CPU expects.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Entry {
	limit_low: u16,
	base_low: u16,
	base_mid: u8,
	access: u8,
	limit_high_flags: u8,
	base_high: u8,
}

impl Entry {
	/// Builds a flat (base 0, limit 4 GiB) descriptor with the given access byte and flags
	/// nibble.
	const fn flat(access: u8, flags: u8) -> Self {
		Self {
			limit_low: 0xffff,
			base_low: 0,
			base_mid: 0,
			access,
			limit_high_flags: 0x0f | (flags << 4),
			base_high: 0,
		}
	}

	const fn null() -> Self {
		Self {
			limit_low: 0,
			base_low: 0,
			base_mid: 0,
			access: 0,
			limit_high_flags: 0,
			base_high: 0,
		}
	}
}

/// The pointer structure loaded into the GDTR by `lgdt`.
#[repr(C, packed)]
struct GdtDescriptor {
	size: u16,
	offset: u32,
}

/// The GDT itself. 4 KiB granularity flat segments spanning the whole 32-bit address space.
static mut GDT: [Entry; ENTRIES_COUNT] = [
	Entry::null(),
	Entry::flat(
		ACCESS_PRESENT | access_dpl(0) | ACCESS_SEGMENT | ACCESS_EXECUTABLE | ACCESS_RW,
		FLAGS_GRANULARITY | FLAGS_SIZE_32,
	),
	Entry::flat(
		ACCESS_PRESENT | access_dpl(0) | ACCESS_SEGMENT | ACCESS_RW,
		FLAGS_GRANULARITY | FLAGS_SIZE_32,
	),
	Entry::flat(
		ACCESS_PRESENT | access_dpl(3) | ACCESS_SEGMENT | ACCESS_EXECUTABLE | ACCESS_RW,
		FLAGS_GRANULARITY | FLAGS_SIZE_32,
	),
	Entry::flat(
		ACCESS_PRESENT | access_dpl(3) | ACCESS_SEGMENT | ACCESS_RW,
		FLAGS_GRANULARITY | FLAGS_SIZE_32,
	),
];

/// Builds the flat GDT, loads it with `lgdt`, then reloads every segment register so the CPU
/// actually uses the new descriptors instead of the bootloader's.
///
/// # Safety
///
/// Must be called exactly once, early during boot, before any code relies on segment selectors
/// matching [`KERNEL_CS`]/[`KERNEL_DS`].
pub unsafe fn init() {
	let descriptor = GdtDescriptor {
		size: (size_of::<Entry>() * ENTRIES_COUNT - 1) as u16,
		offset: core::ptr::addr_of!(GDT) as u32,
	};

	asm!(
		"lgdt [{0}]",
		// Reload CS via a far jump, then the data segments directly.
		"push {1}",
		"lea eax, [2f]",
		"push eax",
		"retf",
		"2:",
		"mov ax, {2:x}",
		"mov ds, ax",
		"mov es, ax",
		"mov fs, ax",
		"mov gs, ax",
		"mov ss, ax",
		in(reg) &descriptor,
		const KERNEL_CS,
		in(reg) KERNEL_DS,
		out("eax") _,
	);
}
