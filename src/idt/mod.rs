//! The IDT (Interrupt Descriptor Table) and the trap dispatcher built on top of it.
//!
//! Every exception and every remapped IRQ enters through a small assembly stub (see
//! `arch/x86/src/interrupts.s`) that pushes a [`TrapFrame`] and calls into [`isr_dispatch`] or
//! [`irq_dispatch`] with a pointer to it. The dispatcher may mutate the frame in place — this is
//! how the scheduler switches tasks — and the stub restores from it before `iret`.

pub mod pic;

use crate::error::EXCEPTION_NAMES;
use crate::gdt::KERNEL_CS;
use crate::panic::panic_regs;
use crate::util::lock::IntMutex;
use core::arch::asm;
use core::mem::size_of;

/// Number of entries in the table.
pub const ENTRIES_COUNT: usize = 256;

/// Software interrupt vector reserved for cooperative yield.
pub const YIELD_VECTOR: u8 = 0x81;

/// Gate flags: present, ring 0, 32-bit interrupt gate.
const GATE_FLAGS: u8 = 0x8e;

/// The canonical register frame pushed by every entry stub.
///
/// Field order is load-bearing: the assembly stubs push/pop in exactly this order, and the
/// scheduler relies on this layout to save and restore a task's context by mutating the frame a
/// handler was called with.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct TrapFrame {
	pub ds: u32,

	pub edi: u32,
	pub esi: u32,
	pub ebp: u32,
	pub esp: u32,
	pub ebx: u32,
	pub edx: u32,
	pub ecx: u32,
	pub eax: u32,

	pub int_no: u32,
	pub err_code: u32,

	pub eip: u32,
	pub cs: u32,
	pub eflags: u32,
	pub useresp: u32,
	pub ss: u32,
}

/// A handler for an exception or an IRQ. Uniform over both: a handler with no use for the frame
/// simply ignores the argument.
pub type Handler = fn(&mut TrapFrame);

/// A single IDT entry (an interrupt gate), in the packed layout the CPU expects.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Entry {
	offset_low: u16,
	selector: u16,
	zero: u8,
	flags: u8,
	offset_high: u16,
}

impl Entry {
	const fn null() -> Self {
		Self {
			offset_low: 0,
			selector: 0,
			zero: 0,
			flags: 0,
			offset_high: 0,
		}
	}

	fn new(handler: usize, selector: u16, flags: u8) -> Self {
		Self {
			offset_low: (handler & 0xffff) as u16,
			selector,
			zero: 0,
			flags,
			offset_high: (handler >> 16) as u16,
		}
	}
}

/// The pointer structure loaded into the IDTR by `lidt`.
#[repr(C, packed)]
struct IdtDescriptor {
	size: u16,
	offset: u32,
}

static mut IDT: [Entry; ENTRIES_COUNT] = [Entry::null(); ENTRIES_COUNT];

/// Exception handlers registered by [`register_exception_handler`], indexed by vector 0..32.
static EXCEPTION_HANDLERS: IntMutex<[Option<Handler>; 32]> = IntMutex::new([None; 32]);
/// IRQ handlers registered by [`register_irq_handler`], indexed by IRQ line 0..16.
static IRQ_HANDLERS: IntMutex<[Option<Handler>; 16]> = IntMutex::new([None; 16]);

/// Installs gate `n` to jump to `handler` at ring 0 in the kernel code segment.
fn set_gate(n: u8, handler: usize) {
	unsafe {
		IDT[n as usize] = Entry::new(handler, KERNEL_CS, GATE_FLAGS);
	}
}

extern "C" {
	fn isr0();
	fn isr1();
	fn isr2();
	fn isr3();
	fn isr4();
	fn isr5();
	fn isr6();
	fn isr7();
	fn isr8();
	fn isr9();
	fn isr10();
	fn isr11();
	fn isr12();
	fn isr13();
	fn isr14();
	fn isr15();
	fn isr16();
	fn isr17();
	fn isr18();
	fn isr19();
	fn isr20();
	fn isr21();
	fn isr22();
	fn isr23();
	fn isr24();
	fn isr25();
	fn isr26();
	fn isr27();
	fn isr28();
	fn isr29();
	fn isr30();
	fn isr31();

	fn irq0();
	fn irq1();
	fn irq2();
	fn irq3();
	fn irq4();
	fn irq5();
	fn irq6();
	fn irq7();
	fn irq8();
	fn irq9();
	fn irq10();
	fn irq11();
	fn irq12();
	fn irq13();
	fn irq14();
	fn irq15();

	fn isr_yield();
}

/// Builds the IDT, loads it with `lidt`, installs every ISR/IRQ/yield gate, and remaps+masks the
/// PIC. Does not `sti`; the caller enables interrupts once the rest of bring-up has finished.
///
/// # Safety
///
/// Must be called exactly once, after [`crate::gdt::init`].
pub unsafe fn init() {
	set_gate(0, isr0 as usize);
	set_gate(1, isr1 as usize);
	set_gate(2, isr2 as usize);
	set_gate(3, isr3 as usize);
	set_gate(4, isr4 as usize);
	set_gate(5, isr5 as usize);
	set_gate(6, isr6 as usize);
	set_gate(7, isr7 as usize);
	set_gate(8, isr8 as usize);
	set_gate(9, isr9 as usize);
	set_gate(10, isr10 as usize);
	set_gate(11, isr11 as usize);
	set_gate(12, isr12 as usize);
	set_gate(13, isr13 as usize);
	set_gate(14, isr14 as usize);
	set_gate(15, isr15 as usize);
	set_gate(16, isr16 as usize);
	set_gate(17, isr17 as usize);
	set_gate(18, isr18 as usize);
	set_gate(19, isr19 as usize);
	set_gate(20, isr20 as usize);
	set_gate(21, isr21 as usize);
	set_gate(22, isr22 as usize);
	set_gate(23, isr23 as usize);
	set_gate(24, isr24 as usize);
	set_gate(25, isr25 as usize);
	set_gate(26, isr26 as usize);
	set_gate(27, isr27 as usize);
	set_gate(28, isr28 as usize);
	set_gate(29, isr29 as usize);
	set_gate(30, isr30 as usize);
	set_gate(31, isr31 as usize);

	set_gate(32, irq0 as usize);
	set_gate(33, irq1 as usize);
	set_gate(34, irq2 as usize);
	set_gate(35, irq3 as usize);
	set_gate(36, irq4 as usize);
	set_gate(37, irq5 as usize);
	set_gate(38, irq6 as usize);
	set_gate(39, irq7 as usize);
	set_gate(40, irq8 as usize);
	set_gate(41, irq9 as usize);
	set_gate(42, irq10 as usize);
	set_gate(43, irq11 as usize);
	set_gate(44, irq12 as usize);
	set_gate(45, irq13 as usize);
	set_gate(46, irq14 as usize);
	set_gate(47, irq15 as usize);

	set_gate(YIELD_VECTOR, isr_yield as usize);

	let descriptor = IdtDescriptor {
		size: (size_of::<Entry>() * ENTRIES_COUNT - 1) as u16,
		offset: core::ptr::addr_of!(IDT) as u32,
	};
	asm!("lidt [{0}]", in(reg) &descriptor);

	pic::init(32, 40);
}

/// Registers `handler` for CPU exception vector `vector` (0..32).
///
/// Replaces any handler previously registered for that vector.
pub fn register_exception_handler(vector: u8, handler: Handler) {
	EXCEPTION_HANDLERS.lock()[vector as usize] = Some(handler);
}

/// Registers `handler` for IRQ line `irq` (0..16) and unmasks it at the PIC.
pub fn register_irq_handler(irq: u8, handler: Handler) {
	IRQ_HANDLERS.lock()[irq as usize] = Some(handler);
	pic::unmask(irq);
}

/// Called by the ISR stubs with the frame they built. Dispatches to a registered exception
/// handler, or panics with the exception's name if none is registered.
#[no_mangle]
pub extern "C" fn isr_dispatch(frame: *mut TrapFrame) {
	let frame = unsafe { &mut *frame };
	let vector = frame.int_no as usize;

	let handler = EXCEPTION_HANDLERS.lock()[vector];
	match handler {
		Some(handler) => handler(frame),
		None => {
			let name = EXCEPTION_NAMES
				.get(vector)
				.copied()
				.unwrap_or("Unknown Interrupt");
			panic_regs(frame, format_args!("{name} (vector {vector}, error code {:#x})", { frame.err_code }));
		}
	}
}

/// Called by the IRQ stubs with the frame they built and the IRQ line (`int_no - 32`).
/// Dispatches to a registered handler if any, then sends EOI.
#[no_mangle]
pub extern "C" fn irq_dispatch(frame: *mut TrapFrame) {
	let frame = unsafe { &mut *frame };
	let irq = (frame.int_no - 32) as u8;

	let handler = IRQ_HANDLERS.lock()[irq as usize];
	if let Some(handler) = handler {
		handler(frame);
	}

	pic::eoi(irq);
}

/// Called by the `int 0x81` stub. Runs the scheduler the same way a timer tick does.
#[no_mangle]
pub extern "C" fn yield_dispatch(frame: *mut TrapFrame) {
	let frame = unsafe { &mut *frame };
	crate::process::scheduler::schedule(frame);
}
