#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "test_main"]
#![deny(warnings)]
#![allow(dead_code)]

//! A small 32-bit protected-mode x86 kernel: Multiboot-1 boot, GDT/IDT bring-up, the 8259/8254
//! pair, a trap-frame dispatcher, a bitmap physical memory manager, two-level paging, a
//! first-fit kernel heap, and a round-robin preemptive scheduler.
//!
//! [`kernel_main`] is the single entry point, called by `arch/x86/src/boot.s` once the CPU is in
//! 32-bit protected mode with paging off. Everything downstream is brought up in dependency
//! order: CPU tables before devices, physical memory before paging, paging before the heap, the
//! heap before anything that allocates a PCB.

mod cmdline;
mod device;
mod error;
mod gdt;
mod idt;
mod io;
mod logger;
mod memory;
mod multiboot;
mod panic;
mod pit;
mod print;
mod process;
pub mod selftest;
mod tty;
mod util;

use core::arch::asm;
use core::panic::PanicInfo;

/// Current kernel version, printed in the boot banner.
const KERNEL_VERSION: &str = "0.1.0";

/// PIT frequency the scheduler's preemption and [`cmdline`]'s `testpagefault`/`testpanic` timing
/// assume.
const TIMER_HZ: u32 = 100;

extern "C" fn demo_task_1() {
	demo_task(b'1')
}

extern "C" fn demo_task_2() {
	demo_task(b'2')
}

extern "C" fn demo_task_3() {
	demo_task(b'3')
}

/// Writes `id` a handful of times, yielding between each write, then returns (which the
/// trampoline turns into a call to `process_exit`).
///
/// Exists to demonstrate round-robin fairness: booted with three of these running, the interleave
/// of ids printed should cycle between them rather than starve any one.
fn demo_task(id: u8) {
	for i in 0..5 {
		println!("[T{}] iteration {}", id as char, i);
		for _ in 0..2_000_000 {
			core::hint::spin_loop();
		}
		process::scheduler::yield_now();
	}
}

/// Called by `_start` (`arch/x86/src/boot.s`) with the Multiboot magic in `magic` and the
/// physical address of the Multiboot information structure in `mbi`.
///
/// Never returns: bring-up either ends in the idle halt loop once the scheduler is running, or in
/// [`panic::panic`]/[`panic::panic_regs`] if something along the way fails.
#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, mbi: *const multiboot::Info) -> ! {
	tty::init();

	if magic != multiboot::BOOTLOADER_MAGIC || !util::is_aligned(mbi, 4) {
		panic::panic(format_args!(
			"boot protocol mismatch: magic {magic:#010x}, mbi {mbi:p}"
		));
	}
	let mbi = unsafe { &*mbi };

	let cmdline = unsafe { mbi.cmdline() }.unwrap_or(&[]);
	let config = match cmdline::BootConfig::parse(cmdline) {
		Ok(config) => config,
		Err(e) => panic::panic(format_args!("{e}")),
	};

	logger::init(false);
	tty::set_earlycon(config.earlycon());

	println!("Booting kestrel kernel version {KERNEL_VERSION}");
	println!("Multiboot magic: {magic:#010x}, info: {mbi:p}");

	unsafe {
		gdt::init();
		idt::init();
	}
	idt::register_exception_handler(14, panic::page_fault_handler);
	pit::init(TIMER_HZ);
	println!("Timer programmed at {} Hz", pit::frequency());

	unsafe {
		memory::pmm::init(mbi);
		memory::paging::init()
			.unwrap_or_else(|e| panic::panic(format_args!("paging init failed: {e}")));
		memory::heap::init()
			.unwrap_or_else(|e| panic::panic(format_args!("heap init failed: {e}")));
	}
	let (total, used, free) = memory::heap::stats();
	println!("Heap: {total} bytes total, {used} used, {free} free");

	unsafe {
		process::scheduler::init()
			.unwrap_or_else(|e| panic::panic(format_args!("scheduler init failed: {e}")));
	}

	if config.testpagefault() {
		println!("testpagefault: dereferencing 0xDEADBEEF");
		unsafe {
			core::ptr::read_volatile(0xDEADBEEF as *const u8);
		}
		unreachable!("page fault handler should not return");
	}

	if config.testpanic() {
		panic::panic(format_args!("testpanic: deliberate panic requested on the command line"));
	}

	if config.boottest() {
		selftest::boot_report();
	}

	#[cfg(test)]
	test_main();

	for (name, entry) in [
		("demo1", demo_task_1 as extern "C" fn()),
		("demo2", demo_task_2 as extern "C" fn()),
		("demo3", demo_task_3 as extern "C" fn()),
	] {
		if let Err(e) = process::scheduler::spawn(name, entry, process::Mode::Kernel) {
			println!("failed to spawn {name}: {e}");
		}
	}

	pit::set_tick_handler(process::scheduler::schedule);
	process::scheduler::enable();

	println!("Bring-up complete, enabling interrupts");
	unsafe {
		asm!("sti");
	}

	loop {
		unsafe {
			asm!("hlt");
		}
	}
}

#[panic_handler]
fn on_panic(info: &PanicInfo) -> ! {
	panic::panic(format_args!("{info}"))
}

#[cfg(not(test))]
#[lang = "eh_personality"]
extern "C" fn eh_personality() {}
