//! The 8254 Programmable Interval Timer.
//!
//! Channel 0 is wired to IRQ0 and is the kernel's only source of time: its tick handler
//! increments a monotonic counter and, once a handler has been registered, drives the scheduler.

use crate::idt;
use crate::idt::TrapFrame;
use crate::io;
use crate::util::lock::IntMutex;
use core::sync::atomic::{AtomicU64, Ordering};

/// Channel 0's data port; also the IRQ0 line.
const CHANNEL_0: u16 = 0x40;
/// The mode/command port.
const COMMAND: u16 = 0x43;

/// Command byte: channel 0, access lobyte then hibyte, mode 3 (square wave generator).
const SELECT_CHANNEL_0_MODE_3: u8 = 0x00 | 0x30 | 0x03;

/// The PIT's oscillator frequency, in hertz.
pub const BASE_FREQUENCY: u32 = 1_193_182;

/// The IRQ line channel 0 is wired to.
const IRQ_LINE: u8 = 0;

/// Monotonic count of ticks delivered since [`init`].
static TICKS: AtomicU64 = AtomicU64::new(0);

/// The realized frequency after divisor clamping, in hertz.
static FREQUENCY: IntMutex<u32> = IntMutex::new(0);

/// An optional handler invoked on every tick, after the counter is incremented.
static TICK_HANDLER: IntMutex<Option<fn(&mut TrapFrame)>> = IntMutex::new(None);

/// Programs channel 0 to `freq_hz`, clamping the divisor to `[1, 65535]`, and unmasks IRQ0.
///
/// The realized frequency (after clamping) is recorded and can differ from the one requested for
/// very low or very high values; read it back with [`frequency`].
pub fn init(freq_hz: u32) {
	let divisor = if freq_hz == 0 {
		65535
	} else {
		(BASE_FREQUENCY / freq_hz).clamp(1, 65535)
	};

	*FREQUENCY.lock() = BASE_FREQUENCY / divisor;

	unsafe {
		io::outb(COMMAND, SELECT_CHANNEL_0_MODE_3);
		io::outb(CHANNEL_0, (divisor & 0xff) as u8);
		io::outb(CHANNEL_0, ((divisor >> 8) & 0xff) as u8);
	}

	idt::register_irq_handler(IRQ_LINE, on_tick);
}

/// Returns the realized tick frequency, in hertz.
pub fn frequency() -> u32 {
	*FREQUENCY.lock()
}

/// Returns the number of ticks delivered since [`init`].
pub fn ticks() -> u64 {
	TICKS.load(Ordering::Relaxed)
}

/// Registers `handler` to be invoked on every tick, after the counter is incremented. Typically
/// the scheduler.
pub fn set_tick_handler(handler: fn(&mut TrapFrame)) {
	*TICK_HANDLER.lock() = Some(handler);
}

/// The IRQ0 handler: increments the tick counter, then invokes the registered handler if any.
fn on_tick(frame: &mut TrapFrame) {
	TICKS.fetch_add(1, Ordering::Relaxed);
	let handler = *TICK_HANDLER.lock();
	if let Some(handler) = handler {
		handler(frame);
	}
}
