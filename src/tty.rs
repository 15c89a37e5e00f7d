//! The diagnostic writer every [`crate::print`]/[`crate::logger`] byte eventually reaches.
//!
//! VGA is always live. The serial sink is gated by the `earlycon` boot flag: the UART is still
//! programmed at [`init`] time, but [`Tty::write`] only emits to it once [`set_earlycon`] has
//! been called with `true`, matching the boot-time default of a silent COM1.

use crate::device::{serial, vga};
use crate::util::lock::IntMutex;
use core::fmt;

static TTY: IntMutex<Tty> = IntMutex::new(Tty { earlycon: false });

/// The single global diagnostic sink.
pub struct Tty {
	earlycon: bool,
}

/// Brings up both backing devices. Call once, early in boot, before the first `print!`.
pub fn init() {
	vga::init();
	serial::init();
}

/// Enables or disables the serial sink. VGA is never gated.
pub fn set_earlycon(enabled: bool) {
	TTY.lock().earlycon = enabled;
}

/// Returns the global TTY instance.
///
/// Takes an index to leave room for a future multi-terminal setup; only `None`/`Some(0)` resolve
/// to anything in v1.
pub fn get(id: Option<usize>) -> Option<&'static IntMutex<Tty>> {
	match id {
		None | Some(0) => Some(&TTY),
		_ => None,
	}
}

impl Tty {
	/// Writes `buf` to every currently enabled sink.
	pub fn write(&self, buf: &[u8]) {
		for &b in buf {
			vga::put_char(b);
			if self.earlycon {
				serial::put_char(b);
			}
		}
	}
}

impl fmt::Write for Tty {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.write(s.as_bytes());
		Ok(())
	}
}
