//! 80x25 VGA text-mode console at `0xB8000`.
//!
//! No scrolling in v1: once the cursor reaches the last row, the next newline wraps back to row
//! 0 and subsequent writes overwrite what was there.

/// Number of columns.
pub const WIDTH: u16 = 80;
/// Number of rows.
pub const HEIGHT: u16 = 25;

/// Physical (identity-mapped) address of the VGA text buffer.
const VGA_MEMORY: usize = 0xb8000;

/// Foreground/background color nibbles: light grey on black, the default.
const DEFAULT_COLOR: u8 = color(Color::LightGrey, Color::Black);

/// One of the 16 VGA text-mode colors.
#[derive(Clone, Copy)]
#[repr(u8)]
pub enum Color {
	Black = 0,
	Blue = 1,
	Green = 2,
	Cyan = 3,
	Red = 4,
	Magenta = 5,
	Brown = 6,
	LightGrey = 7,
	DarkGrey = 8,
	LightBlue = 9,
	LightGreen = 10,
	LightCyan = 11,
	LightRed = 12,
	LightMagenta = 13,
	LightBrown = 14,
	White = 15,
}

const fn color(fg: Color, bg: Color) -> u8 {
	(fg as u8) | ((bg as u8) << 4)
}

const fn entry(c: u8, color: u8) -> u16 {
	c as u16 | ((color as u16) << 8)
}

struct Console {
	row: u16,
	column: u16,
	color: u8,
}

static mut STATE: Console = Console {
	row: 0,
	column: 0,
	color: DEFAULT_COLOR,
};

fn buffer() -> *mut u16 {
	VGA_MEMORY as *mut u16
}

/// Clears the screen and resets the cursor to `(0, 0)`.
pub fn init() {
	unsafe {
		STATE.row = 0;
		STATE.column = 0;
		STATE.color = DEFAULT_COLOR;
		for i in 0..(WIDTH as usize * HEIGHT as usize) {
			buffer().add(i).write_volatile(entry(b' ', STATE.color));
		}
	}
}

fn newline() {
	unsafe {
		STATE.column = 0;
		STATE.row += 1;
		if STATE.row == HEIGHT {
			STATE.row = 0;
		}
	}
}

/// Writes a single byte at the cursor, advancing it (and wrapping row/column as needed).
///
/// `\n` moves to the start of the next row without writing a glyph.
pub fn put_char(c: u8) {
	if c == b'\n' {
		newline();
		return;
	}

	unsafe {
		let index = STATE.row as usize * WIDTH as usize + STATE.column as usize;
		buffer().add(index).write_volatile(entry(c, STATE.color));

		STATE.column += 1;
		if STATE.column == WIDTH {
			newline();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn entry_packs_char_and_color() {
		assert_eq!(entry(b'A', 0x07), 0x07_41);
	}
}
