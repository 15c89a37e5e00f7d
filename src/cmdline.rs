//! When booting, the kernel can take command line arguments. This module implements a parser
//! for these arguments.
//!
//! The grammar is intentionally small: a handful of standalone boolean flags (`earlycon`,
//! `boottest`, `testpanic`, `testpagefault`) and generic `key=value` pairs, separated by
//! whitespace. Unlike the flags, `key=value` pairs aren't enumerated ahead of time — looking one
//! up rescans the raw line, the same way the original implementation does, since there's no
//! allocator available yet when this runs.

use crate::device::vga;
use crate::util::DisplayableStr;
use core::cmp::min;
use core::fmt;

/// Maximum length of the command line the bootloader may hand us, in bytes.
pub const MAX_LEN: usize = 256;

/// Skips spaces in slice `slice`, starting at offset `i`.
fn skip_spaces(slice: &[u8], i: &mut usize) {
	let mut j = *i;
	while j < slice.len() && (slice[j] as char).is_ascii_whitespace() {
		j += 1;
	}
	*i = j;
}

/// Structure representing a command line parsing error.
#[derive(Debug)]
pub struct ParseError<'s> {
	/// The command line.
	cmdline: &'s [u8],
	/// An error message.
	err: &'static str,
	/// The offset and size of the token that caused the error.
	token: Option<(usize, usize)>,
}

impl<'s> ParseError<'s> {
	/// Creates a new instance.
	pub fn new(cmdline: &'s [u8], err: &'static str, token: Option<(usize, usize)>) -> Self {
		Self {
			cmdline,
			err,
			token,
		}
	}
}

impl<'s> fmt::Display for ParseError<'s> {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
		write!(
			fmt,
			"Error while parsing command line arguments: {}",
			self.err
		)?;

		let Some((begin, size)) = self.token else {
			return Ok(());
		};

		let mut i = 0;
		while i < self.cmdline.len() {
			let l = min(self.cmdline.len() - i, vga::WIDTH as usize - 1);
			write!(fmt, "{}", DisplayableStr(&self.cmdline[i..(i + l)]))?;

			let mut j = i;
			while j < i + l {
				if j == begin {
					write!(fmt, "^")?;
				} else if j > begin && j < begin + size {
					write!(fmt, "-")?;
				} else {
					write!(fmt, " ")?;
				}
				j += 1;
			}
			writeln!(fmt)?;

			i += vga::WIDTH as usize - 1;
		}

		writeln!(fmt)
	}
}

/// A single whitespace-delimited token in the command line.
struct Token<'s> {
	/// The token's string.
	s: &'s [u8],
	/// The offset to the beginning of the token in the command line.
	begin: usize,
}

struct TokenIterator<'s> {
	/// The string to iterate on.
	s: &'s [u8],
	/// The current index on the string.
	i: usize,
}

impl<'s> Iterator for TokenIterator<'s> {
	type Item = Token<'s>;

	fn next(&mut self) -> Option<Self::Item> {
		skip_spaces(self.s, &mut self.i);
		let mut j = self.i;
		while j < self.s.len() && !(self.s[j] as char).is_ascii_whitespace() {
			j += 1;
		}

		if j > self.i {
			let tok = Token {
				s: &self.s[self.i..j],
				begin: self.i,
			};
			self.i = j;
			Some(tok)
		} else {
			None
		}
	}
}

/// Splits a `key=value` token into its two halves, or `None` if there is no `=`.
fn split_kv(tok: &[u8]) -> Option<(&[u8], &[u8])> {
	let eq = tok.iter().position(|&b| b == b'=')?;
	Some((&tok[..eq], &tok[eq + 1..]))
}

/// Command line argument parser.
///
/// Every byte in the command line is interpreted as an ASCII character. The four well-known
/// boolean flags are extracted eagerly at parse time; arbitrary `key=value` pairs are looked up
/// on demand with [`Self::get_value`].
pub struct BootConfig<'s> {
	/// The raw command line, kept around so [`Self::get_value`] can rescan it.
	raw: &'s [u8],

	/// Enables the serial console before VGA/paging are up, for debugging very early boot.
	earlycon: bool,
	/// Runs the built-in smoke tests after subsystem init and reports the outcome, instead of
	/// starting the scheduler.
	boottest: bool,
	/// Deliberately triggers a `panic!` shortly after boot, to exercise the panic path.
	testpanic: bool,
	/// Deliberately triggers a page fault shortly after boot, to exercise the panic path's fault
	/// decoding.
	testpagefault: bool,
}

impl<'s> BootConfig<'s> {
	/// Parses the given command line and returns a new instance.
	///
	/// Rejects lines longer than [`MAX_LEN`] bytes. Unrecognized flags (any bare token without an
	/// `=` that isn't one of the four known ones) are an error; unrecognized `key=value` pairs are
	/// accepted and simply ignored unless looked up by name.
	pub fn parse(cmdline: &'s [u8]) -> Result<Self, ParseError<'s>> {
		if cmdline.len() > MAX_LEN {
			return Err(ParseError::new(
				cmdline,
				"command line exceeds maximum length",
				None,
			));
		}

		let mut s = Self {
			raw: cmdline,
			earlycon: false,
			boottest: false,
			testpanic: false,
			testpagefault: false,
		};

		let iter = TokenIterator { s: cmdline, i: 0 };
		for token in iter {
			if split_kv(token.s).is_some() {
				continue;
			}

			match token.s {
				b"earlycon" => s.earlycon = true,
				b"boottest" => s.boottest = true,
				b"testpanic" => s.testpanic = true,
				b"testpagefault" => s.testpagefault = true,
				_ => {
					return Err(ParseError::new(
						cmdline,
						"invalid argument",
						Some((token.begin, token.s.len())),
					));
				}
			}
		}

		Ok(s)
	}

	/// Tells whether `earlycon` was given.
	pub fn earlycon(&self) -> bool {
		self.earlycon
	}

	/// Tells whether `boottest` was given.
	pub fn boottest(&self) -> bool {
		self.boottest
	}

	/// Tells whether `testpanic` was given.
	pub fn testpanic(&self) -> bool {
		self.testpanic
	}

	/// Tells whether `testpagefault` was given.
	pub fn testpagefault(&self) -> bool {
		self.testpagefault
	}

	/// Tells whether the exact token `name` appears standalone (not part of a `key=value` pair)
	/// in the command line.
	pub fn has_flag(&self, name: &[u8]) -> bool {
		TokenIterator {
			s: self.raw,
			i: 0,
		}
		.any(|tok| tok.s == name)
	}

	/// Returns the value associated with `key` in a `key=value` pair, or `None` if `key` isn't
	/// present.
	pub fn get_value(&self, key: &[u8]) -> Option<&'s [u8]> {
		TokenIterator {
			s: self.raw,
			i: 0,
		}
		.find_map(|tok| split_kv(tok.s).filter(|(k, _)| *k == key).map(|(_, v)| v))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn empty() {
		let cl = BootConfig::parse(b"").unwrap();
		assert!(!cl.earlycon());
		assert!(!cl.boottest());
	}

	#[test_case]
	fn known_flags() {
		let cl = BootConfig::parse(b"earlycon boottest").unwrap();
		assert!(cl.earlycon());
		assert!(cl.boottest());
		assert!(!cl.testpanic());
		assert!(!cl.testpagefault());
	}

	#[test_case]
	fn unknown_flag_is_error() {
		assert!(BootConfig::parse(b"bogus").is_err());
	}

	#[test_case]
	fn key_value_pairs_are_not_flags() {
		let cl = BootConfig::parse(b"loglevel=debug earlycon").unwrap();
		assert!(cl.earlycon());
		assert_eq!(cl.get_value(b"loglevel"), Some(&b"debug"[..]));
		assert_eq!(cl.get_value(b"missing"), None);
	}

	#[test_case]
	fn too_long_is_error() {
		let long = [b'a'; MAX_LEN + 1];
		assert!(BootConfig::parse(&long).is_err());
	}

	#[test_case]
	fn has_flag_ignores_kv_pairs() {
		let cl = BootConfig::parse(b"foo=earlycon").unwrap();
		assert!(!cl.has_flag(b"earlycon"));
	}
}
