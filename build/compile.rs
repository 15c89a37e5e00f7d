//! The boot stub, GDT/IDT flush trampolines and interrupt entry stubs are written in
//! assembly. This module compiles them and feeds the result into the kernel's link step.

use super::util;
use crate::target::Target;
use std::{io, path::Path};

/// Compiles the freestanding assembly that is part of the kernel's codebase.
pub fn compile_asm(target: &Target, debug: bool, opt_level: u32) -> io::Result<()> {
	let files = util::list_asm_files(Path::new(&format!("arch/{}/src", target.name)))?;
	for f in &files {
		println!("cargo:rerun-if-changed={}", f.display());
	}

	cc::Build::new()
		.flag("-nostdlib")
		.flag("-ffreestanding")
		.flag("-fno-stack-protector")
		.flag("-mno-red-zone")
		.flag("-Wall")
		.flag("-Wextra")
		.pic(false)
		.target(&target.triplet)
		.debug(debug)
		.opt_level(opt_level)
		.files(files)
		.compile("kasm");

	Ok(())
}
