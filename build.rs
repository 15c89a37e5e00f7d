//! The build script resolves the target architecture, compiles the freestanding
//! assembly sources that Rust cannot express on its own, and wires in the linker script.

#[path = "build/compile.rs"]
mod compile;
#[path = "build/target.rs"]
mod target;
#[path = "build/util.rs"]
mod util;

use std::{env, process::exit};
use target::Target;

fn main() {
	let profile = env::var("PROFILE").unwrap();
	let debug = profile == "debug";
	let opt_level: u32 = env::var("OPT_LEVEL").unwrap().parse().unwrap();

	let target = Target::from_env().unwrap_or_else(|e| {
		eprintln!("cannot resolve target: {e}");
		exit(1);
	});

	compile::compile_asm(&target, debug, opt_level).unwrap_or_else(|e| {
		eprintln!("assembly compilation failed: {e}");
		exit(1);
	});

	println!(
		"cargo:rerun-if-changed={}",
		target.get_linker_script_path().display()
	);
	println!(
		"cargo:rustc-link-arg=-T{}",
		target.get_linker_script_path().display()
	);
	println!("cargo:rustc-link-arg=-zmax-page-size=0x1000");
}
