//! Small filesystem helpers for the build script.

use std::{fs, io, path::{Path, PathBuf}};

/// Recursively collects every `.s`/`.asm` file under `dir`.
pub fn list_asm_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		if path.is_dir() {
			files.extend(list_asm_files(&path)?);
			continue;
		}
		match path.extension().and_then(|e| e.to_str()) {
			Some("s") | Some("asm") => files.push(path),
			_ => {}
		}
	}
	Ok(files)
}
