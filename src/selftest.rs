//! Selftesting: unit tests or integration tests that run on the kernel itself.
//!
//! # Issues
//!
//! Since the kernel cannot reset itself between tests, this method of testing isn't fully
//! trustworthy — a test might corrupt state for the next one in a way that makes it pass when it
//! shouldn't. Unlikely in practice, but worth keeping in mind.

use core::any::type_name;

/// Trait for any testable feature. Blanket-implemented for any `Fn()`, so `#[test_case]` just
/// needs to be a plain function.
pub trait Testable {
	/// Runs the corresponding test, printing its name and outcome.
	fn run(&self);
}

impl<T> Testable for T
where
	T: Fn(),
{
	fn run(&self) {
		let name = type_name::<T>();
		crate::print!("test {} ... ", name);
		self();
		crate::println!("ok");
	}
}

/// Runs every `#[test_case]` and prints a summary.
///
/// This is the `#[test_runner]` for `cargo test` builds only: `#[test_case]`-annotated functions
/// are compiled solely under `cfg(test)`, the same as the standard library's `#[test]`, so this
/// runner never exists in the bootable kernel image. [`boot_report`] is the equivalent for that
/// binary, invoked directly from [`crate::kernel`] when the `boottest` command-line flag is given.
pub fn runner(tests: &[&dyn Testable]) {
	crate::println!("Running {} tests", tests.len());

	for test in tests {
		test.run();
	}

	crate::println!("All tests passed");
}

/// Runs the memory/paging/heap smoke tests described by the `boottest` command-line flag and
/// prints a pass/fail report, then returns so bring-up can continue.
///
/// Exercises the three end-to-end scenarios the subsystems are expected to satisfy after
/// bring-up: PMM reuse of a freed frame (S1), the paging identity map (S2), and heap
/// split-then-coalesce back to the original free span (S3). Unlike `#[test_case]`s, this runs in
/// every build, since it's meant to be reachable from a normally booted image, not just `cargo
/// test`.
pub fn boot_report() {
	crate::println!("Running boot self-test");

	report("pmm reuse", pmm_reuse);
	report("paging identity map", paging_identity_map);
	report("heap split and coalesce", heap_split_coalesce);

	crate::println!("Boot self-test complete");
}

fn report(name: &str, test: fn() -> Result<(), &'static str>) {
	crate::print!("  {name} ... ");
	match test() {
		Ok(()) => crate::println!("ok"),
		Err(e) => crate::println!("FAILED: {e}"),
	}
}

/// S1: three allocations come back distinct and page-aligned; freeing the middle one and
/// allocating again returns exactly that address.
fn pmm_reuse() -> Result<(), &'static str> {
	use crate::memory::pmm;

	let p1 = pmm::alloc().map_err(|_| "alloc 1 failed")?;
	let p2 = pmm::alloc().map_err(|_| "alloc 2 failed")?;
	let p3 = pmm::alloc().map_err(|_| "alloc 3 failed")?;

	if p1 == p2 || p2 == p3 || p1 == p3 {
		return Err("allocations were not distinct");
	}
	if p1 % crate::memory::PAGE_SIZE != 0
		|| p2 % crate::memory::PAGE_SIZE != 0
		|| p3 % crate::memory::PAGE_SIZE != 0
	{
		return Err("allocation was not page-aligned");
	}

	pmm::free(p2);
	let p4 = pmm::alloc().map_err(|_| "alloc 4 failed")?;
	if p4 != p2 {
		return Err("freed frame was not reused first");
	}

	pmm::free(p1);
	pmm::free(p3);
	pmm::free(p4);
	Ok(())
}

/// S2: the identity-mapped first 4 MiB translates to itself; the first page past it is unmapped.
fn paging_identity_map() -> Result<(), &'static str> {
	use crate::memory::paging;

	if paging::get_physical(0x1000) != Some(0x1000) {
		return Err("0x1000 did not translate to itself");
	}
	if paging::get_physical(0x3ffffc) != Some(0x3ffffc) {
		return Err("0x3ffffc did not translate to itself");
	}
	if paging::get_physical(0x400000).is_some() {
		return Err("0x400000 was unexpectedly mapped");
	}
	Ok(())
}

/// S3: allocating two blocks out of one free span and freeing them both merges them back into a
/// single free block, reclaiming both the headers the two splits introduced along with the data,
/// so `used`/`free` settle back to exactly where they started.
fn heap_split_coalesce() -> Result<(), &'static str> {
	use crate::memory::heap;

	let (total, used_before, free_before) = heap::stats();

	let a = heap::alloc(32).map_err(|_| "alloc a failed")?;
	let b = heap::alloc(64).map_err(|_| "alloc b failed")?;

	unsafe {
		heap::free(a);
		heap::free(b);
	}

	let (total_after, used_after, free_after) = heap::stats();
	if total_after != total {
		return Err("total bytes changed across alloc/free");
	}
	if used_after + free_after != total {
		return Err("used + free no longer equals total");
	}
	if used_after != used_before {
		return Err("used bytes did not settle back to baseline");
	}
	if free_after != free_before {
		return Err("free bytes did not settle back to baseline");
	}
	Ok(())
}
