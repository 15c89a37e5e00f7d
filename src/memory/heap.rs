//! First-fit kernel heap.
//!
//! A singly-linked list of blocks, each preceded by a `BlockHeader`, covering `[HEAP_START,
//! heap_end)`. `heap_end` grows towards `HEAP_MAX` a page at a time, mapping freshly allocated
//! frames via [`super::paging`] as needed.

use super::paging::{self, PRESENT, WRITABLE};
use super::{pmm, PAGE_SIZE};
use crate::error::{KError, KResult};
use crate::util::up_align;
use crate::util::lock::IntMutex;
use core::mem::size_of;
use core::ptr;

/// Start of the heap's virtual range.
pub const HEAP_START: usize = 0x0050_0000;
/// First increment committed at [`init`].
const HEAP_INITIAL: usize = 0x0010_0000;
/// Hard ceiling on how far the heap may grow.
pub const HEAP_MAX: usize = 261 * 1024 * 1024;

/// Every allocation is rounded up to a multiple of this many bytes.
const BLOCK_ALIGN: usize = 16;

/// The header preceding every block, whether free or allocated.
struct BlockHeader {
	/// Usable size of this block, not counting the header.
	size: usize,
	free: bool,
	next: *mut BlockHeader,
}

struct Heap {
	first_block: *mut BlockHeader,
	heap_end: usize,
	total: usize,
	used: usize,
}

unsafe impl Send for Heap {}

static HEAP: IntMutex<Heap> = IntMutex::new(Heap {
	first_block: ptr::null_mut(),
	heap_end: HEAP_START,
	total: 0,
	used: 0,
});

unsafe fn header_of(ptr: *mut u8) -> *mut BlockHeader {
	ptr.sub(size_of::<BlockHeader>()) as *mut BlockHeader
}

unsafe fn data_of(header: *mut BlockHeader) -> *mut u8 {
	(header as *mut u8).add(size_of::<BlockHeader>())
}

/// Commits `HEAP_INITIAL` bytes so the heap can service allocations right after bring-up.
///
/// # Safety
///
/// Must be called exactly once, after [`super::paging::init`].
pub unsafe fn init() -> KResult<()> {
	let mut heap = HEAP.lock();
	expand(&mut heap, HEAP_INITIAL)
}

/// Grows the heap by `increment` bytes (rounded up to a page), mapping freshly allocated frames
/// and appending one new free block covering the new span.
fn expand(heap: &mut Heap, increment: usize) -> KResult<()> {
	let increment = up_align(increment, PAGE_SIZE);
	if heap.heap_end + increment > HEAP_MAX {
		return Err(KError::HeapExhausted);
	}

	let old_end = heap.heap_end;
	let pages = increment / PAGE_SIZE;
	for i in 0..pages {
		let frame = pmm::alloc().map_err(|_| KError::HeapExhausted)?;
		paging::map(old_end + i * PAGE_SIZE, frame, PRESENT | WRITABLE)
			.map_err(|_| KError::HeapExhausted)?;
	}
	heap.heap_end += increment;

	let new_block = old_end as *mut BlockHeader;
	let block_size = increment - size_of::<BlockHeader>();
	unsafe {
		*new_block = BlockHeader {
			size: block_size,
			free: true,
			next: ptr::null_mut(),
		};
	}

	if heap.first_block.is_null() {
		heap.first_block = new_block;
	} else {
		unsafe {
			let mut cur = heap.first_block;
			while !(*cur).next.is_null() {
				cur = (*cur).next;
			}
			(*cur).next = new_block;
		}
	}

	heap.total += block_size;
	Ok(())
}

/// Allocates `size` usable bytes, rounded up to 16 bytes, growing the heap if no free block is
/// large enough.
pub fn alloc(size: usize) -> KResult<*mut u8> {
	if size == 0 {
		return Err(KError::InvalidArgument);
	}
	let size = up_align(size, BLOCK_ALIGN);

	let mut heap = HEAP.lock();
	if let Some(ptr) = try_alloc(&mut heap, size) {
		return Ok(ptr);
	}

	let needed = (size + size_of::<BlockHeader>()).max(4 * PAGE_SIZE);
	expand(&mut heap, needed)?;
	try_alloc(&mut heap, size).ok_or(KError::HeapExhausted)
}

fn try_alloc(heap: &mut Heap, size: usize) -> Option<*mut u8> {
	unsafe {
		let mut cur = heap.first_block;
		while !cur.is_null() {
			if (*cur).free && (*cur).size >= size {
				let remainder = (*cur).size - size;
				if remainder >= size_of::<BlockHeader>() + BLOCK_ALIGN {
					let tail = (cur as *mut u8).add(size_of::<BlockHeader>()).add(size)
						as *mut BlockHeader;
					*tail = BlockHeader {
						size: remainder - size_of::<BlockHeader>(),
						free: true,
						next: (*cur).next,
					};
					(*cur).next = tail;
					(*cur).size = size;
					heap.used += size + size_of::<BlockHeader>();
				} else {
					heap.used += (*cur).size;
				}
				(*cur).free = false;
				return Some(data_of(cur));
			}
			cur = (*cur).next;
		}
	}
	None
}

/// Frees a pointer previously returned by [`alloc`]. A null pointer is a no-op.
///
/// # Safety
///
/// `ptr` must be exactly a pointer previously returned by [`alloc`]/[`realloc`], not yet freed.
pub unsafe fn free(ptr: *mut u8) {
	if ptr.is_null() {
		return;
	}

	let mut heap = HEAP.lock();
	let header = header_of(ptr);
	if (*header).free {
		return;
	}
	(*header).free = true;
	heap.used -= (*header).size;

	merge_adjacent(&mut heap);
}

/// Sweeps the block list once, merging any adjacent pair of free blocks whose addresses are
/// contiguous.
///
/// The `next` block's header occupied [`size_of::<BlockHeader>`] bytes that were charged to
/// `used` (not `free`) back when the split that created it ran: merging two free blocks reclaims
/// that header as plain usable bytes (`cur.size` grows by the header *and* `next.size`), so the
/// charge is credited back to `used` in the same step, keeping `used + free == total` exact.
fn merge_adjacent(heap: &mut Heap) {
	unsafe {
		let mut cur = heap.first_block;
		while !cur.is_null() {
			let next = (*cur).next;
			if !next.is_null() && (*cur).free && (*next).free {
				let cur_end = (cur as usize) + size_of::<BlockHeader>() + (*cur).size;
				if cur_end == next as usize {
					(*cur).size += size_of::<BlockHeader>() + (*next).size;
					(*cur).next = (*next).next;
					heap.used -= size_of::<BlockHeader>();
					continue;
				}
			}
			cur = (*cur).next;
		}
	}
}

/// Reallocates `ptr` to hold `size` bytes. `(null, n)` behaves as [`alloc`]; `(p, 0)` behaves as
/// [`free`] and returns a null pointer. Shrinking in place reuses the same pointer; growing
/// allocates fresh, copies the overlap, and frees the original.
///
/// # Safety
///
/// Same requirement on `ptr` as [`free`].
pub unsafe fn realloc(ptr: *mut u8, size: usize) -> KResult<*mut u8> {
	if ptr.is_null() {
		return alloc(size);
	}
	if size == 0 {
		free(ptr);
		return Ok(ptr::null_mut());
	}

	let old_size = (*header_of(ptr)).size;
	if old_size >= up_align(size, BLOCK_ALIGN) {
		return Ok(ptr);
	}

	let new_ptr = alloc(size)?;
	ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(size));
	free(ptr);
	Ok(new_ptr)
}

/// Size of the header charged against `used` on every split; exposed so callers that want to
/// reason about that permanent per-split overhead (the boot self-test does) don't have to
/// duplicate the layout of [`BlockHeader`].
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Returns `(total, used, free)` in bytes.
pub fn stats() -> (usize, usize, usize) {
	let heap = HEAP.lock();
	(heap.total, heap.used, heap.total - heap.used)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_case]
	fn alignment() {
		assert_eq!(up_align(1, BLOCK_ALIGN), 16);
		assert_eq!(up_align(16, BLOCK_ALIGN), 16);
		assert_eq!(up_align(17, BLOCK_ALIGN), 32);
	}
}
