//! Locking primitives.
//!
//! The kernel is uniprocessor, so a spinlock alone would never contend against another core —
//! contention instead comes from re-entry by an interrupt handler running on top of the code that
//! holds the lock. `Mutex` is a plain spinlock for use where the caller already guarantees IF=0
//! (e.g. structures only ever touched from trap context). `IntMutex` additionally disables
//! interrupts for the lifetime of the guard, which is what every singleton shared with the trap
//! dispatcher (PMM, paging, the heap, the scheduler) actually needs.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Reads and returns EFLAGS.
#[inline(always)]
fn eflags() -> u32 {
	let flags: u32;
	unsafe {
		core::arch::asm!("pushfd", "pop {0}", out(reg) flags);
	}
	flags
}

/// Bit of EFLAGS telling whether interrupts are enabled.
const EFLAGS_IF: u32 = 1 << 9;

/// A spinlock with no interrupt discipline of its own.
///
/// Safe to use only when the caller can guarantee the lock cannot be re-entered by an interrupt
/// handler running on the same CPU, either because interrupts are already disabled or because no
/// handler ever touches the protected data.
pub struct Mutex<T: ?Sized> {
	locked: AtomicBool,
	data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}

impl<T> Mutex<T> {
	/// Creates a new unlocked mutex wrapping `data`.
	pub const fn new(data: T) -> Self {
		Self {
			locked: AtomicBool::new(false),
			data: UnsafeCell::new(data),
		}
	}
}

impl<T: ?Sized> Mutex<T> {
	/// Locks the mutex, spinning until it becomes available.
	pub fn lock(&self) -> MutexGuard<'_, T> {
		while self
			.locked
			.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
			.is_err()
		{
			core::hint::spin_loop();
		}
		MutexGuard { mutex: self }
	}
}

/// An RAII guard releasing a [`Mutex`] when dropped.
pub struct MutexGuard<'m, T: ?Sized> {
	mutex: &'m Mutex<T>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		unsafe { &*self.mutex.data.get() }
	}
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		unsafe { &mut *self.mutex.data.get() }
	}
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
	fn drop(&mut self) {
		self.mutex.locked.store(false, Ordering::Release);
	}
}

/// A [`Mutex`] that additionally disables interrupts for the duration the lock is held, and
/// restores the prior interrupt-enable state (rather than unconditionally re-enabling) on
/// release.
///
/// This is the lock every subsystem shared with the trap dispatcher (the PMM bitmap, the page
/// directory, the heap free list, the ready queue and `current`) is expected to use: critical
/// sections close under `cli`/`sti`, matching the discipline the scheduler itself relies on.
pub struct IntMutex<T: ?Sized> {
	inner: Mutex<T>,
}

unsafe impl<T: ?Sized + Send> Sync for IntMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for IntMutex<T> {}

impl<T> IntMutex<T> {
	/// Creates a new unlocked mutex wrapping `data`.
	pub const fn new(data: T) -> Self {
		Self {
			inner: Mutex::new(data),
		}
	}
}

impl<T: ?Sized> IntMutex<T> {
	/// Disables interrupts, then locks the mutex.
	pub fn lock(&self) -> IntMutexGuard<'_, T> {
		let interrupts_were_enabled = eflags() & EFLAGS_IF != 0;
		unsafe {
			core::arch::asm!("cli");
		}
		IntMutexGuard {
			guard: self.inner.lock(),
			restore_interrupts: interrupts_were_enabled,
		}
	}
}

/// An RAII guard releasing an [`IntMutex`] when dropped, restoring the interrupt-enable state
/// observed when the lock was taken.
pub struct IntMutexGuard<'m, T: ?Sized> {
	guard: MutexGuard<'m, T>,
	restore_interrupts: bool,
}

impl<T: ?Sized> Deref for IntMutexGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.guard
	}
}

impl<T: ?Sized> DerefMut for IntMutexGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		&mut self.guard
	}
}

impl<T: ?Sized> Drop for IntMutexGuard<'_, T> {
	fn drop(&mut self) {
		if self.restore_interrupts {
			unsafe {
				core::arch::asm!("sti");
			}
		}
	}
}
