//! Ready queue and round-robin preemptive scheduling.
//!
//! Grounded directly on `ProcessSchedule`/`enqueueProcess`/`dequeueProcess` in the kernel this is
//! descended from: a singly-linked FIFO of READY processes, and a scheduling decision that saves
//! the interrupted frame into the outgoing task's PCB, dequeues the next READY task, switches
//! directory if needed, and overwrites the frame in place with the incoming task's saved context
//! so the stub's `iret` resumes it instead.

use super::{Mode, Process, State, DEFAULT_TIMESLICE};
use crate::error::KResult;
use crate::idt::TrapFrame;
use crate::memory::paging;
use crate::util::lock::IntMutex;
use core::arch::asm;
use core::ptr;

/// A singly-linked FIFO of READY processes, threaded through [`Process::next`].
struct Queue {
	head: *mut Process,
	tail: *mut Process,
}

impl Queue {
	const fn empty() -> Self {
		Self {
			head: ptr::null_mut(),
			tail: ptr::null_mut(),
		}
	}

	fn push(&mut self, p: *mut Process) {
		unsafe {
			(*p).next = ptr::null_mut();
		}
		if self.tail.is_null() {
			self.head = p;
		} else {
			unsafe {
				(*self.tail).next = p;
			}
		}
		self.tail = p;
	}

	fn pop(&mut self) -> Option<*mut Process> {
		if self.head.is_null() {
			return None;
		}
		let p = self.head;
		unsafe {
			self.head = (*p).next;
			(*p).next = ptr::null_mut();
		}
		if self.head.is_null() {
			self.tail = ptr::null_mut();
		}
		Some(p)
	}
}

struct SchedulerState {
	ready: Queue,
	current: *mut Process,
	enabled: bool,
}

unsafe impl Send for SchedulerState {}

static STATE: IntMutex<SchedulerState> = IntMutex::new(SchedulerState {
	ready: Queue::empty(),
	current: ptr::null_mut(),
	enabled: false,
});

/// Creates the PCB representing the already-running boot context (pid 0, "idle", kernel mode,
/// state RUNNING) and installs it as the current task.
///
/// # Safety
///
/// Must run exactly once, after [`crate::memory::heap::init`] and before [`enable`].
pub unsafe fn init() -> KResult<()> {
	let pcb_ptr = crate::memory::heap::alloc(core::mem::size_of::<Process>())? as *mut Process;
	*pcb_ptr = Process {
		pid: 0,
		name: super::copy_name("idle"),
		state: State::Running,
		mode: Mode::Kernel,
		context: core::mem::zeroed(),
		kernel_stack_base: 0,
		user_stack_base: 0,
		page_directory: paging::current_directory(),
		timeslice: DEFAULT_TIMESLICE,
		priority: 0,
		next: ptr::null_mut(),
	};
	STATE.lock().current = pcb_ptr;
	Ok(())
}

/// Creates a task named `name` starting at `entry` in `mode`, and enqueues it READY.
pub fn spawn(name: &str, entry: extern "C" fn(), mode: Mode) -> KResult<()> {
	let p = super::create(name, entry, mode)?;
	STATE.lock().ready.push(p);
	Ok(())
}

/// Lets the scheduler start making decisions on subsequent ticks/yields. Before this is called,
/// [`schedule`] is a no-op, so bring-up code can finish creating the first batch of tasks
/// without one of them being switched to mid-setup.
pub fn enable() {
	STATE.lock().enabled = true;
}

/// The scheduling decision, run from the timer tick and from the `int 0x81` yield vector with
/// the interrupted frame.
///
/// A no-op until [`enable`] has been called. If the current task is still RUNNING, its state is
/// mirrored into its PCB, it's marked READY, its timeslice is decremented (and replenished once
/// it hits zero), and it's requeued. A TERMINATED current task is neither mirrored nor requeued.
/// If the ready queue is empty, the current task simply keeps running. Otherwise the next task's
/// saved context overwrites `frame` in place — the stub that called this resumes it on `iret`.
pub fn schedule(frame: &mut TrapFrame) {
	let mut state = STATE.lock();
	if !state.enabled {
		return;
	}

	let current = state.current;
	unsafe {
		match (*current).state {
			State::Running => {
				(*current).context = *frame;
				(*current).state = State::Ready;
				(*current).timeslice -= 1;
				if (*current).timeslice == 0 {
					(*current).timeslice = DEFAULT_TIMESLICE;
				}
				state.ready.push(current);
			}
			// `block()` has already flipped the state to BLOCKED before trapping in here via
			// `int 0x81`, so this is the only chance to capture the frame it's yielding from;
			// skipping it would resume the task from a stale context on `unblock`.
			State::Blocked => {
				(*current).context = *frame;
			}
			State::Terminated => {}
			State::Ready => {}
		}

		let Some(next) = state.ready.pop() else {
			(*current).state = State::Running;
			return;
		};

		if (*next).page_directory != (*current).page_directory {
			paging::switch_directory((*next).page_directory);
		}

		*frame = (*next).context;
		(*next).state = State::Running;
		(*next).timeslice = DEFAULT_TIMESLICE;
		state.current = next;
	}
}

/// Triggers a cooperative context switch via the `int 0x81` software vector. A no-op before
/// [`enable`].
pub fn yield_now() {
	if !STATE.lock().enabled {
		return;
	}
	unsafe {
		asm!("int 0x81");
	}
}

/// Marks the running task BLOCKED, then yields the CPU.
pub fn block() {
	{
		let state = STATE.lock();
		unsafe {
			(*state.current).state = State::Blocked;
		}
	}
	yield_now();
}

/// Moves `p` from BLOCKED back to READY and onto the tail of the ready queue. A no-op if `p`
/// isn't currently BLOCKED.
pub fn unblock(p: *mut Process) {
	let mut state = STATE.lock();
	unsafe {
		if (*p).state == State::Blocked {
			(*p).state = State::Ready;
			state.ready.push(p);
		}
	}
}

/// Marks the running task TERMINATED and halts until the next tick removes it from the CPU.
///
/// Called by [`super::process_exit`] when a task's entry function returns. Interrupts are still
/// enabled at this point (the task resumed with `EFLAGS.IF=1`), so the next timer tick's
/// [`schedule`] call sees a TERMINATED current, skips requeuing it, and overwrites this very
/// `hlt` loop's interrupt frame with whatever runs next — this loop's body is never actually
/// reached again past the first `hlt`.
pub fn exit() -> ! {
	{
		let state = STATE.lock();
		unsafe {
			(*state.current).state = State::Terminated;
		}
	}
	loop {
		unsafe {
			asm!("hlt");
		}
	}
}
