//! Process control blocks and task creation.
//!
//! A process here is a kernel-mode (or, structurally, user-mode) thread of control: its own 8
//! KiB stack, its own saved register context, nothing more — no address space of its own in v1,
//! no file descriptors, no signals. See [`scheduler`] for how the ready queue and context
//! switching built on top of this are implemented.

pub mod scheduler;

use crate::error::{KError, KResult};
use crate::gdt::{KERNEL_CS, KERNEL_DS, USER_CS, USER_DS};
use crate::idt::TrapFrame;
use crate::memory::{heap, paging};
use core::sync::atomic::{AtomicU32, Ordering};

/// Size of the kernel stack allocated for every task.
const KERNEL_STACK_SIZE: usize = 8192;

/// EFLAGS value every freshly created task starts with: interrupts enabled (bit 9), plus the
/// reserved bit 1 the CPU always reads back as set.
const INITIAL_EFLAGS: u32 = 0x202;

/// Whether a task runs with kernel or user privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Kernel,
	User,
}

/// Lifecycle state of a process, as tracked by [`scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Ready,
	Running,
	Blocked,
	Terminated,
}

/// The process control block.
///
/// `next` threads the process onto [`scheduler`]'s ready-queue linked list; it is meaningless
/// (and must be ignored) whenever the process isn't currently enqueued.
#[repr(C)]
pub struct Process {
	pub pid: u32,
	pub name: [u8; 32],
	pub state: State,
	pub mode: Mode,
	pub context: TrapFrame,
	pub kernel_stack_base: usize,
	pub user_stack_base: usize,
	pub page_directory: usize,
	pub timeslice: u32,
	pub priority: u32,
	pub next: *mut Process,
}

unsafe impl Send for Process {}

/// Default quantum, in ticks, every process is given on becoming RUNNING.
pub const DEFAULT_TIMESLICE: u32 = 10;

static NEXT_PID: AtomicU32 = AtomicU32::new(0);

fn copy_name(name: &str) -> [u8; 32] {
	let mut buf = [0u8; 32];
	let bytes = name.as_bytes();
	let len = bytes.len().min(31);
	buf[..len].copy_from_slice(&bytes[..len]);
	buf
}

/// Creates a new process named `name` that, once scheduled, starts executing `entry` in `mode`.
///
/// Allocates the PCB and an 8 KiB kernel stack from [`heap`], then paints the top of that stack
/// with a synthetic [`TrapFrame`] such that the common interrupt-return tail (`popa; pop ds; iret`)
/// transfers control to [`process_entry`] with the real entry function already sitting in `eax`
/// (restored by that same `popa`) — `process_entry` simply calls through it. The new process is
/// left in state [`State::Ready`]; the caller (or [`scheduler::init`]) enqueues it.
pub fn create(name: &str, entry: extern "C" fn(), mode: Mode) -> KResult<*mut Process> {
	let pcb_ptr = heap::alloc(core::mem::size_of::<Process>())? as *mut Process;
	let stack_ptr = match heap::alloc(KERNEL_STACK_SIZE) {
		Ok(ptr) => ptr,
		Err(e) => {
			unsafe { heap::free(pcb_ptr as *mut u8) };
			return Err(e);
		}
	};

	let kernel_stack_base = stack_ptr as usize;
	let stack_top = kernel_stack_base + KERNEL_STACK_SIZE;

	let (cs, ds) = match mode {
		Mode::Kernel => (KERNEL_CS as u32, KERNEL_DS as u32),
		Mode::User => (USER_CS as u32, USER_DS as u32),
	};

	let context = TrapFrame {
		ds,
		edi: 0,
		esi: 0,
		ebp: 0,
		esp: 0,
		ebx: 0,
		edx: 0,
		ecx: 0,
		eax: entry as usize as u32,
		int_no: 0,
		err_code: 0,
		eip: process_entry as usize as u32,
		cs,
		eflags: INITIAL_EFLAGS,
		useresp: stack_top as u32,
		ss: ds,
	};

	unsafe {
		*pcb_ptr = Process {
			pid: NEXT_PID.fetch_add(1, Ordering::Relaxed),
			name: copy_name(name),
			state: State::Ready,
			mode,
			context,
			kernel_stack_base,
			user_stack_base: 0,
			page_directory: paging::current_directory(),
			timeslice: DEFAULT_TIMESLICE,
			priority: 0,
			next: core::ptr::null_mut(),
		};
	}

	Ok(pcb_ptr)
}

extern "C" {
	/// The trampoline every task starts at; see `arch/x86/src/process.s`.
	fn process_entry();
}

/// Called by the trampoline if the task's entry function ever returns. Marks the current task
/// terminated and halts until the next tick removes it from the CPU.
///
/// Destruction of the PCB and its kernel stack is out of v1's scope; a terminated task is simply
/// never scheduled again.
#[no_mangle]
pub extern "C" fn process_exit() -> ! {
	scheduler::exit();
}
