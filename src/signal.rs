use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::{debug, trace};

use crate::job::{Job, JobTable, WaitStatusExt};

/// Foreground children, one per pipeline stage; 0 marks an empty entry.
static FOREGROUND: [AtomicI32; 2] = [AtomicI32::new(0), AtomicI32::new(0)];

/// Write end of the SIGCHLD self-pipe; -1 until `install` runs.
static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);

/// Runs `f` without letting it clobber the interrupted code's errno.
fn preserving_errno<F: FnOnce()>(f: F) {
	let saved = Errno::last_raw();
	f();
	Errno::set_raw(saved);
}

fn forward_interrupt(slots: &[AtomicI32]) {
	preserving_errno(|| {
		for slot in slots {
			let pid = slot.load(Ordering::SeqCst);
			if pid > 0 {
				unsafe { libc::kill(pid, libc::SIGINT); }
			}
		}
	});
}

fn wake_up(notify_fd: &AtomicI32) {
	preserving_errno(|| {
		let fd = notify_fd.load(Ordering::SeqCst);
		if fd >= 0 {
			let byte = 0u8;
			// A full pipe already guarantees a pending wake-up.
			unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1); }
		}
	});
}

extern "C" fn handle_sigint(_: libc::c_int) {
	forward_interrupt(&FOREGROUND);
}

extern "C" fn handle_sigchld(_: libc::c_int) {
	wake_up(&NOTIFY_FD);
}

pub fn set_foreground(pids: &[Pid]) {
	for (slot, pid) in FOREGROUND.iter().zip(pids) {
		slot.store(pid.as_raw(), Ordering::SeqCst);
	}
}

pub fn clear_foreground() {
	for slot in &FOREGROUND {
		slot.store(0, Ordering::SeqCst);
	}
}

/// Makes a child ignore terminal interrupts; the disposition survives exec.
pub fn detach_from_interrupts() -> nix::Result<()> {
	unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }.map(|_| ())
}

#[derive(Debug, PartialEq, Eq)]
pub struct Completion {
	pub pid: Pid,
	pub succeeded: bool,
	/// `None` when the process ran without a job table entry.
	pub job: Option<Job>,
}

/// Owner of the SIGCHLD self-pipe. Reaping only ever happens in `drain`,
/// on the main thread.
#[derive(Debug)]
pub struct Reaper {
	notify_rx: OwnedFd,
	_notify_tx: OwnedFd,
}

impl Reaper {
	pub fn install() -> nix::Result<Reaper> {
		let (rx, tx) = unistd::pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK)?;
		NOTIFY_FD.store(tx.as_raw_fd(), Ordering::SeqCst);

		let flags = SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP;
		let chld = SigAction::new(SigHandler::Handler(handle_sigchld), flags, SigSet::empty());
		let int = SigAction::new(SigHandler::Handler(handle_sigint), SaFlags::SA_RESTART, SigSet::empty());
		unsafe {
			signal::sigaction(Signal::SIGCHLD, &chld)?;
			signal::sigaction(Signal::SIGINT, &int)?;
		}
		debug!(notify_fd = tx.as_raw_fd(), "signal handlers installed");
		Ok(Reaper { notify_rx: rx, _notify_tx: tx })
	}

	pub fn notify_fd(&self) -> BorrowedFd<'_> {
		self.notify_rx.as_fd()
	}

	fn discard_wakeups(&self) {
		let mut buf = [0u8; 64];
		loop {
			match unistd::read(self.notify_rx.as_raw_fd(), &mut buf) {
				Ok(n) if n > 0 => continue,
				Err(Errno::EINTR) => continue,
				_ => break,
			}
		}
	}

	/// Collects every child that has terminated so far without blocking and
	/// drops the matching jobs from `jobs`.
	pub fn drain(&self, jobs: &mut JobTable) -> Vec<Completion> {
		self.discard_wakeups();
		let mut done = vec![];
		loop {
			let status = match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
				Err(Errno::EINTR) => continue,
				Err(e) => {
					debug!(error = %e, "waitpid failed while draining");
					break;
				},
				Ok(status) => status,
			};
			let pid = match status.pid() {
				Some(pid) => pid,
				None => continue,
			};
			let job = jobs.reap(pid);
			trace!(pid = pid.as_raw(), ?status, tracked = job.is_some(), "reaped");
			done.push(Completion { pid: pid, succeeded: status.succeeded(), job: job });
		}
		done
	}
}

/// Blocks until every pid in `pids` has exited, forwarding SIGINT to them meanwhile.
pub fn wait_foreground(pids: &[Pid]) -> nix::Result<()> {
	set_foreground(pids);
	let r = pids.iter().try_for_each(|&pid| wait_exit(pid));
	clear_foreground();
	r
}

fn wait_exit(pid: Pid) -> nix::Result<()> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status @ WaitStatus::Exited(..)) | Ok(status @ WaitStatus::Signaled(..)) => {
				trace!(pid = pid.as_raw(), ?status, "foreground child finished");
				return Ok(());
			},
			Ok(_) | Err(Errno::EINTR) => continue,
			// Someone else already collected it.
			Err(Errno::ECHILD) => return Ok(()),
			Err(e) => return Err(e),
		}
	}
}
