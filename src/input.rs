use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use nix::errno::Errno;
use nix::poll::{self, PollFd, PollFlags, PollTimeout};
use nix::unistd;
use tracing::trace;

/// Bytes requested from the input per read.
pub const READ_CHUNK: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
pub enum Event {
	Line(Vec<u8>),
	/// The notification descriptor became readable before a full line arrived.
	Notified,
	Eof,
}

/// Splits raw input into lines while also watching a notification descriptor.
pub struct LineReader<F: AsFd> {
	source: F,
	pending: Vec<u8>,
	eof: bool,
}

impl<F: AsFd> LineReader<F> {
	pub fn new(source: F) -> LineReader<F> {
		LineReader { source: source, pending: vec![], eof: false }
	}

	fn take_line(&mut self) -> Option<Vec<u8>> {
		let pos = self.pending.iter().position(|&c| c == b'\n')?;
		let rest = self.pending.split_off(pos + 1);
		let mut line = mem::replace(&mut self.pending, rest);
		line.pop();
		Some(line)
	}

	fn fill(&mut self) -> nix::Result<()> {
		let mut buf = [0u8; READ_CHUNK];
		match unistd::read(self.source.as_fd().as_raw_fd(), &mut buf) {
			Ok(0) => self.eof = true,
			Ok(n) => self.pending.extend_from_slice(&buf[.. n]),
			Err(Errno::EINTR) | Err(Errno::EAGAIN) => {},
			Err(e) => return Err(e),
		}
		trace!(buffered = self.pending.len(), eof = self.eof, "read input");
		Ok(())
	}

	pub fn next_event(&mut self, notify: BorrowedFd<'_>) -> nix::Result<Event> {
		loop {
			if let Some(line) = self.take_line() {
				return Ok(Event::Line(line));
			}
			if self.eof {
				if self.pending.is_empty() {
					return Ok(Event::Eof);
				}
				return Ok(Event::Line(mem::replace(&mut self.pending, vec![])));
			}

			let (notified, readable) = {
				let mut fds = [
					PollFd::new(notify, PollFlags::POLLIN),
					PollFd::new(self.source.as_fd(), PollFlags::POLLIN),
				];
				match poll::poll(&mut fds, PollTimeout::NONE) {
					Ok(_) => {},
					Err(Errno::EINTR) => continue,
					Err(e) => return Err(e),
				}
				let ready = |fd: &PollFd, flags: PollFlags| fd.revents().map_or(false, |r| r.intersects(flags));
				(ready(&fds[0], PollFlags::POLLIN),
				 ready(&fds[1], PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL))
			};
			if notified {
				return Ok(Event::Notified);
			}
			if readable {
				self.fill()?;
			}
		}
	}
}
