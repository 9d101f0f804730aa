use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::error::{ExecError, JobError};

pub trait WaitStatusExt {
	fn succeeded(&self) -> bool;
}

impl WaitStatusExt for WaitStatus {
	fn succeeded(&self) -> bool {
		match *self {
			WaitStatus::Exited(_, code) => code == 0,
			_ => false,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Job {
	pub slot: usize,
	pub pid: Pid,
	pub command: String,
	seq: u64,
}

impl Job {
	/// The number shown to the user and accepted by `fg`.
	pub fn number(&self) -> usize {
		self.slot + 1
	}
}

/// Background processes by slot. A slot is reused as soon as its job is
/// reaped; slots are only materialized up to the highest one in use.
#[derive(Debug)]
pub struct JobTable {
	jobs: Vec<Option<Job>>,
	capacity: usize,
	next_seq: u64,
}

impl JobTable {
	pub fn new(capacity: usize) -> JobTable {
		JobTable { jobs: vec![], capacity: capacity, next_seq: 0 }
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.iter().all(Option::is_none)
	}

	pub fn register(&mut self, pid: Pid, command: &str) -> Result<&Job, JobError> {
		let capacity = self.capacity();
		let seq = self.next_seq;
		let slot = match self.jobs.iter().position(Option::is_none) {
			Some(slot) => slot,
			None if self.jobs.len() < capacity => {
				self.jobs.push(None);
				self.jobs.len() - 1
			},
			None => { return Err(JobError::TableFull(capacity, pid.as_raw())); },
		};
		self.next_seq += 1;
		Ok(&*self.jobs[slot].insert(Job { slot: slot, pid: pid, command: command.to_owned(), seq: seq }))
	}

	pub fn reap(&mut self, pid: Pid) -> Option<Job> {
		let job = self.jobs.iter_mut()
			.find(|o| matches!(o, Some(job) if job.pid == pid))
			.and_then(Option::take);
		while let Some(None) = self.jobs.last() {
			self.jobs.pop();
		}
		job
	}

	/// `None` picks the most recently launched job still in the table.
	pub fn select(&self, number: Option<usize>) -> Result<&Job, JobError> {
		if self.is_empty() {
			return Err(JobError::NoJobs);
		}
		match number {
			None => self.list().max_by_key(|job| job.seq).ok_or(JobError::NoJobs),
			Some(n) if n >= 1 && n <= self.capacity() => {
				self.jobs.get(n - 1).and_then(Option::as_ref).ok_or(JobError::NoSuchJob)
			},
			Some(_) => Err(JobError::NoSuchJob),
		}
	}

	/// Waits for the selected job through `wait`, then drops it from the table.
	pub fn bring_to_foreground<F>(&mut self, number: Option<usize>, wait: F) -> Result<Job, ExecError>
		where F: FnOnce(&Job) -> Result<(), ExecError>
	{
		let pid = {
			let job = self.select(number)?;
			wait(job)?;
			job.pid
		};
		Ok(self.reap(pid).ok_or(JobError::NoSuchJob)?)
	}

	pub fn list(&self) -> impl Iterator<Item = &Job> {
		self.jobs.iter().filter_map(Option::as_ref)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pid(n: i32) -> Pid {
		Pid::from_raw(n)
	}

	fn pids(table: &JobTable) -> Vec<i32> {
		table.list().map(|job| job.pid.as_raw()).collect()
	}

	#[test]
	fn register_uses_lowest_free_slot() {
		let mut table = JobTable::new(4);
		assert_eq!(table.register(pid(10), "a").unwrap().number(), 1);
		assert_eq!(table.register(pid(11), "b").unwrap().number(), 2);
		assert_eq!(table.register(pid(12), "c").unwrap().number(), 3);
		table.reap(pid(11));
		assert_eq!(table.register(pid(13), "d").unwrap().number(), 2);
		assert_eq!(pids(&table), vec![10, 13, 12]);
	}

	#[test]
	fn full_table_is_reported() {
		let mut table = JobTable::new(2);
		table.register(pid(1), "a").unwrap();
		table.register(pid(2), "b").unwrap();
		assert_eq!(table.register(pid(3), "c"), Err(JobError::TableFull(2, 3)));
		assert_eq!(pids(&table), vec![1, 2]);
	}

	#[test]
	fn huge_capacity_allocates_lazily() {
		let mut table = JobTable::new(usize::MAX);
		assert_eq!(table.register(pid(1), "a").unwrap().number(), 1);
		assert_eq!(table.register(pid(2), "b").unwrap().number(), 2);
		assert_eq!(table.select(Some(usize::MAX)), Err(JobError::NoSuchJob));
		table.reap(pid(2));
		assert_eq!(table.register(pid(3), "c").unwrap().number(), 2);
		assert_eq!(pids(&table), vec![1, 3]);
	}

	#[test]
	fn reap_unknown_pid_is_noop() {
		let mut table = JobTable::new(2);
		table.register(pid(1), "a").unwrap();
		assert_eq!(table.reap(pid(99)), None);
		assert_eq!(pids(&table), vec![1]);
	}

	#[test]
	fn table_tracks_exactly_running_set() {
		let mut table = JobTable::new(100);
		let launched: Vec<i32> = (1000 .. 1100).collect();
		for &p in &launched {
			table.register(pid(p), "sleep 1").unwrap();
		}
		// complete in an order unrelated to launch order
		let mut order = launched.clone();
		order.sort_by_key(|p| (p * 37) % 101);
		let mut running = launched.clone();
		for p in order {
			assert!(table.reap(pid(p)).is_some());
			running.retain(|&r| r != p);
			let mut now = pids(&table);
			now.sort();
			assert_eq!(now, running);
		}
		assert!(table.is_empty());
	}

	#[test]
	fn select_without_number_prefers_most_recent_launch() {
		let mut table = JobTable::new(4);
		table.register(pid(1), "a").unwrap();
		table.register(pid(2), "b").unwrap();
		table.register(pid(3), "c").unwrap();
		table.reap(pid(1));
		// pid 4 lands in slot 1, below pid 3's slot, but was launched last
		table.register(pid(4), "d").unwrap();
		assert_eq!(table.select(None).unwrap().pid, pid(4));
	}

	#[test]
	fn select_validates_numbers() {
		let mut table = JobTable::new(3);
		table.register(pid(1), "a").unwrap();
		assert_eq!(table.select(Some(1)).unwrap().pid, pid(1));
		assert_eq!(table.select(Some(0)), Err(JobError::NoSuchJob));
		assert_eq!(table.select(Some(2)), Err(JobError::NoSuchJob));
		assert_eq!(table.select(Some(4)), Err(JobError::NoSuchJob));
	}

	#[test]
	fn foreground_on_empty_table_does_not_wait() {
		let mut table = JobTable::new(3);
		let mut waited = false;
		let r = table.bring_to_foreground(None, |_| { waited = true; Ok(()) });
		match r {
			Err(ExecError::Job(JobError::NoJobs)) => {},
			other => panic!("unexpected {:?}", other),
		}
		assert!(!waited);
	}

	#[test]
	fn foreground_waits_then_reaps() {
		let mut table = JobTable::new(3);
		table.register(pid(7), "sleep 5").unwrap();
		table.register(pid(8), "sleep 6").unwrap();
		let mut waited_on = None;
		let job = table.bring_to_foreground(Some(1), |job| { waited_on = Some(job.pid); Ok(()) }).unwrap();
		assert_eq!(waited_on, Some(pid(7)));
		assert_eq!(job.command, "sleep 5");
		assert_eq!(pids(&table), vec![8]);
	}

	#[test]
	fn failed_wait_keeps_job() {
		let mut table = JobTable::new(3);
		table.register(pid(7), "sleep 5").unwrap();
		let r = table.bring_to_foreground(None, |_| Err(ExecError::Wait(nix::Error::ECHILD)));
		assert!(r.is_err());
		assert_eq!(pids(&table), vec![7]);
	}

	#[test]
	fn wait_status_success() {
		assert!(WaitStatus::Exited(pid(1), 0).succeeded());
		assert!(!WaitStatus::Exited(pid(1), 1).succeeded());
		assert!(!WaitStatus::Signaled(pid(1), nix::sys::signal::Signal::SIGINT, false).succeeded());
	}
}
