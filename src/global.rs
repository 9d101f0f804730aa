use crate::config::Config;
use crate::history::History;
use crate::job::JobTable;
use crate::signal::Reaper;

/// Everything the main loop and the built-ins share. Only the main thread
/// touches it; signal handlers never do.
pub struct State {
	pub config: Config,
	pub job_table: JobTable,
	pub history: History,
	pub reaper: Reaper,
}

impl State {
	pub fn new(config: Config, reaper: Reaper) -> State {
		let job_table = JobTable::new(config.max_jobs);
		let history = History::new(config.history_size);
		State { config: config, job_table: job_table, history: history, reaper: reaper }
	}
}
