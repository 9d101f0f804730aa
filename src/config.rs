use argh::FromArgs;

pub const DEFAULT_PROMPT: &str = "enter command here: > ";
/// Background jobs tracked at once; further launches run untracked.
pub const MAX_JOBS: usize = 100;
pub const HISTORY_CAPACITY: usize = 200;
/// Tokens accepted on one input line.
pub const MAX_TOKENS: usize = 1000;

/// A small interactive shell with one-pipe pipelines, file redirection and
/// background jobs.
#[derive(FromArgs, Debug, PartialEq)]
pub struct Config {
	/// prompt printed before each input line
	#[argh(option, default = "String::from(DEFAULT_PROMPT)")]
	pub prompt: String,

	/// number of background jobs the job table can track
	#[argh(option, default = "MAX_JOBS")]
	pub max_jobs: usize,

	/// number of lines kept by `history`
	#[argh(option, default = "HISTORY_CAPACITY")]
	pub history_size: usize,

	/// maximum number of tokens on one input line
	#[argh(option, default = "MAX_TOKENS")]
	pub max_tokens: usize,
}

#[cfg(test)]
impl Default for Config {
	fn default() -> Config {
		Config {
			prompt: String::from(DEFAULT_PROMPT),
			max_jobs: MAX_JOBS,
			history_size: HISTORY_CAPACITY,
			max_tokens: MAX_TOKENS,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_constants() {
		let config = Config::from_args(&["minish"], &[]).unwrap();
		assert_eq!(config, Config::default());
	}

	#[test]
	fn flags_override_defaults() {
		let config = Config::from_args(&["minish"], &["--prompt", "$ ", "--max-jobs", "3", "--history-size", "5"]).unwrap();
		assert_eq!(config.prompt, "$ ");
		assert_eq!(config.max_jobs, 3);
		assert_eq!(config.history_size, 5);
		assert_eq!(config.max_tokens, MAX_TOKENS);
	}

	#[test]
	fn bad_numbers_are_rejected() {
		assert!(Config::from_args(&["minish"], &["--max-jobs", "many"]).is_err());
	}
}
