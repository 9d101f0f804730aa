use std::{ffi, io};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("operator `&` immediately before a pipe is invalid")]
	BackgroundBeforePipe,
	#[error("empty command around `|`")]
	EmptyStage,
	#[error("missing program name")]
	MissingProgram,
	#[error("missing file name after `{0}`")]
	MissingRedirectTarget(&'static str),
	#[error("too many tokens (limit is {0})")]
	TooManyTokens(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
	#[error("job table full ({0} jobs); process {1} is not tracked")]
	TableFull(usize, i32),
	#[error("no jobs")]
	NoJobs,
	#[error("no such job")]
	NoSuchJob,
}

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{0}")]
	Parse(#[from] ParseError),
	#[error("{0}")]
	Job(#[from] JobError),
	#[error("{path}: {source}")]
	Redirect { path: String, source: io::Error },
	#[error("argument contains a nul byte: {0}")]
	Nul(#[from] ffi::NulError),
	#[error("fork failed: {0}")]
	Fork(nix::Error),
	#[error("cannot set up pipeline: {0}")]
	Pipeline(nix::Error),
	#[error("wait failed: {0}")]
	Wait(nix::Error),
}

impl ExecError {
	/// Fatal errors end the shell; everything else only discards the line.
	pub fn is_fatal(&self) -> bool {
		match *self {
			ExecError::Pipeline(_) => true,
			_ => false,
		}
	}
}
