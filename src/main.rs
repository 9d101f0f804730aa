mod builtin;
mod config;
mod error;
mod eval;
mod global;
mod history;
mod input;
mod job;
mod parser;
mod signal;
mod tokenizer;
mod types;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use builtin::Flow;
use config::Config;
use input::{Event, LineReader};

const LOG_ENV: &str = "MINISH_LOG";

fn print_prompt(prompt: &str) {
	let mut stdout = io::stdout();
	let _ = stdout.write_all(prompt.as_bytes());
	let _ = stdout.flush();
}

fn report_completions(state: &mut global::State) -> bool {
	let done = state.reaper.drain(&mut state.job_table);
	for completion in &done {
		let status = if completion.succeeded { "Done" } else { "Failed" };
		match completion.job {
			Some(ref job) => println!("\n[{}] {} {} {}", job.number(), status, completion.pid, job.command),
			None => println!("\n[-] {} {}", status, completion.pid),
		}
	}
	!done.is_empty()
}

fn execute_line(state: &mut global::State, line: &[u8]) -> Result<Flow, error::ExecError> {
	if let Some(b) = builtin::match_builtin(line) {
		debug!(builtin = b.name, "running builtin");
		return Ok((b.func)(state, &b.args));
	}
	let pipeline = parser::parse(line, state.config.max_tokens)?;
	eval::eval(&mut state.job_table, &pipeline)?;
	Ok(Flow::Continue)
}

fn run(config: Config) -> anyhow::Result<()> {
	let reaper = signal::Reaper::install().context("cannot install signal handlers")?;
	let mut state = global::State::new(config, reaper);
	let mut reader = LineReader::new(io::stdin());

	loop {
		report_completions(&mut state);
		print_prompt(&state.config.prompt);
		let line = loop {
			match reader.next_event(state.reaper.notify_fd()).context("cannot read input")? {
				Event::Line(line) => break line,
				Event::Notified => {
					if report_completions(&mut state) {
						print_prompt(&state.config.prompt);
					}
				},
				Event::Eof => {
					debug!("end of input");
					return Ok(());
				},
			}
		};

		let line = tokenizer::trim(&line);
		if line.is_empty() {
			continue;
		}
		state.history.push(line);

		match execute_line(&mut state, line) {
			Ok(Flow::Continue) => {},
			Ok(Flow::Exit) => return Ok(()),
			Err(e) => {
				if e.is_fatal() {
					return Err(e.into());
				}
				eprintln!("minish: {}", e);
			},
		}
	}
}

fn main() -> ExitCode {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();

	let config: Config = argh::from_env();
	debug!(?config, "starting");
	match run(config) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("minish: {:#}", e);
			ExitCode::FAILURE
		},
	}
}
