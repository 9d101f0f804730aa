use std::io::{self, Write};
use std::str;

use crate::error::ExecError;
use crate::global;
use crate::signal;
use crate::tokenizer;
use crate::types::Token;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow { Continue, Exit }

pub type Builtin = fn(&mut global::State, &[Token]) -> Flow;

pub struct Invocation {
	pub name: &'static str,
	pub func: Builtin,
	pub args: Vec<Token>,
}

pub fn builtin_exit(_: &mut global::State, _: &[Token]) -> Flow {
	Flow::Exit
}

pub fn builtin_jobs(state: &mut global::State, _: &[Token]) -> Flow {
	if state.job_table.is_empty() {
		println!("no jobs");
	}
	for job in state.job_table.list() {
		println!("[{}] Running {}", job.number(), job.command);
	}
	Flow::Continue
}

pub fn builtin_history(state: &mut global::State, _: &[Token]) -> Flow {
	let stdout = io::stdout();
	let mut out = stdout.lock();
	for (i, line) in state.history.iter().enumerate() {
		let _ = write!(out, "{:5}  ", i + 1);
		let _ = out.write_all(line);
		let _ = out.write_all(b"\n");
	}
	let _ = out.flush();
	Flow::Continue
}

fn parse_job_number(args: &[Token]) -> Result<Option<usize>, ()> {
	match args.first() {
		None => Ok(None),
		Some(&Token::Word(ref s)) => str::from_utf8(s).map_err(|_| ())?.parse().map(Some).map_err(|_| ()),
		Some(_) => Err(()),
	}
}

pub fn builtin_fg(state: &mut global::State, args: &[Token]) -> Flow {
	let number = match parse_job_number(args) {
		Ok(n) => n,
		Err(()) => {
			eprintln!("minish: fg: no such job");
			return Flow::Continue;
		},
	};
	let r = state.job_table.bring_to_foreground(number, |job| {
		println!("{}", job.command);
		signal::wait_foreground(&[job.pid]).map_err(ExecError::Wait)
	});
	if let Err(e) = r {
		eprintln!("minish: fg: {}", e);
	}
	Flow::Continue
}

/// `exit`, `jobs` and `history` must be the whole line; `fg` takes an
/// optional job number.
pub fn match_builtin(line: &[u8]) -> Option<Invocation> {
	let (name, func): (&'static str, Builtin) = match line {
		b"exit" => ("exit", builtin_exit),
		b"jobs" => ("jobs", builtin_jobs),
		b"history" => ("history", builtin_history),
		_ => {
			let mut tokens = tokenizer::tokenize(line);
			if !matches!(tokens.first(), Some(Token::Word(name)) if name == b"fg") {
				return None;
			}
			let args = tokens.split_off(1);
			return Some(Invocation { name: "fg", func: builtin_fg, args: args });
		},
	};
	Some(Invocation { name: name, func: func, args: vec![] })
}
