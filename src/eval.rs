use std::convert::Infallible;
use std::ffi::{CString, OsStr};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::error::ExecError;
use crate::job::JobTable;
use crate::signal;
use crate::types::*;

const OUTPUT_MODE: u32 = 0o644;

/// A resolved stage whose argv is ready for exec and whose redirection
/// files are already open in the shell.
struct Launch {
	command: Command,
	argv: Vec<CString>,
	input: Option<File>,
	output: Option<File>,
}

/// Where a child's standard streams come from before its own redirections apply.
#[derive(Default, Clone, Copy)]
struct Wiring {
	stdin: Option<RawFd>,
	stdout: Option<RawFd>,
	unused: Option<RawFd>,
}

fn redirect_error(path: &[u8], source: io::Error) -> ExecError {
	ExecError::Redirect { path: String::from_utf8_lossy(path).into_owned(), source: source }
}

fn open_input(path: &[u8]) -> Result<File, ExecError> {
	File::open(OsStr::from_bytes(path)).map_err(|e| redirect_error(path, e))
}

fn open_output(target: &OutputTarget) -> Result<File, ExecError> {
	let mut oopt = OpenOptions::new();
	oopt.write(true).create(true).mode(OUTPUT_MODE);
	let _ = match target.mode {
		OutputMode::Truncate => oopt.truncate(true),
		OutputMode::Append => oopt.append(true),
	};
	oopt.open(OsStr::from_bytes(&target.path)).map_err(|e| redirect_error(&target.path, e))
}

/// Opens every stage's files before anything is forked, inputs first, so a
/// bad path in either stage abandons the whole line.
fn prepare(commands: Vec<Command>) -> Result<Vec<Launch>, ExecError> {
	let mut launches = commands.into_iter().map(|command| -> Result<Launch, ExecError> {
		let argv = command.argv.iter().map(|s| CString::new(s.as_slice())).collect::<Result<Vec<_>, _>>()?;
		Ok(Launch { command: command, argv: argv, input: None, output: None })
	}).collect::<Result<Vec<Launch>, ExecError>>()?;

	for launch in &mut launches {
		if let Some(ref path) = launch.command.input {
			launch.input = Some(open_input(path)?);
		}
	}
	for launch in &mut launches {
		if let Some(ref target) = launch.command.output {
			launch.output = Some(open_output(target)?);
		}
	}
	Ok(launches)
}

fn do_exec_command(launch: &Launch, wiring: Wiring, is_background: bool) -> nix::Result<Infallible> {
	if is_background {
		signal::detach_from_interrupts()?;
	}
	if let Some(fd) = wiring.unused {
		unistd::close(fd)?;
	}
	if let Some(fd) = wiring.stdout {
		unistd::dup2(fd, libc::STDOUT_FILENO)?;
	}
	if let Some(fd) = wiring.stdin {
		unistd::dup2(fd, libc::STDIN_FILENO)?;
	}
	// Explicit redirections come last so they override the pipe.
	if let Some(ref file) = launch.output {
		unistd::dup2(file.as_raw_fd(), libc::STDOUT_FILENO)?;
	}
	if let Some(ref file) = launch.input {
		unistd::dup2(file.as_raw_fd(), libc::STDIN_FILENO)?;
	}
	unistd::execvp(&launch.argv[0], &launch.argv)
}

/// Writes straight to fd 2; the child must not wait on a lock held at fork time.
fn child_error(name: &[u8], reason: &str) {
	let mut msg = b"minish: ".to_vec();
	msg.extend_from_slice(name);
	msg.extend_from_slice(b": ");
	msg.extend_from_slice(reason.as_bytes());
	msg.push(b'\n');
	unsafe { libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len()); }
}

fn exec_command(launch: &Launch, wiring: Wiring, is_background: bool) -> ! {
	let s = match do_exec_command(launch, wiring, is_background) {
		Ok(never) => match never {},
		Err(Errno::ENOENT) => {
			child_error(launch.command.name(), "command not found");
			127
		},
		Err(e) => {
			child_error(launch.command.name(), e.desc());
			126
		},
	};
	unsafe { libc::_exit(s) }
}

fn spawn(launch: &Launch, wiring: Wiring, is_background: bool) -> nix::Result<Pid> {
	match unsafe { unistd::fork() }? {
		ForkResult::Parent { child } => {
			debug!(pid = child.as_raw(), command = %launch.command.text, is_background, "spawned");
			Ok(child)
		},
		ForkResult::Child => exec_command(launch, wiring, is_background),
	}
}

fn spawn_pipeline(first: &Launch, second: &Launch, is_background: bool) -> Result<Vec<Pid>, ExecError> {
	let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipeline)?;
	let (read_fd, write_fd) = (pipe_read.as_raw_fd(), pipe_write.as_raw_fd());

	let wiring = Wiring { stdin: None, stdout: Some(write_fd), unused: Some(read_fd) };
	let first_pid = spawn(first, wiring, is_background).map_err(ExecError::Pipeline)?;
	let wiring = Wiring { stdin: Some(read_fd), stdout: None, unused: Some(write_fd) };
	let second_pid = spawn(second, wiring, is_background).map_err(ExecError::Pipeline)?;

	// The reader only sees end-of-stream once every write end is closed.
	drop(pipe_read);
	drop(pipe_write);
	Ok(vec![first_pid, second_pid])
}

fn register(jobs: &mut JobTable, launches: &[Launch], pids: &[Pid]) {
	for (launch, &pid) in launches.iter().zip(pids) {
		match jobs.register(pid, &launch.command.text) {
			Ok(job) => println!("[{}] {} {}", job.number(), pid, job.command),
			Err(e) => eprintln!("minish: {}", e),
		}
	}
}

/// Runs one parsed line: resolves redirections, forks each stage, and
/// either waits for it or records it in `jobs`.
pub fn eval(jobs: &mut JobTable, pipeline: &Pipeline) -> Result<(), ExecError> {
	let commands = pipeline.stages.iter().map(Stage::resolve).collect::<Result<Vec<_>, _>>()?;
	let launches = prepare(commands)?;

	let pids = match launches.as_slice() {
		[single] => vec![spawn(single, Wiring::default(), pipeline.is_background).map_err(ExecError::Fork)?],
		[first, second] => spawn_pipeline(first, second, pipeline.is_background)?,
		_ => unreachable!("a pipeline has one or two stages"),
	};

	if pipeline.is_background {
		register(jobs, &launches, &pids);
		Ok(())
	} else {
		signal::wait_foreground(&pids).map_err(ExecError::Wait)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use std::io::{Read, Write};

	use crate::parser;

	fn commands(line: &str) -> Vec<Command> {
		parser::parse(line.as_bytes(), 100).unwrap().stages.iter().map(|s| s.resolve().unwrap()).collect()
	}

	#[test]
	fn output_is_truncated_or_appended() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.txt");
		fs::write(&path, "old contents\n").unwrap();
		let p = path.to_str().unwrap();

		let mut f = open_output(&OutputTarget { path: p.as_bytes().to_vec(), mode: OutputMode::Append }).unwrap();
		f.write_all(b"more\n").unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "old contents\nmore\n");

		let mut f = open_output(&OutputTarget { path: p.as_bytes().to_vec(), mode: OutputMode::Truncate }).unwrap();
		f.write_all(b"new\n").unwrap();
		assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
	}

	#[test]
	fn created_output_has_mode_0644() {
		use std::os::unix::fs::PermissionsExt;
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("fresh");
		open_output(&OutputTarget { path: path.as_os_str().as_bytes().to_vec(), mode: OutputMode::Truncate }).unwrap();
		let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
		// the umask may only remove bits
		assert_eq!(mode & !0o644, 0);
	}

	#[test]
	fn prepare_opens_files_for_every_stage() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("in.txt");
		let output = dir.path().join("out.txt");
		fs::write(&input, "data").unwrap();
		let line = format!("cat < {} | wc -c > {}", input.display(), output.display());

		let launches = prepare(commands(&line)).unwrap();
		assert_eq!(launches.len(), 2);
		let mut buf = String::new();
		launches[0].input.as_ref().unwrap().read_to_string(&mut buf).unwrap();
		assert_eq!(buf, "data");
		assert!(launches[1].output.is_some());
		assert_eq!(launches[1].argv, vec![CString::new("wc").unwrap(), CString::new("-c").unwrap()]);
	}

	#[test]
	fn missing_input_abandons_whole_line_before_outputs() {
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("never.txt");
		let line = format!("echo hi > {} | cat < {}/missing", output.display(), dir.path().display());

		match prepare(commands(&line)) {
			Err(ExecError::Redirect { ref path, .. }) => assert!(path.ends_with("missing")),
			Err(e) => panic!("unexpected error {}", e),
			Ok(_) => panic!("missing input was accepted"),
		}
		assert!(!output.exists());
	}

	#[test]
	fn foreground_command_runs_to_completion() {
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("out.txt");
		let line = format!("echo round trip > {}", output.display());
		let mut jobs = JobTable::new(4);

		eval(&mut jobs, &parser::parse(line.as_bytes(), 100).unwrap()).unwrap();
		assert_eq!(fs::read_to_string(&output).unwrap(), "round trip\n");
		assert!(jobs.is_empty());
	}

	#[test]
	fn foreground_pipeline_connects_stages() {
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("out.txt");
		let line = format!("echo a b c | wc -w > {}", output.display());
		let mut jobs = JobTable::new(4);

		eval(&mut jobs, &parser::parse(line.as_bytes(), 100).unwrap()).unwrap();
		assert_eq!(fs::read_to_string(&output).unwrap().trim(), "3");
	}

	#[test]
	fn non_utf8_bytes_reach_the_program_and_the_file() {
		let dir = tempfile::tempdir().unwrap();
		let mut line = b"printf %s \xff > ".to_vec();
		line.extend_from_slice(dir.path().as_os_str().as_bytes());
		line.extend_from_slice(b"/out\xfe");
		let mut jobs = JobTable::new(4);

		eval(&mut jobs, &parser::parse(&line, 100).unwrap()).unwrap();
		let target = dir.path().join(OsStr::from_bytes(b"out\xfe"));
		assert_eq!(fs::read(&target).unwrap(), vec![0xff]);
	}

	#[test]
	fn unknown_program_only_fails_the_child() {
		let mut jobs = JobTable::new(4);
		let pipeline = parser::parse(b"minish-test-no-such-program", 100).unwrap();
		assert!(eval(&mut jobs, &pipeline).is_ok());
	}
}
