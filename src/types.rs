use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
	Pipe,
	Input,
	Output,
	Background,
	Or,
	HereDoc,
	Append,
	And,
}

impl Operator {
	pub fn from_chars(c: u8, doubled: bool) -> Option<Operator> {
		match (c, doubled) {
			(b'|', false) => Some(Operator::Pipe),
			(b'<', false) => Some(Operator::Input),
			(b'>', false) => Some(Operator::Output),
			(b'&', false) => Some(Operator::Background),
			(b'|', true) => Some(Operator::Or),
			(b'<', true) => Some(Operator::HereDoc),
			(b'>', true) => Some(Operator::Append),
			(b'&', true) => Some(Operator::And),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Operator::Pipe => "|",
			Operator::Input => "<",
			Operator::Output => ">",
			Operator::Background => "&",
			Operator::Or => "||",
			Operator::HereDoc => "<<",
			Operator::Append => ">>",
			Operator::And => "&&",
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
	Word(Vec<u8>),
	Op(Operator),
}

impl Token {
	#[cfg(test)]
	pub fn word(s: &str) -> Token {
		Token::Word(s.as_bytes().to_vec())
	}

	pub fn as_bytes(&self) -> &[u8] {
		match *self {
			Token::Word(ref s) => s,
			Token::Op(op) => op.as_str().as_bytes(),
		}
	}

	pub fn is_op(&self, op: Operator) -> bool {
		*self == Token::Op(op)
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&String::from_utf8_lossy(self.as_bytes()))
	}
}

/// One invocation's tokens as they appeared on the line, redirections included.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stage {
	pub tokens: Vec<Token>,
}

impl Stage {
	/// Display form only; bytes that are not UTF-8 show up replaced.
	pub fn text(&self) -> String {
		let words: Vec<String> = self.tokens.iter().map(Token::to_string).collect();
		words.join(" ")
	}
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub is_background: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OutputMode { Truncate, Append }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OutputTarget {
	pub path: Vec<u8>,
	pub mode: OutputMode,
}

/// A stage after redirection resolution. argv and paths keep the exact
/// bytes typed on the line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command {
	pub argv: Vec<Vec<u8>>,
	pub output: Option<OutputTarget>,
	pub input: Option<Vec<u8>>,
	pub text: String,
}

impl Command {
	pub fn name(&self) -> &[u8] {
		&self.argv[0]
	}
}
