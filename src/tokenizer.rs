use crate::types::{Operator, Token};

pub struct Tokenizer<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Tokenizer<'a> {
	pub fn new(line: &'a [u8]) -> Tokenizer<'a> {
		let mut tokenizer = Tokenizer { line: line, i: 0 };
		tokenizer.skip_whitespaces();
		tokenizer
	}

	fn peek(&self) -> Option<u8> {
		self.line.get(self.i).cloned()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	/// Same set as C `isspace` in the "C" locale.
	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => true,
			_ => false,
		}
	}

	fn is_operator(c: u8) -> bool {
		match c {
			b'|' | b'&' | b'<' | b'>' => true,
			_ => false,
		}
	}

	fn is_letter(c: u8) -> bool {
		!Tokenizer::is_operator(c) && !Tokenizer::is_whitespace(c)
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Tokenizer::is_whitespace);
	}

	fn read_operator(&mut self, c: u8) -> Token {
		self.i += 1;
		let doubled = self.peek() == Some(c);
		if doubled {
			self.i += 1;
		}
		match Operator::from_chars(c, doubled) {
			Some(op) => Token::Op(op),
			None => unreachable!("not an operator character: {}", c as char),
		}
	}

	fn read_word(&mut self) -> Token {
		let orig = self.i;
		self.proceed_while(Tokenizer::is_letter);
		Token::Word(self.line[orig .. self.i].to_vec())
	}

	pub fn next_token(&mut self) -> Option<Token> {
		let c = self.peek()?;
		let token = if Tokenizer::is_operator(c) {
			self.read_operator(c)
		} else {
			self.read_word()
		};
		self.skip_whitespaces();
		Some(token)
	}
}

impl<'a> Iterator for Tokenizer<'a> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		self.next_token()
	}
}

pub fn tokenize(line: &[u8]) -> Vec<Token> {
	Tokenizer::new(line).collect()
}

/// Strips the same whitespace the tokenizer skips.
pub fn trim(line: &[u8]) -> &[u8] {
	let start = line.iter().position(|&c| !Tokenizer::is_whitespace(c)).unwrap_or(line.len());
	let end = line.iter().rposition(|&c| !Tokenizer::is_whitespace(c)).map_or(start, |i| i + 1);
	&line[start .. end]
}
