use crate::error::ParseError;
use crate::tokenizer::Tokenizer;
use crate::types::*;

type ParseResult<T> = Result<T, ParseError>;

fn collect_tokens(line: &[u8], max_tokens: usize) -> ParseResult<Vec<Token>> {
	let mut tokens: Vec<Token> = vec![];
	for token in Tokenizer::new(line) {
		if tokens.len() == max_tokens {
			return Err(ParseError::TooManyTokens(max_tokens));
		}
		tokens.push(token);
	}
	Ok(tokens)
}

fn make_stage(tokens: Vec<Token>) -> ParseResult<Stage> {
	if tokens.is_empty() {
		return Err(ParseError::EmptyStage);
	}
	Ok(Stage { tokens: tokens })
}

/// Splits one line into at most two stages around the first `|`.
///
/// A trailing `&` marks the whole line as background. Any later `|` is left
/// in the second stage as an ordinary argument.
pub fn parse(line: &[u8], max_tokens: usize) -> ParseResult<Pipeline> {
	let mut tokens = collect_tokens(line, max_tokens)?;

	let is_background = tokens.last().map_or(false, |t| t.is_op(Operator::Background));
	if is_background {
		tokens.pop();
	}

	let stages = match tokens.iter().position(|t| t.is_op(Operator::Pipe)) {
		Some(i) => {
			if i > 0 && tokens[i - 1].is_op(Operator::Background) {
				return Err(ParseError::BackgroundBeforePipe);
			}
			let second = tokens.split_off(i + 1);
			tokens.pop();
			vec![make_stage(tokens)?, make_stage(second)?]
		},
		None => vec![make_stage(tokens)?],
	};

	Ok(Pipeline { stages: stages, is_background: is_background })
}

impl Stage {
	/// Pulls `<`, `>` and `>>` targets out of the stage. The last target of
	/// each direction wins.
	pub fn resolve(&self) -> ParseResult<Command> {
		let mut argv: Vec<Vec<u8>> = vec![];
		let mut input: Option<Vec<u8>> = None;
		let mut output: Option<OutputTarget> = None;

		let mut iter = self.tokens.iter();
		while let Some(token) = iter.next() {
			let (op, mode) = match *token {
				Token::Op(op @ Operator::Input) => (op, None),
				Token::Op(op @ Operator::Output) => (op, Some(OutputMode::Truncate)),
				Token::Op(op @ Operator::Append) => (op, Some(OutputMode::Append)),
				ref t => {
					argv.push(t.as_bytes().to_vec());
					continue;
				},
			};
			let target = match iter.next() {
				Some(t) => t.as_bytes().to_vec(),
				None => { return Err(ParseError::MissingRedirectTarget(op.as_str())); },
			};
			match mode {
				None => input = Some(target),
				Some(mode) => output = Some(OutputTarget { path: target, mode: mode }),
			}
		}

		if argv.is_empty() {
			return Err(ParseError::MissingProgram);
		}
		Ok(Command { argv: argv, output: output, input: input, text: self.text() })
	}
}
