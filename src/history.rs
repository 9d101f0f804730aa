/// Fixed-capacity ring of accepted input lines. Once full, each new line
/// overwrites the oldest one.
#[derive(Debug)]
pub struct History {
	entries: Vec<Vec<u8>>,
	capacity: usize,
	cursor: usize,
}

impl History {
	pub fn new(capacity: usize) -> History {
		History { entries: vec![], capacity: capacity, cursor: 0 }
	}

	pub fn push(&mut self, line: &[u8]) {
		if self.capacity == 0 {
			return;
		}
		if self.entries.len() < self.capacity {
			self.entries.push(line.to_vec());
		} else {
			self.entries[self.cursor] = line.to_vec();
		}
		self.cursor = (self.cursor + 1) % self.capacity;
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Oldest first.
	pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
		let (newer, older) = if self.entries.len() < self.capacity {
			self.entries.split_at(self.entries.len())
		} else {
			self.entries.split_at(self.cursor)
		};
		older.iter().chain(newer.iter()).map(Vec::as_slice)
	}
}
