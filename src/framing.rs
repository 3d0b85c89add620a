//! Demultiplexing of framed navigation responses.
//!
//! The server separates the initial document from later streaming updates with
//! `<!--{boundary}-->`, where `boundary` is announced in a response header. Reads don't respect
//! frame boundaries (or UTF-8 sequence boundaries), so both are reassembled here.

use core::str;

/// The literal delimiter placed between frames for a given boundary token.
#[must_use]
pub fn boundary_marker(token: &str) -> String {
	format!("<!--{}-->", token)
}

/// Splits incrementally decoded text on a boundary marker.
#[derive(Debug)]
pub struct FrameSplitter {
	marker: String,
	buffer: String,
}

impl FrameSplitter {
	/// `marker` is the literal delimiter, see [`boundary_marker`].
	///
	/// # Panics
	///
	/// Iff `marker` is empty.
	#[must_use]
	pub fn new(marker: impl Into<String>) -> Self {
		let marker = marker.into();
		assert!(!marker.is_empty(), "frame boundary marker must not be empty");
		Self { marker, buffer: String::new() }
	}

	/// Feeds `text` and returns every frame it completed, in order.
	///
	/// A frame is completed by a marker even if it is empty, since the server emitted it explicitly.
	pub fn push(&mut self, text: &str) -> Vec<String> {
		// A marker may have started in an earlier chunk, so re-scan the unmatched tail.
		let mut search_from = self.buffer.len().saturating_sub(self.marker.len() - 1);
		while !self.buffer.is_char_boundary(search_from) {
			search_from -= 1;
		}
		self.buffer.push_str(text);

		let mut frames = Vec::new();
		while let Some(offset) = self.buffer[search_from..].find(&self.marker) {
			let end = search_from + offset;
			let rest = self.buffer.split_off(end + self.marker.len());
			self.buffer.truncate(end);
			frames.push(core::mem::replace(&mut self.buffer, rest));
			search_from = 0;
		}
		frames
	}

	/// Ends the stream, returning whatever followed the last marker unless that is empty.
	#[must_use]
	pub fn finish(self) -> Option<String> {
		Some(self.buffer).filter(|rest| !rest.is_empty())
	}
}

/// Streaming UTF-8 decoder that never splits a multi-byte sequence across chunks.
///
/// Invalid sequences decode as U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
	pending: Vec<u8>,
}

impl Utf8Decoder {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn decode(&mut self, chunk: &[u8]) -> String {
		self.pending.extend_from_slice(chunk);
		let mut decoded = String::with_capacity(self.pending.len());
		let mut consumed = 0;
		loop {
			match str::from_utf8(&self.pending[consumed..]) {
				Ok(valid) => {
					decoded.push_str(valid);
					consumed = self.pending.len();
					break;
				}
				Err(error) => {
					let valid_up_to = consumed + error.valid_up_to();
					decoded.push_str(str::from_utf8(&self.pending[consumed..valid_up_to]).unwrap_or_default());
					match error.error_len() {
						Some(invalid) => {
							decoded.push(char::REPLACEMENT_CHARACTER);
							consumed = valid_up_to + invalid;
						}
						// Incomplete sequence at the end: wait for more input.
						None => {
							consumed = valid_up_to;
							break;
						}
					}
				}
			}
		}
		self.pending.drain(..consumed);
		decoded
	}

	/// Flushes a trailing incomplete sequence, if any.
	#[must_use]
	pub fn finish(self) -> String {
		if self.pending.is_empty() {
			String::new()
		} else {
			char::REPLACEMENT_CHARACTER.to_string()
		}
	}
}
