//! LZ decompression of V2 archive blocks.
//!
//! A compressed block starts with a u32 (the expected output size), followed by groups of one
//! control byte and up to 8 records. Control bits are consumed from the least significant end:
//! a set bit is a literal byte, a clear bit a two byte back-reference into the last 4 KiB of output.
//!
//! ```text
//! back-reference:  byte 0   pppppppp   position, low 8 bits
//!                  byte 1   ppppcccc   position, high 4 bits (signed) | count - 3
//! ```

use byteorder::{ReadBytesExt, LE};
use crate::error::{Context, Error, Result};

pub const WINDOW_SIZE: i64 = 4096;
/// Added to the raw back-reference position.
pub const POSITION_OFFSET: i64 = 18;
/// Added to the raw back-reference count.
pub const COUNT_OFFSET: usize = 3;
/// Caps how much the size header may preallocate.
const MAX_CAPACITY_HINT: usize = 1 << 20;

struct ByteCursor<'a> {
	buf: &'a [u8],
}

impl<'a> ByteCursor<'a> {
	fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	fn next(&mut self) -> Result<u8> {
		let (&byte, rest) = self.buf.split_first().ok_or(Error::TruncatedStream { context: "compressed block" })?;
		self.buf = rest;
		Ok(byte)
	}
}

/// Expands one compressed block. Stops when the input is exhausted.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
	let mut header = input;
	let size_hint = header.read_u32::<LE>().context("compressed block header")? as usize;
	let mut input = ByteCursor { buf: header };
	let mut output = Vec::with_capacity(size_hint.min(MAX_CAPACITY_HINT));
	while !input.is_empty() {
		let control = input.next()?;
		for bit in 0..8 {
			if input.is_empty() {
				break;
			}
			if control & (1 << bit) != 0 {
				output.push(input.next()?);
			} else {
				let low = input.next()?;
				let high = input.next()?;
				copy_back_reference(&mut output, low, high);
			}
		}
	}
	Ok(output)
}

/// Absolute output index of a raw back-reference position, inside the most recent window.
/// Moved forward by whole windows to the first index neither negative nor before the window start.
fn window_position(raw_position: i64, output_len: usize) -> i64 {
	let position = raw_position + POSITION_OFFSET;
	let lower = (output_len as i64 - WINDOW_SIZE).max(0);
	match position < lower {
		true => position + (lower - position + WINDOW_SIZE - 1) / WINDOW_SIZE * WINDOW_SIZE,
		false => position,
	}
}

fn copy_back_reference(output: &mut Vec<u8>, low: u8, high: u8) {
	let mut raw_position = low as i64 | ((high as i64 & 0xF0) << 4);
	if raw_position & 0x800 != 0 {
		raw_position -= 0x1000;
	}
	let count = (high & 0x0F) as usize + COUNT_OFFSET;
	let position = window_position(raw_position, output.len()) as usize;
	// byte by byte, a reference may overlap the bytes it produces
	for i in 0..count {
		// the window starts out zero-filled
		let byte = output.get(position + i).copied().unwrap_or(0);
		output.push(byte);
	}
}
