//! Block directory at the start of a level archive.
//!
//! V1 header:
//! ```text
//! 0000   u16        number of blocks N
//! 0002   u32 * N    absolute offset of each block
//! ```
//! Block sizes are implied by the next block's offset, the last block runs to the end of the file.
//!
//! V2 header:
//! ```text
//! 0000   u16        number of blocks N
//! 0002   u32        unused
//! 0006   u32 * N    absolute offset of each block
//!        u32 * N    flags (bit 1: compressed, bit 2: has reserved space)
//!        u32 * N    data size of each block
//!        u32 * N    reserved space of each block
//! ```

use std::io::{Read, Seek, SeekFrom};
use bitfield::bitfield;
use log::{debug, trace};
use crate::{
	error::{Context, Error, Result},
	format::Format,
	read_boxed_slice, read_list, skip, stream_len, Readable,
};

bitfield! {
	#[derive(Readable, Clone, Copy, PartialEq, Eq, Default)]
	pub struct BlockFlags(u32);
	impl Debug;
	pub is_compressed, _: 1;
	pub has_reserved_space, _: 2;
}

impl BlockFlags {
	pub fn from_bits(bits: u32) -> Self {
		Self(bits)
	}

	pub fn bits(&self) -> u32 {
		self.0
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDescriptor {
	/// Position in the directory.
	pub index: usize,
	/// Absolute file offset.
	pub offset: u32,
	pub size: u32,
	/// V2 only.
	pub flags: Option<BlockFlags>,
	/// V2 only, extra space the game may grow the block into.
	pub reserved_space_size: u32,
}

impl BlockDescriptor {
	/// Unused slots have no offset or no size.
	pub fn is_unused(&self) -> bool {
		self.offset == 0 || self.size == 0
	}

	pub fn is_compressed(&self) -> bool {
		self.flags.is_some_and(|flags| flags.is_compressed())
	}

	pub fn has_reserved_space(&self) -> bool {
		self.flags.is_some_and(|flags| flags.has_reserved_space())
	}
}

/// Ordered block descriptors, index-aligned with the file's block numbering.
#[derive(Clone, Debug)]
pub struct Directory {
	blocks: Box<[BlockDescriptor]>,
}

impl Directory {
	/// Parses the directory from the start of `reader`.
	pub fn read<R: Read + Seek>(reader: &mut R, format: Format) -> Result<Self> {
		let stream_len = stream_len(reader)?;
		reader.seek(SeekFrom::Start(0))?;
		let blocks = match format {
			Format::V1 => read_v1(reader, stream_len)?,
			Format::V2 => read_v2(reader, stream_len)?,
		};
		debug!("{:?} directory: {} blocks, stream length {}", format, blocks.len(), stream_len);
		for block in blocks.iter() {
			trace!("block {}: offset {:#x}, size {}", block.index, block.offset, block.size);
		}
		Ok(Self { blocks })
	}

	pub fn blocks(&self) -> &[BlockDescriptor] {
		&self.blocks
	}

	pub fn get(&self, index: usize) -> Option<&BlockDescriptor> {
		self.blocks.get(index)
	}

	pub fn len(&self) -> usize {
		self.blocks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.blocks.is_empty()
	}
}

fn check_offset(index: usize, offset: u32, stream_len: u64) -> Result<()> {
	if offset as u64 > stream_len {
		return Err(Error::MalformedHeader(format!(
			"block {} offset {:#x} is past the end of the stream ({:#x})", index, offset, stream_len,
		)));
	}
	Ok(())
}

/// Size of a V1 block: distance to the next block's offset, the last block runs to the end of the stream.
/// A next offset below this one gives 0, which is never a level block.
fn v1_block_size(offsets: &[u32], index: usize, stream_len: u64) -> u32 {
	let offset = offsets[index];
	match offsets.get(index + 1) {
		Some(&next) => next.saturating_sub(offset),
		None => (stream_len - offset as u64).min(u32::MAX as u64) as u32,
	}
}

fn read_v1<R: Read>(reader: &mut R, stream_len: u64) -> Result<Box<[BlockDescriptor]>> {
	let offsets = read_list::<_, u32, u16>(reader).context("block directory")?;
	if offsets.is_empty() {
		return Err(Error::MalformedHeader("block count is zero".into()));
	}
	for (index, &offset) in offsets.iter().enumerate() {
		check_offset(index, offset, stream_len)?;
	}
	let blocks = (0..offsets.len()).map(|index| BlockDescriptor {
		index,
		offset: offsets[index],
		size: v1_block_size(&offsets, index, stream_len),
		flags: None,
		reserved_space_size: 0,
	});
	Ok(blocks.collect())
}

fn read_v2<R: Read>(reader: &mut R, stream_len: u64) -> Result<Box<[BlockDescriptor]>> {
	let count = u16::read(reader).context("block directory")? as usize;
	if count == 0 {
		return Err(Error::MalformedHeader("block count is zero".into()));
	}
	skip(reader, 4).context("block directory")?;
	let offsets = read_boxed_slice::<_, u32>(reader, count).context("block offsets")?;
	let flags = read_boxed_slice::<_, BlockFlags>(reader, count).context("block flags")?;
	let sizes = read_boxed_slice::<_, u32>(reader, count).context("block sizes")?;
	let reserved = read_boxed_slice::<_, u32>(reader, count).context("block reserved sizes")?;
	let mut blocks = Vec::with_capacity(count);
	for index in 0..count {
		let block = BlockDescriptor {
			index,
			offset: offsets[index],
			size: sizes[index],
			flags: Some(flags[index]),
			reserved_space_size: reserved[index],
		};
		check_offset(index, block.offset, stream_len)?;
		if !block.is_unused() && block.offset as u64 + block.size as u64 > stream_len {
			return Err(Error::MalformedHeader(format!(
				"block {} ({:#x} + {} bytes) runs past the end of the stream ({:#x})",
				index, block.offset, block.size, stream_len,
			)));
		}
		blocks.push(block);
	}
	Ok(blocks.into_boxed_slice())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn v1_file(offsets: &[u32], len: usize) -> Cursor<Vec<u8>> {
		let mut bytes = (offsets.len() as u16).to_le_bytes().to_vec();
		for offset in offsets {
			bytes.extend_from_slice(&offset.to_le_bytes());
		}
		bytes.resize(len.max(bytes.len()), 0);
		Cursor::new(bytes)
	}

	/// `(offset, flags, size, reserved)` per block.
	fn v2_file(entries: &[(u32, u32, u32, u32)], len: usize) -> Cursor<Vec<u8>> {
		let mut bytes = (entries.len() as u16).to_le_bytes().to_vec();
		bytes.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
		let columns: [fn(&(u32, u32, u32, u32)) -> u32; 4] = [|e| e.0, |e| e.1, |e| e.2, |e| e.3];
		for column in columns {
			for entry in entries {
				bytes.extend_from_slice(&column(entry).to_le_bytes());
			}
		}
		bytes.resize(len.max(bytes.len()), 0);
		Cursor::new(bytes)
	}

	#[test]
	fn v1_sizes_from_offsets() {
		let mut file = v1_file(&[10, 30, 100], 160);
		let directory = Directory::read(&mut file, Format::V1).unwrap();
		let sizes: Vec<u32> = directory.blocks().iter().map(|block| block.size).collect();
		assert_eq!(sizes, [20, 70, 60]);
		for (index, block) in directory.blocks().iter().enumerate() {
			assert_eq!(block.index, index);
			assert!(block.flags.is_none());
			assert!(!block.is_compressed());
		}
	}

	#[test]
	fn v1_unused_blocks() {
		let mut file = v1_file(&[14, 0, 40, 0], 64);
		let directory = Directory::read(&mut file, Format::V1).unwrap();
		let sizes: Vec<u32> = directory.blocks().iter().map(|block| block.size).collect();
		assert_eq!(sizes, [0, 40, 0, 64]);
		assert!(directory.blocks().iter().all(|block| block.is_unused()));
	}

	#[test]
	fn v1_sizes_are_consecutive_differences() {
		let mut file = v1_file(&[14, 0, 31766], 31776);
		let directory = Directory::read(&mut file, Format::V1).unwrap();
		let sizes: Vec<u32> = directory.blocks().iter().map(|block| block.size).collect();
		assert_eq!(sizes, [0, 31766, 10]);
	}

	#[test]
	fn v1_rejects_empty_directory() {
		let mut file = v1_file(&[], 16);
		assert!(matches!(Directory::read(&mut file, Format::V1), Err(Error::MalformedHeader(_))));
	}

	#[test]
	fn v1_rejects_offset_past_end() {
		let mut file = v1_file(&[10, 200], 100);
		assert!(matches!(Directory::read(&mut file, Format::V1), Err(Error::MalformedHeader(_))));
	}

	#[test]
	fn v1_truncated_table() {
		let mut file = Cursor::new(vec![3, 0, 10, 0, 0, 0]);
		assert!(matches!(Directory::read(&mut file, Format::V1), Err(Error::TruncatedStream { .. })));
	}

	#[test]
	fn v2_explicit_sizes_and_flags() {
		let entries = [(100, 0b010, 50, 0), (0, 0b110, 0, 0), (150, 0b100, 20, 64), (170, 0b110, 30, 8)];
		let mut file = v2_file(&entries, 200);
		let directory = Directory::read(&mut file, Format::V2).unwrap();
		assert_eq!(directory.len(), 4);
		let blocks = directory.blocks();
		assert!(blocks[0].is_compressed() && !blocks[0].has_reserved_space());
		assert!(blocks[1].is_unused());
		assert!(!blocks[2].is_compressed() && blocks[2].has_reserved_space());
		assert_eq!(blocks[2].reserved_space_size, 64);
		assert!(blocks[3].is_compressed() && blocks[3].has_reserved_space());
		assert_eq!((blocks[3].offset, blocks[3].size), (170, 30));
		assert_eq!(blocks[3].flags.unwrap().bits(), 0b110);
	}

	#[test]
	fn v2_rejects_block_past_end() {
		let mut file = v2_file(&[(40, 0, 100, 0)], 120);
		assert!(matches!(Directory::read(&mut file, Format::V2), Err(Error::MalformedHeader(_))));
	}

	#[test]
	fn v2_rejects_empty_directory() {
		let mut file = v2_file(&[], 32);
		assert!(matches!(Directory::read(&mut file, Format::V2), Err(Error::MalformedHeader(_))));
	}

	#[test]
	fn reading_starts_at_offset_zero() {
		let mut file = v1_file(&[10, 30], 40);
		file.set_position(25);
		let directory = Directory::read(&mut file, Format::V1).unwrap();
		assert_eq!(directory.get(1).unwrap().size, 10);
	}
}
