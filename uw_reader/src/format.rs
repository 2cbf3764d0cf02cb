use std::io::{Read, Seek, SeekFrom};
use log::{debug, warn};
use crate::{
	directory::{BlockDescriptor, Directory},
	error::{Context, Error, Result},
	level::{Level, LEVEL_BLOCK_SIZE},
	lz, Readable,
};

pub const V2_WORLD_COUNT: u32 = 10;
pub const V2_LEVELS_PER_WORLD: u32 = 8;
/// Level maps take the first quarter of a V2 directory.
pub const V2_LEVEL_MAP_SLOTS: usize = (V2_WORLD_COUNT * V2_LEVELS_PER_WORLD) as usize;
pub const V2_SLOT_COUNT: usize = V2_LEVEL_MAP_SLOTS * 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
	/// Offsets only, uncompressed blocks.
	V1,
	/// Explicit sizes, optionally compressed blocks, fixed world/level grid.
	V2,
}

impl Format {
	/// Guesses the variant from the block count: only V2 archives have exactly 320 blocks.
	/// The stream is left at offset 0.
	pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Self> {
		reader.seek(SeekFrom::Start(0))?;
		let count = u16::read(reader).context("block count")?;
		reader.seek(SeekFrom::Start(0))?;
		Ok(match count as usize {
			V2_SLOT_COUNT => Format::V2,
			_ => Format::V1,
		})
	}
}

/// What to do with a level block that fails to decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
	/// Abort and return the error.
	#[default]
	Strict,
	/// Log the error and continue with the next block.
	Lenient,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
	pub strictness: Strictness,
}

impl DecodeOptions {
	/// Turns a block-local failure into a skipped block when lenient.
	fn recover(&self, result: Result<Level>, block: &BlockDescriptor) -> Result<Option<Level>> {
		match result {
			Ok(level) => Ok(Some(level)),
			Err(err) if self.strictness == Strictness::Lenient && err.is_block_local() => {
				warn!("skipping block {}: {}", block.index, err);
				Ok(None)
			},
			Err(err) => Err(err),
		}
	}
}

/// Decodes every level in the archive. V1 levels come in directory order,
/// V2 levels in world then level order.
pub fn read_levels<R: Read + Seek>(reader: &mut R, format: Format, options: &DecodeOptions) -> Result<Vec<Level>> {
	let directory = Directory::read(reader, format)?;
	let levels = match format {
		Format::V1 => read_v1_levels(reader, &directory, options)?,
		Format::V2 => read_v2_levels(reader, &directory, options)?,
	};
	debug!("decoded {} levels", levels.len());
	Ok(levels)
}

/// Level blocks are recognized by size; other blocks hold other level data.
fn read_v1_levels<R: Read + Seek>(reader: &mut R, directory: &Directory, options: &DecodeOptions) -> Result<Vec<Level>> {
	let mut levels = Vec::new();
	let level_blocks = directory.blocks().iter().filter(|block| block.size as usize == LEVEL_BLOCK_SIZE);
	for (level_id, block) in (1..).zip(level_blocks) {
		debug!("block {}: level {}", block.index, level_id);
		let result = reader.seek(SeekFrom::Start(block.offset as u64))
			.map_err(Error::from)
			.and_then(|_| Level::read(reader, level_id, None));
		levels.extend(options.recover(result, block)?);
	}
	Ok(levels)
}

fn read_v2_block<R: Read + Seek>(reader: &mut R, block: &BlockDescriptor) -> Result<Vec<u8>> {
	reader.seek(SeekFrom::Start(block.offset as u64))?;
	let mut bytes = vec![0; block.size as usize];
	reader.read_exact(&mut bytes).context("level block")?;
	match block.is_compressed() {
		true => lz::decompress(&bytes),
		false => Ok(bytes),
	}
}

fn read_v2_levels<R: Read + Seek>(reader: &mut R, directory: &Directory, options: &DecodeOptions) -> Result<Vec<Level>> {
	if directory.len() < V2_LEVEL_MAP_SLOTS {
		return Err(Error::MalformedHeader(format!(
			"{} blocks, V2 archives hold at least {} level maps", directory.len(), V2_LEVEL_MAP_SLOTS,
		)));
	}
	if directory.len() != V2_SLOT_COUNT {
		warn!("V2 directory has {} blocks, expected {}", directory.len(), V2_SLOT_COUNT);
	}
	let mut levels = Vec::new();
	for world_id in 1..=V2_WORLD_COUNT {
		for level_id in 1..=V2_LEVELS_PER_WORLD {
			let index = ((world_id - 1) * V2_LEVELS_PER_WORLD + (level_id - 1)) as usize;
			let block = &directory.blocks()[index];
			if block.is_unused() {
				debug!("block {}: unused", index);
				continue;
			}
			debug!("block {}: world {} level {}, compressed: {}", index, world_id, level_id, block.is_compressed());
			let result = read_v2_block(reader, block)
				.and_then(|bytes| Level::from_block(&bytes, block.index, level_id, Some(world_id)));
			levels.extend(options.recover(result, block)?);
		}
	}
	Ok(levels)
}
