//! Decoder for the level archive of a dungeon simulation game.
//! 
//! Two container variants are supported: `V1`, a flat block directory with implicit sizes,
//! and `V2`, a directory with explicit sizes and per-block LZ compression.
//! Both yield the same [`Level`] values: a 64x64 tile map plus a 1024 slot object table.

extern crate self as uw_reader;

pub mod codec;
pub mod directory;
pub mod error;
pub mod format;
pub mod level;
pub mod lz;
pub(crate) mod impls;

use std::io::{self, Read, Seek, SeekFrom};
use num_traits::AsPrimitive;
pub(crate) use uw_derive::Readable;

pub use codec::{GameObject, ObjectSpecial, Tile, TileType};
pub use directory::{BlockDescriptor, BlockFlags, Directory};
pub use error::{Error, Result};
pub use format::{read_levels, DecodeOptions, Format, Strictness};
pub use level::{Level, ObjectChain};

pub(crate) trait Readable: Sized {
	fn read<R: Read>(reader: &mut R) -> io::Result<Self>;
}

pub(crate) fn read_boxed_slice<R: Read, T: Readable>(reader: &mut R, len: usize) -> io::Result<Box<[T]>> {
	let mut vec = Vec::with_capacity(len);
	for _ in 0..len {
		vec.push(T::read(reader)?);
	}
	Ok(vec.into_boxed_slice())
}

/// Reads an `L` length prefix, then that many items.
pub(crate) fn read_list<R: Read, T: Readable, L: Readable + AsPrimitive<usize>>(reader: &mut R) -> io::Result<Box<[T]>> {
	let len = L::read(reader)?.as_();
	read_boxed_slice(reader, len)
}

pub(crate) fn skip<R: Read>(reader: &mut R, num: u64) -> io::Result<()> {
	let skipped = io::copy(&mut reader.by_ref().take(num), &mut io::sink())?;
	if skipped < num {
		return Err(io::ErrorKind::UnexpectedEof.into());
	}
	Ok(())
}

/// Total length of a seekable stream. The stream position is restored.
pub(crate) fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
	let pos = stream.stream_position()?;
	let len = stream.seek(SeekFrom::End(0))?;
	if pos != len {
		stream.seek(SeekFrom::Start(pos))?;
	}
	Ok(len)
}
