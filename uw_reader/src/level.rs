use std::io::{Cursor, Read};
use glam::U16Vec2;
use crate::{
	codec::{read_objects, read_tiles, GameObject, Tile},
	error::{Context, Error, Result},
	skip,
};

pub const MAP_SIDE_LEN: usize = 64;
pub const TILE_COUNT: usize = MAP_SIDE_LEN * MAP_SIDE_LEN;
pub const MOBILE_OBJECT_COUNT: usize = 256;
pub const STATIC_OBJECT_COUNT: usize = 768;
pub const OBJECT_COUNT: usize = MOBILE_OBJECT_COUNT + STATIC_OBJECT_COUNT;

pub const TILE_SIZE: usize = 4;
pub const OBJECT_SIZE: usize = 8;
/// Mobile-only bytes following the general info of each mobile object.
pub const MOBILE_EXTRA_SIZE: u64 = 19;
pub const MOBILE_OBJECT_SIZE: usize = OBJECT_SIZE + MOBILE_EXTRA_SIZE as usize;
/// Object free lists and allocation counters after the object table, not decoded.
pub const TRAILER_SIZE: u64 = 2312;
/// One level's tile map and object table as stored on disk.
pub const LEVEL_BLOCK_SIZE: usize = 31752;

const _: () = assert!(
	TILE_COUNT * TILE_SIZE
		+ MOBILE_OBJECT_COUNT * MOBILE_OBJECT_SIZE
		+ STATIC_OBJECT_COUNT * OBJECT_SIZE
		+ TRAILER_SIZE as usize
		== LEVEL_BLOCK_SIZE,
	"level block layout does not add up",
);

/// A decoded 64x64 tile map and its 1024 slot object table.
///
/// Objects link to each other by index (`next_object_link`, `special_link`). Links are stored
/// as found on disk and may form cycles; walk them with [`Level::object_chain`].
#[derive(Clone, Debug)]
pub struct Level {
	/// 1-based position among the archive's level blocks (V1) or within its world (V2).
	pub level_id: u32,
	/// 1-based world number, V2 archives only.
	pub world_id: Option<u32>,
	tiles: Box<[Tile]>,
	objects: Box<[GameObject]>,
}

impl Level {
	/// Decodes a level block already in memory. `bytes` must be exactly one level block.
	pub fn from_block(bytes: &[u8], block_index: usize, level_id: u32, world_id: Option<u32>) -> Result<Self> {
		if bytes.len() != LEVEL_BLOCK_SIZE {
			return Err(Error::MalformedBlock { index: block_index, len: bytes.len(), expected: LEVEL_BLOCK_SIZE });
		}
		Self::read(&mut Cursor::new(bytes), level_id, world_id)
	}

	/// Decodes a level block from the current stream position, consuming exactly [`LEVEL_BLOCK_SIZE`] bytes.
	pub(crate) fn read<R: Read>(reader: &mut R, level_id: u32, world_id: Option<u32>) -> Result<Self> {
		let reader = &mut reader.take(LEVEL_BLOCK_SIZE as u64);
		let tiles = read_tiles(reader).context("tile map")?;
		let objects = read_objects(reader).context("object table")?;
		skip(reader, TRAILER_SIZE).context("level block trailer")?;
		Ok(Self { level_id, world_id, tiles, objects })
	}

	/// Row-major, index `y * 64 + x`, origin at the bottom-left.
	pub fn tiles(&self) -> &[Tile] {
		&self.tiles
	}

	pub fn tile(&self, pos: U16Vec2) -> Option<&Tile> {
		let side = MAP_SIDE_LEN as u16;
		if pos.x >= side || pos.y >= side {
			return None;
		}
		self.tiles.get(pos.y as usize * MAP_SIDE_LEN + pos.x as usize)
	}

	pub fn tiles_with_pos(&self) -> impl Iterator<Item = (U16Vec2, &Tile)> + '_ {
		self.tiles.iter().enumerate().map(|(index, tile)| {
			let pos = U16Vec2::new((index % MAP_SIDE_LEN) as u16, (index / MAP_SIDE_LEN) as u16);
			(pos, tile)
		})
	}

	/// All 1024 slots, mobile objects first. Slot 0 is never a link target.
	pub fn objects(&self) -> &[GameObject] {
		&self.objects
	}

	pub fn mobile_objects(&self) -> &[GameObject] {
		&self.objects[..MOBILE_OBJECT_COUNT]
	}

	pub fn static_objects(&self) -> &[GameObject] {
		&self.objects[MOBILE_OBJECT_COUNT..]
	}

	/// The object a link points at; `None` for link 0 and links past the table.
	pub fn object(&self, link: u16) -> Option<&GameObject> {
		match link {
			0 => None,
			link => self.objects.get(link as usize),
		}
	}

	/// Follows `next_object_link` from `first`.
	pub fn object_chain(&self, first: u16) -> ObjectChain<'_> {
		ObjectChain::new(&self.objects, first)
	}

	/// Objects lying in the tile at `pos`.
	pub fn tile_objects(&self, pos: U16Vec2) -> ObjectChain<'_> {
		let first = self.tile(pos).map_or(0, |tile| tile.first_object_link);
		self.object_chain(first)
	}
}

/// Iterator over a linked object list, yielding `(link, object)`.
///
/// Ends at link 0, at a link past the table, or when a link repeats.
#[derive(Clone)]
pub struct ObjectChain<'a> {
	objects: &'a [GameObject],
	next: u16,
	visited: [u64; OBJECT_COUNT / 64],
}

impl<'a> ObjectChain<'a> {
	fn new(objects: &'a [GameObject], first: u16) -> Self {
		Self { objects, next: first, visited: [0; OBJECT_COUNT / 64] }
	}

	/// Marks `link` visited, returning whether it was already.
	fn visit(&mut self, link: u16) -> bool {
		let (word, bit) = (link as usize / 64, link as usize % 64);
		let seen = self.visited[word] & (1 << bit) != 0;
		self.visited[word] |= 1 << bit;
		seen
	}
}

impl<'a> Iterator for ObjectChain<'a> {
	type Item = (u16, &'a GameObject);

	fn next(&mut self) -> Option<Self::Item> {
		let link = self.next;
		if link == 0 || link as usize >= self.objects.len().min(OBJECT_COUNT) || self.visit(link) {
			return None;
		}
		let object = &self.objects[link as usize];
		self.next = object.next_object_link;
		Some((link, object))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use glam::u16vec2;

	const OBJECTS_START: usize = TILE_COUNT * TILE_SIZE;
	const STATICS_START: usize = OBJECTS_START + MOBILE_OBJECT_COUNT * MOBILE_OBJECT_SIZE;

	fn put_u16(block: &mut [u8], offset: usize, value: u16) {
		block[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
	}

	fn object_offset(index: usize) -> usize {
		match index < MOBILE_OBJECT_COUNT {
			true => OBJECTS_START + index * MOBILE_OBJECT_SIZE,
			false => STATICS_START + (index - MOBILE_OBJECT_COUNT) * OBJECT_SIZE,
		}
	}

	/// Sets item id and next link of an object slot.
	fn put_object(block: &mut [u8], index: usize, item_id: u16, next: u16) {
		let offset = object_offset(index);
		put_u16(block, offset, item_id);
		put_u16(block, offset + 4, next << 6);
	}

	fn sample_block() -> Vec<u8> {
		let mut block = vec![0; LEVEL_BLOCK_SIZE];
		// tile (1, 2): open door, objects start at 5
		let tile = (2 * MAP_SIDE_LEN + 1) * TILE_SIZE;
		put_u16(&mut block, tile, 0x8001);
		put_u16(&mut block, tile + 2, 5 << 6);
		put_object(&mut block, 5, 0x40, 300);
		put_object(&mut block, 300, 0x41, 1023);
		put_object(&mut block, 1023, 0x42, 0);
		// mobile-only bytes must be ignored
		block[object_offset(5) + OBJECT_SIZE..object_offset(6)].fill(0xAA);
		block
	}

	#[test]
	fn decodes_tiles_and_objects() {
		let level = Level::from_block(&sample_block(), 3, 1, None).unwrap();
		assert_eq!(level.tiles().len(), TILE_COUNT);
		assert_eq!(level.objects().len(), OBJECT_COUNT);
		assert_eq!(level.mobile_objects().len(), MOBILE_OBJECT_COUNT);
		assert_eq!(level.static_objects().len(), STATIC_OBJECT_COUNT);
		let tile = level.tile(u16vec2(1, 2)).unwrap();
		assert!(tile.is_door);
		assert_eq!(tile.first_object_link, 5);
		assert_eq!(level.tiles()[2 * 64 + 1], *tile);
		assert_eq!(level.object(5).unwrap().item_id, 0x40);
		assert_eq!(level.object(6).unwrap().item_id, 0);
		assert_eq!(level.object(300).unwrap().next_object_link, 1023);
		assert_eq!(level.object(1023).unwrap().item_id, 0x42);
	}

	#[test]
	fn follows_tile_object_chain() {
		let level = Level::from_block(&sample_block(), 0, 1, None).unwrap();
		let links: Vec<u16> = level.tile_objects(u16vec2(1, 2)).map(|(link, _)| link).collect();
		assert_eq!(links, [5, 300, 1023]);
		assert_eq!(level.tile_objects(u16vec2(0, 0)).count(), 0);
		assert_eq!(level.tile_objects(u16vec2(64, 0)).count(), 0);
	}

	#[test]
	fn chain_stops_on_cycles() {
		let mut block = sample_block();
		put_object(&mut block, 1023, 0x42, 300);
		let level = Level::from_block(&block, 0, 1, None).unwrap();
		let links: Vec<u16> = level.object_chain(5).map(|(link, _)| link).collect();
		assert_eq!(links, [5, 300, 1023]);

		put_object(&mut block, 7, 0x43, 7);
		let level = Level::from_block(&block, 0, 1, None).unwrap();
		assert_eq!(level.object(7).unwrap().next_object_link, 7);
		assert_eq!(level.object_chain(7).count(), 1);
	}

	#[test]
	fn link_zero_is_not_an_object() {
		let level = Level::from_block(&sample_block(), 0, 1, None).unwrap();
		assert!(level.object(0).is_none());
		assert!(level.object(1024).is_none());
		assert_eq!(level.object_chain(0).count(), 0);
	}

	#[test]
	fn tile_positions_are_row_major() {
		let level = Level::from_block(&sample_block(), 0, 1, None).unwrap();
		let (pos, _) = level.tiles_with_pos().nth(2 * 64 + 1).unwrap();
		assert_eq!(pos, u16vec2(1, 2));
		let (pos, _) = level.tiles_with_pos().last().unwrap();
		assert_eq!(pos, u16vec2(63, 63));
	}

	#[test]
	fn rejects_wrong_block_size() {
		for len in [LEVEL_BLOCK_SIZE - 1, LEVEL_BLOCK_SIZE + 1, 0] {
			match Level::from_block(&vec![0; len], 9, 1, None) {
				Err(Error::MalformedBlock { index, len: got, expected }) => {
					assert_eq!((index, got, expected), (9, len, LEVEL_BLOCK_SIZE));
				},
				other => panic!("unexpected {:?}", other.map(|_| ())),
			}
		}
	}

	#[test]
	fn stream_read_consumes_exactly_one_block() {
		let mut bytes = sample_block();
		bytes.extend_from_slice(&[1, 2, 3]);
		let mut reader = Cursor::new(bytes);
		Level::read(&mut reader, 1, None).unwrap();
		assert_eq!(reader.position(), LEVEL_BLOCK_SIZE as u64);
	}

	#[test]
	fn short_stream_is_truncated() {
		let bytes = vec![0; LEVEL_BLOCK_SIZE - 1];
		let result = Level::read(&mut bytes.as_slice(), 1, None);
		assert!(matches!(result, Err(Error::TruncatedStream { context: "level block trailer" })));
	}
}
