//! Packed tile and object records and their decoding into typed values.
//!
//! The packed forms mirror the on-disk 16-bit words and never leave this module.

use std::io::{Read, Result};
use bitfield::bitfield;
use glam::U16Vec3;
use crate::{
	level::{MOBILE_EXTRA_SIZE, MOBILE_OBJECT_COUNT, STATIC_OBJECT_COUNT, TILE_COUNT},
	read_boxed_slice, Readable,
};

/// Quantity specials at or above this value carry a property instead of a count.
pub const SPECIAL_PROPERTY_BASE: u16 = 512;

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct TileProps(u16);
	/// Bit 3 is not part of the type.
	tile_type, _: 2, 0;
	floor_height, _: 7, 4;
	floor_texture, _: 13, 10;
	no_magic, _: 14;
	door, _: 15;
}

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct TileLink(u16);
	wall_texture, _: 5, 0;
	/// Index into `Level.objects`.
	first_object, _: 15, 6;
}

#[derive(Readable, Clone, Copy)]
struct TilePacked {
	props: TileProps,
	link: TileLink,
}

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct ObjectIdFlags(u16);
	item_id, _: 8, 0;
	flags, _: 12, 9;
	/// Top bit of `flags`.
	enchanted, _: 12;
	door_direction, _: 13;
	invisible, _: 14;
	is_quantity, _: 15;
}

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct ObjectPosition(u16);
	z, _: 6, 0;
	/// Units of 45 degrees.
	heading, _: 9, 7;
	y, _: 12, 10;
	x, _: 15, 13;
}

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct ObjectQualityChain(u16);
	quality, _: 5, 0;
	/// Index into `Level.objects`.
	next, _: 15, 6;
}

bitfield! {
	#[derive(Readable, Clone, Copy)]
	struct ObjectOwnerSpecial(u16);
	owner, _: 5, 0;
	special, _: 15, 6;
}

#[derive(Readable, Clone, Copy)]
struct ObjectPacked {
	id_flags: ObjectIdFlags,
	position: ObjectPosition,
	quality_chain: ObjectQualityChain,
	owner_special: ObjectOwnerSpecial,
}

/// General object info followed by mobile-only data, which is not decoded.
#[derive(Readable, Clone, Copy)]
#[skip_after(MOBILE_EXTRA_SIZE)]
struct MobileObjectPacked {
	general: ObjectPacked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileType {
	Solid,
	Open,
	OpenSE,
	OpenSW,
	OpenNE,
	OpenNW,
	SlopeN,
	SlopeS,
	SlopeE,
	SlopeW,
	/// Raw values 10-15. The 3-bit on-disk field never produces these or `SlopeE`/`SlopeW`.
	Unknown(u8),
}

impl TileType {
	pub fn from_raw(raw: u8) -> Self {
		match raw {
			0 => TileType::Solid,
			1 => TileType::Open,
			2 => TileType::OpenSE,
			3 => TileType::OpenSW,
			4 => TileType::OpenNE,
			5 => TileType::OpenNW,
			6 => TileType::SlopeN,
			7 => TileType::SlopeS,
			8 => TileType::SlopeE,
			9 => TileType::SlopeW,
			raw => TileType::Unknown(raw),
		}
	}

	pub fn raw(self) -> u8 {
		match self {
			TileType::Solid => 0,
			TileType::Open => 1,
			TileType::OpenSE => 2,
			TileType::OpenSW => 3,
			TileType::OpenNE => 4,
			TileType::OpenNW => 5,
			TileType::SlopeN => 6,
			TileType::SlopeS => 7,
			TileType::SlopeE => 8,
			TileType::SlopeW => 9,
			TileType::Unknown(raw) => raw,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
	pub tile_type: TileType,
	pub is_door: bool,
	/// Index into `Level.objects`, 0 = none.
	pub first_object_link: u16,
	pub floor_height: u8,
	pub floor_texture: u8,
	pub wall_texture: u8,
	/// No magic may be cast in or on this tile.
	pub no_magic: bool,
}

impl Tile {
	/// Decodes the two little-endian words of a tile record.
	pub fn from_words(data1: u16, data2: u16) -> Self {
		decode_tile(TilePacked { props: TileProps(data1), link: TileLink(data2) })
	}
}

/// Meaning of an object's 10-bit special field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectSpecial {
	/// Stack count.
	Quantity(u16),
	/// Index into `Level.objects` of a contained or linked object list.
	Link(u16),
	/// Item-type dependent value.
	Property(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameObject {
	pub item_id: u16,
	/// 4 bits, the top one doubles as `is_enchanted`.
	pub flags: u16,
	/// Index into `Level.objects`, 0 = end of list.
	pub next_object_link: u16,
	pub special: ObjectSpecial,
	pub is_enchanted: bool,
	pub door_direction: bool,
	pub is_invisible: bool,
	/// Fine position inside the tile: x and y 0-7, z 0-127.
	pub pos: U16Vec3,
	/// Units of 45 degrees.
	pub heading: u8,
	pub quality: u8,
	pub owner: u8,
}

impl GameObject {
	/// Decodes the four little-endian words of the general object record.
	pub fn from_words([data1, data2, data3, data4]: [u16; 4]) -> Self {
		decode_object(ObjectPacked {
			id_flags: ObjectIdFlags(data1),
			position: ObjectPosition(data2),
			quality_chain: ObjectQualityChain(data3),
			owner_special: ObjectOwnerSpecial(data4),
		})
	}

	/// Stack count, 1 when the special field holds something else.
	pub fn quantity(&self) -> u16 {
		match self.special {
			ObjectSpecial::Quantity(quantity) => quantity,
			_ => 1,
		}
	}

	/// Linked list head, 0 when the special field holds something else.
	pub fn special_link(&self) -> u16 {
		match self.special {
			ObjectSpecial::Link(link) => link,
			_ => 0,
		}
	}

	pub fn special_property(&self) -> u16 {
		match self.special {
			ObjectSpecial::Property(property) => property,
			_ => 0,
		}
	}
}

fn decode_tile(packed: TilePacked) -> Tile {
	let TilePacked { props, link } = packed;
	Tile {
		tile_type: TileType::from_raw(props.tile_type() as u8),
		is_door: props.door(),
		first_object_link: link.first_object(),
		floor_height: props.floor_height() as u8,
		floor_texture: props.floor_texture() as u8,
		wall_texture: link.wall_texture() as u8,
		no_magic: props.no_magic(),
	}
}

fn decode_object(packed: ObjectPacked) -> GameObject {
	let ObjectPacked { id_flags, position, quality_chain, owner_special } = packed;
	let special = owner_special.special();
	let special = match (id_flags.is_quantity(), special) {
		(false, link) => ObjectSpecial::Link(link),
		(true, quantity) if quantity < SPECIAL_PROPERTY_BASE => ObjectSpecial::Quantity(quantity),
		(true, property) => ObjectSpecial::Property(property - SPECIAL_PROPERTY_BASE),
	};
	GameObject {
		item_id: id_flags.item_id(),
		flags: id_flags.flags(),
		next_object_link: quality_chain.next(),
		special,
		is_enchanted: id_flags.enchanted(),
		door_direction: id_flags.door_direction(),
		is_invisible: id_flags.invisible(),
		pos: U16Vec3::new(position.x(), position.y(), position.z()),
		heading: position.heading() as u8,
		quality: quality_chain.quality() as u8,
		owner: owner_special.owner() as u8,
	}
}

pub(crate) fn read_tiles<R: Read>(reader: &mut R) -> Result<Box<[Tile]>> {
	let packed = read_boxed_slice::<_, TilePacked>(reader, TILE_COUNT)?;
	Ok(packed.iter().copied().map(decode_tile).collect())
}

/// Reads the mobile partition, then the static partition, in table order.
pub(crate) fn read_objects<R: Read>(reader: &mut R) -> Result<Box<[GameObject]>> {
	let mobiles = read_boxed_slice::<_, MobileObjectPacked>(reader, MOBILE_OBJECT_COUNT)?;
	let statics = read_boxed_slice::<_, ObjectPacked>(reader, STATIC_OBJECT_COUNT)?;
	let objects = mobiles.iter().map(|mobile| mobile.general).chain(statics.iter().copied());
	Ok(objects.map(decode_object).collect())
}
