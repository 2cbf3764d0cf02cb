use std::{collections::HashSet, io::{Result, Write}};
use glam::u16vec2;
use itertools::{iproduct, Itertools};
use uw_reader::{level::MAP_SIDE_LEN, GameObject, Level, Tile, TileType};

const RULE: &str = "--------------------------------------------------------------------";
const MAP_RULE: &str = "  -----------------------------------------------------------------";
const LEVEL_RULE: &str = "==========================================";
/// Object lists wrap once a line reaches this many characters.
const LINE_WRAP: usize = 80;
const CONTINUATION: &str = ">>  ";
const NESTED_INDENT: &str = "               ";

fn tile_glyph(tile: &Tile) -> char {
	if tile.is_door {
		return '=';
	}
	match tile.tile_type {
		TileType::Solid => 'X',
		TileType::OpenSE => 'p',
		TileType::OpenSW => 'q',
		TileType::OpenNE => 'b',
		TileType::OpenNW => 'd',
		TileType::Open | TileType::SlopeN | TileType::SlopeS | TileType::SlopeE | TileType::SlopeW => ' ',
		TileType::Unknown(_) => '?',
	}
}

fn is_npc(object: &GameObject) -> bool {
	(0x40..=0x7f).contains(&object.item_id)
}

fn is_container(object: &GameObject) -> bool {
	(0x80..=0x8f).contains(&object.item_id)
}

/// Map rows top to bottom, so north is up.
pub fn print_tile_map<W: Write>(out: &mut W, level: &Level) -> Result<()> {
	let side = MAP_SIDE_LEN as u16;
	writeln!(out, "{}", RULE)?;
	writeln!(out, "   {}", (0..side).map(|x| x / 10).join(""))?;
	writeln!(out, "   {}", (0..side).map(|x| x % 10).join(""))?;
	writeln!(out, "{}", MAP_RULE)?;
	for y in (0..side).rev() {
		let row: String = (0..side)
			.map(|x| level.tile(u16vec2(x, y)).map_or('?', tile_glyph))
			.collect();
		writeln!(out, "{:02}|{}|", y, row)?;
	}
	writeln!(out, "{}", MAP_RULE)
}

fn print_object_list<W: Write>(
	out: &mut W,
	level: &Level,
	first: u16,
	indent: &str,
	expanded: &mut HashSet<u16>,
) -> Result<()> {
	let mut line = String::new();
	let mut holders = vec![];
	for (link, object) in level.object_chain(first) {
		if line.len() >= LINE_WRAP {
			writeln!(out, "{}", line)?;
			line = format!("{}{}", indent, CONTINUATION);
		}
		if is_npc(object) || is_container(object) {
			holders.push((link, object));
			continue;
		}
		line.push_str(&format!(" 0x{:03x}", object.item_id));
		match object.quantity() {
			quantity if quantity > 1 => line.push_str(&format!(" (*{:03}) |", quantity)),
			_ => line.push_str("        |"),
		}
	}
	writeln!(out, "{}", line)?;
	for (link, object) in holders {
		let tag = if is_npc(object) { "npc" } else { "inv" };
		let inventory = object.special_link();
		let (has_inventory, separator) = if inventory > 0 { ("+", ":") } else { ("-", " ") };
		write!(out, "{}{} 0x{:03x} ({}{}){} ", indent, CONTINUATION, object.item_id, has_inventory, tag, separator)?;
		// an inventory reachable from itself is listed once
		if inventory > 0 && expanded.insert(link) {
			print_object_list(out, level, inventory, &format!("{}{}", indent, NESTED_INDENT), expanded)?;
		} else {
			writeln!(out)?;
		}
	}
	Ok(())
}

/// Objects lying in each tile, bottom row first.
pub fn print_tile_objects<W: Write>(out: &mut W, level: &Level) -> Result<()> {
	let side = MAP_SIDE_LEN as u16;
	writeln!(out, "{}", RULE)?;
	writeln!(out, "  Objects in Tiles")?;
	let mut expanded = HashSet::new();
	for (y, x) in iproduct!(0..side, 0..side) {
		let first = level.tile(u16vec2(x, y)).map_or(0, |tile| tile.first_object_link);
		if first == 0 {
			continue;
		}
		write!(out, " T [{:02}x{:02}]: ", x, y)?;
		print_object_list(out, level, first, "        ", &mut expanded)?;
	}
	Ok(())
}

pub fn print_levels<W: Write>(out: &mut W, levels: &[Level]) -> Result<()> {
	for level in levels {
		writeln!(out, "{}", LEVEL_RULE)?;
		match level.world_id {
			Some(world_id) => writeln!(out, " World {} Level {}", world_id, level.level_id)?,
			None => writeln!(out, " Level {}", level.level_id)?,
		}
		print_tile_map(out, level)?;
		print_tile_objects(out, level)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tile(tile_type: TileType, is_door: bool) -> Tile {
		Tile { tile_type, is_door, ..Tile::from_words(0, 0) }
	}

	#[test]
	fn glyphs() {
		let glyphs: String = (0..12).map(|raw| tile_glyph(&tile(TileType::from_raw(raw), false))).collect();
		assert_eq!(glyphs, "X pqbd    ??");
		assert_eq!(tile_glyph(&tile(TileType::Solid, true)), '=');
		assert_eq!(tile_glyph(&Tile::from_words(0x0008, 0)), 'X');
		assert_eq!(tile_glyph(&Tile::from_words(0x000A, 0)), 'p');
	}

	#[test]
	fn npc_and_container_ranges() {
		let object = |item_id: u16| GameObject::from_words([item_id, 0, 0, 0]);
		assert!(is_npc(&object(0x40)) && is_npc(&object(0x7f)));
		assert!(!is_npc(&object(0x80)));
		assert!(is_container(&object(0x80)) && is_container(&object(0x8f)));
		assert!(!is_container(&object(0x90)) && !is_container(&object(0x3f)));
	}
}
