//! Nearest-neighbour color naming against a reference table

use crate::{
	color::{self, Color},
	Result,
};
use palette::{Lab, Srgb};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The most common names from the XKCD color survey
const XKCD: &[(&str, [u8; 3])] = &[
	("purple", [0x7e, 0x1e, 0x9c]),
	("green", [0x15, 0xb0, 0x1a]),
	("blue", [0x03, 0x43, 0xdf]),
	("pink", [0xff, 0x81, 0xc0]),
	("brown", [0x65, 0x37, 0x00]),
	("red", [0xe5, 0x00, 0x00]),
	("light blue", [0x95, 0xd0, 0xfc]),
	("teal", [0x02, 0x93, 0x86]),
	("orange", [0xf9, 0x73, 0x06]),
	("light green", [0x96, 0xf9, 0x7b]),
	("magenta", [0xc2, 0x00, 0x78]),
	("yellow", [0xff, 0xff, 0x14]),
	("sky blue", [0x75, 0xbb, 0xfd]),
	("grey", [0x92, 0x95, 0x91]),
	("lime green", [0x89, 0xfe, 0x05]),
	("light purple", [0xbf, 0x77, 0xf6]),
	("violet", [0x9a, 0x0e, 0xea]),
	("dark green", [0x03, 0x35, 0x00]),
	("turquoise", [0x06, 0xc2, 0xac]),
	("lavender", [0xc7, 0x9f, 0xef]),
	("dark blue", [0x00, 0x03, 0x5b]),
	("tan", [0xd1, 0xb2, 0x6f]),
	("cyan", [0x00, 0xff, 0xff]),
	("aqua", [0x13, 0xea, 0xc9]),
	("forest green", [0x06, 0x47, 0x0c]),
	("mauve", [0xae, 0x71, 0x81]),
	("dark purple", [0x35, 0x06, 0x3e]),
	("bright green", [0x01, 0xff, 0x07]),
	("maroon", [0x65, 0x00, 0x21]),
	("olive", [0x6e, 0x75, 0x0e]),
	("salmon", [0xff, 0x79, 0x6c]),
	("beige", [0xe6, 0xda, 0xa6]),
	("royal blue", [0x05, 0x04, 0xaa]),
	("navy blue", [0x00, 0x11, 0x46]),
	("lilac", [0xce, 0xa2, 0xfd]),
	("black", [0x00, 0x00, 0x00]),
	("hot pink", [0xff, 0x02, 0x8d]),
	("light brown", [0xad, 0x81, 0x50]),
	("pale green", [0xc7, 0xfd, 0xb5]),
	("peach", [0xff, 0xb0, 0x7c]),
	("olive green", [0x67, 0x7a, 0x04]),
	("dark pink", [0xcb, 0x41, 0x6b]),
	("periwinkle", [0x8e, 0x82, 0xfe]),
	("sea green", [0x53, 0xfc, 0xa1]),
	("lime", [0xaa, 0xff, 0x32]),
	("indigo", [0x38, 0x02, 0x82]),
	("mustard", [0xce, 0xb3, 0x01]),
	("light pink", [0xff, 0xd1, 0xdf]),
	("white", [0xff, 0xff, 0xff]),
	("navy", [0x01, 0x15, 0x3e]),
	("gold", [0xdb, 0xb4, 0x0c]),
	("dark red", [0x84, 0x00, 0x00]),
	("burgundy", [0x61, 0x00, 0x23]),
	("khaki", [0xaa, 0xa6, 0x62]),
	("cream", [0xff, 0xff, 0xc2]),
	("crimson", [0x8c, 0x00, 0x0f]),
	("coral", [0xfc, 0x5a, 0x50]),
	("light grey", [0xd8, 0xdc, 0xd6]),
	("dark grey", [0x36, 0x37, 0x37]),
	("charcoal", [0x34, 0x38, 0x37]),
	("rust", [0xa8, 0x3c, 0x09]),
	("plum", [0x58, 0x0f, 0x41]),
	("bright blue", [0x01, 0x65, 0xfc]),
	("scarlet", [0xbe, 0x01, 0x19]),
	("ochre", [0xbf, 0x90, 0x05]),
	("slate", [0x51, 0x65, 0x72]),
	("sand", [0xe2, 0xca, 0x76]),
];

/// One entry of a name table as stored on disk.
///
/// Accepts both `{ "name", "hex" }` and the XKCD JSON layout `{ "english", "code" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedColor {
	/// Human readable color name
	#[serde(alias = "english")]
	pub name: String,
	/// `#RRGGBB` color
	#[serde(alias = "code")]
	pub hex: String,
}

/// A reference table of named colors with their Lab coordinates precomputed
#[derive(Debug, Clone)]
pub struct ColorNames {
	/// Name and Lab color of each entry
	entries: Vec<(String, Lab)>,
}

impl Default for ColorNames {
	fn default() -> Self {
		Self::from_rgb(XKCD.iter().map(|&(name, [r, g, b])| (name, Srgb::new(r, g, b))))
	}
}

impl ColorNames {
	/// A table with no entries; every lookup returns `None`
	#[must_use]
	pub const fn empty() -> Self {
		Self { entries: Vec::new() }
	}

	/// Build a table from names and sRGB colors
	pub fn from_rgb<'a>(entries: impl IntoIterator<Item = (&'a str, Color)>) -> Self {
		Self {
			entries: entries
				.into_iter()
				.map(|(name, rgb)| (name.to_owned(), color::rgb_to_lab(rgb)))
				.collect(),
		}
	}

	/// Build a table from on-disk entries, failing on the first malformed hex value
	pub fn from_named(entries: &[NamedColor]) -> Result<Self> {
		let entries = entries
			.iter()
			.map(|entry| Ok((entry.name.clone(), color::rgb_to_lab(color::parse_hex(&entry.hex)?))))
			.collect::<Result<Vec<_>>>()?;
		Ok(Self { entries })
	}

	/// Load a JSON array of [`NamedColor`]s
	pub fn from_json_file(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)?;
		let entries: Vec<NamedColor> = serde_json::from_str(&text)?;
		Self::from_named(&entries)
	}

	/// Number of entries in the table
	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the table has no entries
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The name of the entry closest to `color` in Lab
	#[must_use]
	pub fn nearest(&self, color: Color) -> Option<&str> {
		let lab = color::rgb_to_lab(color);
		self.entries
			.iter()
			.map(|(name, entry)| (name, color::lab_distance(lab, *entry)))
			.min_by(|(_, x), (_, y)| f32::total_cmp(x, y))
			.map(|(name, _)| name.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_entries_name_themselves() {
		let names = ColorNames::default();
		assert_eq!(names.nearest(Srgb::new(0, 0, 0)), Some("black"));
		assert_eq!(names.nearest(Srgb::new(255, 255, 255)), Some("white"));
		assert_eq!(names.nearest(Srgb::new(0xe5, 0x00, 0x00)), Some("red"));
	}

	#[test]
	fn near_colors_snap_to_entry() {
		let names = ColorNames::default();
		assert_eq!(names.nearest(Srgb::new(250, 118, 10)), Some("orange"));
	}

	#[test]
	fn empty_table_has_no_names() {
		assert_eq!(ColorNames::empty().nearest(Srgb::new(10, 20, 30)), None);
	}

	#[test]
	fn parses_xkcd_layout() {
		let entries: Vec<NamedColor> =
			serde_json::from_str(r##"[{"english": "cloudy blue", "code": "#acc2d9"}, {"name": "x", "hex": "#000000"}]"##)
				.expect("valid json");
		let names = ColorNames::from_named(&entries).expect("valid hex");
		assert_eq!(names.len(), 2);
		assert_eq!(names.nearest(Srgb::new(0xac, 0xc2, 0xd9)), Some("cloudy blue"));
	}

	#[test]
	fn rejects_bad_hex() {
		let entries = vec![NamedColor { name: "bad".to_owned(), hex: "#12".to_owned() }];
		assert!(ColorNames::from_named(&entries).is_err());
	}
}
