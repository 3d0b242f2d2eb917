//! Rough dichromacy simulation by mixing gamma encoded sRGB channels

use crate::color::{self, Color};
use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A type of color vision deficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deficiency {
	/// Missing or anomalous long wavelength cones
	Protan,
	/// Missing or anomalous medium wavelength cones
	Deutan,
	/// Missing or anomalous short wavelength cones
	Tritan,
}

impl Deficiency {
	/// Every deficiency
	pub const ALL: [Deficiency; 3] = [Deficiency::Protan, Deficiency::Deutan, Deficiency::Tritan];

	/// Row-major channel mixing matrix
	const fn matrix(self) -> [[f32; 3]; 3] {
		match self {
			Deficiency::Protan => [[0.566, 0.433, 0.0], [0.558, 0.442, 0.0], [0.0, 0.242, 0.758]],
			Deficiency::Deutan => [[0.625, 0.375, 0.0], [0.7, 0.3, 0.0], [0.0, 0.3, 0.7]],
			Deficiency::Tritan => [[0.95, 0.05, 0.0], [0.0, 0.433, 0.567], [0.0, 0.475, 0.525]],
		}
	}
}

impl fmt::Display for Deficiency {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Deficiency::Protan => "protan",
			Deficiency::Deutan => "deutan",
			Deficiency::Tritan => "tritan",
		})
	}
}

impl FromStr for Deficiency {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Deficiency::ALL
			.into_iter()
			.find(|d| d.to_string().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown deficiency `{s}`, expected protan, deutan, or tritan"))
	}
}

/// How a color might look with the given deficiency
#[must_use]
pub fn simulate(pixel: Color, deficiency: Deficiency) -> Color {
	let m = deficiency.matrix();
	let [r, g, b] = [f32::from(pixel.red), f32::from(pixel.green), f32::from(pixel.blue)];
	let mix = |row: [f32; 3]| color::quantize(row[0] * r + row[1] * g + row[2] * b);
	Srgb::new(mix(m[0]), mix(m[1]), mix(m[2]))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rows_nearly_sum_to_one() {
		for deficiency in Deficiency::ALL {
			for row in deficiency.matrix() {
				approx::assert_abs_diff_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 2e-3);
			}
		}
	}

	#[test]
	fn grays_are_unchanged() {
		for deficiency in Deficiency::ALL {
			for v in [0, 17, 128, 200, 255] {
				assert_eq!(simulate(Srgb::new(v, v, v), deficiency), Srgb::new(v, v, v));
			}
		}
	}

	#[test]
	fn protan_collapses_red_and_green() {
		let red = simulate(Srgb::new(255, 0, 0), Deficiency::Protan);
		assert_eq!(red, Srgb::new(144, 142, 0));
		let green = simulate(Srgb::new(0, 255, 0), Deficiency::Protan);
		assert!(red.red.abs_diff(red.green) < 5 && green.red.abs_diff(green.green) < 5);
	}

	#[test]
	fn parses_names() {
		assert_eq!("Deutan".parse(), Ok(Deficiency::Deutan));
		assert!("achromat".parse::<Deficiency>().is_err());
	}
}
