//! Conversions between sRGB, linear RGB, CIE XYZ, CIELAB, and HSL.
//!
//! Everything here is a pure function of its inputs.
//! Channels enter as 8-bit sRGB and leave rounded and clamped back to 8 bits,
//! so callers never have to pre-validate anything beyond the `u8` type itself.
//!
//! The math is `palette`'s; this module fixes the types and rounding.
//! XYZ and Lab are relative to the D65 white point,
//! and Euclidean distance in Lab ([`lab_distance`]) is the perceptual difference metric
//! used for merging clusters, naming colors, and confusion detection.

use crate::{Error, Result};
use palette::convert::FromColorUnclamped;
use palette::{FromColor, Hsl, Lab, LinSrgb, Srgb, Xyz};

/// An 8-bit sRGB color
pub type Color = Srgb<u8>;

/// Round and clamp a value in `0.0..=255.0` to a channel.
///
/// `NaN` becomes `0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn quantize(value: f32) -> u8 {
	value.round().clamp(0.0, 255.0) as u8
}

/// Round unclamped sRGB in `0.0..=1.0` to 8 bits
fn quantize_rgb(color: Srgb) -> Color {
	Srgb::new(quantize(color.red * 255.0), quantize(color.green * 255.0), quantize(color.blue * 255.0))
}

/// Decode sRGB to linear light
#[must_use]
pub fn rgb_to_linear(color: Color) -> LinSrgb {
	color.into_format::<f32>().into_linear()
}

/// Encode linear light back to sRGB, clamping out of gamut values
#[must_use]
pub fn linear_to_rgb(linear: LinSrgb) -> Color {
	quantize_rgb(Srgb::from_linear(linear))
}

/// Decode one sRGB channel to linear light in `0.0..=1.0`
#[must_use]
pub fn srgb_channel_to_linear(channel: u8) -> f32 {
	rgb_to_linear(Srgb::new(channel, channel, channel)).red
}

/// Encode one linear channel back to sRGB, clamping out of gamut values
#[must_use]
pub fn linear_to_srgb_channel(linear: f32) -> u8 {
	linear_to_rgb(LinSrgb::new(linear, linear, linear)).red
}

/// sRGB to CIE XYZ (D65)
#[must_use]
pub fn rgb_to_xyz(color: Color) -> Xyz {
	Xyz::from_color_unclamped(rgb_to_linear(color))
}

/// CIE XYZ (D65) to sRGB, clamping out of gamut colors
#[must_use]
pub fn xyz_to_rgb(xyz: Xyz) -> Color {
	linear_to_rgb(LinSrgb::from_color_unclamped(xyz))
}

/// CIE XYZ to CIELAB, both relative to D65
#[must_use]
pub fn xyz_to_lab(xyz: Xyz) -> Lab {
	Lab::from_color_unclamped(xyz)
}

/// CIELAB to CIE XYZ, both relative to D65
#[must_use]
pub fn lab_to_xyz(lab: Lab) -> Xyz {
	Xyz::from_color_unclamped(lab)
}

/// sRGB to CIELAB
#[must_use]
pub fn rgb_to_lab(color: Color) -> Lab {
	xyz_to_lab(rgb_to_xyz(color))
}

/// CIELAB to sRGB, clamping out of gamut colors
#[must_use]
pub fn lab_to_rgb(lab: Lab) -> Color {
	xyz_to_rgb(lab_to_xyz(lab))
}

/// Euclidean (CIE76) distance between two Lab colors
#[must_use]
pub fn lab_distance(x: Lab, y: Lab) -> f32 {
	let dl = x.l - y.l;
	let da = x.a - y.a;
	let db = x.b - y.b;
	(dl * dl + da * da + db * db).sqrt()
}

/// sRGB to HSL with the hue in degrees `[0, 360)`.
///
/// Grays get a hue and saturation of `0.0`.
#[must_use]
pub fn rgb_to_hsl(color: Color) -> Hsl {
	let hsl: Hsl = Hsl::from_color(color.into_format::<f32>());
	if color.red == color.green && color.green == color.blue {
		Hsl::new(0.0, 0.0, hsl.lightness)
	} else {
		Hsl::new(hsl.hue.into_positive_degrees(), hsl.saturation, hsl.lightness)
	}
}

/// HSL to unrounded sRGB channels in `0.0..=255.0`.
///
/// A `NaN` component in gives `NaN` channels out.
#[must_use]
pub fn hsl_to_rgb_f32(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
	if hue.is_nan() || saturation.is_nan() || lightness.is_nan() {
		return [f32::NAN; 3];
	}

	let rgb: Srgb = Srgb::from_color_unclamped(Hsl::new(hue, saturation, lightness));
	[rgb.red * 255.0, rgb.green * 255.0, rgb.blue * 255.0]
}

/// HSL to sRGB
#[must_use]
pub fn hsl_to_rgb(hsl: Hsl) -> Color {
	let [r, g, b] = hsl_to_rgb_f32(hsl.hue.into_positive_degrees(), hsl.saturation, hsl.lightness);
	Srgb::new(quantize(r), quantize(g), quantize(b))
}

/// Wrap a hue in degrees into `[0, 360)`
#[must_use]
pub fn normalize_hue(hue: f32) -> f32 {
	let h = hue.rem_euclid(360.0);
	// rem_euclid can round up to exactly 360 for tiny negative inputs
	if h >= 360.0 {
		0.0
	} else {
		h
	}
}

/// Shortest angular distance between two hues, in `[0, 180]`
#[must_use]
pub fn hue_distance(x: f32, y: f32) -> f32 {
	let d = (x - y).abs().rem_euclid(360.0);
	d.min(360.0 - d)
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`
#[must_use]
pub fn hue_delta(from: f32, to: f32) -> f32 {
	let d = (to - from).rem_euclid(360.0);
	if d > 180.0 {
		d - 360.0
	} else {
		d
	}
}

/// Format a color as an uppercase `#RRGGBB` string
#[must_use]
pub fn to_hex(color: Color) -> String {
	format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

/// Parse a `#RRGGBB` or `RRGGBB` string
pub fn parse_hex(hex: &str) -> Result<Color> {
	let digits = hex.trim().trim_start_matches('#');
	if digits.len() != 6 || !digits.is_ascii() {
		return Err(Error::InvalidHex(hex.to_owned()));
	}

	let channel = |i: usize| {
		digits
			.get(i..i + 2)
			.and_then(|s| u8::from_str_radix(s, 16).ok())
			.ok_or_else(|| Error::InvalidHex(hex.to_owned()))
	};

	Ok(Srgb::new(channel(0)?, channel(2)?, channel(4)?))
}
