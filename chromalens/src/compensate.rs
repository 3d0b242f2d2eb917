//! Per-pixel hue compensation around a personal confusion axis.
//!
//! A profile's confusion pair defines four attractor hues:
//! both hues of the pair and their opposites on the hue circle.
//! Pixels whose hue falls within the zone half-width of any attractor are rotated
//! toward the axis perpendicular to the pair, more strongly the closer they are to an attractor.
//! The rotation fades to nothing at the zone edge, so there is no visible seam between
//! corrected and untouched regions.

use crate::{
	color::{self, Color},
	profile::{ConfusionPair, CvdProfile},
	Error, Result,
};
use palette::Srgb;
use serde::{Deserialize, Serialize};

/// Tunable constants for compensation and confused-pair detection.
///
/// None of these are derived from vision science; they were picked by eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensationConfig {
	/// Pixels less saturated than this are left alone
	pub min_saturation: f32,
	/// Pixels darker than this are left alone
	pub min_lightness: f32,
	/// Pixels lighter than this are left alone
	pub max_lightness: f32,
	/// Zone half-width, in degrees, for a profile with a zero confusion width
	pub base_width: f32,
	/// Extra zone half-width per degree of measured confusion width
	pub width_scale: f32,
	/// Largest hue rotation, in degrees, applied at the center of a zone
	pub max_shift: f32,
	/// Saturation multiplier applied at the center of a zone
	pub saturation_boost: f32,
	/// Largest HSL lightness difference for two swatches to count as confusable
	pub pair_max_lightness_difference: f32,
	/// Both swatches need at least this saturation to count as confusable
	pub pair_min_saturation: f32,
	/// Swatches closer than this in Lab are already near-identical and not reported
	pub pair_min_lab_distance: f32,
}

impl Default for CompensationConfig {
	fn default() -> Self {
		Self {
			min_saturation: 0.08,
			min_lightness: 0.05,
			max_lightness: 0.95,
			base_width: 35.0,
			width_scale: 3.0,
			max_shift: 60.0,
			saturation_boost: 1.2,
			pair_max_lightness_difference: 0.4,
			pair_min_saturation: 0.15,
			pair_min_lab_distance: 12.0,
		}
	}
}

impl CompensationConfig {
	/// Check that the zone and thresholds are usable
	pub fn validate(&self) -> Result<()> {
		let fail = |msg: &str| Err(Error::InvalidConfig(format!("compensation: {msg}")));
		if self.base_width <= 0.0 || self.width_scale < 0.0 {
			return fail("base_width must be > 0 and width_scale >= 0");
		}
		if !(0.0..=1.0).contains(&self.min_lightness)
			|| !(0.0..=1.0).contains(&self.max_lightness)
			|| self.min_lightness >= self.max_lightness
		{
			return fail("lightness bounds must satisfy 0 <= min_lightness < max_lightness <= 1");
		}
		if self.max_shift < 0.0 || self.saturation_boost < 1.0 {
			return fail("max_shift must be >= 0 and saturation_boost >= 1");
		}
		Ok(())
	}

	/// Half-width, in degrees, of the confusion zone around each attractor hue
	#[must_use]
	pub fn zone_half_width(&self, profile: &CvdProfile) -> f32 {
		self.base_width + profile.max_width * self.width_scale
	}
}

/// The pair's hues and their opposites
fn attractors(pair: ConfusionPair) -> [f32; 4] {
	[
		pair.hue_a,
		pair.hue_b,
		color::normalize_hue(pair.hue_a + 180.0),
		color::normalize_hue(pair.hue_b + 180.0),
	]
}

/// Angular distance from `hue` to the nearest attractor of `pair`
#[must_use]
pub fn distance_to_axis(hue: f32, pair: ConfusionPair) -> f32 {
	attractors(pair)
		.into_iter()
		.map(|attractor| color::hue_distance(hue, attractor))
		.fold(f32::INFINITY, f32::min)
}

/// Whichever end of the axis perpendicular to `pair` is closer to `hue`
fn perpendicular_target(hue: f32, pair: ConfusionPair) -> f32 {
	let mid = (pair.hue_a + pair.hue_b) / 2.0;
	let plus = color::normalize_hue(mid + 90.0);
	let minus = color::normalize_hue(mid - 90.0);
	if color::hue_distance(hue, plus) <= color::hue_distance(hue, minus) {
		plus
	} else {
		minus
	}
}

/// Rotate a pixel's hue away from the profile's confusion axis.
///
/// Pixels that are nearly gray, nearly black or white, or outside every confusion zone
/// are returned unchanged, as is any pixel whose conversion produces `NaN`.
#[must_use]
pub fn compensate(pixel: Color, profile: &CvdProfile, config: &CompensationConfig) -> Color {
	let hsl = color::rgb_to_hsl(pixel);
	let (hue, saturation, lightness) = (hsl.hue.into_positive_degrees(), hsl.saturation, hsl.lightness);

	if saturation < config.min_saturation || lightness < config.min_lightness || lightness > config.max_lightness {
		return pixel;
	}

	let pair = profile.confusion_pair;
	let half_width = config.zone_half_width(profile);
	let distance = distance_to_axis(hue, pair);
	if distance >= half_width {
		return pixel;
	}

	let strength = 1.0 - distance / half_width;
	let delta = color::hue_delta(hue, perpendicular_target(hue, pair));
	let shift = delta.signum() * f32::min(config.max_shift * strength, delta.abs());
	let new_hue = color::normalize_hue(hue + shift);
	let new_saturation = f32::min(saturation * (1.0 + (config.saturation_boost - 1.0) * strength), 1.0);

	let [r, g, b] = color::hsl_to_rgb_f32(new_hue, new_saturation, lightness);
	if r.is_nan() || g.is_nan() || b.is_nan() {
		return pixel;
	}

	Srgb::new(color::quantize(r), color::quantize(g), color::quantize(b))
}

/// Apply [`compensate`] to every pixel of an RGBA buffer in place, leaving alpha untouched
#[cfg(not(feature = "threads"))]
pub fn compensate_rgba(pixels: &mut [u8], profile: &CvdProfile, config: &CompensationConfig) {
	for px in pixels.chunks_exact_mut(4) {
		compensate_rgba_pixel(px, profile, config);
	}
}

/// Apply [`compensate`] to every pixel of an RGBA buffer in place, leaving alpha untouched
#[cfg(feature = "threads")]
pub fn compensate_rgba(pixels: &mut [u8], profile: &CvdProfile, config: &CompensationConfig) {
	use rayon::prelude::*;

	pixels
		.par_chunks_exact_mut(4)
		.with_min_len(4096)
		.for_each(|px| compensate_rgba_pixel(px, profile, config));
}

/// Compensate one `[r, g, b, a]` pixel in place
fn compensate_rgba_pixel(px: &mut [u8], profile: &CvdProfile, config: &CompensationConfig) {
	let out = compensate(Srgb::new(px[0], px[1], px[2]), profile, config);
	px[0] = out.red;
	px[1] = out.green;
	px[2] = out.blue;
}

/// Whether two colors look different but fall on opposite ends of the profile's confusion axis.
///
/// Symmetric in `x` and `y`.
#[must_use]
pub fn is_confused(x: Color, y: Color, profile: &CvdProfile, config: &CompensationConfig) -> bool {
	let hx = color::rgb_to_hsl(x);
	let hy = color::rgb_to_hsl(y);

	if hx.saturation < config.pair_min_saturation || hy.saturation < config.pair_min_saturation {
		return false;
	}
	if (hx.lightness - hy.lightness).abs() > config.pair_max_lightness_difference {
		return false;
	}
	if color::lab_distance(color::rgb_to_lab(x), color::rgb_to_lab(y)) < config.pair_min_lab_distance {
		return false;
	}

	let half_width = config.zone_half_width(profile);
	let near = |hue: f32, target: f32| color::hue_distance(hue, target) <= half_width;
	let (hx, hy) = (hx.hue.into_positive_degrees(), hy.hue.into_positive_degrees());

	let pair = profile.confusion_pair;
	let opposite = pair.rotated(180.0);
	[pair, opposite].into_iter().any(|ConfusionPair { hue_a, hue_b }| {
		(near(hx, hue_a) && near(hy, hue_b)) || (near(hx, hue_b) && near(hy, hue_a))
	})
}
