//! Pseudoisochromatic plates: a field of random dots where the dots inside a shape take one color
//! and the rest take another, so the shape is only visible to someone who can tell the colors apart

use super::mask::ShapeMask;
use crate::{
	color::{self, Color},
	profile::ConfusionPair,
};
use image::{Rgb, RgbImage};
use palette::Hsl;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Plate background
pub const BACKGROUND: Color = Color::new(0xf5, 0xf5, 0xf5);

/// Smallest dot radius in pixels
const MIN_RADIUS: f32 = 2.0;

/// Range of the random extra radius added to [`MIN_RADIUS`]
const RADIUS_SPREAD: f32 = 2.5;

/// Size and density of a plate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateSize {
	/// Width in pixels
	pub width: u32,
	/// Height in pixels
	pub height: u32,
	/// Number of dots
	pub dots: u32,
}

/// A filled circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dot {
	/// Center x in pixels
	pub x: f32,
	/// Center y in pixels
	pub y: f32,
	/// Radius in pixels
	pub radius: f32,
}

/// Randomly placed dots over a canvas.
///
/// Positions and radii do not depend on the shape, so only color can reveal it.
#[derive(Debug, Clone, PartialEq)]
pub struct DotField {
	/// Canvas width in pixels
	width: u32,
	/// Canvas height in pixels
	height: u32,
	/// The dots, drawn in order
	dots: Vec<Dot>,
}

impl DotField {
	/// Scatter `count` dots uniformly with radii in `[2, 4.5)`
	#[must_use]
	pub fn random(width: u32, height: u32, count: u32, rng: &mut impl Rng) -> Self {
		#[allow(clippy::cast_precision_loss)]
		let (w, h) = (width as f32, height as f32);
		let dots = (0..count)
			.map(|_| Dot {
				x: rng.gen::<f32>() * w,
				y: rng.gen::<f32>() * h,
				radius: MIN_RADIUS + rng.gen::<f32>() * RADIUS_SPREAD,
			})
			.collect();
		Self { width, height, dots }
	}

	/// Scatter dots according to a [`PlateSize`]
	#[must_use]
	pub fn for_plate(size: PlateSize, rng: &mut impl Rng) -> Self {
		Self::random(size.width, size.height, size.dots, rng)
	}

	/// The dots, in drawing order
	#[must_use]
	pub fn dots(&self) -> &[Dot] {
		&self.dots
	}

	/// Draw the plate: dots whose center lies inside `mask` get `figure`, the rest get `ground`
	#[must_use]
	pub fn render(&self, mask: &impl ShapeMask, figure: Color, ground: Color) -> RgbImage {
		let mut image = RgbImage::from_pixel(self.width, self.height, rgb(BACKGROUND));
		#[allow(clippy::cast_precision_loss)]
		let (w, h) = (self.width as f32, self.height as f32);

		for dot in &self.dots {
			let fill = rgb(if mask.contains(dot.x / w, dot.y / h) { figure } else { ground });
			fill_circle(&mut image, dot, fill);
		}

		image
	}
}

/// Convert to an `image` pixel
fn rgb(color: Color) -> Rgb<u8> {
	Rgb([color.red, color.green, color.blue])
}

/// Set every pixel whose center lies inside the dot
fn fill_circle(image: &mut RgbImage, dot: &Dot, fill: Rgb<u8>) {
	// the bounding box is clamped to the canvas, so the casts cannot go negative or past the edge
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
	let bounds = |center: f32, limit: u32| {
		let low = (center - dot.radius).floor().max(0.0) as u32;
		let high = ((center + dot.radius).ceil().max(0.0) as u32).min(limit);
		low..high
	};

	let r2 = dot.radius * dot.radius;
	for y in bounds(dot.y, image.height()) {
		for x in bounds(dot.x, image.width()) {
			#[allow(clippy::cast_precision_loss)]
			let (dx, dy) = (x as f32 + 0.5 - dot.x, y as f32 + 0.5 - dot.y);
			if dx * dx + dy * dy <= r2 {
				image.put_pixel(x, y, fill);
			}
		}
	}
}

/// The plate colors of a hue pair at a fixed saturation and lightness.
///
/// HSL lightness is not perceptual, so two hues at the same HSL lightness can still differ in luminance.
/// With `match_lightness`, the second color's HSL lightness is adjusted until its Lab lightness
/// matches the first color's, keeping both hues exact.
#[must_use]
pub fn pair_colors(pair: ConfusionPair, saturation: f32, lightness: f32, match_lightness: bool) -> (Color, Color) {
	let a = color::hsl_to_rgb(Hsl::new(pair.hue_a, saturation, lightness));
	let b = if match_lightness {
		with_lab_lightness(pair.hue_b, saturation, color::rgb_to_lab(a).l)
	} else {
		color::hsl_to_rgb(Hsl::new(pair.hue_b, saturation, lightness))
	};
	(a, b)
}

/// Bisect HSL lightness for the color of the given hue and saturation closest to a Lab lightness.
///
/// For a fixed hue and saturation every channel is non-decreasing in HSL lightness, so Lab lightness is too.
fn with_lab_lightness(hue: f32, saturation: f32, target: f32) -> Color {
	let at = |lightness: f32| color::hsl_to_rgb(Hsl::new(hue, saturation, lightness));

	let (mut low, mut high) = (0.0f32, 1.0f32);
	for _ in 0..24 {
		let mid = (low + high) / 2.0;
		if color::rgb_to_lab(at(mid)).l < target {
			low = mid;
		} else {
			high = mid;
		}
	}

	let (below, above) = (at(low), at(high));
	if target - color::rgb_to_lab(below).l <= color::rgb_to_lab(above).l - target {
		below
	} else {
		above
	}
}
