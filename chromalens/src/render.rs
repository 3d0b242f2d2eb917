//! Render an image as seen through a simulation and compensation,
//! optionally highlighting one palette color and outlining the palette regions

use crate::{
	color::{self, Color},
	compensate::{self, CompensationConfig},
	extract::Palette,
	profile::CvdProfile,
	simulate::{self, Deficiency},
};
use image::RgbaImage;
use palette::{Lab, Srgb};

/// Everything that changes how a frame is drawn
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame<'a> {
	/// Simulate a deficiency before compensating
	pub simulation: Option<Deficiency>,
	/// Compensate for this profile's confusion axis
	pub profile: Option<&'a CvdProfile>,
	/// Show only pixels of this palette color in color and the rest in gray
	pub selected: Option<usize>,
	/// Draw black lines where palette regions meet
	pub outline: bool,
}

/// Index of the nearest swatch in Lab
fn nearest_swatch(pixel: &[u8], labs: &[Lab]) -> usize {
	let lab = color::rgb_to_lab(Srgb::new(pixel[0], pixel[1], pixel[2]));
	let mut min_dist = f32::INFINITY;
	let mut min_index = 0;
	for (i, &swatch) in labs.iter().enumerate() {
		let dist = color::lab_distance(lab, swatch);
		if dist < min_dist {
			min_dist = dist;
			min_index = i;
		}
	}
	min_index
}

/// The swatch index of every pixel in row-major order, or an empty map for an empty palette
#[cfg(not(feature = "threads"))]
#[must_use]
pub fn cluster_map(image: &RgbaImage, palette: &Palette) -> Vec<usize> {
	if palette.is_empty() {
		return Vec::new();
	}
	let labs = palette.swatches().iter().map(|s| color::rgb_to_lab(s.rgb)).collect::<Vec<_>>();
	image.as_raw().chunks_exact(4).map(|px| nearest_swatch(px, &labs)).collect()
}

/// The swatch index of every pixel in row-major order, or an empty map for an empty palette
#[cfg(feature = "threads")]
#[must_use]
pub fn cluster_map(image: &RgbaImage, palette: &Palette) -> Vec<usize> {
	use rayon::prelude::*;

	if palette.is_empty() {
		return Vec::new();
	}
	let labs = palette.swatches().iter().map(|s| color::rgb_to_lab(s.rgb)).collect::<Vec<_>>();
	image
		.as_raw()
		.par_chunks_exact(4)
		.with_min_len(4096)
		.map(|px| nearest_swatch(px, &labs))
		.collect()
}

/// Rec. 709 luma gray
fn gray(pixel: Color) -> Color {
	let luma = 0.2126 * f32::from(pixel.red) + 0.7152 * f32::from(pixel.green) + 0.0722 * f32::from(pixel.blue);
	let v = color::quantize(luma);
	Srgb::new(v, v, v)
}

/// Draw a frame. Alpha is kept as is.
///
/// Each pixel is simulated, then compensated, then grayed out if it belongs to a palette color other than the selected one.
/// Outlines are drawn on interior pixels with any of their 8 neighbors in another palette region.
#[must_use]
pub fn render_frame(image: &RgbaImage, palette: &Palette, frame: &Frame, config: &CompensationConfig) -> RgbaImage {
	let needs_map = frame.selected.is_some() || frame.outline;
	let clusters = if needs_map { cluster_map(image, palette) } else { Vec::new() };

	let mut out = image.clone();
	shade(&mut out, &clusters, frame, config);

	if frame.outline && !clusters.is_empty() {
		draw_outlines(&mut out, &clusters);
	}

	out
}

/// Simulate, compensate, and gray out one RGBA pixel in place
fn shade_pixel(px: &mut [u8], cluster: Option<usize>, frame: &Frame, config: &CompensationConfig) {
	let mut pixel = Srgb::new(px[0], px[1], px[2]);
	if let Some(deficiency) = frame.simulation {
		pixel = simulate::simulate(pixel, deficiency);
	}
	if let Some(profile) = frame.profile {
		pixel = compensate::compensate(pixel, profile, config);
	}
	if let (Some(selected), Some(cluster)) = (frame.selected, cluster) {
		if cluster != selected {
			pixel = gray(pixel);
		}
	}
	px[0] = pixel.red;
	px[1] = pixel.green;
	px[2] = pixel.blue;
}

/// Shade every pixel of an RGBA buffer
#[cfg(not(feature = "threads"))]
fn shade(pixels: &mut [u8], clusters: &[usize], frame: &Frame, config: &CompensationConfig) {
	for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
		shade_pixel(px, clusters.get(i).copied(), frame, config);
	}
}

/// Shade every pixel of an RGBA buffer
#[cfg(feature = "threads")]
fn shade(pixels: &mut [u8], clusters: &[usize], frame: &Frame, config: &CompensationConfig) {
	use rayon::prelude::*;

	pixels
		.par_chunks_exact_mut(4)
		.with_min_len(4096)
		.enumerate()
		.for_each(|(i, px)| shade_pixel(px, clusters.get(i).copied(), frame, config));
}

/// Blacken interior pixels that border another cluster
fn draw_outlines(image: &mut RgbaImage, clusters: &[usize]) {
	let (w, h) = (image.width() as usize, image.height() as usize);
	if w < 3 || h < 3 {
		return;
	}

	let mut edges = Vec::new();
	for y in 1..h - 1 {
		for x in 1..w - 1 {
			let i = y * w + x;
			let c = clusters[i];
			let border = [i - w - 1, i - w, i - w + 1, i - 1, i + 1, i + w - 1, i + w, i + w + 1]
				.into_iter()
				.any(|n| clusters[n] != c);
			if border {
				edges.push(i);
			}
		}
	}

	let raw: &mut [u8] = image;
	for i in edges {
		raw[i * 4..i * 4 + 3].fill(0);
	}
}
