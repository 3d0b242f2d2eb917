//! Palette extraction: downsample, sample, cluster, then merge and rank the clusters.
//!
//! The pipeline is
//! 1. shrink the image so its longer side is at most [`ExtractOptions::max_dimension`],
//! 2. take every n-th opaque pixel so that roughly [`ExtractOptions::sample_budget`] remain,
//! 3. run k-means in RGB over the samples (see [`crate::kmeans`]),
//! 4. turn each non-empty cluster into a [`Swatch`],
//! 5. merge swatches closer than [`ExtractOptions::merge_threshold`] in Lab,
//! 6. sort by share of the image and drop swatches below [`ExtractOptions::min_ratio`].
//!
//! Given the same image, options, and seed, extraction is deterministic.

use crate::{
	color::{self, Color},
	compensate::{self, CompensationConfig},
	kmeans::{self, Init, Point},
	names::ColorNames,
	profile::CvdProfile,
	Error, Result,
};
use image::{imageops, RgbaImage};
use palette::Srgb;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Tunable parameters for [`extract`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
	/// Images with a longer side above this are downsampled first
	pub max_dimension: u32,
	/// Approximate number of pixels to sample after downsampling
	pub sample_budget: u32,
	/// Pixels with an alpha below this are ignored
	pub alpha_threshold: u8,
	/// Ignore nearly gray pixels that are also nearly black or white
	pub skip_extremes: bool,
	/// Number of k-means iterations per trial
	pub iterations: u32,
	/// Number of k-means trials, keeping the one with the lowest variance
	pub trials: u32,
	/// How the starting centroids are chosen
	pub init: Init,
	/// Swatches closer than this in Lab are merged, or `None` to keep every cluster
	pub merge_threshold: Option<f32>,
	/// Swatches with a smaller share of the samples are dropped
	pub min_ratio: f32,
	/// Seed for centroid selection, or `None` to seed from the OS
	pub seed: Option<u64>,
}

impl Default for ExtractOptions {
	fn default() -> Self {
		Self {
			max_dimension: 320,
			sample_budget: 200 * 200,
			alpha_threshold: 128,
			skip_extremes: false,
			iterations: 10,
			trials: 1,
			init: Init::PlusPlus,
			merge_threshold: Some(15.0),
			min_ratio: 0.0,
			seed: None,
		}
	}
}

impl ExtractOptions {
	/// Check that every parameter is in its usable range
	pub fn validate(&self) -> Result<()> {
		let fail = |msg: &str| Err(Error::InvalidConfig(format!("extract: {msg}")));
		if self.max_dimension == 0 {
			return fail("max_dimension must be > 0");
		}
		if self.sample_budget == 0 {
			return fail("sample_budget must be > 0");
		}
		if self.trials == 0 {
			return fail("trials must be > 0");
		}
		if self.merge_threshold.is_some_and(|t| t.is_nan() || t < 0.0) {
			return fail("merge_threshold must be >= 0");
		}
		if !(0.0..1.0).contains(&self.min_ratio) {
			return fail("min_ratio must be in [0, 1)");
		}
		Ok(())
	}
}

/// One color of an extracted palette
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swatch {
	/// The rounded cluster centroid
	pub rgb: Color,
	/// `rgb` as `#RRGGBB`
	pub hex: String,
	/// Number of samples in the cluster
	pub population: u32,
	/// Share of the samples in the cluster
	pub ratio: f32,
	/// Nearest entry of the name table, if the table was not empty
	pub name: Option<String>,
}

/// An extracted palette, sorted by descending [`Swatch::ratio`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Palette(Vec<Swatch>);

impl Palette {
	/// The swatches, most common first
	#[must_use]
	pub fn swatches(&self) -> &[Swatch] {
		&self.0
	}

	/// Number of swatches
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the palette has no swatches
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Every pair of swatch indices `(i, j)`, `i < j`, that the profile's owner is likely to confuse
	#[must_use]
	pub fn confused_pairs(&self, profile: &CvdProfile, config: &CompensationConfig) -> Vec<(usize, usize)> {
		let swatches = &self.0;
		let mut pairs = Vec::new();
		for (i, x) in swatches.iter().enumerate() {
			for (j, y) in swatches.iter().enumerate().skip(i + 1) {
				if compensate::is_confused(x.rgb, y.rgb, profile, config) {
					pairs.push((i, j));
				}
			}
		}
		pairs
	}
}

impl IntoIterator for Palette {
	type Item = Swatch;
	type IntoIter = std::vec::IntoIter<Swatch>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl<'a> IntoIterator for &'a Palette {
	type Item = &'a Swatch;
	type IntoIter = std::slice::Iter<'a, Swatch>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

/// A cluster before rounding, so that merges average the exact centroids
#[derive(Debug, Clone, Copy)]
struct Cluster {
	/// Centroid in RGB
	centroid: Point,
	/// Number of samples
	population: u32,
}

impl Cluster {
	/// The centroid rounded to 8-bit sRGB
	fn rgb(&self) -> Color {
		Srgb::new(
			color::quantize(self.centroid[0]),
			color::quantize(self.centroid[1]),
			color::quantize(self.centroid[2]),
		)
	}
}

/// Extract up to `k` colors from an RGBA buffer of `width * height` pixels.
///
/// A fully transparent or empty image, or `k` = 0, gives an empty palette.
///
/// # Errors
/// [`Error::InvalidBuffer`] if `pixels` is not exactly `width * height * 4` bytes long,
/// and [`Error::InvalidConfig`] if `options` fails [`ExtractOptions::validate`].
pub fn extract(
	pixels: &[u8],
	width: u32,
	height: u32,
	k: u8,
	options: &ExtractOptions,
	names: &ColorNames,
) -> Result<Palette> {
	let expected = usize::try_from(u64::from(width) * u64::from(height) * 4).unwrap_or(usize::MAX);
	if pixels.len() != expected {
		return Err(Error::InvalidBuffer { width, height, expected, actual: pixels.len() });
	}
	options.validate()?;

	if width == 0 || height == 0 {
		return Ok(Palette::default());
	}

	let image = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(Error::InvalidBuffer {
		width,
		height,
		expected,
		actual: pixels.len(),
	})?;

	Ok(extract_image(&image, k, options, names))
}

/// Extract up to `k` colors from an already decoded image.
///
/// Options are used as given; call [`ExtractOptions::validate`] first if they come from outside.
#[must_use]
pub fn extract_image(image: &RgbaImage, k: u8, options: &ExtractOptions, names: &ColorNames) -> Palette {
	if k == 0 || image.width() == 0 || image.height() == 0 {
		return Palette::default();
	}

	let thumbnail;
	let image = match thumbnail_dimensions(image.width(), image.height(), options.max_dimension) {
		Some((width, height)) => {
			tracing::debug!(width, height, "downsampling");
			thumbnail = imageops::thumbnail(image, width, height);
			&thumbnail
		},
		None => image,
	};

	let samples = sample(image, options);
	tracing::debug!(samples = samples.len(), "sampled pixels");
	if samples.is_empty() {
		return Palette::default();
	}

	let seed = options.seed.unwrap_or_else(|| OsRng.next_u64());
	let result = kmeans::run(&samples, options.trials.max(1), k, options.init, options.iterations, seed);
	tracing::debug!(variance = result.variance, clusters = result.centroids.len(), "k-means finished");

	let mut clusters = result
		.centroids
		.into_iter()
		.zip(result.counts)
		.map(|(centroid, population)| Cluster { centroid, population })
		.collect::<Vec<_>>();

	if let Some(threshold) = options.merge_threshold {
		merge(&mut clusters, threshold);
	}

	let total = clusters.iter().map(|c| u64::from(c.population)).sum::<u64>();
	clusters.sort_by_key(|c| std::cmp::Reverse(c.population));

	let kept = clusters
		.iter()
		.take_while(|c| ratio(c.population, total) >= options.min_ratio)
		.count();
	if kept < clusters.len() {
		tracing::debug!(dropped = clusters.len() - kept, "dropping rare swatches");
		clusters.truncate(kept);
	}
	let total = clusters.iter().map(|c| u64::from(c.population)).sum::<u64>();

	Palette(
		clusters
			.iter()
			.map(|cluster| {
				let rgb = cluster.rgb();
				Swatch {
					rgb,
					hex: color::to_hex(rgb),
					population: cluster.population,
					ratio: ratio(cluster.population, total),
					name: names.nearest(rgb).map(str::to_owned),
				}
			})
			.collect(),
	)
}

/// `population / total`, or `0.0` for an empty total
fn ratio(population: u32, total: u64) -> f32 {
	if total == 0 {
		0.0
	} else {
		#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
		{
			(f64::from(population) / total as f64) as f32
		}
	}
}

/// Dimensions to downsample to so the longer side is at most `max_dimension`,
/// or `None` if the image is already small enough
fn thumbnail_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
	let longer = width.max(height);
	if longer <= max_dimension {
		None
	} else {
		let scale = f64::from(max_dimension) / f64::from(longer);
		// multiplying by a positive factor < 1
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let (w, h) = (
			((f64::from(width) * scale).round() as u32).clamp(1, max_dimension),
			((f64::from(height) * scale).round() as u32).clamp(1, max_dimension),
		);
		Some((w, h))
	}
}

/// Every n-th opaque pixel, where n is chosen so roughly `sample_budget` pixels are visited
fn sample(image: &RgbaImage, options: &ExtractOptions) -> Vec<Point> {
	let pixels = image.as_raw();
	let count = pixels.len() / 4;
	let stride = usize::max(1, count / usize::try_from(options.sample_budget.max(1)).unwrap_or(usize::MAX));

	pixels
		.chunks_exact(4)
		.step_by(stride)
		.filter(|px| px[3] >= options.alpha_threshold)
		.filter(|px| !(options.skip_extremes && is_extreme(Srgb::new(px[0], px[1], px[2]))))
		.map(|px| [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])])
		.collect()
}

/// Nearly gray and also nearly black or white
fn is_extreme(color: Color) -> bool {
	let hsl = color::rgb_to_hsl(color);
	hsl.saturation < 0.1 && (hsl.lightness < 0.08 || hsl.lightness > 0.92)
}

/// Repeatedly merge the closest pair of clusters in Lab until no pair is closer than `threshold`.
///
/// Merged centroids are the population weighted average of the two.
fn merge(clusters: &mut Vec<Cluster>, threshold: f32) {
	loop {
		let labs = clusters.iter().map(|c| color::rgb_to_lab(c.rgb())).collect::<Vec<_>>();

		let mut closest = None;
		let mut min_dist = threshold;
		for i in 0..labs.len() {
			for j in (i + 1)..labs.len() {
				let dist = color::lab_distance(labs[i], labs[j]);
				if dist < min_dist {
					min_dist = dist;
					closest = Some((i, j));
				}
			}
		}

		let Some((i, j)) = closest else { break };

		let y = clusters.swap_remove(j);
		let x = &mut clusters[i];
		let (nx, ny) = (f64::from(x.population), f64::from(y.population));
		let n = nx + ny;
		#[allow(clippy::cast_possible_truncation)]
		for c in 0..3 {
			x.centroid[c] = ((f64::from(x.centroid[c]) * nx + f64::from(y.centroid[c]) * ny) / n) as f32;
		}
		x.population += y.population;

		tracing::debug!(distance = min_dist, remaining = clusters.len(), "merged swatches");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::profile::{ConfusionPair, SeverityThresholds, WidthMeasurement};
	use approx::assert_abs_diff_eq;
	use rand::SeedableRng;

	fn options() -> ExtractOptions {
		ExtractOptions { seed: Some(0), ..ExtractOptions::default() }
	}

	/// A `width * height` RGBA buffer with a vertical stripe of each color, of the given widths
	fn stripes(stripes: &[([u8; 3], u32)], height: u32) -> (Vec<u8>, u32) {
		let width = stripes.iter().map(|&(_, w)| w).sum::<u32>();
		let mut pixels = Vec::new();
		for _ in 0..height {
			for &([r, g, b], w) in stripes {
				for _ in 0..w {
					pixels.extend([r, g, b, 255]);
				}
			}
		}
		(pixels, width)
	}

	fn noisy(width: u32, height: u32) -> Vec<u8> {
		let mut rng = rand_xoshiro::Xoroshiro128PlusPlus::seed_from_u64(9);
		let mut pixels = vec![0; (width * height * 4) as usize];
		rng.fill_bytes(&mut pixels);
		for px in pixels.chunks_exact_mut(4) {
			px[3] = 255;
		}
		pixels
	}

	#[test]
	fn ratios_sum_to_one_and_are_sorted() {
		let pixels = noisy(64, 48);
		for k in [1, 3, 8, 16] {
			let palette = extract(&pixels, 64, 48, k, &options(), &ColorNames::default()).expect("valid buffer");
			assert!(!palette.is_empty());
			assert!(palette.len() <= usize::from(k));
			let sum = palette.swatches().iter().map(|s| s.ratio).sum::<f32>();
			assert_abs_diff_eq!(sum, 1.0, epsilon = 0.01);
			assert!(palette.swatches().windows(2).all(|w| w[0].ratio >= w[1].ratio));
		}
	}

	#[test]
	fn single_cluster_has_ratio_one() {
		let palette = extract(&noisy(20, 20), 20, 20, 1, &options(), &ColorNames::default()).expect("valid buffer");
		assert_eq!(palette.len(), 1);
		#[allow(clippy::float_cmp)]
		{
			assert_eq!(palette.swatches()[0].ratio, 1.0);
		}
	}

	#[test]
	fn finds_stripe_colors() {
		let (pixels, width) = stripes(&[([230, 20, 20], 30), ([20, 40, 220], 10)], 10);
		let palette = extract(&pixels, width, 10, 2, &options(), &ColorNames::default()).expect("valid buffer");
		assert_eq!(palette.len(), 2);

		let top = &palette.swatches()[0];
		assert_eq!(top.rgb, Srgb::new(230, 20, 20));
		assert_eq!(top.hex, "#E61414");
		assert_eq!(top.population, 300);
		assert_abs_diff_eq!(top.ratio, 0.75);
		assert_eq!(palette.swatches()[1].rgb, Srgb::new(20, 40, 220));
		assert!(top.name.is_some());
	}

	#[test]
	fn close_clusters_are_merged() {
		let (pixels, width) = stripes(&[([200, 30, 30], 10), ([204, 32, 30], 10), ([20, 200, 40], 20)], 4);

		let palette = extract(&pixels, width, 4, 3, &options(), &ColorNames::empty()).expect("valid buffer");
		assert_eq!(palette.len(), 2);
		assert_eq!(palette.swatches()[0].population, 80);
		assert_eq!(palette.swatches()[1].population, 80);

		let unmerged = ExtractOptions { merge_threshold: None, ..options() };
		let palette = extract(&pixels, width, 4, 3, &unmerged, &ColorNames::empty()).expect("valid buffer");
		assert_eq!(palette.len(), 3);
	}

	#[test]
	fn rare_swatches_are_dropped_and_ratios_renormalized() {
		let (pixels, width) = stripes(&[([230, 20, 20], 49), ([20, 40, 220], 1)], 2);
		let options = ExtractOptions { min_ratio: 0.05, ..options() };
		let palette = extract(&pixels, width, 2, 2, &options, &ColorNames::empty()).expect("valid buffer");
		assert_eq!(palette.len(), 1);
		#[allow(clippy::float_cmp)]
		{
			assert_eq!(palette.swatches()[0].ratio, 1.0);
		}
	}

	#[test]
	fn empty_and_transparent_inputs_give_empty_palettes() {
		let names = ColorNames::default();
		assert!(extract(&[], 0, 0, 5, &options(), &names).expect("valid buffer").is_empty());
		assert!(extract(&[], 0, 7, 5, &options(), &names).expect("valid buffer").is_empty());
		assert!(extract(&noisy(4, 4), 4, 4, 0, &options(), &names).expect("valid buffer").is_empty());

		let transparent = vec![120; 8 * 8 * 4].into_iter().enumerate().map(|(i, v)| if i % 4 == 3 { 0 } else { v });
		let transparent = transparent.collect::<Vec<u8>>();
		assert!(extract(&transparent, 8, 8, 5, &options(), &names).expect("valid buffer").is_empty());
	}

	#[test]
	fn mismatched_buffer_is_an_error() {
		let result = extract(&[0; 15], 2, 2, 3, &options(), &ColorNames::default());
		assert!(matches!(result, Err(Error::InvalidBuffer { expected: 16, actual: 15, .. })));
	}

	#[test]
	fn skip_extremes_ignores_black_and_white() {
		let (pixels, width) = stripes(&[([0, 0, 0], 10), ([255, 255, 255], 10), ([30, 160, 60], 5)], 4);
		let options = ExtractOptions { skip_extremes: true, ..options() };
		let palette = extract(&pixels, width, 4, 3, &options, &ColorNames::empty()).expect("valid buffer");
		assert_eq!(palette.len(), 1);
		assert_eq!(palette.swatches()[0].rgb, Srgb::new(30, 160, 60));
	}

	#[test]
	fn large_images_are_downsampled() {
		assert_eq!(thumbnail_dimensions(640, 480, 320), Some((320, 240)));
		assert_eq!(thumbnail_dimensions(100, 2000, 320), Some((16, 320)));
		assert_eq!(thumbnail_dimensions(320, 100, 320), None);
	}

	#[test]
	fn extraction_runs_on_the_thumbnail() {
		let (pixels, width) = stripes(&[([230, 20, 20], 750), ([20, 40, 220], 250)], 400);
		let options = ExtractOptions { max_dimension: 100, ..options() };
		let palette = extract(&pixels, width, 400, 2, &options, &ColorNames::empty()).expect("valid buffer");

		assert_eq!(palette.len(), 2);
		let total = palette.swatches().iter().map(|s| s.population).sum::<u32>();
		assert_eq!(total, 100 * 40);

		let top = &palette.swatches()[0];
		assert!(top.rgb.red.abs_diff(230) <= 2 && top.rgb.green.abs_diff(20) <= 2 && top.rgb.blue.abs_diff(20) <= 2);
		assert_abs_diff_eq!(top.ratio, 0.75, epsilon = 0.01);
	}

	#[test]
	fn same_seed_same_palette() {
		let pixels = noisy(50, 50);
		let x = extract(&pixels, 50, 50, 6, &options(), &ColorNames::default()).expect("valid buffer");
		let y = extract(&pixels, 50, 50, 6, &options(), &ColorNames::default()).expect("valid buffer");
		assert_eq!(x, y);
	}

	#[test]
	fn flags_confused_swatches() {
		let (pixels, width) = stripes(&[([191, 119, 64], 10), ([89, 191, 64], 10), ([64, 64, 191], 10)], 2);
		let palette = extract(&pixels, width, 2, 3, &options(), &ColorNames::empty()).expect("valid buffer");
		assert_eq!(palette.len(), 3);

		let measurements = vec![WidthMeasurement { offset: 5.0, can_distinguish: false }];
		let profile =
			CvdProfile::new(ConfusionPair::new(30.0, 100.0), measurements, &SeverityThresholds::default());

		let pairs = palette.confused_pairs(&profile, &CompensationConfig::default());
		assert_eq!(pairs.len(), 1);
		let (i, j) = pairs[0];
		let hexes = [palette.swatches()[i].hex.as_str(), palette.swatches()[j].hex.as_str()];
		assert!(hexes.contains(&"#BF7740") && hexes.contains(&"#59BF40"));
	}
}
