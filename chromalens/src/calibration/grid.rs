//! Candidate hue pairs for the grid selection stages

use crate::{color, profile::ConfusionPair};
use serde::{Deserialize, Serialize};

/// Spacing and extent of one grid selection stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStage {
	/// Degrees between neighboring hues
	pub step: f32,
	/// Half-width, in degrees, of the search window around the previous pick,
	/// or `None` to search the whole hue circle
	pub window: Option<f32>,
}

/// Hues from `start` (inclusive) to `end` (exclusive) in increments of `step`, wrapped into `[0, 360)`
fn hue_range(start: f32, end: f32, step: f32) -> impl Iterator<Item = f32> {
	(0u16..)
		.map(move |i| start + f32::from(i) * step)
		.take_while(move |&hue| hue < end)
		.map(color::normalize_hue)
}

/// The candidate pairs of a grid stage.
///
/// Without a window, `hue_a` covers `[0, 180)` and `hue_b` the whole circle.
/// This halves the first stage; pairs with both hues in `[180, 360)` are only reached by the refined stages.
/// With a window `w` around `center`, each hue independently covers `[center - w, center + w)`.
///
/// Pairs whose circular hue difference is outside `min_separation..=max_separation` are skipped,
/// and `(a, b)` is only listed once even if `(b, a)` also occurs.
#[must_use]
pub fn candidate_pairs(
	stage: &GridStage,
	center: Option<ConfusionPair>,
	min_separation: f32,
	max_separation: f32,
) -> Vec<ConfusionPair> {
	let ((a_start, a_end), (b_start, b_end)) = match (stage.window, center) {
		(Some(w), Some(center)) => (
			(center.hue_a - w, center.hue_a + w),
			(center.hue_b - w, center.hue_b + w),
		),
		_ => ((0.0, 180.0), (0.0, 360.0)),
	};

	let mut pairs = Vec::<ConfusionPair>::new();
	for hue_a in hue_range(a_start, a_end, stage.step) {
		for hue_b in hue_range(b_start, b_end, stage.step) {
			let separation = color::hue_distance(hue_a, hue_b);
			if separation < min_separation || separation > max_separation {
				continue;
			}

			let pair = ConfusionPair::new(hue_a, hue_b);
			if !pairs.contains(&pair) {
				pairs.push(pair);
			}
		}
	}
	pairs
}

/// Number of pages needed to show `len` items `page_size` at a time
#[must_use]
pub fn page_count(len: usize, page_size: usize) -> usize {
	if page_size == 0 {
		0
	} else {
		len.div_ceil(page_size)
	}
}

/// The items on the given page, which may be fewer than `page_size` on the last page
/// and empty past the end
#[must_use]
pub fn page<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
	let start = page.saturating_mul(page_size).min(items.len());
	let end = start.saturating_add(page_size).min(items.len());
	&items[start..end]
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;

	const STAGE_ONE: GridStage = GridStage { step: 30.0, window: None };

	#[test]
	fn stage_one_covers_every_separated_pair_once() {
		let pairs = candidate_pairs(&STAGE_ONE, None, 60.0, 300.0);
		// 6 values of hue_a, 9 sufficiently separated values of hue_b each,
		// minus the 10 pairs where both hues are below 180 and were seen twice
		assert_eq!(pairs.len(), 44);

		for (i, x) in pairs.iter().enumerate() {
			assert!(color::hue_distance(x.hue_a, x.hue_b) >= 60.0);
			assert!(pairs[i + 1..].iter().all(|y| x != y));
		}
		assert!(pairs.contains(&ConfusionPair::new(0.0, 120.0)));
		assert!(pairs.contains(&ConfusionPair::new(150.0, 330.0)));
		assert!(!pairs.contains(&ConfusionPair::new(210.0, 330.0)));
	}

	#[test]
	fn refined_stage_stays_in_window() {
		let stage = GridStage { step: 15.0, window: Some(45.0) };
		let center = ConfusionPair::new(30.0, 120.0);
		let pairs = candidate_pairs(&stage, Some(center), 60.0, 300.0);

		assert!(pairs.contains(&center));
		for pair in &pairs {
			assert!(color::hue_distance(pair.hue_a, 30.0) <= 45.0);
			assert!(color::hue_distance(pair.hue_b, 120.0) <= 45.0);
		}
	}

	#[test]
	fn refined_window_wraps_around_zero() {
		let stage = GridStage { step: 5.0, window: Some(15.0) };
		let center = ConfusionPair::new(5.0, 200.0);
		let pairs = candidate_pairs(&stage, Some(center), 60.0, 300.0);

		assert_eq!(pairs.len(), 36);
		assert!(pairs.contains(&ConfusionPair::new(350.0, 185.0)));
		assert!(pairs.iter().all(|p| (0.0..360.0).contains(&p.hue_a)));
	}

	#[test]
	fn pagination() {
		let items = (0..10).collect::<Vec<_>>();
		assert_eq!(page_count(items.len(), 4), 3);
		assert_eq!(page(&items, 0, 4), &[0, 1, 2, 3]);
		assert_eq!(page(&items, 2, 4), &[8, 9]);
		assert!(page(&items, 3, 4).is_empty());
		assert_eq!(page_count(0, 4), 0);
	}
}
