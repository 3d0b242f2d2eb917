//! Provides the implementation for k-means over sampled RGB pixels

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;
use serde::{Deserialize, Serialize};

/// A sampled pixel or centroid, with channels in `0.0..=255.0`
pub type Point = [f32; 3];

/// Strategy used to pick the starting centroids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Init {
	/// Uniformly random samples
	Random,
	/// k-means++: samples weighted by squared distance to the nearest chosen centroid
	#[default]
	PlusPlus,
}

/// Squared Euclidean distance in RGB
fn squared_distance(x: Point, y: Point) -> f32 {
	let dr = x[0] - y[0];
	let dg = x[1] - y[1];
	let db = x[2] - y[2];
	dr * dr + dg * dg + db * db
}

/// Index of the centroid closest to `point`
fn nearest(point: Point, centroids: &[Point]) -> usize {
	let mut min_dist = f32::INFINITY;
	let mut min_center = 0;
	for (i, &centroid) in centroids.iter().enumerate() {
		let dist = squared_distance(point, centroid);
		if dist < min_dist {
			min_dist = dist;
			min_center = i;
		}
	}
	min_center
}

/// Data for each center/centroid
struct CenterData {
	/// The centroid point
	centroid: Vec<Point>,
	/// Vector sum of all points assigned to this center
	sum: Vec<[f64; 3]>,
	/// Number of points assigned to this center
	count: Vec<u32>,
}

impl CenterData {
	/// Create a [`CenterData`] around the given starting centroids
	fn new(centroid: Vec<Point>) -> Self {
		let k = centroid.len();
		Self {
			centroid,
			sum: vec![[0.0; 3]; k],
			count: vec![0; k],
		}
	}
}

/// Result from running k-means
#[derive(Debug, Clone)]
pub struct KmeansResult {
	/// Sum of squared distances from each point to its centroid
	///
	/// A lower variance indicates a tighter clustering.
	pub variance: f64,
	/// Final centroid colors, excluding centroids that ended up with no points
	pub centroids: Vec<Point>,
	/// Number of points in each centroid
	pub counts: Vec<u32>,
	/// Number of elapsed iterations
	pub iterations: u32,
}

impl KmeansResult {
	/// Create an empty result, representing that no k-means trials were able to be run
	const fn empty() -> Self {
		Self {
			variance: 0.0,
			centroids: Vec::new(),
			counts: Vec::new(),
			iterations: 0,
		}
	}
}

/// Choose the starting centroids using the k-means++ algorithm
fn kmeans_plus_plus(k: u8, rng: &mut impl Rng, points: &[Point], centroids: &mut Vec<Point>) {
	use rand::{
		distributions::{WeightedError::*, WeightedIndex},
		prelude::Distribution,
	};

	let mut weights = vec![f32::INFINITY; points.len()];

	// Pick any random first centroid
	centroids.push(points[rng.gen_range(0..points.len())]);

	// Pick each next centroid with a weighted probability based off the squared distance to its closest centroid
	for i in 1..usize::from(k) {
		let centroid = centroids[i - 1];
		for (weight, &point) in weights.iter_mut().zip(points) {
			*weight = f32::min(*weight, squared_distance(point, centroid));
		}

		match WeightedIndex::new(&weights) {
			Ok(sampler) => centroids.push(points[sampler.sample(rng)]),
			Err(AllWeightsZero) => return, // every point already coincides with a centroid
			Err(InvalidWeight | NoItem | TooMany) => {
				unreachable!("distances are finite and >= 0 and points is non-empty")
			},
		}
	}
}

/// Choose the starting centroids uniformly at random
fn random_init(k: u8, rng: &mut impl Rng, points: &[Point], centroids: &mut Vec<Point>) {
	centroids.extend((0..k).map(|_| points[rng.gen_range(0..points.len())]));
}

/// Recompute the per-center sums and counts from scratch by nearest-centroid assignment
#[cfg(not(feature = "threads"))]
fn update_assignments(points: &[Point], centers: &mut CenterData) {
	centers.sum.fill([0.0; 3]);
	centers.count.fill(0);

	for &point in points {
		let i = nearest(point, &centers.centroid);
		let sum = &mut centers.sum[i];
		sum[0] += f64::from(point[0]);
		sum[1] += f64::from(point[1]);
		sum[2] += f64::from(point[2]);
		centers.count[i] += 1;
	}
}

/// Recompute the per-center sums and counts from scratch by nearest-centroid assignment
#[cfg(feature = "threads")]
fn update_assignments(points: &[Point], centers: &mut CenterData) {
	use rayon::prelude::*;

	let k = centers.centroid.len();
	let centroids = &centers.centroid;
	let empty = || (vec![[0.0f64; 3]; k], vec![0u32; k]);

	let (sums, counts) = points
		.par_iter()
		.with_min_len(1024)
		.fold(empty, |(mut sums, mut counts), &point| {
			let i = nearest(point, centroids);
			let sum = &mut sums[i];
			sum[0] += f64::from(point[0]);
			sum[1] += f64::from(point[1]);
			sum[2] += f64::from(point[2]);
			counts[i] += 1;
			(sums, counts)
		})
		.reduce(empty, |(mut sums, mut counts), (other_sums, other_counts)| {
			for (sum, other) in sums.iter_mut().zip(&other_sums) {
				sum[0] += other[0];
				sum[1] += other[1];
				sum[2] += other[2];
			}
			for (count, other) in counts.iter_mut().zip(&other_counts) {
				*count += other;
			}
			(sums, counts)
		});

	centers.sum = sums;
	centers.count = counts;
}

/// For each center, move its centroid to the mean of its points,
/// reseeding any center that received no points from a random sample
fn update_centroids(rng: &mut impl Rng, points: &[Point], centers: &mut CenterData) -> u32 {
	let mut reseeded = 0;
	for ((centroid, &n), sum) in centers.centroid.iter_mut().zip(&centers.count).zip(&centers.sum) {
		if n == 0 {
			*centroid = points[rng.gen_range(0..points.len())];
			reseeded += 1;
		} else {
			let n = f64::from(n);
			// Sums need the extra precision, but the mean fits back in an f32
			#[allow(clippy::cast_possible_truncation)]
			{
				*centroid = [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32];
			}
		}
	}
	reseeded
}

/// Final nearest-centroid pass giving the population of each centroid and the total variance
fn tally(points: &[Point], centroids: &[Point]) -> (Vec<u32>, f64) {
	let mut counts = vec![0; centroids.len()];
	let mut variance = 0.0;
	for &point in points {
		let i = nearest(point, centroids);
		counts[i] += 1;
		variance += f64::from(squared_distance(point, centroids[i]));
	}
	(counts, variance)
}

/// Run a single trial of k-means for a fixed number of iterations
fn kmeans(points: &[Point], k: u8, init: Init, iterations: u32, seed: u64) -> KmeansResult {
	let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);

	let mut centroids = Vec::with_capacity(usize::from(k));
	match init {
		Init::PlusPlus => kmeans_plus_plus(k, &mut rng, points, &mut centroids),
		Init::Random => random_init(k, &mut rng, points, &mut centroids),
	}

	let mut centers = CenterData::new(centroids);
	for _ in 0..iterations {
		update_assignments(points, &mut centers);
		let reseeded = update_centroids(&mut rng, points, &mut centers);
		if reseeded > 0 {
			tracing::trace!(reseeded, "reseeded empty clusters");
		}
	}

	let (counts, variance) = tally(points, &centers.centroid);

	let (centroids, counts) = centers
		.centroid
		.into_iter()
		.zip(counts)
		.filter(|&(_, n)| n > 0)
		.unzip();

	KmeansResult { variance, centroids, counts, iterations }
}

/// Run multiple trials of k-means, taking the trial with the lowest variance
///
/// An empty result with no centroids is returned if `points` is empty, `trials` = 0, or `k` = 0.
pub fn run(points: &[Point], trials: u32, k: u8, init: Init, iterations: u32, seed: u64) -> KmeansResult {
	if k == 0 || points.is_empty() {
		return KmeansResult::empty();
	}

	(0..trials)
		.map(|i| kmeans(points, k, init, iterations, seed ^ u64::from(i)))
		.min_by(|x, y| f64::total_cmp(&x.variance, &y.variance))
		.unwrap_or(KmeansResult::empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn test_points() -> Vec<Point> {
		vec![
			[12.0, 40.0, 200.0],
			[250.0, 10.0, 15.0],
			[30.0, 220.0, 35.0],
			[128.0, 128.0, 128.0],
			[0.0, 0.0, 0.0],
			[255.0, 255.0, 255.0],
			[200.0, 180.0, 20.0],
			[90.0, 10.0, 150.0],
		]
	}

	/// Two tight, well separated blobs: 30 reddish points and 10 bluish points
	fn two_blobs() -> Vec<Point> {
		let mut points = Vec::new();
		for i in 0..30u8 {
			points.push([240.0 - f32::from(i % 5), 20.0 + f32::from(i % 3), 25.0]);
		}
		for i in 0..10u8 {
			points.push([15.0, 30.0 + f32::from(i % 4), 230.0]);
		}
		points
	}

	fn kmeans_plus_plus_num_centroids(k: u8, n: usize) {
		let mut centroids = Vec::new();
		kmeans_plus_plus(k, &mut Xoroshiro128PlusPlus::seed_from_u64(0), &test_points()[..n], &mut centroids);
		assert_eq!(centroids.len(), usize::min(usize::from(k), n));
	}

	#[test]
	fn kmeans_plus_plus_k_greater_than_n() {
		kmeans_plus_plus_num_centroids(6, 2);
	}

	#[test]
	fn kmeans_plus_plus_k_equals_n() {
		kmeans_plus_plus_num_centroids(4, 4);
	}

	#[test]
	fn kmeans_plus_plus_k_less_than_n() {
		kmeans_plus_plus_num_centroids(2, 6);
	}

	#[test]
	fn random_init_always_picks_k() {
		let mut centroids = Vec::new();
		random_init(5, &mut Xoroshiro128PlusPlus::seed_from_u64(3), &test_points()[..2], &mut centroids);
		assert_eq!(centroids.len(), 5);
	}

	#[test]
	fn update_assignments_preserves_count() {
		let points = test_points();
		let mut centers = CenterData::new(vec![[0.0; 3], [255.0; 3], [128.0, 0.0, 128.0]]);
		update_assignments(&points, &mut centers);
		assert_eq!(centers.count.iter().sum::<u32>() as usize, points.len());

		let total: f64 = centers.sum.iter().map(|s| s[0]).sum();
		let expected: f64 = points.iter().map(|p| f64::from(p[0])).sum();
		assert_abs_diff_eq!(total, expected, epsilon = 1e-6);
	}

	#[test]
	fn empty_centers_are_reseeded_from_samples() {
		let points = test_points();
		// The far away centroid never receives any point
		let mut centers = CenterData::new(vec![[128.0; 3], [-1000.0; 3]]);
		update_assignments(&points, &mut centers);
		let reseeded = update_centroids(&mut Xoroshiro128PlusPlus::seed_from_u64(1), &points, &mut centers);
		assert_eq!(reseeded, 1);
		assert!(points.contains(&centers.centroid[1]));
	}

	#[test]
	fn single_cluster_is_the_mean() {
		let points = test_points();
		let result = run(&points, 1, 1, Init::PlusPlus, 10, 0);
		assert_eq!(result.counts, vec![points.len() as u32]);

		#[allow(clippy::cast_precision_loss)]
		let mean = points.iter().map(|p| p[1]).sum::<f32>() / points.len() as f32;
		assert_abs_diff_eq!(result.centroids[0][1], mean, epsilon = 1e-3);
	}

	#[test]
	fn separates_two_blobs() {
		for init in [Init::PlusPlus, Init::Random] {
			let result = run(&two_blobs(), 2, 2, init, 10, 7);
			let mut counts = result.counts.clone();
			counts.sort_unstable();
			assert_eq!(counts, vec![10, 30]);
		}
	}

	#[test]
	fn k_larger_than_distinct_points() {
		let points = vec![[10.0, 10.0, 10.0]; 50];
		let result = run(&points, 1, 8, Init::Random, 12, 5);
		assert_eq!(result.counts.iter().sum::<u32>(), 50);
		assert!(result.centroids.len() <= 8);
		assert_abs_diff_eq!(result.variance, 0.0);
	}

	#[test]
	fn same_seed_same_result() {
		let x = run(&two_blobs(), 1, 3, Init::PlusPlus, 10, 42);
		let y = run(&two_blobs(), 1, 3, Init::PlusPlus, 10, 42);
		assert_eq!(x.centroids, y.centroids);
		assert_eq!(x.counts, y.counts);
	}

	#[test]
	fn empty_input_gives_empty_result() {
		assert!(run(&[], 1, 4, Init::PlusPlus, 10, 0).centroids.is_empty());
		assert!(run(&test_points(), 1, 0, Init::PlusPlus, 10, 0).centroids.is_empty());
		assert!(run(&test_points(), 0, 4, Init::PlusPlus, 10, 0).centroids.is_empty());
	}
}
