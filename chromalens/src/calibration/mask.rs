//! Figure shapes hidden in stimulus plates

/// A region of a plate given in normalized coordinates, where `(0, 0)` is the top left and `(1, 1)` the bottom right
pub trait ShapeMask {
	/// Whether the point belongs to the figure rather than the ground
	fn contains(&self, x: f32, y: f32) -> bool;
}

impl<F: Fn(f32, f32) -> bool> ShapeMask for F {
	fn contains(&self, x: f32, y: f32) -> bool {
		self(x, y)
	}
}

/// A blocky digit 5 built from five bars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigitFive {
	/// Horizontal center
	pub cx: f32,
	/// Vertical center
	pub cy: f32,
	/// Half of the glyph's width
	pub size: f32,
}

impl Default for DigitFive {
	fn default() -> Self {
		Self { cx: 0.5, cy: 0.5, size: 0.22 }
	}
}

impl DigitFive {
	/// The five bars as `(left, right, top, bottom)` in units of `size` relative to the center
	const BARS: [(f32, f32, f32, f32); 5] = [
		// top
		(-1.0, 1.0, -1.1, -0.8),
		// upper left
		(-1.0, -0.6, -1.1, -0.1),
		// middle
		(-1.0, 1.0, -0.15, 0.15),
		// lower right
		(0.6, 1.0, 0.1, 1.1),
		// bottom
		(-1.0, 1.0, 0.8, 1.1),
	];
}

impl ShapeMask for DigitFive {
	fn contains(&self, x: f32, y: f32) -> bool {
		let (dx, dy) = ((x - self.cx) / self.size, (y - self.cy) / self.size);
		Self::BARS
			.iter()
			.any(|&(left, right, top, bottom)| left < dx && dx < right && top < dy && dy < bottom)
	}
}
