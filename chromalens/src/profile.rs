//! The personal CVD profile produced by a finished calibration session

use crate::{color, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Two hues, in degrees, that the user cannot tell apart at a fixed saturation and lightness.
///
/// The pair is unordered: `(a, b) == (b, a)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionPair {
	/// First hue in `[0, 360)`
	pub hue_a: f32,
	/// Second hue in `[0, 360)`
	pub hue_b: f32,
}

impl ConfusionPair {
	/// Create a pair, wrapping both hues into `[0, 360)`
	#[must_use]
	pub fn new(hue_a: f32, hue_b: f32) -> Self {
		Self {
			hue_a: color::normalize_hue(hue_a),
			hue_b: color::normalize_hue(hue_b),
		}
	}

	/// Both hues rotated by the same offset
	#[must_use]
	pub fn rotated(self, offset: f32) -> Self {
		Self::new(self.hue_a + offset, self.hue_b + offset)
	}

	/// The hues in ascending order
	fn ordered(self) -> (f32, f32) {
		if self.hue_a <= self.hue_b {
			(self.hue_a, self.hue_b)
		} else {
			(self.hue_b, self.hue_a)
		}
	}
}

impl PartialEq for ConfusionPair {
	#[allow(clippy::float_cmp)]
	fn eq(&self, other: &Self) -> bool {
		self.ordered() == other.ordered()
	}
}

impl fmt::Display for ConfusionPair {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}° ↔ {}°", self.hue_a, self.hue_b)
	}
}

/// One answer from the confusion width test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidthMeasurement {
	/// Degrees both hues were rotated by
	pub offset: f32,
	/// Whether the user could tell the two colors apart
	pub can_distinguish: bool,
}

/// How wide the user's confusion zone is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
	/// Up to the first threshold
	Mild,
	/// Up to the second threshold
	MildModerate,
	/// Up to the third threshold
	Moderate,
	/// Up to the fourth threshold
	ModerateSevere,
	/// Anything wider
	Severe,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Severity::Mild => "mild",
			Severity::MildModerate => "mild-moderate",
			Severity::Moderate => "moderate",
			Severity::ModerateSevere => "moderate-severe",
			Severity::Severe => "severe",
		})
	}
}

/// Upper bounds, in degrees, of each severity below [`Severity::Severe`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SeverityThresholds {
	/// Largest width still graded mild
	pub mild: f32,
	/// Largest width still graded mild-moderate
	pub mild_moderate: f32,
	/// Largest width still graded moderate
	pub moderate: f32,
	/// Largest width still graded moderate-severe
	pub moderate_severe: f32,
}

impl Default for SeverityThresholds {
	fn default() -> Self {
		Self {
			mild: 1.0,
			mild_moderate: 2.0,
			moderate: 3.0,
			moderate_severe: 5.0,
		}
	}
}

impl SeverityThresholds {
	/// Thresholds must be non-negative and strictly increasing so grading is monotonic
	pub fn validate(&self) -> Result<()> {
		let bounds = [self.mild, self.mild_moderate, self.moderate, self.moderate_severe];
		if bounds[0] < 0.0 || bounds.windows(2).any(|w| w[0] >= w[1]) {
			return Err(Error::InvalidConfig(format!(
				"severity thresholds must be non-negative and strictly increasing, got {bounds:?}"
			)));
		}
		Ok(())
	}

	/// Grade a confusion width
	#[must_use]
	pub fn grade(&self, max_width: f32) -> Severity {
		if max_width <= self.mild {
			Severity::Mild
		} else if max_width <= self.mild_moderate {
			Severity::MildModerate
		} else if max_width <= self.moderate {
			Severity::Moderate
		} else if max_width <= self.moderate_severe {
			Severity::ModerateSevere
		} else {
			Severity::Severe
		}
	}
}

/// Widest absolute offset the user could not distinguish, or `0.0` if there is none
#[must_use]
pub fn max_width(measurements: &[WidthMeasurement]) -> f32 {
	measurements
		.iter()
		.filter(|m| !m.can_distinguish)
		.map(|m| m.offset.abs())
		.fold(0.0, f32::max)
}

/// A finished calibration: the user's confusion axis and how wide it is.
///
/// Profiles are never edited; calibrating again produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvdProfile {
	/// The hue pair picked in the last grid stage
	pub confusion_pair: ConfusionPair,
	/// See [`max_width`]
	pub max_width: f32,
	/// Grade of `max_width`
	#[serde(rename = "severityLabel")]
	pub severity: Severity,
	/// Every width test answer, in the order asked
	pub width_measurements: Vec<WidthMeasurement>,
	/// When the calibration finished
	pub timestamp: DateTime<Utc>,
}

impl CvdProfile {
	/// Build a profile stamped with the current time
	#[must_use]
	pub fn new(
		confusion_pair: ConfusionPair,
		width_measurements: Vec<WidthMeasurement>,
		thresholds: &SeverityThresholds,
	) -> Self {
		Self::with_timestamp(confusion_pair, width_measurements, thresholds, Utc::now())
	}

	/// Build a profile with an explicit timestamp
	#[must_use]
	pub fn with_timestamp(
		confusion_pair: ConfusionPair,
		width_measurements: Vec<WidthMeasurement>,
		thresholds: &SeverityThresholds,
		timestamp: DateTime<Utc>,
	) -> Self {
		let max_width = max_width(&width_measurements);
		Self {
			confusion_pair,
			max_width,
			severity: thresholds.grade(max_width),
			width_measurements,
			timestamp,
		}
	}

	/// Human readable severity; a zero width only affects the axis itself
	#[allow(clippy::float_cmp)]
	#[must_use]
	pub fn severity_label(&self) -> String {
		if self.max_width == 0.0 {
			format!("{} (axis only)", self.severity)
		} else {
			self.severity.to_string()
		}
	}

	/// Serialize to pretty JSON
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Deserialize from JSON.
	///
	/// Hues are wrapped into `[0, 360)`, and `maxWidth` must agree with `widthMeasurements`.
	/// The severity is kept as saved, since the thresholds it was graded with are not part of the profile.
	pub fn from_json(json: &str) -> Result<Self> {
		let mut profile: Self = serde_json::from_str(json)?;
		let ConfusionPair { hue_a, hue_b } = profile.confusion_pair;
		if !(hue_a.is_finite() && hue_b.is_finite()) {
			return Err(Error::InvalidProfile(format!("confusion pair {} is not a pair of hues", profile.confusion_pair)));
		}
		profile.confusion_pair = ConfusionPair::new(hue_a, hue_b);

		let expected = max_width(&profile.width_measurements);
		if (profile.max_width - expected).abs() > 1e-4 {
			return Err(Error::InvalidProfile(format!(
				"maxWidth is {} but the measurements give {expected}",
				profile.max_width
			)));
		}
		profile.max_width = expected;

		Ok(profile)
	}

	/// Write the profile as JSON, replacing any previous profile at `path`
	pub fn save(&self, path: &Path) -> Result<()> {
		std::fs::write(path, self.to_json()?)?;
		Ok(())
	}

	/// Read a profile written by [`CvdProfile::save`]
	pub fn load(path: &Path) -> Result<Self> {
		Self::from_json(&std::fs::read_to_string(path)?)
	}
}

impl fmt::Display for CvdProfile {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"confusion {}, width ±{}°, {}",
			self.confusion_pair,
			self.max_width,
			self.severity_label()
		)
	}
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;

	fn measurements(confused_up_to: f32) -> Vec<WidthMeasurement> {
		[0.0, 1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 5.0, -5.0, 8.0, -8.0]
			.into_iter()
			.map(|offset: f32| WidthMeasurement { offset, can_distinguish: offset.abs() > confused_up_to })
			.collect()
	}

	#[test]
	fn pair_is_symmetric() {
		assert_eq!(ConfusionPair::new(30.0, 130.0), ConfusionPair::new(130.0, 30.0));
		assert_ne!(ConfusionPair::new(30.0, 130.0), ConfusionPair::new(30.0, 135.0));
	}

	#[test]
	fn pair_rotation_wraps() {
		let pair = ConfusionPair::new(355.0, 2.0).rotated(8.0);
		assert_eq!(pair, ConfusionPair::new(3.0, 10.0));
	}

	#[test]
	fn max_width_is_widest_confused_offset() {
		for n in [0.0, 1.0, 2.0, 3.0, 5.0, 8.0] {
			assert_eq!(max_width(&measurements(n)), n);
		}
	}

	#[test]
	fn max_width_without_confusion_is_zero() {
		assert_eq!(max_width(&measurements(-1.0)), 0.0);
		assert_eq!(max_width(&[]), 0.0);
	}

	#[test]
	fn severity_is_monotonic() {
		let thresholds = SeverityThresholds::default();
		let grades = [0.0, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 8.0].map(|w| thresholds.grade(w));
		assert!(grades.windows(2).all(|w| w[0] <= w[1]));
		assert_eq!(grades[0], Severity::Mild);
		assert_eq!(grades[3], Severity::MildModerate);
		assert_eq!(grades[4], Severity::Moderate);
		assert_eq!(grades[6], Severity::ModerateSevere);
		assert_eq!(grades[7], Severity::Severe);
	}

	#[test]
	fn rejects_non_increasing_thresholds() {
		let thresholds = SeverityThresholds { moderate: 1.5, ..SeverityThresholds::default() };
		assert!(thresholds.validate().is_err());
		assert!(SeverityThresholds::default().validate().is_ok());
	}

	#[test]
	fn axis_only_label() {
		let profile = CvdProfile::new(ConfusionPair::new(40.0, 115.0), measurements(-1.0), &SeverityThresholds::default());
		assert_eq!(profile.severity_label(), "mild (axis only)");

		let profile = CvdProfile::new(ConfusionPair::new(40.0, 115.0), measurements(3.0), &SeverityThresholds::default());
		assert_eq!(profile.severity_label(), "moderate");
	}

	#[test]
	fn json_uses_camel_case_fields() {
		let profile = CvdProfile::new(ConfusionPair::new(40.0, 115.0), measurements(2.0), &SeverityThresholds::default());
		let json = profile.to_json().expect("serializable");
		assert!(json.contains("\"confusionPair\""));
		assert!(json.contains("\"hueA\""));
		assert!(json.contains("\"canDistinguish\""));
		assert!(json.contains("\"severityLabel\": \"mild-moderate\""));
		assert_eq!(CvdProfile::from_json(&json).expect("deserializable"), profile);
	}

	#[test]
	fn loading_wraps_hues() {
		let mut profile = CvdProfile::new(ConfusionPair::new(40.0, 115.0), measurements(2.0), &SeverityThresholds::default());
		profile.confusion_pair = ConfusionPair { hue_a: 400.0, hue_b: -245.0 };
		let loaded = CvdProfile::from_json(&profile.to_json().expect("serializable")).expect("deserializable");
		assert_eq!(loaded.confusion_pair.hue_a, 40.0);
		assert_eq!(loaded.confusion_pair.hue_b, 115.0);
	}

	#[test]
	fn loading_rejects_inconsistent_width() {
		let mut profile = CvdProfile::new(ConfusionPair::new(40.0, 115.0), measurements(2.0), &SeverityThresholds::default());
		profile.max_width = 8.0;
		let json = profile.to_json().expect("serializable");
		assert!(matches!(CvdProfile::from_json(&json), Err(Error::InvalidProfile(_))));

		profile.max_width = 2.0;
		profile.width_measurements.clear();
		let json = profile.to_json().expect("serializable");
		assert!(matches!(CvdProfile::from_json(&json), Err(Error::InvalidProfile(_))));
	}
}
