//! Every tunable parameter in one serializable structure.
//!
//! Missing sections and fields take their defaults, so a config file only needs the values it changes:
//!
//! ```json
//! {
//!   "extract": { "merge_threshold": 10.0, "seed": 42 },
//!   "compensation": { "max_shift": 45.0 }
//! }
//! ```

use crate::{
	calibration::CalibrationConfig, compensate::CompensationConfig, extract::ExtractOptions, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for extraction, calibration, and compensation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Palette extraction
	pub extract: ExtractOptions,
	/// Calibration protocol and severity grading
	pub calibration: CalibrationConfig,
	/// Compensation filter and confused pair detection
	pub compensation: CompensationConfig,
}

impl Config {
	/// Parse and validate a JSON config
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Load and validate a JSON config file
	pub fn from_json_file(path: &Path) -> Result<Self> {
		Self::from_json(&std::fs::read_to_string(path)?)
	}

	/// Save as pretty JSON
	pub fn to_json_file(&self, path: &Path) -> Result<()> {
		std::fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Check every section
	pub fn validate(&self) -> Result<()> {
		self.extract.validate()?;
		self.calibration.validate()?;
		self.compensation.validate()
	}
}
