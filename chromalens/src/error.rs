//! Error type shared by the fallible parts of the library

use thiserror::Error;

/// Result alias for chromalens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong outside of the pure color math
#[derive(Error, Debug)]
pub enum Error {
	/// The RGBA buffer does not match the stated dimensions
	#[error("pixel buffer has {actual} bytes, expected {expected} for a {width}x{height} RGBA image")]
	InvalidBuffer {
		/// Image width in pixels
		width: u32,
		/// Image height in pixels
		height: u32,
		/// Number of bytes required
		expected: usize,
		/// Number of bytes provided
		actual: usize,
	},

	/// A configuration value is out of range or inconsistent
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// A calibration input that the current stage does not accept
	#[error("`{input}` is not accepted during the {stage} stage")]
	UnexpectedInput {
		/// Name of the stage the session was in
		stage: &'static str,
		/// Description of the rejected input
		input: String,
	},

	/// A grid selection index past the end of the candidate list
	#[error("candidate {index} does not exist ({len} candidates)")]
	NoSuchCandidate {
		/// Requested index
		index: usize,
		/// Number of candidates in the stage
		len: usize,
	},

	/// A saved profile whose fields contradict each other
	#[error("invalid profile: {0}")]
	InvalidProfile(String),

	/// A hex color string that could not be parsed
	#[error("invalid hex color `{0}`")]
	InvalidHex(String),

	/// Profile or configuration JSON could not be (de)serialized
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Reading or writing a profile or configuration file failed
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
