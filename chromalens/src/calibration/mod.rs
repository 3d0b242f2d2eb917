//! Interactive calibration of a personal confusion axis.
//!
//! A session walks through
//! - an intro,
//! - three grid selection stages, each showing candidate hue pairs as plates
//!   and asking for the plate where the hidden shape is *least* visible,
//!   each stage searching a finer grid around the previous pick,
//! - a width measurement stage that rotates the final pair by a fixed list of offsets
//!   and asks whether the two colors can be told apart,
//! - a result holding the finished [`CvdProfile`].
//!
//! [`Session`] owns the current [`State`], and every change happens through [`State::next`].
//! Invalid inputs are rejected without changing the state,
//! and [`Input::Restart`] returns to the intro from anywhere, discarding everything in progress.

pub mod grid;
pub mod mask;
pub mod stimulus;

use crate::{
	color::Color,
	profile::{ConfusionPair, CvdProfile, SeverityThresholds, WidthMeasurement},
	Error, Result,
};
use grid::GridStage;
use serde::{Deserialize, Serialize};
use std::fmt;
use stimulus::PlateSize;

/// Number of grid selection stages
pub const GRID_STAGES: usize = 3;

/// Parameters of the calibration protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
	/// HSL saturation of every stimulus color
	pub saturation: f32,
	/// HSL lightness of the first color of every stimulus pair
	pub lightness: f32,
	/// Give the second color of each pair the same Lab lightness as the first
	pub match_lightness: bool,
	/// The grid selection stages, coarsest first
	pub stages: [GridStage; GRID_STAGES],
	/// Smallest circular hue difference of a candidate pair
	pub min_separation: f32,
	/// Largest circular hue difference of a candidate pair
	pub max_separation: f32,
	/// Candidate plates shown per page
	pub page_size: usize,
	/// Offsets, in degrees, tested in the width measurement stage, in order
	pub offsets: Vec<f32>,
	/// Grading of the measured width
	pub severity: SeverityThresholds,
	/// Plates shown during grid selection
	pub grid_plate: PlateSize,
	/// Plate shown during width measurement
	pub width_plate: PlateSize,
}

impl Default for CalibrationConfig {
	fn default() -> Self {
		Self {
			saturation: 0.7,
			lightness: 0.5,
			match_lightness: true,
			stages: [
				GridStage { step: 30.0, window: None },
				GridStage { step: 15.0, window: Some(45.0) },
				GridStage { step: 5.0, window: Some(15.0) },
			],
			min_separation: 60.0,
			max_separation: 300.0,
			page_size: 4,
			offsets: vec![0.0, 1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 5.0, -5.0, 8.0, -8.0],
			severity: SeverityThresholds::default(),
			grid_plate: PlateSize { width: 300, height: 300, dots: 2500 },
			width_plate: PlateSize { width: 340, height: 340, dots: 1800 },
		}
	}
}

impl CalibrationConfig {
	/// Check that the protocol can run to completion with these parameters
	pub fn validate(&self) -> Result<()> {
		let fail = |msg: &str| Err(Error::InvalidConfig(format!("calibration: {msg}")));
		let unit = |x: f32| x > 0.0 && x <= 1.0;
		if !unit(self.saturation) || !unit(self.lightness) || self.lightness >= 1.0 {
			return fail("saturation must be in (0, 1] and lightness in (0, 1)");
		}
		if self.stages.iter().any(|s| s.step.is_nan() || s.step < 1.0 || s.window.is_some_and(|w| !unit(w / 180.0))) {
			return fail("grid steps must be >= 1 and windows in (0, 180]");
		}
		if !(0.0..=self.max_separation).contains(&self.min_separation) {
			return fail("separation bounds must satisfy 0 <= min_separation <= max_separation");
		}
		if self.page_size == 0 {
			return fail("page_size must be > 0");
		}
		if self.offsets.is_empty() {
			return fail("offsets must not be empty");
		}
		let plates = [self.grid_plate, self.width_plate];
		if plates.iter().any(|p| p.width == 0 || p.height == 0) {
			return fail("plates must be at least 1x1");
		}
		self.severity.validate()
	}

	/// The plate colors for a hue pair
	#[must_use]
	pub fn pair_colors(&self, pair: ConfusionPair) -> (Color, Color) {
		stimulus::pair_colors(pair, self.saturation, self.lightness, self.match_lightness)
	}

	/// Candidate pairs for a grid stage, given the previous stage's pick
	fn candidates(&self, stage: usize, center: Option<ConfusionPair>) -> Result<Vec<ConfusionPair>> {
		let pairs = grid::candidate_pairs(&self.stages[stage], center, self.min_separation, self.max_separation);
		if pairs.is_empty() {
			Err(Error::InvalidConfig(format!("calibration: grid stage {} has no candidate pairs", stage + 1)))
		} else {
			Ok(pairs)
		}
	}
}

/// Something the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
	/// Leave the intro
	Start,
	/// Show the next page of candidates
	NextPage,
	/// Show the previous page of candidates
	PrevPage,
	/// Pick a candidate on the current page by its position on the page
	Select(usize),
	/// Swap which color of the width stimulus is the ground
	SwapGround,
	/// Answer the width measurement question for the current offset
	Respond {
		/// Whether the user could tell the two colors apart
		can_distinguish: bool,
	},
	/// Abandon the session and return to the intro
	Restart,
}

impl fmt::Display for Input {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Input::Start => f.write_str("start"),
			Input::NextPage => f.write_str("next page"),
			Input::PrevPage => f.write_str("previous page"),
			Input::Select(i) => write!(f, "select {i}"),
			Input::SwapGround => f.write_str("swap ground"),
			Input::Respond { can_distinguish: true } => f.write_str("can distinguish"),
			Input::Respond { can_distinguish: false } => f.write_str("cannot distinguish"),
			Input::Restart => f.write_str("restart"),
		}
	}
}

/// Where a session is in the protocol, along with everything collected so far
#[derive(Debug, Clone, PartialEq)]
pub enum State {
	/// Nothing collected yet
	Intro,
	/// Picking the least visible plate among candidate pairs
	Grid {
		/// Stage index, starting at `0`
		stage: usize,
		/// Every candidate of this stage
		candidates: Vec<ConfusionPair>,
		/// Current page of candidates
		page: usize,
		/// Picks of the previous stages
		picks: Vec<ConfusionPair>,
	},
	/// Rotating the final pick by each offset in turn
	Width {
		/// The pick of the last grid stage
		pair: ConfusionPair,
		/// Answers so far, one per offset already tested
		measurements: Vec<WidthMeasurement>,
		/// Whether the second color is currently the ground
		swapped: bool,
	},
	/// Done
	Result {
		/// The finished profile
		profile: CvdProfile,
	},
}

impl State {
	/// Short name of the stage
	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			State::Intro => "intro",
			State::Grid { stage: 0, .. } => "grid 1",
			State::Grid { stage: 1, .. } => "grid 2",
			State::Grid { .. } => "grid 3",
			State::Width { .. } => "width measurement",
			State::Result { .. } => "result",
		}
	}

	/// Candidates on the current page, or nothing outside of grid selection
	#[must_use]
	pub fn page_candidates(&self, config: &CalibrationConfig) -> &[ConfusionPair] {
		match self {
			State::Grid { candidates, page, .. } => grid::page(candidates, *page, config.page_size),
			_ => &[],
		}
	}

	/// The rotated pair currently under test and its offset, during width measurement
	#[must_use]
	pub fn width_trial(&self, config: &CalibrationConfig) -> Option<(ConfusionPair, f32)> {
		match self {
			State::Width { pair, measurements, .. } => {
				let offset = *config.offsets.get(measurements.len())?;
				Some((pair.rotated(offset), offset))
			},
			_ => None,
		}
	}

	/// The `(figure, ground)` colors of the width stimulus
	#[must_use]
	pub fn width_colors(&self, config: &CalibrationConfig) -> Option<(Color, Color)> {
		let (pair, _) = self.width_trial(config)?;
		let (a, b) = config.pair_colors(pair);
		match self {
			State::Width { swapped: true, .. } => Some((a, b)),
			_ => Some((b, a)),
		}
	}

	/// The state after `input`, or an error if the current stage does not accept it
	pub fn next(&self, input: Input, config: &CalibrationConfig) -> Result<State> {
		let unexpected = || Error::UnexpectedInput { stage: self.name(), input: input.to_string() };

		match (self, input) {
			(_, Input::Restart) => Ok(State::Intro),

			(State::Intro, Input::Start) => Ok(State::Grid {
				stage: 0,
				candidates: config.candidates(0, None)?,
				page: 0,
				picks: Vec::new(),
			}),

			(State::Grid { stage, candidates, page, picks }, Input::NextPage | Input::PrevPage) => {
				let last = grid::page_count(candidates.len(), config.page_size).saturating_sub(1);
				let page = if input == Input::NextPage { (page + 1).min(last) } else { page.saturating_sub(1) };
				Ok(State::Grid { stage: *stage, candidates: candidates.clone(), page, picks: picks.clone() })
			},

			(State::Grid { stage, picks, .. }, Input::Select(index)) => {
				let shown = self.page_candidates(config);
				let pick = *shown.get(index).ok_or(Error::NoSuchCandidate { index, len: shown.len() })?;

				let mut picks = picks.clone();
				picks.push(pick);

				let stage = stage + 1;
				if stage < GRID_STAGES {
					Ok(State::Grid { stage, candidates: config.candidates(stage, Some(pick))?, page: 0, picks })
				} else {
					Ok(State::Width { pair: pick, measurements: Vec::new(), swapped: false })
				}
			},

			(State::Width { pair, measurements, swapped }, Input::SwapGround) => Ok(State::Width {
				pair: *pair,
				measurements: measurements.clone(),
				swapped: !swapped,
			}),

			(State::Width { pair, measurements, swapped }, Input::Respond { can_distinguish }) => {
				let (_, offset) = self.width_trial(config).ok_or_else(unexpected)?;
				let mut measurements = measurements.clone();
				measurements.push(WidthMeasurement { offset, can_distinguish });

				if measurements.len() < config.offsets.len() {
					Ok(State::Width { pair: *pair, measurements, swapped: *swapped })
				} else {
					Ok(State::Result { profile: CvdProfile::new(*pair, measurements, &config.severity) })
				}
			},

			_ => Err(unexpected()),
		}
	}
}

/// A calibration in progress
#[derive(Debug, Clone)]
pub struct Session {
	/// Protocol parameters, fixed for the session
	config: CalibrationConfig,
	/// Current state
	state: State,
}

impl Session {
	/// Start at the intro
	pub fn new(config: CalibrationConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config, state: State::Intro })
	}

	/// The protocol parameters
	#[must_use]
	pub fn config(&self) -> &CalibrationConfig {
		&self.config
	}

	/// The current state
	#[must_use]
	pub fn state(&self) -> &State {
		&self.state
	}

	/// Apply an input, leaving the state unchanged if it is rejected
	pub fn apply(&mut self, input: Input) -> Result<&State> {
		let next = self.state.next(input, &self.config)?;
		tracing::debug!(from = self.state.name(), to = next.name(), %input, "calibration transition");
		self.state = next;
		Ok(&self.state)
	}

	/// The finished profile, once the session reaches the result
	#[must_use]
	pub fn profile(&self) -> Option<&CvdProfile> {
		match &self.state {
			State::Result { profile } => Some(profile),
			_ => None,
		}
	}
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
	use super::*;
	use crate::profile::Severity;

	fn session() -> Session {
		Session::new(CalibrationConfig::default()).expect("default config is valid")
	}

	/// Pick the first candidate of the current page in each grid stage
	fn through_grid(session: &mut Session) -> ConfusionPair {
		session.apply(Input::Start).expect("start");
		for _ in 0..GRID_STAGES {
			session.apply(Input::Select(0)).expect("select");
		}
		match session.state() {
			State::Width { pair, .. } => *pair,
			state => panic!("expected width measurement, got {state:?}"),
		}
	}

	#[test]
	fn default_config_is_valid() {
		assert!(CalibrationConfig::default().validate().is_ok());
		let bad = CalibrationConfig { offsets: Vec::new(), ..CalibrationConfig::default() };
		assert!(bad.validate().is_err());
		let bad = CalibrationConfig { page_size: 0, ..CalibrationConfig::default() };
		assert!(Session::new(bad).is_err());
	}

	#[test]
	fn grid_stages_narrow_around_picks() {
		let mut session = session();
		session.apply(Input::Start).expect("start");
		session.apply(Input::NextPage).expect("next page");
		let pick = session.state().page_candidates(session.config())[1];
		session.apply(Input::Select(1)).expect("select");

		match session.state() {
			State::Grid { stage: 1, candidates, page: 0, picks } => {
				assert_eq!(picks, &[pick]);
				assert!(candidates.contains(&pick));
				for c in candidates {
					let near = |x: f32, y: f32| crate::color::hue_distance(x, y) <= 45.0;
					let straight = near(c.hue_a, pick.hue_a) && near(c.hue_b, pick.hue_b);
					let flipped = near(c.hue_a, pick.hue_b) && near(c.hue_b, pick.hue_a);
					assert!(straight || flipped, "{c} is outside the window around {pick}");
				}
			},
			state => panic!("expected grid 2, got {state:?}"),
		}
	}

	#[test]
	fn paging_is_clamped() {
		let mut session = session();
		session.apply(Input::Start).expect("start");
		session.apply(Input::PrevPage).expect("previous page");
		assert!(matches!(session.state(), State::Grid { page: 0, .. }));

		for _ in 0..100 {
			session.apply(Input::NextPage).expect("next page");
		}
		// 44 candidates on pages of 4
		assert!(matches!(session.state(), State::Grid { page: 10, .. }));
		assert_eq!(session.state().page_candidates(session.config()).len(), 4);
	}

	#[test]
	fn invalid_inputs_leave_state_unchanged() {
		let mut session = session();
		assert!(matches!(session.apply(Input::Select(0)), Err(Error::UnexpectedInput { stage: "intro", .. })));
		assert_eq!(session.state(), &State::Intro);

		session.apply(Input::Start).expect("start");
		let before = session.state().clone();
		assert!(matches!(session.apply(Input::Select(4)), Err(Error::NoSuchCandidate { index: 4, len: 4 })));
		assert!(session.apply(Input::Respond { can_distinguish: true }).is_err());
		assert!(session.apply(Input::Start).is_err());
		assert_eq!(session.state(), &before);
	}

	#[test]
	fn width_measurement_tests_every_offset_in_order() {
		let mut session = session();
		let pair = through_grid(&mut session);
		let offsets = session.config().offsets.clone();

		for (i, &offset) in offsets.iter().enumerate() {
			let (rotated, tested) = session.state().width_trial(session.config()).expect("in width stage");
			assert_eq!(tested, offset);
			assert_eq!(rotated, pair.rotated(offset));
			// confused up to 3 degrees
			session.apply(Input::Respond { can_distinguish: offset.abs() > 3.0 }).expect("respond");
			if i + 1 < offsets.len() {
				assert!(session.profile().is_none());
			}
		}

		let profile = session.profile().expect("finished");
		assert_eq!(profile.confusion_pair, pair);
		assert_eq!(profile.max_width, 3.0);
		assert_eq!(profile.severity, Severity::Moderate);
		let logged = profile.width_measurements.iter().map(|m| m.offset).collect::<Vec<_>>();
		assert_eq!(logged, offsets);
	}

	#[test]
	fn swapping_ground_swaps_colors() {
		let mut session = session();
		through_grid(&mut session);
		let (figure, ground) = session.state().width_colors(session.config()).expect("in width stage");
		session.apply(Input::SwapGround).expect("swap");
		assert_eq!(session.state().width_colors(session.config()), Some((ground, figure)));
		assert!(matches!(session.state(), State::Width { swapped: true, .. }));
	}

	#[test]
	fn restart_discards_progress_from_anywhere() {
		let mut session = session();
		assert_eq!(session.apply(Input::Restart).expect("restart"), &State::Intro);

		through_grid(&mut session);
		session.apply(Input::Respond { can_distinguish: false }).expect("respond");
		session.apply(Input::Restart).expect("restart");
		assert_eq!(session.state(), &State::Intro);

		through_grid(&mut session);
		for _ in 0..session.config().offsets.len() {
			session.apply(Input::Respond { can_distinguish: true }).expect("respond");
		}
		assert_eq!(session.profile().expect("finished").severity_label(), "mild (axis only)");
		session.apply(Input::Restart).expect("restart");
		assert!(session.profile().is_none());
	}
}
