//! Extract color palettes from images, and measure and compensate for a personal color vision deficiency.
//!
//! # Examples
//!
//! ## Read an image file and get up to 6 colors.
//!
//! ```no_run
//! use chromalens::{ColorNames, ExtractOptions};
//!
//! let image = image::open("some image").unwrap().into_rgba8();
//! let palette = chromalens::extract_image(&image, 6, &ExtractOptions::default(), &ColorNames::default());
//! for swatch in &palette {
//! 	println!("{} {:.1}% {}", swatch.hex, swatch.ratio * 100.0, swatch.name.as_deref().unwrap_or(""));
//! }
//! ```
//!
//! ## Calibrate and compensate.
//!
//! ```no_run
//! use chromalens::{CalibrationConfig, CompensationConfig, Input, Session};
//!
//! let mut session = Session::new(CalibrationConfig::default()).unwrap();
//! session.apply(Input::Start).unwrap();
//! for _ in 0..3 {
//! 	// show `session.state().page_candidates(session.config())` as plates, then pick one
//! 	session.apply(Input::Select(0)).unwrap();
//! }
//! while session.profile().is_none() {
//! 	session.apply(Input::Respond { can_distinguish: true }).unwrap();
//! }
//!
//! let profile = session.profile().unwrap();
//! let mut pixels = image::open("some image").unwrap().into_rgba8();
//! chromalens::compensate_rgba(&mut pixels, profile, &CompensationConfig::default());
//! ```
//!
//! # Overview
//!
//! ## Color Spaces
//!
//! [`color`] converts between 8-bit sRGB, CIE XYZ, CIELAB, and HSL.
//! Lab distance is the perceptual difference used throughout,
//! while HSL hue is what calibration measures and compensation rotates.
//!
//! ## Palette Extraction
//!
//! [`extract()`] downsamples and samples the image, runs k-means in RGB,
//! then merges clusters that are perceptually too close and ranks the rest by their share of the samples.
//! See [`ExtractOptions`] for the knobs.
//!
//! Provide a `seed` in the options for reproducible palettes.
//!
//! ## Calibration
//!
//! A [`Session`] drives a sequence of dot plates that narrows in on the hue pair the user confuses most,
//! then measures how far that pair can be rotated while staying confused.
//! The result is a [`CvdProfile`], which can be saved as JSON.
//!
//! ## Compensation
//!
//! [`compensate()`] rotates hues near the profile's confusion axis toward the perpendicular axis,
//! and [`is_confused`] flags color pairs that fall on opposite ends of the axis.
//! [`render_frame`] puts simulation, compensation, and palette highlighting together for a whole image.
//!
//! None of the thresholds in [`CompensationConfig`] or [`CalibrationConfig`] come from vision science;
//! they are defaults that looked right and are meant to be tuned.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::missing_errors_doc)]

pub mod calibration;
pub mod color;
pub mod compensate;
pub mod config;
mod error;
pub mod extract;
pub mod kmeans;
pub mod names;
pub mod profile;
pub mod render;
pub mod simulate;

pub use calibration::{CalibrationConfig, Input, Session, State};
pub use color::Color;
pub use compensate::{compensate, compensate_rgba, is_confused, CompensationConfig};
pub use config::Config;
pub use error::{Error, Result};
pub use extract::{extract, extract_image, ExtractOptions, Palette, Swatch};
pub use kmeans::{Init, KmeansResult};
pub use names::ColorNames;
pub use profile::{ConfusionPair, CvdProfile, Severity, SeverityThresholds, WidthMeasurement};
pub use render::{render_frame, Frame};
pub use simulate::{simulate, Deficiency};
