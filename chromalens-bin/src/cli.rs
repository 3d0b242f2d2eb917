//! Specifies the CLI and handles arg parsing

use chromalens::{Deficiency, Init};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{
	fmt::{Debug, Display},
	num::ParseFloatError,
	ops::RangeBounds,
	path::PathBuf,
	str::FromStr,
};

/// Supported output formats for palette colors
#[derive(Copy, Clone, ValueEnum)]
pub enum FormatOutput {
	/// sRGB hexcode
	Hex,
	/// sRGB (r,g,b) triple
	Rgb,
	/// Whitespace with true color background
	Swatch,
	/// Every swatch field as JSON
	Json,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, ValueEnum)]
pub enum ColorizeOutput {
	/// Foreground
	Fg,
	/// Background
	Bg,
}

/// Ways to pick the starting k-means centroids
#[derive(Copy, Clone, ValueEnum)]
pub enum InitArg {
	/// k-means++
	PlusPlus,
	/// Uniformly random pixels
	Random,
}

impl From<InitArg> for Init {
	fn from(init: InitArg) -> Self {
		match init {
			InitArg::PlusPlus => Init::PlusPlus,
			InitArg::Random => Init::Random,
		}
	}
}

/// Extract color palettes from images, calibrate your personal color confusion axis,
/// and recolor images to make confused colors easier to tell apart.
#[derive(Parser)]
#[command(version)]
pub struct Options {
	/// A JSON config file; command line options override its values
	#[arg(long, global = true)]
	pub config: Option<PathBuf>,

	/// Print timings and intermediate results
	///
	/// The RUST_LOG environment variable takes precedence if set.
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// The number of threads to use
	///
	/// A value of 0 indicates to automatically choose the number of threads.
	#[cfg(feature = "threads")]
	#[arg(short, long, global = true, default_value_t = 0)]
	pub threads: u8,

	/// What to do
	#[command(subcommand)]
	pub command: Command,
}

/// The subcommands
#[derive(Subcommand)]
pub enum Command {
	/// Print the palette of an image
	Palette(PaletteOptions),
	/// Write a recolored copy of an image
	Render(RenderOptions),
	/// Run the interactive calibration and save the resulting profile
	Calibrate(CalibrateOptions),
	/// Print a saved profile
	Profile {
		/// The profile to print
		profile: PathBuf,
	},
}

/// Options shared by every command that extracts a palette
#[derive(Args)]
pub struct ExtractArgs {
	/// The (maximum) number of colors to find
	#[arg(short, default_value_t = 8)]
	pub k: u8,

	/// The number of trials of k-means to run, keeping the one with the lowest variance
	#[arg(short = 'n', long)]
	pub trials: Option<u32>,

	/// The number of k-means iterations per trial
	#[arg(short, long)]
	pub iterations: Option<u32>,

	/// How to pick the starting centroids
	#[arg(long)]
	pub init: Option<InitArg>,

	/// Merge colors closer than this CIELAB distance
	#[arg(short, long, value_parser = parse_non_negative)]
	pub merge_threshold: Option<f32>,

	/// Keep every k-means cluster, even near duplicates
	#[arg(long, conflicts_with = "merge_threshold")]
	pub no_merge: bool,

	/// Drop colors making up less than this fraction of the sampled pixels
	#[arg(long, value_parser = parse_ratio)]
	pub min_ratio: Option<f32>,

	/// Ignore nearly gray pixels that are also nearly black or white
	#[arg(long)]
	pub skip_extremes: bool,

	/// The seed value used for the random number generator
	///
	/// If not provided, every run may give a slightly different palette.
	#[arg(long)]
	pub seed: Option<u64>,
}

/// Options for the `palette` command
#[allow(clippy::struct_excessive_bools)]
#[derive(Args)]
pub struct PaletteOptions {
	/// The path to the input image
	pub image: PathBuf,

	#[command(flatten)]
	pub extract: ExtractArgs,

	/// The format to print the colors in
	#[arg(short, long, default_value = "hex")]
	pub output: FormatOutput,

	/// Color the foreground or background for each printed color
	#[arg(short, long)]
	pub colorize: Option<ColorizeOutput>,

	/// Print one color per line along with its share of the image and its name
	#[arg(short, long)]
	pub details: bool,

	/// A JSON name table of `{ "name", "hex" }` or `{ "english", "code" }` entries to name colors with
	#[arg(long)]
	pub names: Option<PathBuf>,

	/// A saved profile; pairs of colors likely to be confused are listed after the palette
	#[arg(short, long)]
	pub profile: Option<PathBuf>,
}

/// Options for the `render` command
#[derive(Args)]
pub struct RenderOptions {
	/// The path to the input image
	pub image: PathBuf,

	/// Where to write the result; the format follows the extension
	#[arg(short, long)]
	pub output: PathBuf,

	/// Compensate for the confusion axis of this saved profile
	#[arg(short, long)]
	pub profile: Option<PathBuf>,

	/// Simulate a color vision deficiency before compensating
	#[arg(short, long)]
	pub simulate: Option<Deficiency>,

	/// Gray out everything except this palette color, counted from 1 in descending order of share
	#[arg(long, value_parser = clap::value_parser!(u8).range(1..))]
	pub select: Option<u8>,

	/// Draw black outlines where palette colors meet
	#[arg(long)]
	pub outline: bool,

	#[command(flatten)]
	pub extract: ExtractArgs,
}

/// Options for the `calibrate` command
#[derive(Args)]
pub struct CalibrateOptions {
	/// Where to save the finished profile
	#[arg(short, long, default_value = "profile.json")]
	pub profile: PathBuf,

	/// The directory to write stimulus plates to
	#[arg(long, default_value = "plates")]
	pub plates: PathBuf,

	/// The seed used to scatter plate dots
	#[arg(long)]
	pub seed: Option<u64>,
}

/// Parse a float value and ensure it in the provided, valid range
fn parse_float_in_range<T>(s: &str, range: impl RangeBounds<T> + Debug) -> Result<T, String>
where
	T: FromStr<Err = ParseFloatError> + Display + PartialOrd,
{
	let value: T = s.parse().map_err(|e| format!("{e}"))?;
	if range.contains(&value) {
		Ok(value)
	} else {
		Err(format!("{value} is not in {range:?}"))
	}
}

/// Parse a distance and ensure it is >= `0.0`
fn parse_non_negative(s: &str) -> Result<f32, String> {
	parse_float_in_range(s, 0.0..)
}

/// Parse a ratio and ensure it is in `0.0..1.0`
fn parse_ratio(s: &str) -> Result<f32, String> {
	parse_float_in_range(s, 0.0..1.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn verify_cli() {
		Options::command().debug_assert();
	}

	#[test]
	fn float_ranges() {
		assert_eq!(parse_ratio("0.25"), Ok(0.25));
		assert!(parse_ratio("1").is_err());
		assert!(parse_non_negative("-3").is_err());
		assert!(parse_non_negative("abc").is_err());
	}

	#[test]
	fn parses_subcommands() {
		let options = Options::try_parse_from(["chromalens", "palette", "img.png", "-k", "5", "--seed", "3", "--no-merge"])
			.expect("valid arguments");
		match options.command {
			Command::Palette(palette) => {
				assert_eq!(palette.extract.k, 5);
				assert_eq!(palette.extract.seed, Some(3));
				assert!(palette.extract.no_merge);
			},
			_ => panic!("expected the palette command"),
		}

		let options = Options::try_parse_from(["chromalens", "render", "in.png", "-o", "out.png", "-s", "deutan"])
			.expect("valid arguments");
		assert!(matches!(options.command, Command::Render(RenderOptions { simulate: Some(Deficiency::Deutan), .. })));

		assert!(Options::try_parse_from(["chromalens", "render", "in.png", "-o", "out.png", "--select", "0"]).is_err());
	}
}
