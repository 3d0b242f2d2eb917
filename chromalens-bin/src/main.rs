//! Extract image palettes, calibrate a personal color confusion axis, and recolor images to compensate for it.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
	clippy::pedantic,
	clippy::cargo,
	clippy::use_debug,
	clippy::dbg_macro,
	clippy::todo,
	clippy::unimplemented,
	clippy::unwrap_used,
	clippy::unwrap_in_result,
	clippy::unneeded_field_pattern,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::unnecessary_self_imports,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::string_slice,
	missing_docs,
	clippy::missing_docs_in_private_items,
	rustdoc::all,
	clippy::float_cmp_const,
	clippy::lossy_float_literal
)]
#![allow(
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::many_single_char_names,
	clippy::missing_panics_doc,
	clippy::unreadable_literal
)]

mod calibrate;
mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{path::Path, process::ExitCode, time::Instant};

use anyhow::{Context, Result};
use chromalens::{ColorNames, CompensationConfig, Config, CvdProfile, ExtractOptions, Frame, Palette, Swatch};
use clap::Parser;
use colored::Colorize;
use image::{DynamicImage, RgbaImage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Record the running time of an expression and log the elapsed time
macro_rules! time {
	($name: literal, $func_call: expr) => {{
		let start = Instant::now();
		let result = $func_call;
		tracing::info!("{} took {}ms", $name, start.elapsed().as_millis());
		result
	}};
}

fn main() -> ExitCode {
	let options = Options::parse();
	init_tracing(options.verbose);

	// Returning Result<_> uses Debug printing instead of Display
	if let Err(e) = run(&options) {
		eprintln!("{} {e:#}", "error:".red().bold());
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	}
}

/// Log to stderr, filtered by `RUST_LOG` if set and otherwise by `--verbose`
fn init_tracing(verbose: bool) {
	let default = if verbose { "chromalens=debug" } else { "chromalens=warn" };
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).without_time())
		.init();
}

/// Builds a thread pool and then runs the command
#[cfg(feature = "threads")]
fn run(options: &Options) -> Result<()> {
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(usize::from(options.threads))
		.build()
		.context("failed to start the thread pool")?;

	pool.install(|| run_command(options))
}

/// Runs the command on a single thread
#[cfg(not(feature = "threads"))]
fn run(options: &Options) -> Result<()> {
	run_command(options)
}

/// Load the config and dispatch to the command
fn run_command(options: &Options) -> Result<()> {
	let config = match &options.config {
		Some(path) => Config::from_json_file(path).with_context(|| format!("failed to load config {}", path.display()))?,
		None => Config::default(),
	};

	match &options.command {
		Command::Palette(palette) => print_palette_command(palette, &config),
		Command::Render(render) => render_command(render, &config),
		Command::Calibrate(calibrate) => calibrate::run(calibrate, &config),
		Command::Profile { profile } => {
			println!("{}", load_profile(profile)?);
			Ok(())
		},
	}
}

/// Load the image at the given path
fn load_image(path: &Path) -> Result<RgbaImage> {
	let image: DynamicImage = time!(
		"Image loading",
		image::open(path).with_context(|| format!("failed to load the image file {}", path.display()))?
	);
	Ok(image.into_rgba8())
}

/// Load a saved profile
fn load_profile(path: &Path) -> Result<CvdProfile> {
	CvdProfile::load(path).with_context(|| format!("failed to load the profile {}", path.display()))
}

/// Apply command line overrides to the configured extraction options
fn extract_options(args: &ExtractArgs, config: &Config) -> Result<ExtractOptions> {
	let mut options = config.extract;
	if let Some(trials) = args.trials {
		options.trials = trials;
	}
	if let Some(iterations) = args.iterations {
		options.iterations = iterations;
	}
	if let Some(init) = args.init {
		options.init = init.into();
	}
	if args.no_merge {
		options.merge_threshold = None;
	} else if let Some(threshold) = args.merge_threshold {
		options.merge_threshold = Some(threshold);
	}
	if let Some(min_ratio) = args.min_ratio {
		options.min_ratio = min_ratio;
	}
	options.skip_extremes |= args.skip_extremes;
	options.seed = args.seed.or(options.seed);

	options.validate()?;
	Ok(options)
}

/// Extract the palette of an image
fn palette(image: &RgbaImage, args: &ExtractArgs, config: &Config, names: &ColorNames) -> Result<Palette> {
	let options = extract_options(args, config)?;
	Ok(time!("Palette extraction", chromalens::extract_image(image, args.k, &options, names)))
}

/// Extract and print the palette of an image, along with confused pairs if a profile is given
fn print_palette_command(options: &PaletteOptions, config: &Config) -> Result<()> {
	let names = match &options.names {
		Some(path) => ColorNames::from_json_file(path)
			.with_context(|| format!("failed to load the name table {}", path.display()))?,
		None => ColorNames::default(),
	};

	let image = load_image(&options.image)?;
	let palette = palette(&image, &options.extract, config, &names)?;

	match options.output {
		FormatOutput::Json => println!("{}", serde_json::to_string_pretty(&palette)?),
		_ if options.details => {
			for swatch in &palette {
				println!(
					"{}  {:>5.1}%  {}",
					format_swatch(swatch, options),
					swatch.ratio * 100.0,
					swatch.name.as_deref().unwrap_or("")
				);
			}
		},
		_ => {
			let delimiter = if matches!(options.output, FormatOutput::Swatch) { "" } else { " " };
			let line = palette.swatches().iter().map(|s| format_swatch(s, options)).collect::<Vec<_>>();
			println!("{}", line.join(delimiter));
		},
	}

	if let Some(path) = &options.profile {
		let profile = load_profile(path)?;
		print_confused_pairs(&palette, &profile, &config.compensation, options);
	}

	Ok(())
}

/// Format and colorize the text for one swatch
fn format_swatch(swatch: &Swatch, options: &PaletteOptions) -> String {
	let color = swatch.rgb;
	let text = match options.output {
		FormatOutput::Hex | FormatOutput::Json => swatch.hex.clone(),
		FormatOutput::Rgb => format!("({},{},{})", color.red, color.green, color.blue),
		FormatOutput::Swatch => return "   ".on_truecolor(color.red, color.green, color.blue).to_string(),
	};

	match options.colorize {
		Some(ColorizeOutput::Fg) => text.truecolor(color.red, color.green, color.blue).to_string(),
		Some(ColorizeOutput::Bg) => text.on_truecolor(color.red, color.green, color.blue).to_string(),
		None => text,
	}
}

/// Print every pair of swatches the profile's owner is likely to confuse
fn print_confused_pairs(palette: &Palette, profile: &CvdProfile, config: &CompensationConfig, options: &PaletteOptions) {
	let pairs = palette.confused_pairs(profile, config);
	if pairs.is_empty() {
		println!("No likely confused colors for {}", profile.confusion_pair);
		return;
	}

	println!("Likely confused colors for {}:", profile.confusion_pair);
	let swatches = palette.swatches();
	for (i, j) in pairs {
		println!(
			"  {} {}  {} {}",
			i + 1,
			format_swatch(&swatches[i], options),
			j + 1,
			format_swatch(&swatches[j], options)
		);
	}
}

/// Write a simulated, compensated, or highlighted copy of an image
fn render_command(options: &RenderOptions, config: &Config) -> Result<()> {
	let image = load_image(&options.image)?;
	let profile = options.profile.as_deref().map(load_profile).transpose()?;

	let palette = if options.select.is_some() || options.outline {
		palette(&image, &options.extract, config, &ColorNames::empty())?
	} else {
		Palette::default()
	};

	let selected = options.select.map(|n| usize::from(n) - 1);
	if let Some(index) = selected {
		anyhow::ensure!(
			index < palette.len(),
			"cannot select color {}, the palette only has {} colors",
			index + 1,
			palette.len()
		);
	}

	let frame = Frame {
		simulation: options.simulate,
		profile: profile.as_ref(),
		selected,
		outline: options.outline,
	};

	let output = time!("Rendering", chromalens::render_frame(&image, &palette, &frame, &config.compensation));
	output
		.save(&options.output)
		.with_context(|| format!("failed to write {}", options.output.display()))?;

	Ok(())
}
