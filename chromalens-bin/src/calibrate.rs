//! The interactive calibration loop: plates are written as PNG files and answers are read from stdin

use crate::cli::CalibrateOptions;
use anyhow::{Context, Result};
use chromalens::{
	calibration::{
		grid,
		mask::DigitFive,
		stimulus::{DotField, PlateSize},
	},
	CalibrationConfig, Config, Input, Session, State,
};
use colored::Colorize;
use rand::SeedableRng;
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::{
	io::{self, BufRead, Write},
	path::Path,
};

/// A line typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
	/// Feed an input to the session
	Input(Input),
	/// Stop without saving
	Quit,
}

/// Interpret a line of user input for the given state
fn parse_command(line: &str, state: &State) -> Option<Command> {
	let line = line.trim().to_ascii_lowercase();
	let input = match (state, line.as_str()) {
		(_, "q" | "quit") => return Some(Command::Quit),
		(_, "r" | "restart") => Input::Restart,
		(State::Intro, "" | "s" | "start") => Input::Start,
		(State::Grid { .. }, "n" | "next") => Input::NextPage,
		(State::Grid { .. }, "p" | "prev") => Input::PrevPage,
		(State::Grid { .. }, n) => Input::Select(n.parse::<usize>().ok()?.checked_sub(1)?),
		(State::Width { .. }, "s" | "swap") => Input::SwapGround,
		(State::Width { .. }, "y" | "yes") => Input::Respond { can_distinguish: true },
		(State::Width { .. }, "n" | "no") => Input::Respond { can_distinguish: false },
		_ => return None,
	};
	Some(Command::Input(input))
}

/// Write one plate as a PNG
fn write_plate(
	dir: &Path,
	name: &str,
	size: PlateSize,
	(figure, ground): (chromalens::Color, chromalens::Color),
	rng: &mut Xoroshiro128PlusPlus,
) -> Result<()> {
	let path = dir.join(format!("{name}.png"));
	DotField::for_plate(size, rng)
		.render(&DigitFive::default(), figure, ground)
		.save(&path)
		.with_context(|| format!("failed to write the plate {}", path.display()))
}

/// File stems of every plate this tool writes
fn plate_names(page_size: usize) -> impl Iterator<Item = String> {
	(1..=page_size).map(|i| format!("plate-{i}")).chain(std::iter::once("width".to_owned()))
}

/// Remove plates left over from a previous prompt, leaving every other file alone
fn clear_plates(dir: &Path, page_size: usize) -> Result<()> {
	for name in plate_names(page_size) {
		let path = dir.join(format!("{name}.png"));
		match std::fs::remove_file(&path) {
			Ok(()) => {},
			Err(e) if e.kind() == io::ErrorKind::NotFound => {},
			Err(e) => return Err(e).with_context(|| format!("failed to remove {}", path.display())),
		}
	}
	Ok(())
}

/// Write the plates for the current state and describe what to answer
fn present(session: &Session, dir: &Path, rng: &mut Xoroshiro128PlusPlus) -> Result<()> {
	let config = session.config();
	let state = session.state();
	clear_plates(dir, config.page_size)?;

	match state {
		State::Intro => {
			println!("{}", "Color vision calibration".bold());
			println!("You will be shown dot plates with a hidden digit 5, written to {}.", dir.display());
			println!("First pick the plates where the 5 is hardest to see, three times over,");
			println!("then say whether two slightly different colors can be told apart.");
			println!("Press enter to start, or type q to quit.");
		},
		State::Grid { stage, candidates, page, .. } => {
			let shown = state.page_candidates(config);
			for (i, &pair) in shown.iter().enumerate() {
				let (a, b) = config.pair_colors(pair);
				write_plate(dir, &format!("plate-{}", i + 1), config.grid_plate, (b, a), rng)?;
			}
			println!(
				"{} page {}/{} ({} candidates)",
				format!("Stage {}/{}:", stage + 1, chromalens::calibration::GRID_STAGES).bold(),
				page + 1,
				grid::page_count(candidates.len(), config.page_size),
				candidates.len(),
			);
			for (i, pair) in shown.iter().enumerate() {
				println!("  plate-{}.png  {pair}", i + 1);
			}
			println!("Type the number of the plate where the 5 is least visible, n/p to change pages.");
		},
		State::Width { measurements, .. } => {
			let (colors, (_, offset)) = state
				.width_colors(config)
				.zip(state.width_trial(config))
				.context("width measurement has no offset left")?;
			write_plate(dir, "width", config.width_plate, colors, rng)?;
			println!(
				"{} offset {offset:+}°",
				format!("Test {}/{}:", measurements.len() + 1, config.offsets.len()).bold()
			);
			println!("Can you tell the two colors in width.png apart? y/n, or s to swap the background.");
		},
		State::Result { profile } => println!("{profile}"),
	}
	Ok(())
}

/// Walk through a calibration session and save the resulting profile
pub fn run(options: &CalibrateOptions, config: &Config) -> Result<()> {
	let calibration: CalibrationConfig = config.calibration.clone();
	let mut session = Session::new(calibration)?;
	let mut rng = match options.seed {
		Some(seed) => Xoroshiro128PlusPlus::seed_from_u64(seed),
		None => Xoroshiro128PlusPlus::from_entropy(),
	};

	std::fs::create_dir_all(&options.plates)
		.with_context(|| format!("failed to create {}", options.plates.display()))?;

	let stdin = io::stdin();
	let mut lines = stdin.lock().lines();
	loop {
		present(&session, &options.plates, &mut rng)?;
		if session.profile().is_some() {
			break;
		}

		print!("> ");
		io::stdout().flush()?;
		let Some(line) = lines.next().transpose()? else {
			anyhow::bail!("calibration aborted, input ended before a profile was made");
		};

		match parse_command(&line, session.state()) {
			Some(Command::Quit) => anyhow::bail!("calibration aborted"),
			Some(Command::Input(input)) => {
				if let Err(e) = session.apply(input) {
					println!("{}", e.to_string().yellow());
				}
			},
			None => println!("{}", format!("unrecognized answer `{}`", line.trim()).yellow()),
		}
	}

	let profile = session.profile().context("calibration finished without a profile")?;
	profile
		.save(&options.profile)
		.with_context(|| format!("failed to save the profile to {}", options.profile.display()))?;
	println!("Saved to {}", options.profile.display());

	Ok(())
}
