//! eq-report - print the net frequency response of an equalizer setting
//!
//! ## Usage
//!
//! ```text
//! eq-report <eq.txt> [--save-profile NAME] [--profiles PATH]
//! eq-report --preset NAME
//! ```
//!
//! The input file uses the EqualizerAPO text format (`Preamp:` and `Filter N:`
//! lines). Set RUST_LOG=debug to see skipped lines.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use riffle_core::config::{default_engine_config_path, load_config, EngineConfig};
use riffle_core::dsp::linear_to_db;
use riffle_core::engine::EngineController;
use riffle_core::eq::{builtin_presets, MAX_FREQUENCY, MIN_FREQUENCY};
use riffle_core::profiles::{JsonFileStorage, ProfileStorage};

/// Points per octave of the printed response
const POINTS_PER_OCTAVE: usize = 3;

#[derive(Debug, Default)]
struct Args {
    input: Option<PathBuf>,
    preset: Option<String>,
    save_profile: Option<String>,
    profiles: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--preset" => args.preset = Some(iter.next().context("--preset needs a name")?),
            "--save-profile" => {
                args.save_profile = Some(iter.next().context("--save-profile needs a name")?)
            }
            "--profiles" => {
                args.profiles = Some(iter.next().context("--profiles needs a path")?.into())
            }
            other if other.starts_with("--") => bail!("unknown option {}", other),
            other => args.input = Some(other.into()),
        }
    }
    if args.input.is_none() && args.preset.is_none() {
        bail!("usage: eq-report <eq.txt> [--save-profile NAME] [--profiles PATH] | --preset NAME");
    }
    Ok(args)
}

/// Log-spaced frequencies covering the audible range
fn report_frequencies() -> Vec<f32> {
    let octaves = (MAX_FREQUENCY / MIN_FREQUENCY).log2();
    let points = (octaves * POINTS_PER_OCTAVE as f32).floor() as usize;
    (0..=points)
        .map(|i| MIN_FREQUENCY * 2f32.powf(i as f32 / POINTS_PER_OCTAVE as f32))
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config: EngineConfig = load_config(&default_engine_config_path());
    let storage: Box<dyn ProfileStorage> = match &args.profiles {
        Some(path) => Box::new(JsonFileStorage::new(path)),
        None => Box::new(JsonFileStorage::default_location()),
    };
    let mut controller = EngineController::new(config, storage);

    if let Some(name) = &args.preset {
        let preset = builtin_presets()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .with_context(|| format!("no built-in preset named {:?}", name))?;
        controller.apply_preset(&preset);
    }

    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let imported = controller.import_from_text(&text);
        if imported == 0 {
            bail!("{} contains no usable filters", path.display());
        }
        log::info!("Imported {} filters from {}", imported, path.display());
    }

    println!("{}", controller.export_to_text());
    println!();

    let frequencies = report_frequencies();
    let response = controller.frequency_response(&frequencies);
    for (freq, gain) in frequencies.iter().zip(&response) {
        println!("{:>8.1} Hz  {:>+7.2} dB", freq, linear_to_db(*gain));
    }

    if let Some(name) = &args.save_profile {
        controller
            .save_device_profile(name)
            .with_context(|| format!("failed to save profile {:?}", name))?;
        println!();
        println!("Saved device profile {:?}", name);
    }

    Ok(())
}
