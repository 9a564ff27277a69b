//! CLI entry point for the simulation harness: config-driven runs with CSV or JSON-lines output.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use otg_rs::config::{Config, load_config};
use otg_rs::{OutputParameter, UpdateResult};

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(name = "otg-sim", about = "Closed-loop simulation of the online trajectory generator.")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Stop after this many cycles
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles: usize,

    /// Log every planning pass
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed outputs back until the target is reached (default)
    Run,
    /// Sample the configured path geometry
    Path {
        /// Path parameter step
        #[arg(long, default_value_t = 0.01)]
        step: f64,
    },
    /// Validate the config and print the planned duration
    Check,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Jsonl,
}

#[derive(Serialize)]
struct PathSample {
    s: f64,
    q: Vec<f64>,
    pdq: Vec<f64>,
    pddq: Vec<f64>,
}

/// Writes rows either as CSV records or as one JSON object per line.
enum Emitter {
    Csv(csv::Writer<Box<dyn Write>>),
    Jsonl(Box<dyn Write>),
}

impl Emitter {
    fn new(format: Format, sink: Box<dyn Write>, header: &[String]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(match format {
            Format::Csv => {
                let mut writer = csv::Writer::from_writer(sink);
                writer.write_record(header)?;
                Emitter::Csv(writer)
            }
            Format::Jsonl => Emitter::Jsonl(sink),
        })
    }

    fn emit<T: Serialize>(&mut self, record: &T, flat: &[f64]) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            Emitter::Csv(writer) => writer.write_record(flat.iter().map(|v| v.to_string()))?,
            Emitter::Jsonl(sink) => writeln!(sink, "{}", serde_json::to_string(record)?)?,
        }
        Ok(())
    }

    fn finish(self) -> io::Result<()> {
        match self {
            Emitter::Csv(mut writer) => writer.flush(),
            Emitter::Jsonl(mut sink) => sink.flush(),
        }
    }
}

fn columns(first: &str, groups: &[&str], dofs: usize) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(groups.iter().flat_map(|g| (0..dofs).map(move |i| format!("{g}{i}"))))
        .collect()
}

fn run(cli: &Cli, config: &Config, sink: Box<dyn Write>) -> Result<(), Box<dyn std::error::Error>> {
    let dofs = config.degrees_of_freedom();
    let mut otg = config.build_generator()?;
    let mut input = config.input_parameter()?;
    let mut output = OutputParameter::new(dofs);
    let mut emitter = Emitter::new(cli.format, sink, &columns("time", &["p", "v", "a"], dofs))?;

    let mut cycles = 0;
    loop {
        if cycles >= cli.max_cycles {
            tracing::warn!("Stopped after {} cycles without reaching the target", cycles);
            break;
        }
        let result = otg.update(&input, &mut output);
        cycles += 1;
        if let UpdateResult::Error(err) = &result {
            tracing::error!("Update failed in cycle {}: {} (code {})", cycles, err, err.code());
            return Err(err.clone().into());
        }
        if output.new_calculation {
            tracing::debug!("Cycle {}: planned in {:.1}us", cycles, output.calculation_duration);
        }
        let sample = output.sample();
        let flat: Vec<f64> = std::iter::once(sample.time)
            .chain(sample.position.iter().copied())
            .chain(sample.velocity.iter().copied())
            .chain(sample.acceleration.iter().copied())
            .collect();
        emitter.emit(&sample, &flat)?;

        input.current_position.clone_from(&output.new_position);
        input.current_velocity.clone_from(&output.new_velocity);
        input.current_acceleration.clone_from(&output.new_acceleration);
        if result == UpdateResult::Finished {
            break;
        }
    }
    emitter.finish()?;

    if let Some(trajectory) = &output.trajectory {
        tracing::info!("Finished after {} cycles, trajectory duration {:.6}s", cycles, trajectory.duration());
    }
    Ok(())
}

fn sample_path(cli: &Cli, config: &Config, step: f64, sink: Box<dyn Write>) -> Result<(), Box<dyn std::error::Error>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(format!("path step must be positive, got {step}").into());
    }
    let Some(path) = config.build_path()? else {
        return Err("configuration has no [path] table".into());
    };
    let dofs = path.degrees_of_freedom();
    let mut emitter = Emitter::new(cli.format, sink, &columns("s", &["q", "pdq", "pddq"], dofs))?;
    let steps = (path.length() / step).ceil() as usize;
    for k in 0..=steps {
        let s = (k as f64 * step).min(path.length());
        let sample = PathSample {
            s,
            q: path.q(s),
            pdq: path.pdq(s),
            pddq: path.pddq(s),
        };
        let flat: Vec<f64> = std::iter::once(s)
            .chain(sample.q.iter().copied())
            .chain(sample.pdq.iter().copied())
            .chain(sample.pddq.iter().copied())
            .collect();
        emitter.emit(&sample, &flat)?;
    }
    emitter.finish()?;
    tracing::info!("Path length {:.6} with {} segments", path.length(), path.segments().len());
    Ok(())
}

fn check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let otg = config.build_generator()?;
    let input = config.input_parameter()?;
    let trajectory = otg.calculate(&input)?;
    println!("duration: {:.6}s", trajectory.duration());
    println!("independent minimum durations: {:?}", trajectory.independent_min_durations());
    if let Some(dof) = trajectory.limiting_dof() {
        println!("limiting DoF: {dof}");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .with_writer(io::stderr)
        .init();

    let config_path = cli.config.to_string_lossy().into_owned();
    tracing::info!("Loading configuration from: {}", config_path);
    let config = load_config(&config_path)?;
    config.validate()?;

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    match &cli.command {
        Some(Commands::Path { step }) => sample_path(&cli, &config, *step, sink),
        Some(Commands::Check) => check(&config),
        Some(Commands::Run) | None => run(&cli, &config, sink),
    }
}
