use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use solarswitch_core::{
    emit_snapshot, IndexSource, MemoryStore, PolarizedRelay, SetOutcome, SettingsStore,
    SimulatedPin, SolarIndexSensor, SwitchConfig, SwitchController, ThresholdBounds, TickOutcome,
    WriterSink, SENSOR_FAULT,
};
use solarswitch_store::SqliteStore;

mod profile;
mod sim;

#[derive(Parser)]
#[command(name = "solarswitch", about = "Solar index relay controller tools")]
struct Cli {
    /// TOML configuration file (SOLARSWITCH_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite settings database
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive a controller with a scripted signal on a simulated clock
    Simulate(SimulateArgs),
    /// Validate and persist threshold bounds
    SetBounds {
        #[arg(long)]
        max: Option<f64>,
        #[arg(long)]
        min: f64,
    },
    /// Print stored settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored setting; bounds are reseeded from the configuration on next start
    Forget { key: String },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// Signal profile, e.g. "500:5m,1100:6m,500:5m"
    #[arg(long)]
    profile: String,
    /// Tick spacing
    #[arg(long, default_value = "10s")]
    step: String,
    /// Decision interval in minutes (overrides the configuration)
    #[arg(long)]
    interval: Option<u32>,
    /// Uniform noise amplitude added to every sample
    #[arg(long, default_value_t = 0.0)]
    noise: f64,
    /// Probability that a sample is a failed read
    #[arg(long, default_value_t = 0.0)]
    dropout: f64,
    /// Treat profile values as raw ADC counts read through the divider sensor
    #[arg(long)]
    adc: bool,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "solarswitch_core=info,solarswitch_store=info,solarswitch_cli=info".into()
            }),
        )
        .with_writer(io::stderr)
        .init();
}

fn open_store(db: Option<&Path>) -> Result<Box<dyn SettingsStore>> {
    Ok(match db {
        Some(path) => Box::new(
            SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => {
            tracing::info!("no --db given, using an in-memory store");
            Box::new(MemoryStore::new())
        }
    })
}

fn fmt_clock(ms: u64) -> String {
    let s = ms / 1000;
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

fn simulate(cfg: &SwitchConfig, db: Option<&Path>, args: SimulateArgs) -> Result<()> {
    let segments = profile::parse_profile(&args.profile)?;
    let step = profile::parse_duration(&args.step)?;
    if step.is_zero() {
        bail!("--step must be positive");
    }
    let step_ms = u64::try_from(step.as_millis()).context("--step too large")?;
    let end_ms = u64::try_from(profile::total_duration(&segments).as_millis()).context("profile too long")?;

    let clock = Rc::new(Cell::new(0u64));
    if args.adc {
        let adc = sim::ProfileAdc::new(
            segments,
            clock.clone(),
            args.noise,
            args.dropout,
            args.seed,
            cfg.sensor.adc_max_reading,
        )?;
        let sensor = SolarIndexSensor::new(adc, open_store(db)?, cfg.sensor.clone());
        run(cfg, db, &args, sensor, &clock, end_ms, step_ms)
    } else {
        let source = sim::ProfileSource::new(segments, clock.clone(), args.noise, args.dropout, args.seed)?;
        run(cfg, db, &args, source, &clock, end_ms, step_ms)
    }
}

fn run<S: IndexSource>(
    cfg: &SwitchConfig,
    db: Option<&Path>,
    args: &SimulateArgs,
    source: S,
    clock: &Cell<u64>,
    end_ms: u64,
    step_ms: u64,
) -> Result<()> {
    let relay = PolarizedRelay::new(SimulatedPin::new(), cfg.relay_active_low)?;
    let mut ctl = SwitchController::new(cfg, source, relay, open_store(db)?)?;
    if let Some(minutes) = args.interval {
        ctl.set_interval(minutes)?;
    }

    let mut now_ms = 0;
    let mut decisions = 0;
    while now_ms < end_ms {
        clock.set(now_ms);
        if let TickOutcome::Decided(d) = ctl.tick(now_ms) {
            decisions += 1;
            if d.switched {
                println!(
                    "[{}] relay {} (out of range {:?} of {:?})",
                    fmt_clock(now_ms),
                    if d.energize { "ON " } else { "OFF" },
                    d.out_of_range(),
                    ctl.interval(),
                );
            }
        }
        let Some(next) = now_ms.checked_add(step_ms) else {
            break;
        };
        now_ms = next;
    }

    println!(
        "{} decisions over {:?}, relay {}{}",
        decisions,
        Duration::from_millis(end_ms),
        if ctl.relay_energized() { "energized" } else { "released" },
        if ctl.sensor_degraded() { ", sensor degraded" } else { "" },
    );
    let snapshot = ctl.debug(now_ms);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        emit_snapshot(&mut WriterSink::new(io::stdout().lock()), &snapshot);
    }
    Ok(())
}

fn set_bounds(cfg: &SwitchConfig, db: Option<&Path>, max: Option<f64>, min: f64) -> Result<()> {
    let Some(db) = db else {
        bail!("set-bounds needs --db");
    };
    let bounds = match max {
        Some(max) => ThresholdBounds::new(max, min),
        None => ThresholdBounds::min_only(min),
    };
    let store = SqliteStore::open(db).with_context(|| format!("opening {}", db.display()))?;
    let relay = PolarizedRelay::new(SimulatedPin::new(), cfg.relay_active_low)?;
    // Offline: no sensor, the controller is only used for its validated mutator.
    let mut ctl = SwitchController::new(cfg, || SENSOR_FAULT, relay, store)?;
    match ctl.set_bounds(bounds)? {
        SetOutcome::Applied => println!("stored bounds max {} min {} under {}", bounds.max, bounds.min, cfg.store_key),
        SetOutcome::Unchanged => println!("bounds unchanged"),
    }
    Ok(())
}

fn show(db: Option<&Path>, json: bool) -> Result<()> {
    let Some(db) = db else {
        bail!("show needs --db");
    };
    let store = SqliteStore::open(db).with_context(|| format!("opening {}", db.display()))?;
    let entries = store.entries()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("no settings stored");
    }
    for e in entries {
        println!(
            "{:<12} {:<7} {:<32} {:<12} {}{}",
            e.key,
            e.kind,
            e.value.to_string(),
            e.digest.get(..12).unwrap_or(&e.digest),
            e.updated_at.map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            if e.intact { "" } else { "  CORRUPT" },
        );
    }
    Ok(())
}

fn forget(db: Option<&Path>, key: &str) -> Result<()> {
    let Some(db) = db else {
        bail!("forget needs --db");
    };
    let store = SqliteStore::open(db).with_context(|| format!("opening {}", db.display()))?;
    if store.remove(key)? {
        println!("removed {key}");
    } else {
        println!("{key} not stored");
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = SwitchConfig::load(cli.config.as_deref())?;
    let db = cli.db.as_deref();

    match cli.cmd {
        Command::Simulate(args) => simulate(&cfg, db, args),
        Command::SetBounds { max, min } => set_bounds(&cfg, db, max, min),
        Command::Show { json } => show(db, json),
        Command::Forget { key } => forget(db, &key),
        Command::InitConfig { output } => {
            let text = cfg.to_toml_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("wrote {}", path.display());
                }
                None => print!("{text}"),
            }
            Ok(())
        }
    }
}
