//! CLI entry point for the tunable laser adapter
//!
//! ```bash
//! tunable_laser info
//! tunable_laser set-wavelength 1550
//! tunable_laser sweep 1460 1620 10 --mode CONT --speed 40 --start
//! tunable_laser --mock demo
//! RUST_LOG=debug tunable_laser --resource "TCPIP0::192.168.1.20::5025::SOCKET" raw "*IDN?"
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tunable_laser::adapters::MockResourceManager;
use tunable_laser::config::{LaserConfig, DEFAULT_CONFIG_PATH};
use tunable_laser::instrument::{SweepMode, TriggerOutput, TunableLaser, DEFAULT_SWEEP_CYCLES};

#[derive(Parser)]
#[command(name = "tunable_laser")]
#[command(about = "Control a tunable laser source over VISA/SCPI", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Resource string, overriding the configured one
    #[arg(long, global = true)]
    resource: Option<String>,

    /// Talk to a simulated laser instead of hardware
    #[arg(long, global = true)]
    mock: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources visible to the resource manager
    List,

    /// Identify the laser and print its current settings
    Info,

    /// Exercise every setting once, printing each step
    Demo,

    /// Tune to a wavelength in nanometers
    SetWavelength {
        /// Target wavelength (nm)
        nm: f64,
    },

    /// Configure a wavelength sweep
    Sweep {
        /// Start wavelength (nm)
        start: f64,
        /// Stop wavelength (nm)
        stop: f64,
        /// Step (nm)
        step: f64,
        /// Sweep mode (STEP, MAN, CONT)
        #[arg(long)]
        mode: Option<SweepMode>,
        /// Continuous sweep speed (nm/s)
        #[arg(long)]
        speed: Option<f64>,
        /// Number of sweep cycles
        #[arg(long, default_value_t = DEFAULT_SWEEP_CYCLES)]
        cycles: u32,
        /// Trigger output (DISABLED, STFINISHED, SWFINISHED, SWSTART)
        #[arg(long)]
        trigger: Option<TriggerOutput>,
        /// Start the sweep once configured
        #[arg(long = "start")]
        start_now: bool,
    },

    /// Switch the laser output
    Laser {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Lock or unlock the instrument
    Lock {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Send a raw SCPI command; queries (ending in '?') print the response
    Raw {
        /// Command text
        command: String,
    },

    /// Print the effective configuration
    PrintConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        matches!(self, Toggle::On)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LaserConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(resource) = &cli.resource {
        config.connection.resource = resource.clone();
    }

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::PrintConfig = cli.command {
        let text = if cli.json {
            serde_json::to_string_pretty(&config)?
        } else {
            toml::to_string_pretty(&config)?
        };
        println!("{}", text);
        return Ok(());
    }

    let mut laser = TunableLaser::from_config(&config.connection);
    if cli.mock {
        info!("Using simulated laser");
        laser = laser.with_manager(MockResourceManager::new());
    }

    if let Commands::List = cli.command {
        let resources = laser
            .list_resources()
            .context("Failed to enumerate resources")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&resources)?);
        } else {
            for resource in resources {
                println!("{}", resource);
            }
        }
        return Ok(());
    }

    let identity = laser
        .open_default()
        .with_context(|| format!("Failed to open '{}'", laser.default_resource()))?;

    info!("Opened {}", identity);

    let result = run(&mut laser, cli.command, cli.json);
    if let Err(e) = laser.close() {
        warn!("Failed to close session: {}", e);
    }
    result
}

fn run(laser: &mut TunableLaser, command: Commands, as_json: bool) -> Result<()> {
    match command {
        Commands::Info => info_command(laser, as_json),
        Commands::Demo => demo(laser),
        Commands::SetWavelength { nm } => {
            laser.set_wavelength(nm)?;
            let applied = laser.wavelength()?;
            if as_json {
                println!("{}", json!({ "wavelength_nm": applied }));
            } else {
                println!("Wavelength: {} nm", applied);
            }
            Ok(())
        }
        Commands::Sweep {
            start,
            stop,
            step,
            mode,
            speed,
            cycles,
            trigger,
            start_now,
        } => {
            if let Some(mode) = mode {
                laser.set_sweep_mode(mode)?;
            }
            if let Some(speed) = speed {
                laser.set_sweep_speed(speed)?;
            }
            if let Some(trigger) = trigger {
                laser.set_output_trigger(trigger)?;
            }
            laser.set_sweep_cycles(cycles)?;
            let range = laser
                .configure_sweep(start, stop, step)
                .context("Failed to configure sweep")?;
            if start_now {
                laser.start_sweep()?;
            }
            let cycles = laser.sweep_cycles()?;
            if as_json {
                println!(
                    "{}",
                    json!({ "range": range, "cycles": cycles, "started": start_now })
                );
            } else {
                println!(
                    "Sweep: {} nm to {} nm, step {} nm, {} cycle(s){}",
                    range.start_nm,
                    range.stop_nm,
                    range.step_nm,
                    cycles,
                    if start_now { ", started" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Laser { state } => {
            laser.set_laser_status(state.is_on())?;
            print_flag("laser_on", laser.laser_status()?, as_json);
            Ok(())
        }
        Commands::Lock { state } => {
            laser.set_locked(state.is_on())?;
            print_flag("locked", laser.locked()?, as_json);
            Ok(())
        }
        Commands::Raw { command } => {
            if command.contains('?') {
                let response = laser.query(&command)?;
                if as_json {
                    println!("{}", json!({ "command": command, "response": response }));
                } else {
                    println!("{}", response);
                }
            } else {
                laser.write(&command)?;
            }
            Ok(())
        }
        Commands::List | Commands::PrintConfig => Ok(()),
    }
}

fn print_flag(name: &str, value: bool, as_json: bool) {
    if as_json {
        let mut map = serde_json::Map::new();
        map.insert(name.to_string(), value.into());
        println!("{}", serde_json::Value::Object(map));
    } else {
        println!("{}: {}", name, value);
    }
}

fn info_command(laser: &mut TunableLaser, as_json: bool) -> Result<()> {
    let wavelength = laser.wavelength()?;
    let (min, max) = laser.wavelength_limits()?;
    let trigger = laser.output_trigger()?;
    let mode = laser.sweep_mode()?;
    let speed = laser.sweep_speed()?;
    let cycles = laser.sweep_cycles()?;
    let laser_on = laser.laser_status()?;
    let locked = laser.locked()?;
    let report = json!({
        "identity": laser.identity(),
        "resource": laser.resource(),
        "transport": laser.transport_info(),
        "wavelength_nm": wavelength,
        "wavelength_limits_nm": [min, max],
        "output_trigger": trigger,
        "sweep_mode": mode,
        "sweep_speed_nm_per_s": speed,
        "sweep_cycles": cycles,
        "laser_on": laser_on,
        "locked": locked,
    });

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", laser);
        if let Some(map) = report.as_object() {
            for (key, value) in map {
                println!("  {:<22} {}", key, value);
            }
        }
    }
    Ok(())
}

fn demo(laser: &mut TunableLaser) -> Result<()> {
    println!("Device: {} opened", laser.identity().unwrap_or("unknown"));
    println!("Wavelength: {} nm", laser.wavelength()?);
    println!("Limits: {:?} nm", laser.wavelength_limits()?);
    println!("Output trigger: {}", laser.output_trigger()?);

    println!("Sweep mode: {}", laser.sweep_mode()?);
    laser.set_sweep_mode(SweepMode::Continuous)?;
    println!("Sweep mode: {}", laser.sweep_mode()?);

    println!("Sweep: {:?}", laser.configure_sweep(1460.0, 1620.0, 10.0)?);

    println!("Locked: {}", laser.locked()?);
    laser.set_locked(true)?;
    println!("Locked: {}", laser.locked()?);
    laser.set_locked(false)?;
    println!("Locked: {}", laser.locked()?);

    println!("Laser on: {}", laser.laser_status()?);
    laser.set_laser_status(true)?;
    println!("Laser on: {}", laser.laser_status()?);
    laser.set_laser_status(false)?;
    println!("Laser on: {}", laser.laser_status()?);

    println!("Sweep cycles: {}", laser.sweep_cycles()?);
    laser.set_sweep_cycles(2)?;
    println!("Sweep cycles: {}", laser.sweep_cycles()?);

    println!("{}", laser);
    Ok(())
}
