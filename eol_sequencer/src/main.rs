//! # EOL Sequencer Binary
//!
//! Runs EOL force-test cycles against simulator or hardware backends.
//!
//! # Usage
//!
//! ```bash
//! # Full simulator run, one cycle
//! eol_sequencer --dut-id DUT-001 --model WF-A1 --serial SN0001 --simulate
//!
//! # Hardware run from config files, three cycles
//! eol_sequencer -t config/test.toml -w config/hardware.toml \
//!     --dut-id DUT-001 --model WF-A1 --serial SN0001 --cycles 3
//! ```

#![deny(warnings)]

use clap::Parser;
use eol_common::cancel::CancelToken;
use eol_common::config::ConfigLoader;
use eol_common::dut::DutInfo;
use eol_common::hw_config::{HardwareConfig, MODEL_SIM};
use eol_common::progress::ProgressSink;
use eol_common::test_config::TestConfiguration;
use eol_sequencer::cycle::TestSequencer;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// EOL force-test sequencer.
#[derive(Parser, Debug)]
#[command(name = "eol_sequencer")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "End-of-line force-test sequencer for electro-mechanical actuators")]
#[command(long_about = None)]
struct Args {
    /// Path to the test configuration file (TOML); defaults apply if omitted
    #[arg(short = 't', long)]
    test_config: Option<PathBuf>,

    /// Path to the hardware configuration file (TOML); defaults apply if omitted
    #[arg(short = 'w', long)]
    hardware_config: Option<PathBuf>,

    /// DUT identifier
    #[arg(long)]
    dut_id: String,

    /// DUT model number
    #[arg(long = "model")]
    model_number: String,

    /// DUT serial number
    #[arg(long = "serial")]
    serial_number: String,

    /// Number of cycles to run
    #[arg(short, long, default_value_t = 1)]
    cycles: u32,

    /// Force simulator backends for every device
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(&args);

    match run(args).await {
        Ok(all_passed) => {
            if all_passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("sequencer failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    info!("EOL sequencer v{} starting...", env!("CARGO_PKG_VERSION"));

    let test = match &args.test_config {
        Some(path) => TestConfiguration::load(path)?,
        None => TestConfiguration::default(),
    };
    test.validate()?;

    let mut hw = match &args.hardware_config {
        Some(path) => HardwareConfig::load(path)?,
        None => HardwareConfig::default(),
    };
    if args.simulate {
        info!("Simulation mode enabled (all devices)");
        hw.robot.model = MODEL_SIM.to_string();
        hw.loadcell.model = MODEL_SIM.to_string();
        hw.mcu.model = MODEL_SIM.to_string();
        hw.power.model = MODEL_SIM.to_string();
        hw.digital_io.model = MODEL_SIM.to_string();
    }
    hw.validate()?;

    let dut = DutInfo::new(&args.dut_id, &args.model_number, &args.serial_number);
    dut.validate()?;

    let facade = eol_hal::factory::create_facade(&hw, &test)?;

    let (progress, mut progress_rx) = ProgressSink::channel();
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            info!(
                "[{:?}] {} {}",
                event.phase,
                event.step,
                event.detail.as_deref().unwrap_or("")
            );
        }
    });

    let mut sequencer = TestSequencer::new(facade, progress);

    // Ctrl-C unwinds the run through teardown.
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_token.cancel();
        }
    });

    let report = sequencer.execute(args.cycles, &test, &hw, &dut, &cancel).await;
    sequencer.shutdown().await;

    for cycle in &report.cycles {
        match &cycle.error_message {
            None => info!(
                "cycle {}: {} ({} slots, {:.1} s)",
                cycle.cycle_number,
                if cycle.is_passed { "PASS" } else { "FAIL" },
                cycle.measurements.slot_count(),
                cycle.execution_duration
            ),
            Some(message) => info!(
                "cycle {}: FAIL - {} ({} slots, {:.1} s)",
                cycle.cycle_number,
                message,
                cycle.measurements.slot_count(),
                cycle.execution_duration
            ),
        }
    }

    let all_passed = report.all_passed();
    info!(
        "run complete: {}/{} cycles passed",
        report.cycles.iter().filter(|c| c.is_passed).count(),
        report.cycle_count()
    );
    Ok(all_passed)
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
