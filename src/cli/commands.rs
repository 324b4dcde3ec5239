use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Main CLI structure for the droid-netwatch application
#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Timed network-stability tests for an ADB-attached Android device")]
#[command(long_about = "Runs a countdown test against the attached device, probing internet reachability \
every second and reporting throughput from the device's interface counters. Two consecutive failed \
probes abort the test; on Xiaomi/Redmi devices a full bug report is captured automatically.")]
pub struct Cli {
    /// Optional TOML configuration file; DNW_* environment variables override it
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Timed stability test with live console output
    #[command(about = "Run a timed network-stability test")]
    #[command(long_about = "Waits for a device, then runs a timed test. While it runs, type a command \
and press Enter:\n  stop     pause the test (keeps elapsed time)\n  resume   continue a paused test\n  \
restart  start over with the same duration\n  quit     end the program\n\n\
Examples:\n  \
dnw run --minutes 30                  # 30 minute test\n  \
dnw run --seconds 90 --wait-device 60 # wait up to a minute for a device")]
    Run {
        #[arg(short, long, default_value = "0", help = "Test duration minutes")]
        minutes: u32,

        #[arg(short, long, default_value = "30", help = "Test duration seconds")]
        seconds: u32,

        /// How long to wait for a device before giving up
        #[arg(short, long, default_value = "30", help = "Seconds to wait for a device")]
        wait_device: u64,
    },

    #[command(about = "List attached devices")]
    Devices,

    /// Device model, Android version and network classification
    #[command(about = "Show device and network information")]
    Info {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    /// Two counter reads separated by the measurement duration
    #[command(about = "Measure current device throughput")]
    Traffic {
        #[arg(
            short = 'm',
            long,
            default_value = "2",
            help = "Measurement duration in seconds (minimum 1)"
        )]
        measurement_duration: u64,

        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    /// Captures a bug report regardless of brand
    #[command(about = "Capture a diagnostic bug report now")]
    Capture,
}

/// Total test length from the minute and second fields
pub fn total_seconds(minutes: u32, seconds: u32) -> u32 {
    minutes.saturating_mul(60).saturating_add(seconds)
}
