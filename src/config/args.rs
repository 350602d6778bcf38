// Command-line argument parsing

use clap::Parser;

use super::DEFAULT_AVOID_PATTERN;

/// lowmemd - early OOM daemon
///
/// Monitors available memory and free swap, and terminates the most
/// expendable process before the kernel's own OOM handling stalls the
/// machine under swap pressure.
#[derive(Parser, Debug)]
#[command(name = "lowmemd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kills the most expendable process when memory runs out", long_about = None)]
pub struct Args {
    /// Start relieving pressure when available memory drops below PERCENT of total
    #[arg(short = 'm', long = "mem-min", value_name = "PERCENT", default_value_t = 10)]
    pub mem_min_percent: i64,

    /// Start relieving pressure when free swap drops below PERCENT of total
    #[arg(short = 's', long = "swap-min", value_name = "PERCENT", default_value_t = 10)]
    pub swap_min_percent: i64,

    /// Ask the kernel to pick and kill the victim instead of scoring in userspace
    #[arg(short = 'k', long = "kernel-reaper")]
    pub kernel_reaper: bool,

    /// Subtract positive badness adjustments wholesale instead of damping them
    #[arg(short = 'i', long = "ignore-adjustment")]
    pub ignore_adjustment: bool,

    /// Enable per-process diagnostic output
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Never kill processes whose command line matches REGEX
    #[arg(long = "avoid", value_name = "REGEX", default_value = DEFAULT_AVOID_PATTERN)]
    pub avoid: String,

    /// Prefer killing processes whose command line matches REGEX
    #[arg(long = "prefer", value_name = "REGEX")]
    pub prefer: Option<String>,

    /// Add a modifier proportional to virtual memory size to each score
    #[arg(long = "memory-weight")]
    pub memory_weight: bool,
}

impl Args {
    /// Parse arguments from the command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
