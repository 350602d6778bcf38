// Configuration module

mod args;
mod env;

pub use args::Args;

use std::path::PathBuf;
use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::error::FatalError;
use crate::killer::score::ScorePolicy;
use crate::monitor::MemInfo;

/// Command lines that are too precious to kill by default. Matches whole
/// init/X/sshd/firefox invocations and the argument-less chrome parent
/// process, but not chrome's renderer children.
pub const DEFAULT_AVOID_PATTERN: &str =
    "(^|/)(((init|X|sshd|firefox)( .*|$))|chrome|chromium-browser)$";

/// Maximum allowed length for classification patterns
const MAX_PATTERN_LENGTH: usize = 256;

/// Maximum compiled regex size in bytes (10MB)
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Interval between pressure samples
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A status line is emitted every this many samples (~1s)
const REPORT_EVERY: u64 = 10;

/// Wait after a termination attempt before re-measuring, so reclamation
/// from the kill can take effect and one kill is not followed by a burst
const COOLDOWN: Duration = Duration::from_secs(10);

/// Compile a classification pattern with safety limits.
///
/// Caps the pattern length and the compiled program size so a hostile or
/// accidental pattern cannot exhaust the daemon's own locked memory.
fn compile_pattern(pattern: &str) -> Result<Regex, FatalError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(FatalError::BadPattern {
            pattern: pattern.to_string(),
            reason: anyhow::anyhow!("pattern longer than {MAX_PATTERN_LENGTH} characters"),
        });
    }

    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| FatalError::BadPattern {
            pattern: pattern.to_string(),
            reason: anyhow::Error::new(e),
        })
}

/// Immutable daemon configuration, resolved once at startup and passed by
/// reference into every component that needs it.
#[derive(Debug)]
pub struct Config {
    /// Available-memory minimum as a percentage of MemTotal
    pub mem_min_percent: i64,
    /// Free-swap minimum as a percentage of SwapTotal
    pub swap_min_percent: i64,
    /// Percentage minimums resolved against the machine's totals, in KiB
    pub mem_min_kib: u64,
    pub swap_min_kib: u64,

    /// Hand victim selection to the kernel via sysrq instead of scoring
    pub kernel_reaper: bool,
    /// Subtract positive badness adjustments instead of damping
    pub ignore_adjustment: bool,
    /// Fold virtual memory size into each score
    pub memory_weight: bool,
    /// Per-process diagnostic output
    pub debug: bool,

    /// Never-kill classification pattern
    pub avoid: Regex,
    /// Prefer-kill classification pattern
    pub prefer: Option<Regex>,

    /// Process table root, threaded explicitly through every read
    pub proc_root: PathBuf,

    pub tick_interval: Duration,
    pub report_every: u64,
    pub cooldown: Duration,
}

impl Config {
    /// Build and validate the configuration from parsed arguments,
    /// after applying environment overrides.
    pub fn from_args(mut args: Args) -> Result<Self, FatalError> {
        env::apply_env_overrides(&mut args)?;

        if args.mem_min_percent <= 0 {
            return Err(FatalError::InvalidMemPercent);
        }
        if args.swap_min_percent <= 0 || args.swap_min_percent > 100 {
            return Err(FatalError::InvalidSwapPercent);
        }
        if args.kernel_reaper && args.ignore_adjustment {
            return Err(FatalError::ConflictingFlags);
        }

        let avoid = compile_pattern(&args.avoid)?;
        let prefer = args.prefer.as_deref().map(compile_pattern).transpose()?;

        Ok(Self {
            mem_min_percent: args.mem_min_percent,
            swap_min_percent: args.swap_min_percent,
            mem_min_kib: 0,
            swap_min_kib: 0,
            kernel_reaper: args.kernel_reaper,
            ignore_adjustment: args.ignore_adjustment,
            memory_weight: args.memory_weight,
            debug: args.debug,
            avoid,
            prefer,
            proc_root: PathBuf::from("/proc"),
            tick_interval: TICK_INTERVAL,
            report_every: REPORT_EVERY,
            cooldown: COOLDOWN,
        })
    }

    /// Translate the percentage minimums into KiB against the machine's
    /// totals. Called once at startup, before the loop begins.
    pub fn resolve_thresholds(&mut self, totals: &MemInfo) {
        self.mem_min_kib = totals.mem_total * self.mem_min_percent as u64 / 100;
        self.swap_min_kib = totals.swap_total * self.swap_min_percent as u64 / 100;
    }

    /// The scoring knobs, detached from the rest of the configuration so
    /// the scorer stays a pure function of explicit inputs.
    pub const fn score_policy(&self) -> ScorePolicy {
        ScorePolicy {
            ignore_adjustment: self.ignore_adjustment,
            memory_weight: self.memory_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            mem_min_percent: 10,
            swap_min_percent: 10,
            kernel_reaper: false,
            ignore_adjustment: false,
            debug: false,
            avoid: DEFAULT_AVOID_PATTERN.to_string(),
            prefer: None,
            memory_weight: false,
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = Config::from_args(base_args()).unwrap();
        assert_eq!(config.mem_min_percent, 10);
        assert_eq!(config.swap_min_percent, 10);
        assert!(!config.memory_weight);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.cooldown, Duration::from_secs(10));
        assert_eq!(config.report_every, 10);
    }

    #[test]
    fn test_invalid_mem_percent() {
        let mut args = base_args();
        args.mem_min_percent = 0;
        let err = Config::from_args(args).unwrap_err();
        assert_eq!(err.exit_code(), 15);
    }

    #[test]
    fn test_invalid_swap_percent() {
        let mut args = base_args();
        args.swap_min_percent = 101;
        let err = Config::from_args(args).unwrap_err();
        assert_eq!(err.exit_code(), 16);

        let mut args = base_args();
        args.swap_min_percent = 0;
        assert_eq!(Config::from_args(args).unwrap_err().exit_code(), 16);
    }

    #[test]
    fn test_kernel_reaper_conflicts_with_ignore_adjustment() {
        let mut args = base_args();
        args.kernel_reaper = true;
        args.ignore_adjustment = true;
        let err = Config::from_args(args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_bad_pattern_is_fatal() {
        let mut args = base_args();
        args.prefer = Some("[unclosed".to_string());
        let err = Config::from_args(args).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_pattern_length_limit() {
        let err = compile_pattern(&"a".repeat(MAX_PATTERN_LENGTH + 1)).unwrap_err();
        assert_eq!(err.exit_code(), 6);
        assert!(compile_pattern(&"a".repeat(MAX_PATTERN_LENGTH)).is_ok());
    }

    #[test]
    fn test_default_avoid_pattern_compiles_and_matches() {
        let re = compile_pattern(DEFAULT_AVOID_PATTERN).unwrap();
        assert!(re.is_match("/sbin/init"));
        assert!(re.is_match("sshd -D"));
        assert!(re.is_match("/usr/lib/firefox/firefox"));
        assert!(re.is_match("chrome"));
        // Renderer children carry arguments and stay killable
        assert!(!re.is_match("chrome --type=renderer"));
        assert!(!re.is_match("/usr/bin/vim"));
    }

    #[test]
    fn test_resolve_thresholds() {
        let mut config = Config::from_args(base_args()).unwrap();
        let totals = MemInfo {
            mem_total: 16_000_000,
            mem_available: 8_000_000,
            swap_total: 8_000_000,
            swap_free: 4_000_000,
        };
        config.resolve_thresholds(&totals);
        assert_eq!(config.mem_min_kib, 1_600_000);
        assert_eq!(config.swap_min_kib, 800_000);
    }
}
