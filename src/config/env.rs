// Environment variable configuration overrides

use std::env;

use super::Args;
use crate::error::FatalError;

/// Apply `LOWMEMD_*` overrides to the parsed arguments.
///
/// Overrides target the argument struct rather than the finished config so
/// that pattern strings are compiled exactly once, after all sources have
/// been merged. Malformed values are startup-fatal.
pub fn apply_env_overrides(args: &mut Args) -> Result<(), FatalError> {
    if let Some(val) = var("LOWMEMD_MEM_MIN") {
        args.mem_min_percent = parse_int("LOWMEMD_MEM_MIN", &val)?;
    }
    if let Some(val) = var("LOWMEMD_SWAP_MIN") {
        args.swap_min_percent = parse_int("LOWMEMD_SWAP_MIN", &val)?;
    }
    if let Some(val) = var("LOWMEMD_AVOID") {
        args.avoid = val;
    }
    if let Some(val) = var("LOWMEMD_PREFER") {
        args.prefer = Some(val);
    }
    if let Some(val) = var("LOWMEMD_MEMORY_WEIGHT") {
        args.memory_weight = parse_bool("LOWMEMD_MEMORY_WEIGHT", &val)?;
    }
    if let Some(val) = var("LOWMEMD_DEBUG") {
        args.debug = parse_bool("LOWMEMD_DEBUG", &val)?;
    }

    Ok(())
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_int(var: &str, value: &str) -> Result<i64, FatalError> {
    value.trim().parse().map_err(|_| FatalError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Accepts true/false, 1/0, yes/no, on/off (case-insensitive)
fn parse_bool(var: &str, value: &str) -> Result<bool, FatalError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FatalError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
