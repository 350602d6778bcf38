// Memory telemetry from the process table's meminfo record

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Aggregate memory telemetry in KiB, refreshed every sample
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    /// Total physical memory
    pub mem_total: u64,
    /// Available memory (more useful than free: includes reclaimable caches)
    pub mem_available: u64,
    /// Total swap space
    pub swap_total: u64,
    /// Free swap space
    pub swap_free: u64,
}

impl MemInfo {
    /// Read telemetry from `<proc_root>/meminfo`
    pub fn read_from(proc_root: &Path) -> Result<Self> {
        let path = proc_root.join("meminfo");
        let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut info = Self::default();

        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };

            let field = match key.trim_end_matches(':') {
                "MemTotal" => &mut info.mem_total,
                "MemAvailable" => &mut info.mem_available,
                "SwapTotal" => &mut info.swap_total,
                "SwapFree" => &mut info.swap_free,
                _ => continue,
            };
            *field = value
                .parse()
                .with_context(|| format!("unparsable value for {key} in {}", path.display()))?;
        }

        if info.mem_total == 0 {
            anyhow::bail!("no MemTotal record in {}", path.display());
        }

        Ok(info)
    }

    /// The low-memory trigger predicate: conjunctive, both resources must
    /// be scarce. Abundant swap suppresses killing even when RAM is low.
    pub const fn pressure_is_low(&self, mem_min_kib: u64, swap_min_kib: u64) -> bool {
        self.mem_available <= mem_min_kib && self.swap_free <= swap_min_kib
    }

    pub fn mem_available_percent(&self) -> f64 {
        if self.mem_total == 0 {
            return 0.0;
        }
        (self.mem_available as f64 / self.mem_total as f64) * 100.0
    }

    pub fn swap_free_percent(&self) -> f64 {
        if self.swap_total == 0 {
            return 100.0; // no swap configured means none is missing
        }
        (self.swap_free as f64 / self.swap_total as f64) * 100.0
    }
}

impl std::fmt::Display for MemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mem avail: {:5} MiB ({:.0} %), swap free: {:5} MiB ({:.0} %)",
            self.mem_available / 1024,
            self.mem_available_percent(),
            self.swap_free / 1024,
            self.swap_free_percent(),
        )
    }
}
