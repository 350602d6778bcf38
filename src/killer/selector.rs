// Victim selection

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::killer::classify::classify;
use crate::killer::score;
use crate::monitor::{snapshot, ProcessSnapshot};

/// The running maximum of one scan. Reset every scan; the victim of one
/// cycle has no bearing on the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VictimCandidate {
    pub pid: libc::pid_t,
    pub score: f64,
    pub resident_kib: u64,
}

/// Primary key: score, higher wins. Tie-break: resident size, higher wins.
fn beats(score: f64, resident_kib: u64, best: &VictimCandidate) -> bool {
    score > best.score || (score == best.score && resident_kib > best.resident_kib)
}

/// Fold a stream of snapshots into the best candidate. Pure with respect
/// to its inputs; comparison is strictly in iteration order.
pub fn select_from<I>(snapshots: I, config: &Config, uptime_secs: f64) -> Option<VictimCandidate>
where
    I: IntoIterator<Item = ProcessSnapshot>,
{
    let policy = config.score_policy();
    let mut best: Option<VictimCandidate> = None;

    for snap in snapshots {
        if snap.pid <= 1 {
            continue;
        }

        let class = classify(snap.label(), &config.avoid, config.prefer.as_ref());
        let points = score::score(&snap, class, uptime_secs, &policy);

        if config.debug {
            log::debug!(
                "pid {:>7}: score {:>8.1}, resident {:>8} KiB, prio {:>3}, {:?}, {}",
                snap.pid,
                points,
                snap.resident_kib,
                snap.priority,
                class,
                snap.label()
            );
        }

        if best.as_ref().map_or(true, |b| beats(points, snap.resident_kib, b)) {
            if config.debug {
                log::debug!("    ^ new best candidate");
            }
            best = Some(VictimCandidate {
                pid: snap.pid,
                score: points,
                resident_kib: snap.resident_kib,
            });
        }
    }

    best
}

/// Scan the whole process table for a victim.
///
/// The scan is best-effort, not atomic: processes that exit between the
/// directory read and the snapshot reads are skipped. `Ok(None)` means no
/// process produced a valid score, which is recoverable; only a failure
/// to enumerate the table at all is an error.
pub fn select(proc_root: &Path, config: &Config, uptime_secs: f64) -> Result<Option<VictimCandidate>> {
    let own_pid = std::process::id() as libc::pid_t;

    let pids = snapshot::enumerate_pids(proc_root)
        .with_context(|| format!("failed to enumerate {}", proc_root.display()))?;

    let snapshots = pids
        .into_iter()
        .filter(|pid| *pid != own_pid)
        .filter_map(|pid| snapshot::read(proc_root, pid));

    Ok(select_from(snapshots, config, uptime_secs))
}
