// Pressure-monitoring control loop and startup self-protection

use std::io;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use nix::sys::mman::{mlockall, MlockAllFlags};
use nix::sys::signal::Signal;

use crate::config::Config;
use crate::error::FatalError;
use crate::killer::{selector, signals, TerminationFailure};
use crate::monitor::{snapshot, MemInfo};

/// Control-loop states. One trip around the machine is: tick, sample,
/// maybe reap, cool down, repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Idle,
    Sampling,
    Reaping,
    CoolingDown,
}

/// Pure transition function. `pressure_low` is only consulted when
/// leaving `Sampling`; a reap attempt always cools down afterwards,
/// successful or not.
const fn transition(state: MonitorState, pressure_low: bool) -> MonitorState {
    match state {
        MonitorState::Idle => MonitorState::Sampling,
        MonitorState::Sampling => {
            if pressure_low {
                MonitorState::Reaping
            } else {
                MonitorState::Idle
            }
        }
        MonitorState::Reaping => MonitorState::CoolingDown,
        MonitorState::CoolingDown => MonitorState::Idle,
    }
}

/// The daemon: samples telemetry on a fixed tick and relieves pressure
/// when both memory and swap run out.
pub struct PressureMonitor {
    config: Config,
    running: Arc<AtomicBool>,
}

impl PressureMonitor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Startup sequence, then the loop. Runs until externally terminated.
    pub fn run(&mut self) -> Result<(), FatalError> {
        self.verify_proc_root()?;

        let totals = MemInfo::read_from(&self.config.proc_root).map_err(|e| FatalError::Telemetry {
            path: self.config.proc_root.join("meminfo"),
            reason: e,
        })?;
        self.config.resolve_thresholds(&totals);
        self.log_startup(&totals);

        // Dry run first: the scan's working set must reach steady state
        // while the pages it needs can still be faulted in.
        self.dry_run_pass()?;

        mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
            .map_err(FatalError::MemoryLock)?;
        log::info!("memory locked, the daemon itself can no longer be swapped");

        self.shield_from_kernel_reaper();
        self.install_shutdown_handler();

        self.run_loop();
        log::info!("shutting down");
        Ok(())
    }

    fn verify_proc_root(&self) -> Result<(), FatalError> {
        let path = &self.config.proc_root;

        let meta = fs::metadata(path).map_err(|e| FatalError::ProcRootMissing {
            path: path.clone(),
            reason: e,
        })?;
        if !meta.is_dir() {
            return Err(FatalError::ProcRootMissing {
                path: path.clone(),
                reason: io::Error::from(io::ErrorKind::NotADirectory),
            });
        }

        fs::read_dir(path)
            .map(|_| ())
            .map_err(|e| FatalError::ProcRootUnreadable {
                path: path.clone(),
                reason: e,
            })
    }

    fn log_startup(&self, totals: &MemInfo) {
        log::info!("lowmemd {}", env!("CARGO_PKG_VERSION"));
        log::info!(
            "mem total: {} MiB, min: {} MiB ({} %)",
            totals.mem_total / 1024,
            self.config.mem_min_kib / 1024,
            self.config.mem_min_percent
        );
        log::info!(
            "swap total: {} MiB, min: {} MiB ({} %)",
            totals.swap_total / 1024,
            self.config.swap_min_kib / 1024,
            self.config.swap_min_percent
        );
        if self.config.kernel_reaper {
            log::info!("victim selection delegated to the kernel");
        }
    }

    /// One full selection pass with the probe signal. Finding nothing at
    /// all here is fatal: an empty process table means the daemon cannot
    /// do its one job, and there is no later cycle to back off to yet.
    fn dry_run_pass(&self) -> Result<(), FatalError> {
        if self.config.kernel_reaper {
            if let Err(e) = signals::trigger_kernel_reaper(&self.config.proc_root, true) {
                log::warn!("sysrq trigger not usable: {e}");
            }
            return Ok(());
        }

        let uptime =
            snapshot::read_uptime(&self.config.proc_root).map_err(|e| FatalError::Telemetry {
                path: self.config.proc_root.join("uptime"),
                reason: e,
            })?;

        let candidate = selector::select(&self.config.proc_root, &self.config, uptime).map_err(
            |e| FatalError::ProcRootUnreadable {
                path: self.config.proc_root.clone(),
                reason: io::Error::other(e),
            },
        )?;

        let Some(victim) = candidate else {
            return Err(FatalError::EmptyProcessTable);
        };

        match signals::terminate(victim.pid, None) {
            Ok(()) | Err(TerminationFailure::Vanished) => {}
            Err(e) => log::warn!("startup probe of pid {} failed: {e}", victim.pid),
        }
        Ok(())
    }

    /// Tell the kernel's own killer to spare us. Best effort: without
    /// privilege the write fails, and mlockall already keeps us live.
    fn shield_from_kernel_reaper(&self) {
        let path = self.config.proc_root.join("self/oom_score_adj");
        match fs::write(&path, "-100") {
            Ok(()) => log::info!("badness adjustment set to -100"),
            Err(e) => log::warn!("could not write {}: {e}", path.display()),
        }
    }

    fn install_shutdown_handler(&self) {
        let running = Arc::clone(&self.running);
        let result = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        });
        if let Err(e) = result {
            log::warn!("could not install shutdown handler: {e}");
        }
    }

    fn run_loop(&self) {
        let mut state = MonitorState::Idle;
        // Start at 1 so the very first sample does not produce a status line
        let mut samples: u64 = 1;

        while self.running.load(Ordering::SeqCst) {
            state = match state {
                MonitorState::Idle => {
                    thread::sleep(self.config.tick_interval);
                    transition(state, false)
                }
                MonitorState::Sampling => {
                    let low = self.sample(&mut samples);
                    transition(state, low)
                }
                MonitorState::Reaping => {
                    self.relieve_pressure();
                    transition(state, false)
                }
                MonitorState::CoolingDown => {
                    thread::sleep(self.config.cooldown);
                    if self.config.debug {
                        if let Ok(m) = MemInfo::read_from(&self.config.proc_root) {
                            log::debug!("after cool-down: {m}");
                        }
                    }
                    transition(state, false)
                }
            };
        }
    }

    /// Read telemetry, emit the periodic status line, and evaluate the
    /// trigger predicate. Telemetry failures are cycle-level: warn and
    /// treat the sample as not low.
    fn sample(&self, samples: &mut u64) -> bool {
        let info = match MemInfo::read_from(&self.config.proc_root) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("telemetry unavailable this cycle: {e:#}");
                return false;
            }
        };

        if *samples % self.config.report_every == 0 {
            log::info!("{info}");
        }
        *samples = samples.wrapping_add(1);

        let low = info.pressure_is_low(self.config.mem_min_kib, self.config.swap_min_kib);
        if low {
            log::warn!(
                "out of memory: {info}, minimums {} MiB / {} MiB",
                self.config.mem_min_kib / 1024,
                self.config.swap_min_kib / 1024
            );
        }
        low
    }

    /// One selection + termination attempt. Every outcome, including
    /// failure, is followed by the cool-down state.
    fn relieve_pressure(&self) {
        if self.config.kernel_reaper {
            match signals::trigger_kernel_reaper(&self.config.proc_root, false) {
                Ok(()) => log::warn!("kernel reaper invoked"),
                Err(e) => log::warn!("kernel reaper unavailable: {e}"),
            }
            return;
        }

        let uptime = match snapshot::read_uptime(&self.config.proc_root) {
            Ok(uptime) => uptime,
            Err(e) => {
                log::warn!("cannot read uptime: {e:#}");
                return;
            }
        };

        let candidate = match selector::select(&self.config.proc_root, &self.config, uptime) {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("process scan failed: {e:#}");
                return;
            }
        };

        let Some(victim) = candidate else {
            log::warn!("no process produced a valid score, cooling down");
            return;
        };

        // Re-read for the announcement; the victim may already be gone
        let label = snapshot::read(&self.config.proc_root, victim.pid)
            .map_or_else(|| "<exited>".to_string(), |s| s.label().to_string());

        log::warn!(
            "terminating pid {} ({label}): score {:.1}, resident {} MiB",
            victim.pid,
            victim.score,
            victim.resident_kib / 1024
        );

        if let Err(e) = signals::terminate(victim.pid, Some(Signal::SIGKILL)) {
            log::warn!("could not terminate pid {}: {e}", victim.pid);
        }

        if self.config.debug {
            if let Ok(m) = MemInfo::read_from(&self.config.proc_root) {
                log::debug!("after termination attempt: {m}");
            }
        }
    }
}
