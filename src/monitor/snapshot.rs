// Per-process snapshot reading
//
// Every record under /proc/<pid> gets its own parser returning an Option;
// a snapshot that fails any required read is discarded whole. Processes
// vanish between the directory scan and the reads all the time, so a
// failed read is a normal outcome, not an error.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Everything the scorer needs to know about one process, read fresh
/// each scan cycle and owned by that cycle alone.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: libc::pid_t,
    /// Kernel-reported badness (oom_score)
    pub kernel_badness: i64,
    /// Self- or administrator-assigned bias (oom_score_adj)
    pub badness_adjustment: i64,
    pub resident_kib: u64,
    pub virtual_kib: u64,
    /// Full argv joined with spaces; empty for kernel threads
    pub command_line: String,
    /// Short name from the stat record
    pub comm: String,
    /// Start time in clock ticks since boot
    pub start_ticks: u64,
    pub priority: i64,
}

impl ProcessSnapshot {
    /// What classification and logging operate on: the command line, or
    /// the short name when the kernel reports no arguments.
    pub fn label(&self) -> &str {
        if self.command_line.is_empty() {
            &self.comm
        } else {
            &self.command_line
        }
    }

    /// Start time in seconds since boot
    pub fn start_secs(&self) -> f64 {
        self.start_ticks as f64 / procfs::ticks_per_second() as f64
    }
}

/// Read one process. `None` means the pid is not a valid candidate this
/// cycle: it exited mid-read, a record was unparsable, or it is pid 1,
/// which is never a candidate.
pub fn read(proc_root: &Path, pid: libc::pid_t) -> Option<ProcessSnapshot> {
    if pid <= 1 {
        return None;
    }

    let dir = proc_root.join(pid.to_string());

    let stat = parse_stat(&fs::read_to_string(dir.join("stat")).ok()?)?;
    let kernel_badness = parse_scalar(&fs::read_to_string(dir.join("oom_score")).ok()?)?;
    let badness_adjustment = parse_scalar(&fs::read_to_string(dir.join("oom_score_adj")).ok()?)?;
    let command_line = parse_cmdline(&fs::read(dir.join("cmdline")).ok()?);

    let page_kib = procfs::page_size() / 1024;

    Some(ProcessSnapshot {
        pid,
        kernel_badness,
        badness_adjustment,
        resident_kib: stat.rss_pages * page_kib,
        virtual_kib: stat.vsize_bytes / 1024,
        command_line,
        comm: stat.comm,
        start_ticks: stat.start_ticks,
        priority: stat.priority,
    })
}

/// All numeric entries of the process table, in directory order
pub fn enumerate_pids(proc_root: &Path) -> std::io::Result<Vec<libc::pid_t>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir(proc_root)? {
        let entry = entry?;
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<libc::pid_t>() {
            if pid > 0 {
                pids.push(pid);
            }
        }
    }
    Ok(pids)
}

/// Seconds since boot, from the first field of `<proc_root>/uptime`
pub fn read_uptime(proc_root: &Path) -> Result<f64> {
    let path = proc_root.join("uptime");
    let content =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    content
        .split_whitespace()
        .next()
        .with_context(|| format!("empty uptime record in {}", path.display()))?
        .parse()
        .with_context(|| format!("unparsable uptime in {}", path.display()))
}

struct StatRecord {
    comm: String,
    priority: i64,
    start_ticks: u64,
    vsize_bytes: u64,
    rss_pages: u64,
}

/// Parse the stat record. The comm field is parenthesized and may itself
/// contain spaces and parentheses, so it ends at the LAST closing paren;
/// the positional fields follow from there.
fn parse_stat(content: &str) -> Option<StatRecord> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    let comm = content.get(open + 1..close)?.to_string();

    let fields: Vec<&str> = content.get(close + 1..)?.split_whitespace().collect();

    // Fields numbered from the stat(5) table, where comm is field 2 and
    // state is field 3 (our index 0): priority 18, starttime 22, vsize 23,
    // rss 24.
    let priority = fields.get(15)?.parse().ok()?;
    let start_ticks = fields.get(19)?.parse().ok()?;
    let vsize_bytes = fields.get(20)?.parse().ok()?;
    let rss_pages: i64 = fields.get(21)?.parse().ok()?;

    Some(StatRecord {
        comm,
        priority,
        start_ticks,
        vsize_bytes,
        rss_pages: rss_pages.max(0) as u64,
    })
}

/// Parse a single-integer record such as oom_score or oom_score_adj
fn parse_scalar<T: FromStr>(content: &str) -> Option<T> {
    content.trim().parse().ok()
}

/// NUL-separated argv joined with single spaces; empty is legal
fn parse_cmdline(bytes: &[u8]) -> String {
    bytes
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // pid 4242: priority 20, starttime 54321 ticks, vsize 104857600 bytes,
    // rss 2560 pages
    const STAT_LINE: &str = "4242 (demo proc) S 1 4242 4242 0 -1 4194304 1000 0 0 0 50 10 0 0 \
                             20 0 4 0 54321 104857600 2560 18446744073709551615 1 1 0 0 0 0 0 0 \
                             0 0 0 0 17 3 0 0 0 0 0";

    fn fake_proc(pid: &str) -> TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(pid);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("stat"), format!("{STAT_LINE}\n")).unwrap();
        fs::write(dir.join("oom_score"), "123\n").unwrap();
        fs::write(dir.join("oom_score_adj"), "-200\n").unwrap();
        fs::write(dir.join("cmdline"), b"/usr/bin/demo\0--flag\0value\0").unwrap();
        root
    }

    #[test]
    fn test_read_complete_snapshot() {
        let root = fake_proc("4242");
        let snap = read(root.path(), 4242).unwrap();

        assert_eq!(snap.pid, 4242);
        assert_eq!(snap.kernel_badness, 123);
        assert_eq!(snap.badness_adjustment, -200);
        assert_eq!(snap.comm, "demo proc");
        assert_eq!(snap.command_line, "/usr/bin/demo --flag value");
        assert_eq!(snap.start_ticks, 54321);
        assert_eq!(snap.priority, 20);
        assert_eq!(snap.virtual_kib, 104_857_600 / 1024);
        assert_eq!(snap.resident_kib, 2560 * (procfs::page_size() / 1024));
    }

    #[test]
    fn test_pid_one_is_never_read() {
        let root = fake_proc("1");
        assert!(read(root.path(), 1).is_none());
    }

    #[test]
    fn test_vanished_process_reads_as_none() {
        let root = tempfile::tempdir().unwrap();
        assert!(read(root.path(), 4242).is_none());
    }

    #[test]
    fn test_partial_snapshot_is_discarded() {
        let root = fake_proc("4242");
        fs::remove_file(root.path().join("4242/oom_score_adj")).unwrap();
        assert!(read(root.path(), 4242).is_none());
    }

    #[test]
    fn test_unparsable_record_is_discarded() {
        let root = fake_proc("4242");
        fs::write(root.path().join("4242/oom_score"), "not a number\n").unwrap();
        assert!(read(root.path(), 4242).is_none());
    }

    #[test]
    fn test_label_falls_back_to_comm() {
        let root = fake_proc("4242");
        fs::write(root.path().join("4242/cmdline"), b"").unwrap();
        let snap = read(root.path(), 4242).unwrap();
        assert_eq!(snap.label(), "demo proc");
    }

    #[test]
    fn test_parse_stat_comm_with_parens() {
        let line = "99 (Web (Content)) R 1 99 99 0 -1 0 0 0 0 0 0 0 0 0 \
                    20 0 1 0 1000 2048 10 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let stat = parse_stat(line).unwrap();
        assert_eq!(stat.comm, "Web (Content)");
        assert_eq!(stat.priority, 20);
        assert_eq!(stat.start_ticks, 1000);
        assert_eq!(stat.vsize_bytes, 2048);
        assert_eq!(stat.rss_pages, 10);
    }

    #[test]
    fn test_parse_stat_truncated_is_none() {
        assert!(parse_stat("12 (short) S 1 2 3").is_none());
        assert!(parse_stat("garbage").is_none());
    }

    #[test]
    fn test_parse_cmdline_empty_and_trailing_nul() {
        assert_eq!(parse_cmdline(b""), "");
        assert_eq!(parse_cmdline(b"sh\0"), "sh");
        assert_eq!(parse_cmdline(b"a\0b\0\0"), "a b");
    }

    #[test]
    fn test_enumerate_pids_skips_non_numeric() {
        let root = tempfile::tempdir().unwrap();
        for name in ["1", "42", "self", "meminfo", "1000"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        let mut pids = enumerate_pids(root.path()).unwrap();
        pids.sort_unstable();
        assert_eq!(pids, vec![1, 42, 1000]);
    }

    #[test]
    fn test_read_uptime() {
        let root = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(root.path().join("uptime")).unwrap();
        writeln!(f, "12345.67 45678.90").unwrap();
        drop(f);
        let uptime = read_uptime(root.path()).unwrap();
        assert!((uptime - 12345.67).abs() < 1e-9);
    }

    #[test]
    fn test_read_uptime_missing_is_err() {
        let root = tempfile::tempdir().unwrap();
        assert!(read_uptime(root.path()).is_err());
    }
}
