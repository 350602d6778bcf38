// System telemetry and per-process snapshots

mod meminfo;
pub mod snapshot;

pub use meminfo::MemInfo;
pub use snapshot::ProcessSnapshot;
