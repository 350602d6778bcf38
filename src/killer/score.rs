// Badness scoring
//
// Every step is a pure function of explicit inputs so each can be tested
// in isolation. Higher scores mean more killable. The final score is a
// plain sum of the four components.

use crate::killer::classify::Classification;
use crate::monitor::ProcessSnapshot;

/// Window over which the age bonus grows to its maximum
pub const AGE_WINDOW_SECS: f64 = 8.0 * 60.0 * 60.0;

/// Age bonus at a full window
pub const AGE_BONUS_MAX: f64 = 400.0;

/// Convex shaping of the age curve: growth accelerates toward the window end
const AGE_CURVE_EXPONENT: f64 = 1.25;

/// Weight of the classification verdict, in either direction
pub const CLASS_WEIGHT: f64 = 400.0;

/// Divisor that damps the kernel's heavy bias toward raw memory size
const BADNESS_DAMPING: f64 = 8.0;

/// The two scoring knobs that come from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ScorePolicy {
    /// Subtract positive adjustments wholesale instead of damping
    pub ignore_adjustment: bool,
    /// Enable the virtual-size modifier
    pub memory_weight: bool,
}

/// Base score from kernel badness.
///
/// The default mode damps the kernel number while preserving the explicit
/// self-reported adjustment: `(badness - adj) / 8 + adj`. The alternate
/// mode subtracts positive adjustments wholesale and leaves the rest of
/// the kernel number untouched.
pub fn base_score(kernel_badness: i64, adjustment: i64, ignore_adjustment: bool) -> f64 {
    if ignore_adjustment {
        (kernel_badness - adjustment.max(0)) as f64
    } else {
        (kernel_badness - adjustment) as f64 / BADNESS_DAMPING + adjustment as f64
    }
}

/// Fraction of the age window this process has lived, in [0, 1]
pub fn age_fraction(uptime_secs: f64, start_secs: f64) -> f64 {
    (uptime_secs - start_secs).clamp(0.0, AGE_WINDOW_SECS) / AGE_WINDOW_SECS
}

/// Age bonus, applied only to Preferred processes: a whitelisted service
/// earns killability as it ages, while young instances keep their grace.
pub fn age_bonus(fraction: f64, class: Classification) -> f64 {
    match class {
        Classification::Preferred => AGE_BONUS_MAX * fraction.powf(AGE_CURVE_EXPONENT),
        Classification::Neutral | Classification::Excluded => 0.0,
    }
}

pub fn class_modifier(class: Classification) -> f64 {
    match class {
        Classification::Neutral => 0.0,
        Classification::Excluded => -CLASS_WEIGHT,
        Classification::Preferred => CLASS_WEIGHT,
    }
}

/// Linear modifier from virtual size. Off by default: it over-weighted
/// large-but-harmless processes.
pub fn memory_modifier(virtual_kib: u64, enabled: bool) -> f64 {
    if enabled {
        virtual_kib as f64 / 1024.0 / 4.0
    } else {
        0.0
    }
}

/// Final kill-worthiness of one process
pub fn score(
    snapshot: &ProcessSnapshot,
    class: Classification,
    uptime_secs: f64,
    policy: &ScorePolicy,
) -> f64 {
    base_score(
        snapshot.kernel_badness,
        snapshot.badness_adjustment,
        policy.ignore_adjustment,
    ) + age_bonus(age_fraction(uptime_secs, snapshot.start_secs()), class)
        + class_modifier(class)
        + memory_modifier(snapshot.virtual_kib, policy.memory_weight)
}
