//! Scheduling metric calculators.
//!
//! Laxity, task utilization and the comparable priority words used by the
//! MUF family and the enhanced-priority adaptive policy. Utilization is
//! carried in permille (x1000) so the hot path stays in integer math.

/// Task-set utilization ceiling, in permille.
pub const MAX_UTILIZATION: u32 = 1000;

/// Slack between now and the absolute deadline once the remaining
/// execution time is accounted for. Clamped at zero for late tasks.
pub fn laxity(abs_deadline: u32, time_left: u32, now: u32) -> u32 {
    abs_deadline.saturating_sub(now.saturating_add(time_left))
}

/// Per-task utilization in permille. `None` when the period is zero.
pub fn utilization(c_duration: u32, period: u32) -> Option<u32> {
    if period == 0 {
        return None;
    }
    Some(c_duration.saturating_mul(1000) / period)
}

/// MUF urgency word. Critical tasks outrank non-critical ones, then the
/// task with less laxity wins, then the low bits of the static priority
/// break ties. Field order gives the derived `Ord` exactly that ranking;
/// higher compares greater, and the greatest urgency dispatches first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Urgency {
    critical: bool,
    inverse_laxity: u32,
    priority_bits: u8,
}

impl Urgency {
    pub fn new(critical: bool, laxity: u32, priority: u8) -> Self {
        Self {
            critical,
            inverse_laxity: !laxity & 0x07ff_ffff,
            priority_bits: priority & 0xf,
        }
    }

    pub fn is_critical(self) -> bool {
        self.critical
    }
}

/// Candidate rank for enhanced-priority period doubling. Tasks that have
/// been doubled fewer times rank lower, ties broken so that numerically
/// higher (less important) static priorities rank lower. The *lowest*
/// value is the next doubling candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct EnhancedPriority {
    multiplier_bits: u8,
    inverted_priority: u8,
}

impl EnhancedPriority {
    pub fn new(multiplier: u8, priority: u8) -> Self {
        Self {
            multiplier_bits: multiplier & 0xf,
            inverted_priority: !priority & 0xf,
        }
    }
}
