//! Reader badges unlocked by the number of chapters read.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeStyle {
    pub color: &'static str,
    /// Visual stage of the badge frame, 0 (plain) to 3 (animated)
    pub stage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeTier {
    pub threshold: u32,
    pub label: &'static str,
    pub style: BadgeStyle,
}

impl BadgeTier {
    const fn new(threshold: u32, label: &'static str, color: &'static str, stage: u8) -> Self {
        BadgeTier {
            threshold,
            label,
            style: BadgeStyle { color, stage },
        }
    }

    /// The tier's identifier is its threshold, e.g. "10"
    pub fn key(&self) -> String {
        self.threshold.to_string()
    }
}

/// Sorted ascending by threshold; the first tier must start at 0.
pub const TIERS: &[BadgeTier] = &[
    BadgeTier::new(0, "Newcomer", "#9ca3af", 0),
    BadgeTier::new(10, "Page Turner", "#a3a3a3", 0),
    BadgeTier::new(20, "Bookworm", "#84cc16", 1),
    BadgeTier::new(30, "Avid Reader", "#22c55e", 1),
    BadgeTier::new(40, "Story Seeker", "#14b8a6", 1),
    BadgeTier::new(50, "Chapter Chaser", "#0ea5e9", 2),
    BadgeTier::new(60, "Lore Keeper", "#6366f1", 2),
    BadgeTier::new(70, "Night Owl", "#8b5cf6", 2),
    BadgeTier::new(80, "Saga Devourer", "#d946ef", 3),
    BadgeTier::new(90, "Archivist", "#f43f5e", 3),
    BadgeTier::new(100, "Legend", "#f59e0b", 3),
];

/// Returns the highest tier of `tiers` whose threshold is at most `count`.
///
/// `tiers` must be sorted ascending and start at threshold 0, in which case a
/// tier is always found.
pub fn tier_in(tiers: &'static [BadgeTier], count: u64) -> &'static BadgeTier {
    let unlocked = tiers.partition_point(|t| u64::from(t.threshold) <= count);
    &tiers[unlocked.saturating_sub(1)]
}

pub fn tier_for(count: u64) -> &'static BadgeTier {
    tier_in(TIERS, count)
}

/// The next tier to unlock, `None` once the top tier is reached.
pub fn next_tier(count: u64) -> Option<&'static BadgeTier> {
    TIERS.iter().find(|t| u64::from(t.threshold) > count)
}
