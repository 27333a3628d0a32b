use std::{collections::BTreeMap, sync::Arc};

use warpnet_core::SimTime;

// CATEGORY STATS
// ================================================================================================

/// Per-category traffic counters of a single model-net LP.
///
/// Every field is updated by a forward handler and exactly rolled back by the matching reverse
/// handler, so the counters are safe to read at any committed point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CategoryStats {
    pub send_count: u64,
    pub send_bytes: u64,
    pub send_time: SimTime,
    pub recv_count: u64,
    pub recv_bytes: u64,
    pub recv_time: SimTime,
}

// STATS TABLE
// ================================================================================================

/// Category-keyed statistics table owned by a single LP.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsTable {
    entries: BTreeMap<Arc<str>, CategoryStats>,
}

impl StatsTable {
    /// Returns an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters for `category`, inserting a zeroed entry on first use.
    pub fn entry(&mut self, category: &Arc<str>) -> &mut CategoryStats {
        self.entries.entry(category.clone()).or_default()
    }

    /// Returns the counters for `category`, if the category has been seen.
    pub fn get(&self, category: &str) -> Option<&CategoryStats> {
        self.entries.get(category)
    }

    /// Returns an iterator over all categories, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &CategoryStats)> {
        self.entries.iter()
    }

    /// Returns true if no category has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// TESTS
// ================================================================================================
