//! Snapshot + delta merging for Bybit linear tickers.

use ahash::AHashMap;
use parking_lot::Mutex;
use pt_core::PriceUpdate;

use super::parser::FrameKind;

/// Last complete ticker per symbol.
#[derive(Default)]
pub struct TickerMerger {
    snapshots: Mutex<AHashMap<String, PriceUpdate>>,
}

impl TickerMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a frame and return the merged record to publish.
    ///
    /// A delta for a symbol without a snapshot is returned as-is (and kept
    /// as the base for later deltas).
    pub fn apply(&self, kind: FrameKind, update: PriceUpdate) -> PriceUpdate {
        let mut snapshots = self.snapshots.lock();
        match (kind, snapshots.get_mut(&update.symbol)) {
            (FrameKind::Delta, Some(base)) => {
                base.merge_from(update);
                base.clone()
            }
            _ => {
                snapshots.insert(update.symbol.clone(), update.clone());
                update
            }
        }
    }
}
