/// Position management: the single-position tracker and its ratchet
///
/// **Key Design Principles:**
/// 1. At most one open position per run; a second entry is an error
/// 2. **Ratchet invariant**: stops may tighten, never loosen (even if ATR expands)
/// 3. Exit checks run in a fixed order: stop, targets, time stop
/// 4. Stop adjustments computed on a bar apply from the next bar
pub mod ratchet;
pub mod tracker;

pub use ratchet::RatchetState;
pub use tracker::{ExitRules, PositionTracker, TrackerError};
