/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen (even if ATR expands).
///
/// Breakeven moves and ATR trailing both propose levels; only proposals in
/// the position's favor are accepted.
use crate::domain::Side;

/// Ratchet state for stop-loss management
///
/// - Long positions: stop can only rise (tighten)
/// - Short positions: stop can only fall (tighten)
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    current_level: Option<f64>,
    side: Side,
}

impl RatchetState {
    /// A ratchet with no stop yet; the first proposal initializes it.
    pub fn new(side: Side) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    pub fn with_initial_level(side: Side, initial_level: f64) -> Self {
        Self {
            current_level: Some(initial_level),
            side,
        }
    }

    /// Seed from a position's optional stop.
    pub fn from_stop(side: Side, stop: Option<f64>) -> Self {
        Self {
            current_level: stop,
            side,
        }
    }

    /// Apply ratchet to a proposed stop level
    ///
    /// Returns the ratcheted level (can only tighten, never loosen).
    /// Non-finite proposals are ignored.
    ///
    /// # Example
    /// ```
    /// use algolab_core::domain::Side;
    /// use algolab_core::position_management::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(Side::Long, 95.0);
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if !proposed.is_finite() {
            return self.current_level.unwrap_or(proposed);
        }
        let ratcheted = match self.current_level {
            None => proposed,
            Some(current) => match self.side {
                Side::Long => current.max(proposed),
                Side::Short => current.min(proposed),
            },
        };
        self.current_level = Some(ratcheted);
        ratcheted
    }

    /// Like [`apply`](Self::apply) but reports whether the level strictly moved.
    pub fn tighten(&mut self, proposed: f64) -> bool {
        let before = self.current_level;
        let after = self.apply(proposed);
        before != Some(after)
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    pub fn side(&self) -> Side {
        self.side
    }
}
