//! [`ProgressGuard`] – stalled-exploration detector.
//!
//! Wall-hugging can circle forever around an island or through open space
//! once nothing new is in sensor range.  The guard watches coverage and
//! flags a stall after too many consecutive moves, or too many consecutive
//! sweeps, without any gain.
//!
//! # Example
//!
//! ```rust
//! use gridscout_runtime::progress_guard::ProgressGuard;
//!
//! let mut guard = ProgressGuard::new(3, 2);
//!
//! assert!(!guard.record_move(10));
//! assert!(!guard.record_move(10));
//! assert!(!guard.record_move(10));
//! assert!(guard.record_move(10)); // third move without a new cell
//!
//! // Any gain clears the streak.
//! assert!(!guard.record_move(11));
//! ```

/// Consecutive sweeps without gain tolerated by default.
pub const DEFAULT_MAX_IDLE_LAPS: usize = 3;

pub struct ProgressGuard {
    max_idle_moves: usize,
    max_idle_laps: usize,
    best_area: usize,
    idle_moves: usize,
    lap_area: usize,
    idle_laps: usize,
}

impl ProgressGuard {
    pub fn new(max_idle_moves: usize, max_idle_laps: usize) -> Self {
        Self {
            max_idle_moves,
            max_idle_laps,
            best_area: 0,
            idle_moves: 0,
            lap_area: 0,
            idle_laps: 0,
        }
    }

    /// Record coverage after a move.  Returns `true` once stalled.
    pub fn record_move(&mut self, area: usize) -> bool {
        if area > self.best_area {
            self.best_area = area;
            self.idle_moves = 0;
        } else {
            self.idle_moves += 1;
        }
        self.is_stalled()
    }

    /// Record coverage after a sweep.  Returns `true` once stalled.
    pub fn record_lap(&mut self, area: usize) -> bool {
        if area > self.lap_area {
            self.lap_area = area;
            self.idle_laps = 0;
        } else {
            self.idle_laps += 1;
        }
        self.best_area = self.best_area.max(area);
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        self.idle_moves > self.max_idle_moves || self.idle_laps >= self.max_idle_laps
    }
}
