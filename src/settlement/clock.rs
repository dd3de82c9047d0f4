//! Simulation clock
//!
//! Accumulated-time counter driving interval-gated room updates and
//! season-sensitive decisions. Cooperative polling, no real parallelism.

use serde::{Deserialize, Serialize};

use crate::settlement::types::Season;

/// Default length of one season in simulated seconds
pub const DEFAULT_SEASON_LENGTH: f64 = 240.0;

/// Simulation clock tracking elapsed time and the derived season
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimClock {
    elapsed: f64,
    season_length: f64,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock {
            elapsed: 0.0,
            season_length: DEFAULT_SEASON_LENGTH,
        }
    }

    pub fn with_season_length(season_length: f64) -> Self {
        SimClock {
            elapsed: 0.0,
            season_length,
        }
    }

    /// Advance the clock by a slice of simulated time
    pub fn advance(&mut self, elapsed: f64) {
        self.elapsed += elapsed;
    }

    /// Current simulation time in seconds
    pub fn current_sim_time(&self) -> f64 {
        self.elapsed
    }

    /// Season derived from elapsed time
    pub fn current_season(&self) -> Season {
        let seasons = Season::all();
        let index = (self.elapsed / self.season_length) as usize % seasons.len();
        seasons[index]
    }

    /// Jump to the start of a specific season in the current year
    pub fn set_season(&mut self, season: Season) {
        let seasons = Season::all();
        let index = seasons.iter().position(|s| *s == season).unwrap_or(0);
        let year_length = self.season_length * seasons.len() as f64;
        let year_start = (self.elapsed / year_length).floor() * year_length;
        self.elapsed = year_start + index as f64 * self.season_length;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        SimClock::new()
    }
}
