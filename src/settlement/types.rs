//! Core types for the settlement orchestration core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job#{}", self.0)
    }
}

/// Unique identifier for a world entity (item stack, creature, furniture)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}", self.0)
    }
}

/// Unique identifier for a room
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Room#{}", self.0)
    }
}

/// Unique identifier for a resource claim, scoped to the tracker that issued it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub u64);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allocation#{}", self.0)
    }
}

/// Season of the year
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Get all seasons in year order
    pub fn all() -> &'static [Season] {
        &[Season::Spring, Season::Summer, Season::Autumn, Season::Winter]
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }
}

/// Job priority, ordered lowest to highest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

impl JobPriority {
    /// Get all priorities in ascending order
    pub fn all() -> &'static [JobPriority] {
        &[
            JobPriority::Lowest,
            JobPriority::Low,
            JobPriority::Normal,
            JobPriority::High,
            JobPriority::Highest,
        ]
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            JobPriority::Lowest => "Lowest",
            JobPriority::Low => "Low",
            JobPriority::Normal => "Normal",
            JobPriority::High => "High",
            JobPriority::Highest => "Highest",
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

/// Tile coordinate on the settlement map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: usize,
    pub y: usize,
}

impl TileCoord {
    pub fn new(x: usize, y: usize) -> Self {
        TileCoord { x, y }
    }

    /// Manhattan distance to another coordinate
    pub fn distance_to(&self, other: &TileCoord) -> usize {
        let dx = (self.x as i32 - other.x as i32).unsigned_abs() as usize;
        let dy = (self.y as i32 - other.y as i32).unsigned_abs() as usize;
        dx + dy
    }

    /// Coordinate offset by a signed delta, clamped at zero
    pub fn offset(&self, dx: i32, dy: i32) -> TileCoord {
        TileCoord {
            x: (self.x as i32 + dx).max(0) as usize,
            y: (self.y as i32 + dy).max(0) as usize,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
