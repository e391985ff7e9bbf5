use serde::{Deserialize, Serialize};

use crate::Direction;

/// Hard ceilings on a single search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Maximum number of nodes popped from the open set.
    pub max_expansions: usize,
    /// Maximum path length (in moves) a branch may reach before it stops
    /// being expanded.
    pub max_moves: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_expansions: 200_000,
            max_moves: 10_000,
        }
    }
}

/// Tunables for a [`DungeonAgent`](crate::agent::DungeonAgent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Width and height of the agent's local map. The agent starts at its
    /// center, so this must be at least twice the largest dungeon dimension.
    pub map_size: usize,
    /// Facing the agent assumes on its first turn.
    pub initial_facing: Direction,
    pub limits: SearchLimits,
    /// How many ranked candidates are planned with A* once exploration is
    /// exhausted.
    pub max_plan_attempts: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            map_size: 160,
            initial_facing: Direction::East,
            limits: SearchLimits::default(),
            max_plan_attempts: 8,
        }
    }
}
