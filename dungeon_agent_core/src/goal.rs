//! Goal scoring and selection.
//!
//! Every tick without a usable goal the [`GoalSelector`] decides what to do
//! next, in priority order:
//!
//! 1. While gold is held, plan back to the start cell.
//! 2. Otherwise walk to the nearest frontier or item found by the
//!    [`Explorer`].
//! 3. Once exploration is exhausted, rank the known candidate cells by score
//!    and plan to the best achievable one with the [`Planner`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Cell, Direction, Item, Position, VIEW_HALF_SIZE,
    config::{AgentConfig, SearchLimits},
    inventory::Inventory,
    map::{WorldMap, offset},
    search::{Explorer, Path, Planner},
};

const SCORE_TREASURE: i32 = 100;
const SCORE_TOOL: i32 = 50;
const SCORE_BREAKABLE: i32 = 70;
const SCORE_FRONTIER_MAX: i32 = 20;
const SCORE_FRONTIER_MIN: i32 = 5;
const SCORE_UNEXPLORED: i32 = -50;
const SCORE_WATER: i32 = -100;

/// Why a goal was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalKind {
    /// Nearest frontier or item found by breadth-first exploration.
    Explore,
    /// A scored candidate planned with A*.
    Collect,
    /// Carrying gold back to the start cell.
    Return,
}

/// A target cell and, once resolved, the path leading to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub target: Position,
    /// Symbol at the target when the goal was created.
    pub cell: Cell,
    pub kind: GoalKind,
    pub score: i32,
    pub path: Path,
    /// Index of the waypoint the agent currently stands on.
    pub cursor: usize,
}

impl Goal {
    pub fn new(target: Position, cell: Cell, kind: GoalKind, score: i32) -> Self {
        Goal {
            target,
            cell,
            kind,
            score,
            path: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = path;
        self.cursor = 0;
        self
    }

    pub fn is_resolved(&self) -> bool {
        !self.path.is_empty()
    }

    /// Dynamite that must already be held to claim this goal.
    ///
    /// A resolved goal needs enough to cover the deepest drop below the
    /// starting count along its path (dynamite picked up on the way counts).
    /// An unresolved one is estimated from the target alone.
    pub fn required_dynamite(&self, held: &Inventory) -> u32 {
        if let Some(first) = self.path.first() {
            let initial = first.inventory.get(Item::Dynamite);
            return self
                .path
                .iter()
                .map(|w| initial.saturating_sub(w.inventory.get(Item::Dynamite)))
                .max()
                .unwrap_or(0);
        }
        match self.cell {
            Cell::Wall => 1,
            Cell::Tree if !held.has(Item::Axe) => 1,
            Cell::Door if !held.has(Item::Key) => 1,
            _ => 0,
        }
    }

    pub fn is_achievable(&self, inventory: &Inventory) -> bool {
        inventory.get(Item::Dynamite) >= self.required_dynamite(inventory)
    }
}

/// Read-only view of the agent's state used while choosing and following
/// goals.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub map: &'a WorldMap,
    pub inventory: Inventory,
    pub position: Position,
    pub facing: Direction,
    pub start: Position,
}

/// Known cells worth planning towards: items and removable obstacles.
///
/// Filled in from each viewport window as it arrives, so choosing a goal never
/// needs to rescan the whole map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidates {
    cells: BTreeMap<Position, Cell>,
}

impl Candidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the candidates inside the view window centered on `center`.
    pub fn record_window(&mut self, map: &WorldMap, center: Position) {
        let half = VIEW_HALF_SIZE as isize;
        for dy in -half..=half {
            for dx in -half..=half {
                let Some(position) = offset(center, dx, dy) else {
                    continue;
                };
                match map.cell(position) {
                    Some(cell) if cell.is_interesting() || cell.is_obstacle() => {
                        self.cells.insert(position, cell);
                    }
                    _ => {
                        self.cells.remove(&position);
                    }
                }
            }
        }
    }

    /// Drops entries whose cell no longer holds the recorded symbol.
    pub fn prune(&mut self, map: &WorldMap) {
        self.cells
            .retain(|position, cell| map.cell(*position) == Some(*cell));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        self.cells.iter().map(|(p, c)| (*p, *c))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Quarter turns (0, 1 or 2) needed before heading from `from` towards `to`.
pub fn turning_penalty(facing: Direction, from: Position, to: Position) -> i32 {
    let dx = to.x as isize - from.x as isize;
    let dy = to.y as isize - from.y as isize;
    let (fx, fy) = facing.delta();
    let ahead = dx * fx + dy * fy;
    let sideways = dx * fy - dy * fx;
    if ahead >= 0 && sideways == 0 {
        0
    } else if ahead >= 0 {
        1
    } else {
        2
    }
}

/// Scores cells and picks the agent's next goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSelector {
    limits: SearchLimits,
    max_plan_attempts: usize,
}

impl GoalSelector {
    pub fn new(config: &AgentConfig) -> Self {
        GoalSelector {
            limits: config.limits,
            max_plan_attempts: config.max_plan_attempts,
        }
    }

    /// How desirable `position` is as a target right now.
    pub fn score(&self, snapshot: &Snapshot, position: Position) -> i32 {
        let inventory = snapshot.inventory;
        if position == snapshot.start && inventory.has(Item::Gold) {
            return SCORE_TREASURE;
        }
        let Some(cell) = snapshot.map.cell(position) else {
            return SCORE_WATER;
        };
        let breakable = |tool: Option<Item>| {
            if tool.is_some_and(|t| inventory.has(t)) || inventory.has(Item::Dynamite) {
                SCORE_BREAKABLE
            } else {
                0
            }
        };
        match cell {
            Cell::Gold => SCORE_TREASURE,
            Cell::Axe | Cell::Dynamite | Cell::Key => SCORE_TOOL,
            Cell::Tree => breakable(Some(Item::Axe)).max(1),
            Cell::Door => breakable(Some(Item::Key)).max(1),
            Cell::Wall => breakable(None),
            Cell::Floor if snapshot.map.has_unexplored_neighbor(position) => {
                let distance = snapshot.position.manhattan(&position) as i32;
                (SCORE_FRONTIER_MAX - distance).max(SCORE_FRONTIER_MIN)
            }
            Cell::Floor => 0,
            Cell::Unexplored => SCORE_UNEXPLORED,
            Cell::Water => SCORE_WATER,
        }
    }

    /// Chooses the next goal, or `None` when nothing is reachable.
    pub fn select(&self, snapshot: &Snapshot, candidates: &Candidates) -> Option<Goal> {
        if snapshot.inventory.has(Item::Gold) {
            if let Some(goal) = self.plan_return(snapshot) {
                return Some(goal);
            }
        }
        if let Some(goal) = self.explore(snapshot) {
            return Some(goal);
        }
        self.plan_best_candidate(snapshot, candidates)
    }

    fn plan_return(&self, snapshot: &Snapshot) -> Option<Goal> {
        let planner = Planner::new(snapshot.map, self.limits);
        match planner.search_a_star(snapshot.start, snapshot.position, snapshot.inventory) {
            Ok(path) => {
                debug!("heading home to {} ({} steps)", snapshot.start, path.len() - 1);
                let cell = snapshot.map.cell(snapshot.start).unwrap_or(Cell::Floor);
                let score = self.score(snapshot, snapshot.start);
                Some(Goal::new(snapshot.start, cell, GoalKind::Return, score).with_path(path))
            }
            Err(err) => {
                debug!("no way home yet: {}", err);
                None
            }
        }
    }

    fn explore(&self, snapshot: &Snapshot) -> Option<Goal> {
        let path = Explorer::new(snapshot.map).explore(snapshot.position, snapshot.inventory)?;
        let target = path.last()?.position;
        let cell = snapshot.map.cell(target)?;
        let score = self.score(snapshot, target);
        debug!("exploring towards {} '{}' (score {})", target, cell.symbol(), score);
        Some(Goal::new(target, cell, GoalKind::Explore, score).with_path(path))
    }

    fn plan_best_candidate(&self, snapshot: &Snapshot, candidates: &Candidates) -> Option<Goal> {
        let map = snapshot.map;
        let mut ranked: Vec<(i32, Goal)> = candidates
            .iter()
            .filter(|(position, cell)| map.cell(*position) == Some(*cell))
            .filter(|(position, cell)| !cell.is_obstacle() || map.has_unexplored_neighbor(*position))
            .filter_map(|(position, cell)| {
                let score = self.score(snapshot, position);
                if score <= 0 {
                    return None;
                }
                let goal = Goal::new(position, cell, GoalKind::Collect, score);
                if !goal.is_achievable(&snapshot.inventory) {
                    return None;
                }
                let rank = score - turning_penalty(snapshot.facing, snapshot.position, position);
                Some((rank, goal))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.target.cmp(&b.1.target)));
        debug!("exploration exhausted, {} ranked candidates", ranked.len());

        let planner = Planner::new(map, self.limits);
        for (rank, goal) in ranked.into_iter().take(self.max_plan_attempts) {
            match planner.search_a_star(goal.target, snapshot.position, snapshot.inventory) {
                Ok(path) => {
                    let goal = goal.with_path(path);
                    if goal.is_achievable(&snapshot.inventory) {
                        debug!(
                            "planned to '{}' at {} (rank {})",
                            goal.cell.symbol(),
                            goal.target,
                            rank
                        );
                        return Some(goal);
                    }
                }
                Err(err) => debug!("candidate {} skipped: {}", goal.target, err),
            }
        }
        None
    }
}
