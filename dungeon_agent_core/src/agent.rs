use tracing::{debug, info, trace, warn};

use crate::{
    Action, Cell, Direction, Item, Position,
    config::AgentConfig,
    goal::{Candidates, Goal, GoalKind, GoalSelector, Snapshot},
    inventory::Inventory,
    map::WorldMap,
    navigator::{NavStep, Navigator},
    view::{Viewport, rotate_view},
};

/// Trait defining the behavior of an agent.
/// Agents answer every egocentric viewport with exactly one action.
pub trait Agent {
    /// Determines the action to take after seeing `viewport`.
    /// `&mut self` lets the agent keep its map and plans between turns.
    fn get_action(&mut self, viewport: &Viewport) -> Action;
}

/// Explores the dungeon, collects what it needs and brings the gold home.
///
/// The agent never learns its true coordinates. It starts at the center of a
/// map large enough to hold the whole dungeon in any direction and tracks its
/// own moves from there.
#[derive(Debug, Clone)]
pub struct DungeonAgent {
    selector: GoalSelector,
    map: WorldMap,
    inventory: Inventory,
    position: Position,
    facing: Direction,
    start: Position,
    turn: u64,
    candidates: Candidates,
    goal: Option<Goal>,
}

impl DungeonAgent {
    pub fn new(config: AgentConfig) -> Self {
        let center = config.map_size / 2;
        let start = Position::new(center, center);
        DungeonAgent {
            selector: GoalSelector::new(&config),
            map: WorldMap::new(config.map_size, start),
            inventory: Inventory::new(),
            position: start,
            facing: config.initial_facing,
            start,
            turn: 0,
            candidates: Candidates::new(),
            goal: None,
        }
    }

    pub fn map(&self) -> &WorldMap {
        &self.map
    }

    pub fn cell(&self, position: Position) -> Option<Cell> {
        self.map.cell(position)
    }

    pub fn inventory(&self) -> Inventory {
        self.inventory
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn start(&self) -> Position {
        self.start
    }

    /// Viewports observed so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    /// Back on the start cell with the gold.
    pub fn is_done(&self) -> bool {
        self.inventory.has(Item::Gold) && self.position == self.start
    }

    fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            map: &self.map,
            inventory: self.inventory,
            position: self.position,
            facing: self.facing,
            start: self.start,
        }
    }

    /// Merges an egocentric viewport into the map.
    pub fn observe(&mut self, viewport: &Viewport) {
        let world = rotate_view(viewport, self.facing);
        self.map.update(self.position, &world);
        self.candidates.record_window(&self.map, self.position);
        self.turn += 1;
    }

    fn is_stale(&self, goal: &Goal) -> bool {
        if self.position == goal.target {
            return true;
        }
        if goal.kind != GoalKind::Return && self.inventory.has(Item::Gold) {
            return true;
        }
        match goal.kind {
            GoalKind::Explore => {
                let cell = self.map.cell(goal.target);
                !self.map.has_unexplored_neighbor(goal.target)
                    && !cell.is_some_and(WorldMap::is_interesting)
            }
            GoalKind::Collect => self.map.cell(goal.target) != Some(goal.cell),
            GoalKind::Return => false,
        }
    }

    /// Picks the action for this turn from the current goal, choosing a new
    /// goal when there is none.
    pub fn decide(&mut self) -> Action {
        if self.is_done() {
            debug!("already home with the gold");
            return Action::Left;
        }

        // A goal that ends or goes off course gets one replacement per tick.
        for _ in 0..2 {
            if self.goal.as_ref().is_some_and(|goal| self.is_stale(goal)) {
                trace!("retiring stale goal at {:?}", self.goal.as_ref().map(|g| g.target));
                self.goal = None;
            }
            if self.goal.is_none() {
                self.candidates.prune(&self.map);
                self.goal = self.selector.select(&self.snapshot(), &self.candidates);
            }
            let Some(mut goal) = self.goal.take() else {
                warn!("nothing reachable from {}, turning in place", self.position);
                debug!(
                    "known map:\n{}",
                    self.map.render_explored(self.position, self.facing, self.start)
                );
                return Action::Left;
            };

            let step = Navigator::next_step(&mut goal, &self.snapshot());
            match step {
                NavStep::Act(action) => {
                    self.goal = Some(goal);
                    return action;
                }
                NavStep::Blocked(action) => {
                    warn!("path to {} is blocked, replanning next turn", goal.target);
                    return action;
                }
                NavStep::Arrived | NavStep::OffPath => {
                    debug!("goal at {} finished or lost, replanning", goal.target);
                }
            }
        }
        warn!("no usable plan from {} this turn", self.position);
        Action::Left
    }

    /// Updates the agent's own picture of itself after sending `action`.
    pub fn apply(&mut self, action: Action) {
        let ahead = self.position.step(self.facing);
        let ahead_cell = ahead.and_then(|p| self.map.cell(p));
        match (action, ahead, ahead_cell) {
            (Action::Left, ..) => self.facing = self.facing.left(),
            (Action::Right, ..) => self.facing = self.facing.right(),
            (Action::Forward, Some(next), Some(cell)) if cell.is_walkable() => {
                self.position = next;
                if let Some(item) = cell.item() {
                    self.inventory.add(item);
                    self.map.clear(next);
                    info!("picked up {:?} at {}, now holding {}", item, next, self.inventory);
                }
            }
            (Action::Chop, Some(next), Some(Cell::Tree)) if self.inventory.has(Item::Axe) => {
                self.map.clear(next);
            }
            (Action::Open, Some(next), Some(Cell::Door)) if self.inventory.has(Item::Key) => {
                self.map.clear(next);
            }
            (Action::Blast, Some(next), Some(cell))
                if cell.is_obstacle() && self.inventory.has(Item::Dynamite) =>
            {
                self.inventory.use_item(Item::Dynamite);
                self.map.clear(next);
                debug!("blasted {:?} at {}, {} dynamite left", cell, next, self.inventory.get(Item::Dynamite));
            }
            (action, ..) => debug!("{} had no effect at {}", action, self.position),
        }
    }

    /// One full tick: observe, decide and record the chosen action.
    pub fn step(&mut self, viewport: &Viewport) -> Action {
        self.observe(viewport);
        let action = self.decide();
        self.apply(action);
        trace!(
            "turn {} at {} facing {:?} holding {}: {}",
            self.turn, self.position, self.facing, self.inventory, action
        );
        action
    }
}

impl Agent for DungeonAgent {
    fn get_action(&mut self, viewport: &Viewport) -> Action {
        self.step(viewport)
    }
}
