use tracing::{debug, info};

use crate::{
    Action, Cell, Direction, Item, Position, VIEW_HALF_SIZE,
    agent::Agent,
    error::EnvironmentError,
    inventory::Inventory,
    map::{Grid, offset},
    view::{Viewport, egocentric_view},
};

/// Represents the outcome of processing an agent's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    /// The action was legal but changed nothing.
    Failure(String),
    /// Back at the start holding the gold.
    Win,
    /// Walked into water.
    Lose,
}

impl ActionResult {
    /// Whether the game is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionResult::Win | ActionResult::Lose)
    }
}

/// Manages the simulation: the true dungeon and the agent's real state.
#[derive(Debug, Clone)]
pub struct Environment {
    terrain: Grid<Cell>,
    position: Position,
    facing: Direction,
    start: Position,
    inventory: Inventory,
    turns: usize,
}

impl Environment {
    pub fn new(terrain: Grid<Cell>, start: Position, facing: Direction) -> Self {
        Environment {
            terrain,
            position: start,
            facing,
            start,
            inventory: Inventory::new(),
            turns: 0,
        }
    }

    pub fn terrain(&self) -> &Grid<Cell> {
        &self.terrain
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
    pub fn inventory(&self) -> Inventory {
        self.inventory
    }
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// True terrain at `position`; everything beyond the map is water.
    pub fn cell_at(&self, position: Position) -> Cell {
        self.terrain.get(position).copied().unwrap_or(Cell::Water)
    }

    /// The window around the agent as the agent sees it: straight ahead is
    /// row 0 and the center is the agent's own cell.
    pub fn viewport(&self) -> Viewport {
        let half = VIEW_HALF_SIZE as isize;
        let world: Viewport = std::array::from_fn(|row| {
            std::array::from_fn(|col| {
                if row as isize == half && col as isize == half {
                    return Cell::Floor;
                }
                offset(self.position, col as isize - half, row as isize - half)
                    .map_or(Cell::Water, |p| self.cell_at(p))
            })
        });
        egocentric_view(&world, self.facing)
    }

    fn clear_ahead(&mut self, ahead: Position) {
        if let Err(err) = self.terrain.set(ahead, Cell::Floor) {
            debug!("nothing to clear: {}", err);
        }
    }

    /// Processes a single action for the agent.
    pub fn process_action(&mut self, action: Action) -> ActionResult {
        self.turns += 1;
        let ahead = self.position.step(self.facing);
        let ahead_cell = ahead.map_or(Cell::Water, |p| self.cell_at(p));

        match action {
            Action::Left => {
                self.facing = self.facing.left();
                ActionResult::Success
            }
            Action::Right => {
                self.facing = self.facing.right();
                ActionResult::Success
            }
            Action::Forward => match (ahead, ahead_cell) {
                (_, Cell::Water) | (None, _) => {
                    info!("agent drowned after {} turns", self.turns);
                    ActionResult::Lose
                }
                (Some(next), cell) if cell.is_walkable() => {
                    self.position = next;
                    if let Some(item) = cell.item() {
                        self.inventory.add(item);
                        self.terrain[next] = Cell::Floor;
                    }
                    if self.position == self.start && self.inventory.has(Item::Gold) {
                        info!("gold returned home after {} turns", self.turns);
                        return ActionResult::Win;
                    }
                    ActionResult::Success
                }
                (_, cell) => ActionResult::Failure(format!("Cannot walk into {:?}.", cell)),
            },
            Action::Chop => match (ahead, ahead_cell) {
                (Some(next), Cell::Tree) if self.inventory.has(Item::Axe) => {
                    self.clear_ahead(next);
                    ActionResult::Success
                }
                _ => ActionResult::Failure("Nothing to chop.".to_string()),
            },
            Action::Open => match (ahead, ahead_cell) {
                (Some(next), Cell::Door) if self.inventory.has(Item::Key) => {
                    self.clear_ahead(next);
                    ActionResult::Success
                }
                _ => ActionResult::Failure("No door to unlock.".to_string()),
            },
            Action::Blast => match (ahead, ahead_cell) {
                (Some(next), cell) if cell.is_obstacle() && self.inventory.has(Item::Dynamite) => {
                    self.inventory.use_item(Item::Dynamite);
                    self.clear_ahead(next);
                    ActionResult::Success
                }
                _ => ActionResult::Failure("Nothing to blast.".to_string()),
            },
        }
    }

    /// Shows the agent its viewport and carries out the action it picks.
    pub fn process_turn(&mut self, agent: &mut dyn Agent) -> ActionResult {
        let view = self.viewport();
        let action = agent.get_action(&view);
        let result = self.process_action(action);
        if let ActionResult::Failure(reason) = &result {
            debug!("{} failed: {}", action, reason);
        }
        result
    }

    /// Plays turns until the game ends or `max_turns` have passed. Returns
    /// the last result.
    pub fn run(&mut self, agent: &mut dyn Agent, max_turns: usize) -> ActionResult {
        let mut result = ActionResult::Success;
        for _ in 0..max_turns {
            result = self.process_turn(agent);
            if result.is_terminal() {
                break;
            }
        }
        result
    }
}

/// Loads an environment from a text map.
///
/// Rows use the cell symbols; the agent's start is one of `^ > v <`, which
/// also sets its initial facing. Short rows are padded with water. Blank
/// lines before and after the map are ignored.
pub fn load_environment_from_string(map_string: &str) -> Result<Environment, EnvironmentError> {
    let lines: Vec<&str> = map_string.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return Err(EnvironmentError::Empty);
    };
    let rows: Vec<Vec<char>> = lines[first..=last]
        .iter()
        .map(|l| l.trim_end_matches('\r').chars().collect())
        .collect();

    let height = rows.len();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut terrain = Grid::filled(width, height, Cell::Water);
    let mut agent: Option<(Position, Direction)> = None;

    for (y, row) in rows.iter().enumerate() {
        for (x, &symbol) in row.iter().enumerate() {
            let position = Position { x, y };
            let cell = if let Some(facing) = Direction::from_arrow(symbol) {
                if agent.replace((position, facing)).is_some() {
                    return Err(EnvironmentError::MultipleStarts);
                }
                Cell::Floor
            } else {
                Cell::from_symbol(symbol).ok_or(EnvironmentError::UnknownSymbol { symbol, x, y })?
            };
            terrain[position] = cell;
        }
    }

    let (start, facing) = agent.ok_or(EnvironmentError::MissingStart)?;
    Ok(Environment::new(terrain, start, facing))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<Action>);

    impl Agent for Scripted {
        fn get_action(&mut self, _viewport: &Viewport) -> Action {
            if self.0.is_empty() {
                Action::Left
            } else {
                self.0.remove(0)
            }
        }
    }

    #[test]
    fn loads_start_and_facing() {
        let env = load_environment_from_string("\n~~~~~\n~ v g\n~~~\n").unwrap();
        assert_eq!(env.start(), Position::new(2, 1));
        assert_eq!(env.facing(), Direction::South);
        assert_eq!(env.cell_at(Position::new(2, 1)), Cell::Floor);
        assert_eq!(env.cell_at(Position::new(4, 1)), Cell::Gold);
        assert_eq!(env.cell_at(Position::new(4, 2)), Cell::Water);
        assert_eq!(env.terrain().width(), 5);
        assert_eq!(env.terrain().height(), 3);
    }

    #[test]
    fn rejects_bad_maps() {
        assert_eq!(load_environment_from_string(" \n\n").unwrap_err(), EnvironmentError::Empty);
        assert_eq!(
            load_environment_from_string("~~~\n~>~\n~?~").unwrap_err(),
            EnvironmentError::UnknownSymbol {
                symbol: '?',
                x: 1,
                y: 2
            }
        );
        assert_eq!(
            load_environment_from_string("> <").unwrap_err(),
            EnvironmentError::MultipleStarts
        );
        assert_eq!(load_environment_from_string("~ ~").unwrap_err(), EnvironmentError::MissingStart);
    }

    #[test]
    fn viewport_is_egocentric_and_water_beyond_the_edge() {
        let env = load_environment_from_string("  g\n ^ \n   ").unwrap();
        let view = env.viewport();
        assert_eq!(view[2][2], Cell::Floor);
        assert_eq!(view[1][3], Cell::Gold);
        assert_eq!(view[0][0], Cell::Water);

        let env = load_environment_from_string("  g\n > \n   ").unwrap();
        // Facing east the gold is ahead and to the left.
        assert_eq!(env.viewport()[1][1], Cell::Gold);
    }

    #[test]
    fn tools_remove_obstacles() {
        let mut env = load_environment_from_string("~~~~~~~~\n~>akdT-*\n~~~~~~~~").unwrap();
        for _ in 0..3 {
            assert_eq!(env.process_action(Action::Forward), ActionResult::Success);
        }
        assert_eq!(env.inventory(), Inventory::new().with(Item::Axe).with(Item::Key).with(Item::Dynamite));
        assert!(matches!(env.process_action(Action::Forward), ActionResult::Failure(_)));
        assert_eq!(env.process_action(Action::Chop), ActionResult::Success);
        env.process_action(Action::Forward);
        assert_eq!(env.process_action(Action::Open), ActionResult::Success);
        env.process_action(Action::Forward);
        assert_eq!(env.process_action(Action::Blast), ActionResult::Success);
        assert_eq!(env.inventory().get(Item::Dynamite), 0);
        assert!(matches!(env.process_action(Action::Blast), ActionResult::Failure(_)));
        assert_eq!(env.cell_at(Position::new(7, 1)), Cell::Floor);
        // Key is kept after opening a door.
        assert!(env.inventory().has(Item::Key));
    }

    #[test]
    fn water_and_the_map_edge_drown() {
        let mut env = load_environment_from_string("~>").unwrap();
        assert_eq!(env.process_action(Action::Forward), ActionResult::Lose);
        let mut env = load_environment_from_string("~<").unwrap();
        assert_eq!(env.process_action(Action::Forward), ActionResult::Lose);
    }

    #[test]
    fn returning_with_gold_wins() {
        let mut env = load_environment_from_string("~~~~\n~>g~\n~~~~").unwrap();
        let mut agent = Scripted(vec![Action::Forward, Action::Left, Action::Left, Action::Forward]);
        assert_eq!(env.run(&mut agent, 10), ActionResult::Win);
        assert_eq!(env.turns(), 4);
    }
}
