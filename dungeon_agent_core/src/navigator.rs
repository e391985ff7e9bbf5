//! Turns the current goal's path into one primitive action per tick.

use tracing::trace;

use crate::{
    Action, Cell, Direction, Item,
    goal::{Goal, Snapshot},
    inventory::Inventory,
};

/// Outcome of asking the [`Navigator`] for the next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStep {
    /// Send this action and keep the goal.
    Act(Action),
    /// The agent stands on the goal's target.
    Arrived,
    /// The agent is not on the remaining path; the goal should be replanned.
    OffPath,
    /// The next cell cannot be entered with what is held. Send the action and
    /// drop the goal.
    Blocked(Action),
}

/// Follows a resolved path one waypoint at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Navigator;

impl Navigator {
    /// Next action along `goal.path`, advancing its cursor when the agent is
    /// about to step forward.
    pub fn next_step(goal: &mut Goal, snapshot: &Snapshot) -> NavStep {
        let here = snapshot.position;
        let Some(index) = goal
            .path
            .iter()
            .enumerate()
            .skip(goal.cursor)
            .find(|(_, waypoint)| waypoint.position == here)
            .map(|(i, _)| i)
        else {
            return NavStep::OffPath;
        };
        goal.cursor = index;

        let Some(next) = goal.path.get(index + 1).map(|w| w.position) else {
            return NavStep::Arrived;
        };
        let Some(heading) = here.direction_to(&next) else {
            return NavStep::OffPath;
        };
        if snapshot.facing != heading {
            return NavStep::Act(Self::turn_towards(snapshot.facing, heading));
        }

        let ahead = snapshot.map.cell(next).unwrap_or(Cell::Water);
        match Self::action_for(ahead, &snapshot.inventory) {
            Some(Action::Forward) => {
                goal.cursor = index + 1;
                NavStep::Act(Action::Forward)
            }
            Some(action) => NavStep::Act(action),
            None => {
                trace!("path blocked at {} by '{}'", next, ahead.symbol());
                NavStep::Blocked(Action::Left)
            }
        }
    }

    /// A single quarter turn towards `heading`. Reversals start with a left
    /// turn.
    pub fn turn_towards(facing: Direction, heading: Direction) -> Action {
        match facing.left_turns_to(heading) {
            3 => Action::Right,
            _ => Action::Left,
        }
    }

    /// What to do when facing `cell`: walk in, or remove it first.
    pub fn action_for(cell: Cell, inventory: &Inventory) -> Option<Action> {
        if cell.is_walkable() {
            return Some(Action::Forward);
        }
        let dynamite = inventory.has(Item::Dynamite);
        match cell {
            Cell::Tree if inventory.has(Item::Axe) => Some(Action::Chop),
            Cell::Door if inventory.has(Item::Key) => Some(Action::Open),
            Cell::Tree | Cell::Door | Cell::Wall if dynamite => Some(Action::Blast),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Position,
        config::SearchLimits,
        goal::GoalKind,
        map::WorldMap,
        search::Planner,
    };

    fn planned(map: &WorldMap, from: Position, to: Position, inventory: Inventory) -> Goal {
        let path = Planner::new(map, SearchLimits::default())
            .search_a_star(to, from, inventory)
            .unwrap();
        let cell = map.cell(to).unwrap();
        Goal::new(to, cell, GoalKind::Collect, 100).with_path(path)
    }

    fn snapshot(map: &WorldMap, position: Position, facing: Direction, inventory: Inventory) -> Snapshot<'_> {
        Snapshot {
            map,
            inventory,
            position,
            facing,
            start: position,
        }
    }

    #[test]
    fn corridor_to_gold_is_two_forward_steps() {
        let map = WorldMap::from_rows(&["~~~~~", "~  g~", "~~~~~"]);
        let mut goal = planned(&map, Position::new(1, 1), Position::new(3, 1), Inventory::new());
        assert_eq!(goal.path.len(), 3);

        let inventory = Inventory::new();
        let first = Navigator::next_step(&mut goal, &snapshot(&map, Position::new(1, 1), Direction::East, inventory));
        assert_eq!(first, NavStep::Act(Action::Forward));
        let second = Navigator::next_step(&mut goal, &snapshot(&map, Position::new(2, 1), Direction::East, inventory));
        assert_eq!(second, NavStep::Act(Action::Forward));
        let third = Navigator::next_step(&mut goal, &snapshot(&map, Position::new(3, 1), Direction::East, inventory));
        assert_eq!(third, NavStep::Arrived);
    }

    #[test]
    fn turns_take_the_short_way_round() {
        assert_eq!(Navigator::turn_towards(Direction::East, Direction::North), Action::Left);
        assert_eq!(Navigator::turn_towards(Direction::East, Direction::South), Action::Right);
        assert_eq!(Navigator::turn_towards(Direction::East, Direction::West), Action::Left);
        assert_eq!(Navigator::turn_towards(Direction::South, Direction::East), Action::Left);
    }

    #[test]
    fn faces_the_next_waypoint_before_moving() {
        let map = WorldMap::from_rows(&["~~~~", "~ g~", "~~~~"]);
        let mut goal = planned(&map, Position::new(1, 1), Position::new(2, 1), Inventory::new());
        let step = Navigator::next_step(
            &mut goal,
            &snapshot(&map, Position::new(1, 1), Direction::South, Inventory::new()),
        );
        assert_eq!(step, NavStep::Act(Action::Left));
        assert_eq!(goal.cursor, 0);
    }

    #[test]
    fn chops_with_an_axe_instead_of_blasting() {
        let map = WorldMap::from_rows(&["~~~~~", "~ Tg~", "~~~~~"]);
        let inventory = Inventory::new().with(Item::Axe);
        let mut goal = planned(&map, Position::new(1, 1), Position::new(3, 1), inventory);
        let step = Navigator::next_step(
            &mut goal,
            &snapshot(&map, Position::new(1, 1), Direction::East, inventory),
        );
        assert_eq!(step, NavStep::Act(Action::Chop));
        assert_eq!(goal.cursor, 0);
    }

    #[test]
    fn removal_actions_follow_the_inventory() {
        let empty = Inventory::new();
        let key = Inventory::new().with(Item::Key);
        let dynamite = Inventory::new().with(Item::Dynamite);
        assert_eq!(Navigator::action_for(Cell::Gold, &empty), Some(Action::Forward));
        assert_eq!(Navigator::action_for(Cell::Door, &key), Some(Action::Open));
        assert_eq!(Navigator::action_for(Cell::Door, &dynamite), Some(Action::Blast));
        assert_eq!(Navigator::action_for(Cell::Wall, &dynamite), Some(Action::Blast));
        assert_eq!(Navigator::action_for(Cell::Wall, &key), None);
        assert_eq!(Navigator::action_for(Cell::Tree, &empty), None);
        assert_eq!(Navigator::action_for(Cell::Water, &dynamite), None);
    }

    #[test]
    fn blocked_when_the_tool_is_gone() {
        let map = WorldMap::from_rows(&["~~~~~", "~ *g~", "~~~~~"]);
        let armed = Inventory::new().with(Item::Dynamite);
        let mut goal = planned(&map, Position::new(1, 1), Position::new(3, 1), armed);
        let step = Navigator::next_step(
            &mut goal,
            &snapshot(&map, Position::new(1, 1), Direction::East, Inventory::new()),
        );
        assert_eq!(step, NavStep::Blocked(Action::Left));
    }

    #[test]
    fn off_path_when_the_agent_strays() {
        let map = WorldMap::from_rows(&["~~~~~", "~  g~", "~   ~", "~~~~~"]);
        let mut goal = planned(&map, Position::new(1, 1), Position::new(3, 1), Inventory::new());
        let step = Navigator::next_step(
            &mut goal,
            &snapshot(&map, Position::new(1, 2), Direction::East, Inventory::new()),
        );
        assert_eq!(step, NavStep::OffPath);
    }
}
