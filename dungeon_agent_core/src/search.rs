//! State-space search over the agent's map.
//!
//! Both searches work on [`SearchState`] nodes stored in an arena and linked
//! to their parent by index. A node carries its own inventory snapshot and
//! the set of cells destroyed on the way to it, so looking ahead through a
//! tree or a wall never touches the canonical [`WorldMap`].
//!
//! - [`Explorer`] is a breadth-first search that never consumes items and
//!   stops at the nearest frontier or item.
//! - [`Planner`] is an A* search that may spend dynamite and stops when the
//!   requested cell is reached with any inventory.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Cell, Direction, Item, Position, config::SearchLimits, error::PlanError,
    inventory::Inventory, map::WorldMap,
};

/// One step of a resolved path: where the agent stands and what it would be
/// holding once there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Position,
    pub inventory: Inventory,
}

/// Ordered waypoints, from the agent's position to the target inclusive.
pub type Path = Vec<Waypoint>;

/// A compact search node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub position: Position,
    pub inventory: Inventory,
    /// Cells removed along this branch only.
    pub destroyed: BTreeSet<Position>,
    /// Arena index of the node this one was expanded from.
    pub parent: Option<usize>,
    /// Accumulated cost from the start.
    pub g: u32,
    /// `g` plus the heuristic estimate to the goal.
    pub f: u32,
    /// Number of moves from the start on this branch.
    pub moves: usize,
}

/// Identity of a node for planning: two branches that stand on the same cell
/// with the same items and the same cells removed are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    position: Position,
    inventory: Inventory,
    destroyed: BTreeSet<Position>,
}

impl SearchState {
    pub fn root(position: Position, inventory: Inventory) -> Self {
        SearchState {
            position,
            inventory,
            destroyed: BTreeSet::new(),
            parent: None,
            g: 0,
            f: 0,
            moves: 0,
        }
    }

    /// The cell at `position` as seen from this branch.
    pub fn effective_cell(&self, map: &WorldMap, position: Position) -> Option<Cell> {
        if self.destroyed.contains(&position) {
            Some(Cell::Floor)
        } else {
            map.cell(position)
        }
    }

    /// Step cost between two cells (euclidean, 1 for orthogonal neighbours).
    pub fn cost(&self, other: &SearchState) -> u32 {
        let dx = self.position.x.abs_diff(other.position.x) as f64;
        let dy = self.position.y.abs_diff(other.position.y) as f64;
        (dx * dx + dy * dy).sqrt() as u32
    }

    fn plan_key(&self) -> PlanKey {
        PlanKey {
            position: self.position,
            inventory: self.inventory,
            destroyed: self.destroyed.clone(),
        }
    }

    fn child(&self, position: Position) -> SearchState {
        SearchState {
            position,
            inventory: self.inventory,
            destroyed: self.destroyed.clone(),
            parent: None,
            g: self.g,
            f: self.f,
            moves: self.moves + 1,
        }
    }

    /// Every state reachable with one orthogonal move inside the explored
    /// area.
    ///
    /// Items are picked up on entry. Trees and doors are passed with an axe
    /// or key; when `use_items` is set, dynamite opens trees, doors and
    /// walls. The returned states have no parent yet.
    pub fn neighbours(&self, map: &WorldMap, use_items: bool) -> Vec<SearchState> {
        let mut neighbours = Vec::with_capacity(4);
        for direction in Direction::ALL {
            let Some(next) = self.position.step(direction) else {
                continue;
            };
            if !map.in_explored_bounds(next) {
                continue;
            }
            let Some(cell) = self.effective_cell(map, next) else {
                continue;
            };

            let mut child = self.child(next);
            match cell {
                Cell::Floor => {}
                Cell::Axe | Cell::Dynamite | Cell::Key | Cell::Gold => {
                    if let Some(item) = cell.item() {
                        child.inventory.add(item);
                    }
                    child.destroyed.insert(next);
                }
                Cell::Tree | Cell::Door | Cell::Wall => {
                    let tool = match cell {
                        Cell::Tree => Some(Item::Axe),
                        Cell::Door => Some(Item::Key),
                        _ => None,
                    };
                    if tool.is_some_and(|t| self.inventory.has(t)) {
                        child.destroyed.insert(next);
                    } else if use_items && self.inventory.has(Item::Dynamite) {
                        child.inventory.use_item(Item::Dynamite);
                        child.destroyed.insert(next);
                    } else {
                        continue;
                    }
                }
                Cell::Water | Cell::Unexplored => continue,
            }
            neighbours.push(child);
        }
        neighbours
    }
}

/// Search nodes addressed by index.
#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<SearchState>,
}

impl Arena {
    fn push(&mut self, node: SearchState) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Walks parent links from `index` back to the root.
    fn path_to(&self, index: usize) -> Path {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = &self.nodes[i];
            path.push(Waypoint {
                position: node.position,
                inventory: node.inventory,
            });
            current = node.parent;
        }
        path.reverse();
        path
    }
}

/// Open-set entry: lowest `f` first, deeper nodes first on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    g: u32,
    index: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Inventory-aware A* towards a single cell.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    map: &'a WorldMap,
    limits: SearchLimits,
}

impl<'a> Planner<'a> {
    pub fn new(map: &'a WorldMap, limits: SearchLimits) -> Self {
        Planner { map, limits }
    }

    fn heuristic(from: Position, goal: Position) -> u32 {
        from.manhattan(&goal) as u32
    }

    /// Finds the cheapest path from `start` to `goal`, spending items held in
    /// `inventory` (and picked up on the way) where needed.
    ///
    /// Targets outside the map, in water or still unexplored are rejected
    /// before any search work is done.
    pub fn search_a_star(
        &self,
        goal: Position,
        start: Position,
        inventory: Inventory,
    ) -> Result<Path, PlanError> {
        let cell = self
            .map
            .cell(goal)
            .ok_or(PlanError::OutOfBounds { target: goal })?;
        if matches!(cell, Cell::Water | Cell::Unexplored) {
            return Err(PlanError::UntraversableTarget { target: goal, cell });
        }

        let mut arena = Arena::default();
        let mut open = BinaryHeap::new();
        let mut best_cost: HashMap<PlanKey, u32> = HashMap::new();
        let mut closed: HashSet<PlanKey> = HashSet::new();

        let mut root = SearchState::root(start, inventory);
        root.f = Self::heuristic(start, goal);
        best_cost.insert(root.plan_key(), 0);
        let (f, g) = (root.f, root.g);
        let index = arena.push(root);
        open.push(OpenEntry { f, g, index });

        let mut expansions = 0;
        while let Some(OpenEntry { index, .. }) = open.pop() {
            let node = &arena.nodes[index];
            if node.position == goal {
                let path = arena.path_to(index);
                debug!(
                    "A* reached {} in {} steps after {} expansions",
                    goal,
                    path.len().saturating_sub(1),
                    expansions
                );
                return Ok(path);
            }
            if !closed.insert(node.plan_key()) {
                continue;
            }

            expansions += 1;
            if expansions > self.limits.max_expansions {
                debug!("A* towards {} hit the expansion ceiling", goal);
                return Err(PlanError::ExpansionLimit {
                    target: goal,
                    expansions: self.limits.max_expansions,
                });
            }
            if node.moves >= self.limits.max_moves {
                continue;
            }

            let current_g = node.g;
            let children: Vec<SearchState> = node
                .neighbours(self.map, true)
                .into_iter()
                .map(|child| {
                    let step = node.cost(&child);
                    let mut child = child;
                    child.g = current_g + step;
                    child.f = child.g + Self::heuristic(child.position, goal);
                    child.parent = Some(index);
                    child
                })
                .collect();

            for child in children {
                let key = child.plan_key();
                if closed.contains(&key) {
                    continue;
                }
                if best_cost.get(&key).is_some_and(|&known| known <= child.g) {
                    continue;
                }
                best_cost.insert(key, child.g);
                let (f, g) = (child.f, child.g);
                let index = arena.push(child);
                open.push(OpenEntry { f, g, index });
            }
        }

        trace!("A* exhausted {} states without reaching {}", expansions, goal);
        Err(PlanError::Unreachable { target: goal })
    }
}

/// Breadth-first search for the nearest cell worth walking to.
#[derive(Debug, Clone, Copy)]
pub struct Explorer<'a> {
    map: &'a WorldMap,
}

impl<'a> Explorer<'a> {
    pub fn new(map: &'a WorldMap) -> Self {
        Explorer { map }
    }

    fn is_target(&self, position: Position) -> bool {
        self.map.has_unexplored_neighbor(position)
            || self.map.cell(position).is_some_and(WorldMap::is_interesting)
    }

    /// Path to the closest cell, other than `start`, that borders unexplored
    /// territory or holds an item. Only free moves are considered: no
    /// dynamite is spent. Returns `None` once everything reachable has been
    /// visited.
    pub fn explore(&self, start: Position, inventory: Inventory) -> Option<Path> {
        let mut arena = Arena::default();
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();

        visited.insert(start);
        queue.push_back(arena.push(SearchState::root(start, inventory)));

        while let Some(index) = queue.pop_front() {
            let node = &arena.nodes[index];
            if node.position != start && self.is_target(node.position) {
                trace!("explorer picked {} after {} nodes", node.position, arena.nodes.len());
                return Some(arena.path_to(index));
            }

            let children: Vec<SearchState> = node
                .neighbours(self.map, false)
                .into_iter()
                .filter(|child| visited.insert(child.position))
                .map(|mut child| {
                    child.g = node.g + 1;
                    child.parent = Some(index);
                    child
                })
                .collect();

            for child in children {
                queue.push_back(arena.push(child));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(path: &Path) -> Vec<Position> {
        path.iter().map(|w| w.position).collect()
    }

    fn neighbour_at(state: &SearchState, map: &WorldMap, use_items: bool, at: Position) -> Option<SearchState> {
        state
            .neighbours(map, use_items)
            .into_iter()
            .find(|n| n.position == at)
    }

    #[test]
    fn floor_and_items_are_entered() {
        let map = WorldMap::from_rows(&["~~~~~", "~ a ~", "~~~~~"]);
        let state = SearchState::root(Position::new(1, 1), Inventory::new());

        let pickup = neighbour_at(&state, &map, false, Position::new(2, 1)).unwrap();
        assert_eq!(pickup.inventory.get(Item::Axe), 1);
        assert!(pickup.destroyed.contains(&Position::new(2, 1)));
        assert_eq!(pickup.effective_cell(&map, Position::new(2, 1)), Some(Cell::Floor));
        // The canonical map still shows the axe.
        assert_eq!(map.cell(Position::new(2, 1)), Some(Cell::Axe));

        // Water is never entered.
        assert!(neighbour_at(&state, &map, true, Position::new(1, 0)).is_none());
    }

    #[test]
    fn tree_needs_axe_or_dynamite() {
        let map = WorldMap::from_rows(&["~~~~", "~ T~", "~~~~"]);
        let tree = Position::new(2, 1);
        let empty = SearchState::root(Position::new(1, 1), Inventory::new());
        assert!(neighbour_at(&empty, &map, true, tree).is_none());

        let with_axe = SearchState::root(Position::new(1, 1), Inventory::new().with(Item::Axe));
        let chopped = neighbour_at(&with_axe, &map, false, tree).unwrap();
        assert_eq!(chopped.inventory, with_axe.inventory);
        assert!(chopped.destroyed.contains(&tree));

        let with_dynamite =
            SearchState::root(Position::new(1, 1), Inventory::new().with(Item::Dynamite));
        assert!(neighbour_at(&with_dynamite, &map, false, tree).is_none());
        let blasted = neighbour_at(&with_dynamite, &map, true, tree).unwrap();
        assert_eq!(blasted.inventory.get(Item::Dynamite), 0);
        assert!(blasted.destroyed.contains(&tree));
        assert_eq!(map.cell(tree), Some(Cell::Tree));
    }

    #[test]
    fn door_opens_with_key_without_spending_it() {
        let map = WorldMap::from_rows(&["~~~~", "~ -~", "~~~~"]);
        let door = Position::new(2, 1);
        let state = SearchState::root(Position::new(1, 1), Inventory::new().with(Item::Key));
        let opened = neighbour_at(&state, &map, false, door).unwrap();
        assert_eq!(opened.inventory.get(Item::Key), 1);
    }

    #[test]
    fn wall_only_falls_to_dynamite_when_items_are_allowed() {
        let map = WorldMap::from_rows(&["~~~~", "~ *~", "~~~~"]);
        let wall = Position::new(2, 1);
        let tools = Inventory::new().with(Item::Axe).with(Item::Key);
        let state = SearchState::root(Position::new(1, 1), tools);
        assert!(neighbour_at(&state, &map, true, wall).is_none());

        let state = SearchState::root(Position::new(1, 1), tools.with(Item::Dynamite));
        assert!(neighbour_at(&state, &map, false, wall).is_none());
        let blasted = neighbour_at(&state, &map, true, wall).unwrap();
        assert_eq!(blasted.inventory.get(Item::Dynamite), 0);
    }

    #[test]
    fn neighbours_stay_inside_explored_bounds() {
        let center = Position::new(5, 5);
        let mut map = WorldMap::new(10, center);
        map.update(center, &crate::map::viewport_from_rows(["     "; 5]));
        // Known floor, but outside what has been observed.
        map.clear(Position::new(8, 5));
        let state = SearchState::root(Position::new(7, 5), Inventory::new());
        assert!(neighbour_at(&state, &map, true, Position::new(8, 5)).is_none());
        assert!(neighbour_at(&state, &map, true, Position::new(6, 5)).is_some());
    }

    #[test]
    fn a_star_finds_shortest_path_to_goal() {
        let map = WorldMap::from_rows(&[
            "~~~~~~~",
            "~     ~",
            "~ *** ~",
            "~   g ~",
            "~~~~~~~",
        ]);
        let start = Position::new(1, 1);
        let goal = Position::new(4, 3);
        let path = Planner::new(&map, SearchLimits::default())
            .search_a_star(goal, start, Inventory::new())
            .unwrap();
        assert_eq!(path.first().unwrap().position, start);
        assert_eq!(path.last().unwrap().position, goal);
        assert_eq!(path.len(), 6);
        for pair in path.windows(2) {
            assert_eq!(pair[0].position.manhattan(&pair[1].position), 1);
        }
        assert_eq!(path.last().unwrap().inventory.get(Item::Gold), 1);
    }

    #[test]
    fn a_star_rejects_untraversable_targets() {
        let map = WorldMap::from_rows(&["~~~", "~ ~", "~~~"]);
        let planner = Planner::new(&map, SearchLimits::default());
        let start = Position::new(1, 1);
        assert_eq!(
            planner.search_a_star(Position::new(0, 1), start, Inventory::new()),
            Err(PlanError::UntraversableTarget {
                target: Position::new(0, 1),
                cell: Cell::Water
            })
        );
        assert_eq!(
            planner.search_a_star(Position::new(40, 1), start, Inventory::new()),
            Err(PlanError::OutOfBounds {
                target: Position::new(40, 1)
            })
        );
    }

    #[test]
    fn a_star_reports_unreachable_goals() {
        let map = WorldMap::from_rows(&["~~~~~", "~ * ~", "~~~~~"]);
        let result = Planner::new(&map, SearchLimits::default()).search_a_star(
            Position::new(3, 1),
            Position::new(1, 1),
            Inventory::new(),
        );
        assert_eq!(
            result,
            Err(PlanError::Unreachable {
                target: Position::new(3, 1)
            })
        );
    }

    #[test]
    fn a_star_spends_dynamite_on_a_blocking_wall() {
        let map = WorldMap::from_rows(&["~~~~~", "~ * ~", "~~~~~"]);
        let inventory = Inventory::new().with(Item::Dynamite);
        let path = Planner::new(&map, SearchLimits::default())
            .search_a_star(Position::new(3, 1), Position::new(1, 1), inventory)
            .unwrap();
        assert_eq!(
            positions(&path),
            vec![Position::new(1, 1), Position::new(2, 1), Position::new(3, 1)]
        );
        assert_eq!(path[0].inventory.get(Item::Dynamite), 1);
        assert_eq!(path[2].inventory.get(Item::Dynamite), 0);
    }

    #[test]
    fn a_star_picks_up_dynamite_before_blasting() {
        let map = WorldMap::from_rows(&["~~~~~~", "~d * ~", "~~~~~~"]);
        let path = Planner::new(&map, SearchLimits::default())
            .search_a_star(Position::new(4, 1), Position::new(2, 1), Inventory::new())
            .unwrap();
        assert_eq!(
            positions(&path),
            vec![
                Position::new(2, 1),
                Position::new(1, 1),
                Position::new(2, 1),
                Position::new(3, 1),
                Position::new(4, 1)
            ]
        );
    }

    #[test]
    fn a_star_respects_expansion_ceiling() {
        let map = WorldMap::from_rows(&["~~~~~~~~", "~      ~", "~~~~~~~~"]);
        let limits = SearchLimits {
            max_expansions: 2,
            max_moves: 100,
        };
        let result = Planner::new(&map, limits).search_a_star(
            Position::new(6, 1),
            Position::new(1, 1),
            Inventory::new(),
        );
        assert!(matches!(result, Err(PlanError::ExpansionLimit { .. })));
    }

    #[test]
    fn explorer_heads_for_the_nearest_frontier() {
        // Right half is unknown.
        let map = WorldMap::from_rows(&[
            "~~~~~~xxxx",
            "~     xxxx",
            "~     xxxx",
            "~~~~~~xxxx",
        ]);
        let start = Position::new(1, 1);
        let path = Explorer::new(&map).explore(start, Inventory::new()).unwrap();
        let end = path.last().unwrap().position;
        assert_eq!(path.first().unwrap().position, start);
        assert_ne!(end, start);
        assert!(map.has_unexplored_neighbor(end));
        // Nearest cell whose view perimeter reaches the unknown columns.
        assert_eq!(end, Position::new(4, 1));
    }

    #[test]
    fn explorer_stops_at_items() {
        // Nothing is unexplored; the key is the only reason to move.
        let map = WorldMap::from_rows(&["~~~~~~~~~", "~  k    ~", "~~~~~~~~~"]);
        let start = Position::new(7, 1);
        let path = Explorer::new(&map).explore(start, Inventory::new()).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.last().unwrap().position, Position::new(3, 1));
    }

    #[test]
    fn explorer_is_exhausted_in_a_known_room() {
        let map = WorldMap::from_rows(&["~~~~~~~", "~     ~", "~  *  ~", "~     ~", "~~~~~~~"]);
        assert!(Explorer::new(&map).explore(Position::new(1, 1), Inventory::new()).is_none());
    }

    #[test]
    fn explorer_never_spends_dynamite() {
        let map = WorldMap::from_rows(&["~~~~~~~~~", "~ * g   ~", "~~~~~~~~~"]);
        let inventory = Inventory::new().with(Item::Dynamite);
        assert!(Explorer::new(&map).explore(Position::new(1, 1), inventory).is_none());
    }
}
