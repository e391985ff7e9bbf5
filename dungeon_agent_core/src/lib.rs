use std::fmt;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod goal;
pub mod inventory;
pub mod map;
pub mod navigator;
pub mod protocol;
pub mod search;
pub mod view;

/// Width and height of the viewport the game engine sends each turn.
pub const VIEW_SIZE: usize = 5;
/// Distance from the viewport center to its edge.
pub const VIEW_HALF_SIZE: usize = VIEW_SIZE / 2;
/// Render-only symbol for the start cell. Never stored in a map.
pub const START_MARKER: char = 'S';

/// Represents a 2D coordinate. `y` grows towards the south.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Returns the neighbouring position in the given direction, or `None`
    /// if it would underflow.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Direction of an orthogonally adjacent position, `None` otherwise.
    pub fn direction_to(&self, other: &Position) -> Option<Direction> {
        let dx = other.x as isize - self.x as isize;
        let dy = other.y as isize - self.y as isize;
        Direction::ALL.into_iter().find(|d| d.delta() == (dx, dy))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// Compass direction the agent can face.
///
/// Variants are ordered counter-clockwise starting from east, so a left turn
/// is `+1` and a right turn is `+3` modulo four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    East,
    North,
    West,
    South,
}

impl Direction {
    /// All directions in counter-clockwise order from east.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    /// Direction after a 90° counter-clockwise turn.
    pub fn left(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Direction after a 90° clockwise turn.
    pub fn right(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Number of counter-clockwise quarter turns needed to face `target`.
    pub fn left_turns_to(self, target: Direction) -> usize {
        (target.index() + 4 - self.index()) % 4
    }

    /// Unit vector `(dx, dy)` of a single step.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::East => (1, 0),
            Direction::North => (0, -1),
            Direction::West => (-1, 0),
            Direction::South => (0, 1),
        }
    }

    /// Arrow glyph used when rendering the agent.
    pub fn arrow(self) -> char {
        match self {
            Direction::East => '>',
            Direction::North => '^',
            Direction::West => '<',
            Direction::South => 'v',
        }
    }

    pub fn from_arrow(c: char) -> Option<Self> {
        match c {
            '>' => Some(Direction::East),
            '^' => Some(Direction::North),
            '<' => Some(Direction::West),
            'v' => Some(Direction::South),
            _ => None,
        }
    }
}

/// Items that can be picked up and held in an inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    Axe,
    Dynamite,
    Key,
    Gold,
}

impl Item {
    pub const ALL: [Item; 4] = [Item::Axe, Item::Dynamite, Item::Key, Item::Gold];

    pub fn symbol(self) -> char {
        Cell::from(self).symbol()
    }
}

/// Represents the symbol observed at a single map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    Floor,
    #[default]
    Unexplored,
    Wall,
    Tree,
    Door,
    Water,
    Axe,
    Dynamite,
    Key,
    Gold,
}

impl Cell {
    pub fn symbol(self) -> char {
        match self {
            Cell::Floor => ' ',
            Cell::Unexplored => 'x',
            Cell::Wall => '*',
            Cell::Tree => 'T',
            Cell::Door => '-',
            Cell::Water => '~',
            Cell::Axe => 'a',
            Cell::Dynamite => 'd',
            Cell::Key => 'k',
            Cell::Gold => 'g',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        let cell = match c {
            ' ' => Cell::Floor,
            'x' => Cell::Unexplored,
            '*' => Cell::Wall,
            'T' => Cell::Tree,
            '-' => Cell::Door,
            '~' => Cell::Water,
            'a' => Cell::Axe,
            'd' => Cell::Dynamite,
            'k' => Cell::Key,
            'g' => Cell::Gold,
            _ => return None,
        };
        Some(cell)
    }

    /// The item lying on this cell, if any.
    pub fn item(self) -> Option<Item> {
        match self {
            Cell::Axe => Some(Item::Axe),
            Cell::Dynamite => Some(Item::Dynamite),
            Cell::Key => Some(Item::Key),
            Cell::Gold => Some(Item::Gold),
            _ => None,
        }
    }

    /// Tool and treasure cells.
    pub fn is_interesting(self) -> bool {
        self.item().is_some()
    }

    /// Cells that can be removed with a tool or dynamite.
    pub fn is_obstacle(self) -> bool {
        matches!(self, Cell::Tree | Cell::Door | Cell::Wall)
    }

    /// Cells the agent can step onto without any action first.
    pub fn is_walkable(self) -> bool {
        self == Cell::Floor || self.is_interesting()
    }
}

impl From<Item> for Cell {
    fn from(item: Item) -> Self {
        match item {
            Item::Axe => Cell::Axe,
            Item::Dynamite => Cell::Dynamite,
            Item::Key => Cell::Key,
            Item::Gold => Cell::Gold,
        }
    }
}

/// Primitive actions sent back to the game engine, one per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Forward,
    Left,
    Right,
    Chop,
    Open,
    Blast,
}

impl Action {
    pub fn to_byte(self) -> u8 {
        match self {
            Action::Forward => b'F',
            Action::Left => b'L',
            Action::Right => b'R',
            Action::Chop => b'C',
            Action::Open => b'O',
            Action::Blast => b'B',
        }
    }

    /// Parses an action byte, ignoring case.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte.to_ascii_uppercase() {
            b'F' => Some(Action::Forward),
            b'L' => Some(Action::Left),
            b'R' => Some(Action::Right),
            b'C' => Some(Action::Chop),
            b'O' => Some(Action::Open),
            b'B' => Some(Action::Blast),
            _ => None,
        }
    }

    /// Like [`Action::from_byte`] but resolves anything unrecognized to a
    /// left turn.
    pub fn from_byte_lenient(byte: u8) -> Self {
        Self::from_byte(byte).unwrap_or(Action::Left)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_byte() as char)
    }
}
