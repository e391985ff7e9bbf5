use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{
    Cell, Direction, Position, START_MARKER, VIEW_HALF_SIZE, VIEW_SIZE, view::Viewport,
};

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Position {position} is out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        position: Position,
        width: usize,
        height: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with every cell set to `fill`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn filled(width: usize, height: usize, fill: T) -> Self
    where
        T: Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![fill; size],
        }
    }

    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes the position of a cell and returns its value.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Position { x, y }));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    fn index_of(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            Some(position.y * self.width + position.x)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    /// Gets an immutable reference to the cell at the given position.
    ///
    /// Returns `None` if the position is out of bounds.
    pub fn get(&self, position: Position) -> Option<&T> {
        self.index_of(position).and_then(|index| self.cells.get(index))
    }

    /// Sets the value of the cell at the given position.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the position is invalid.
    pub fn set(&mut self, position: Position, value: T) -> Result<(), GridError> {
        let index = self.index_of(position).ok_or(GridError::OutOfBounds {
            position,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, position: Position) -> &Self::Output {
        match self.index_of(position) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, self.width, self.height
            ),
        }
    }
}

/// Indexing using Position coordinates for mutable access
impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, position: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.index_of(position) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, width, height
            ),
        }
    }
}

/// Inclusive rectangle of map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl Bounds {
    pub fn around(position: Position) -> Self {
        Bounds {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x,
            max_y: position.y,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.min_x..=self.max_x).contains(&position.x)
            && (self.min_y..=self.max_y).contains(&position.y)
    }
}

/// Offsets `position` by a signed amount, `None` on underflow.
#[inline]
pub(crate) fn offset(position: Position, dx: isize, dy: isize) -> Option<Position> {
    Some(Position {
        x: position.x.checked_add_signed(dx)?,
        y: position.y.checked_add_signed(dy)?,
    })
}

/// The agent's persistent picture of the dungeon.
///
/// Every cell starts unexplored. Observed cells are never turned back into
/// unexplored ones and the explored bounds only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMap {
    grid: Grid<Cell>,
    bounds: Bounds,
}

impl WorldMap {
    /// Creates a square map of side `size` whose explored area is just `origin`.
    pub fn new(size: usize, origin: Position) -> Self {
        WorldMap {
            grid: Grid::filled(size, size, Cell::Unexplored),
            bounds: Bounds::around(origin),
        }
    }

    /// Builds a map whose explored area is exactly the given text rows, one
    /// symbol per cell. Unknown symbols read as unexplored; the padding
    /// needed to make the grid square reads as water.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let size = width.max(height).max(1);
        let grid = Grid::from_generator(size, size, |p| {
            match rows.get(p.y).and_then(|row| row.chars().nth(p.x)) {
                Some(c) => Cell::from_symbol(c).unwrap_or(Cell::Unexplored),
                None => Cell::Water,
            }
        });
        WorldMap {
            grid,
            bounds: Bounds {
                min_x: 0,
                min_y: 0,
                max_x: width.saturating_sub(1),
                max_y: height.saturating_sub(1),
            },
        }
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Current explored bounding box.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Cell at `position`, or `None` outside the grid.
    pub fn cell(&self, position: Position) -> Option<Cell> {
        self.grid.get(position).copied()
    }

    /// Absolute grid limits.
    pub fn in_bounds(&self, position: Position) -> bool {
        self.grid.contains(position)
    }

    /// Whether `position` lies inside the area observed so far.
    pub fn in_explored_bounds(&self, position: Position) -> bool {
        self.bounds.contains(position)
    }

    pub fn is_interesting(cell: Cell) -> bool {
        cell.is_interesting()
    }

    /// Overlays a world-oriented viewport centered on `center`.
    pub fn update(&mut self, center: Position, view: &Viewport) {
        for (row, cells) in view.iter().enumerate() {
            for (col, &observed) in cells.iter().enumerate() {
                let dx = col as isize - VIEW_HALF_SIZE as isize;
                let dy = row as isize - VIEW_HALF_SIZE as isize;
                let Some(target) = offset(center, dx, dy) else {
                    continue;
                };
                let Some(slot) = self.grid.get(target) else {
                    continue;
                };
                if observed == Cell::Unexplored && *slot != Cell::Unexplored {
                    continue;
                }
                self.grid[target] = observed;
            }
        }

        let last = self.width().min(self.height()).saturating_sub(1);
        self.bounds.min_x = self.bounds.min_x.min(center.x.saturating_sub(VIEW_HALF_SIZE));
        self.bounds.min_y = self.bounds.min_y.min(center.y.saturating_sub(VIEW_HALF_SIZE));
        self.bounds.max_x = self.bounds.max_x.max(center.x + VIEW_HALF_SIZE).min(last);
        self.bounds.max_y = self.bounds.max_y.max(center.y + VIEW_HALF_SIZE).min(last);
    }

    /// Records that the cell at `position` is now empty floor, after the agent
    /// picked something up or removed an obstacle there.
    pub fn clear(&mut self, position: Position) {
        if let Err(err) = self.grid.set(position, Cell::Floor) {
            tracing::warn!("ignoring clear outside the map: {}", err);
        }
    }

    /// Cheap frontier probe: true if any orthogonal neighbour, or any cell on
    /// the perimeter of the view window centered on `position`, is unexplored.
    /// Cells outside the grid never count.
    pub fn has_unexplored_neighbor(&self, position: Position) -> bool {
        let is_unexplored = |dx: isize, dy: isize| {
            offset(position, dx, dy).and_then(|p| self.cell(p)) == Some(Cell::Unexplored)
        };

        if Direction::ALL.iter().any(|d| {
            let (dx, dy) = d.delta();
            is_unexplored(dx, dy)
        }) {
            return true;
        }

        let half = VIEW_HALF_SIZE as isize;
        for d in -half..=half {
            if is_unexplored(d, -half) || is_unexplored(d, half) {
                return true;
            }
        }
        for d in (-half + 1)..half {
            if is_unexplored(-half, d) || is_unexplored(half, d) {
                return true;
            }
        }
        false
    }

    /// Text picture of the explored area, bordered with `%`, with the agent
    /// drawn as an arrow and its start cell as `S`.
    pub fn render_explored(&self, agent: Position, facing: Direction, start: Position) -> String {
        let b = self.bounds;
        let border: String = std::iter::repeat_n('%', b.max_x - b.min_x + 3).collect();
        let mut out = String::with_capacity((border.len() + 1) * (b.max_y - b.min_y + 3));
        out.push_str(&border);
        out.push('\n');
        for y in b.min_y..=b.max_y {
            out.push('%');
            for x in b.min_x..=b.max_x {
                let here = Position { x, y };
                let c = if here == agent {
                    facing.arrow()
                } else if here == start {
                    START_MARKER
                } else {
                    self.grid[here].symbol()
                };
                out.push(c);
            }
            out.push_str("%\n");
        }
        out.push_str(&border);
        out
    }
}

/// Convenience for building a fully known viewport from text rows.
pub fn viewport_from_rows(rows: [&str; VIEW_SIZE]) -> Viewport {
    std::array::from_fn(|i| {
        let chars: Vec<char> = rows[i].chars().collect();
        std::array::from_fn(|j| {
            chars
                .get(j)
                .and_then(|c| Cell::from_symbol(*c))
                .unwrap_or(Cell::Unexplored)
        })
    })
}
