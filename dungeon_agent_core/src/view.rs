//! World-orientation of the egocentric viewport.
//!
//! The game engine sends the window around the agent as the agent sees it:
//! the row at index 0 is always straight ahead. Before the window can be
//! merged into the map it has to be turned so that index `(0, 0)` is the
//! world north-west corner.

use crate::{Cell, Direction, VIEW_HALF_SIZE, VIEW_SIZE};

/// A square window of cells, indexed `[row][column]`.
pub type Viewport = [[Cell; VIEW_SIZE]; VIEW_SIZE];

/// Index in the egocentric window that lands at world index `(i, j)`.
#[inline]
fn source_index(facing: Direction, n: usize, i: usize, j: usize) -> (usize, usize) {
    match facing {
        Direction::North => (i, j),
        Direction::South => (n - 1 - i, n - 1 - j),
        Direction::East => (n - 1 - j, i),
        Direction::West => (j, n - 1 - i),
    }
}

/// Rotates an egocentric window into world orientation.
///
/// Facing north is the identity. Values are only moved, never altered.
pub fn rotate_view<T: Copy, const N: usize>(view: &[[T; N]; N], facing: Direction) -> [[T; N]; N] {
    std::array::from_fn(|i| {
        std::array::from_fn(|j| {
            let (r, c) = source_index(facing, N, i, j);
            view[r][c]
        })
    })
}

/// Inverse of [`rotate_view`]: turns a world-oriented window into what an
/// agent facing `facing` would observe.
pub fn egocentric_view<T: Copy, const N: usize>(
    world: &[[T; N]; N],
    facing: Direction,
) -> [[T; N]; N] {
    // East and west remaps are quarter turns in opposite senses.
    let inverse = match facing {
        Direction::East => Direction::West,
        Direction::West => Direction::East,
        other => other,
    };
    rotate_view(world, inverse)
}

/// Builds a viewport from the 24 cells the engine sends (row-major, center
/// omitted). The center is the agent's own cell and always reads as floor.
pub fn viewport_from_ring(cells: &[Cell; VIEW_SIZE * VIEW_SIZE - 1]) -> Viewport {
    let mut view = [[Cell::Floor; VIEW_SIZE]; VIEW_SIZE];
    let mut rest = cells.iter();
    for (i, row) in view.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            if i == VIEW_HALF_SIZE && j == VIEW_HALF_SIZE {
                continue;
            }
            if let Some(next) = rest.next() {
                *cell = *next;
            }
        }
    }
    view
}

/// Flattens a viewport back into the 24 transmitted cells.
pub fn ring_from_viewport(view: &Viewport) -> [Cell; VIEW_SIZE * VIEW_SIZE - 1] {
    let mut cells = [Cell::Floor; VIEW_SIZE * VIEW_SIZE - 1];
    let ring = view
        .iter()
        .enumerate()
        .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, cell)| ((i, j), *cell)))
        .filter(|((i, j), _)| !(*i == VIEW_HALF_SIZE && *j == VIEW_HALF_SIZE))
        .map(|(_, cell)| cell);
    for (slot, cell) in cells.iter_mut().zip(ring) {
        *slot = cell;
    }
    cells
}
