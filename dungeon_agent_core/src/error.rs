use crate::{Cell, Position};

/// Reasons a planning request produced no path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Target {target} is outside the map")]
    OutOfBounds { target: Position },
    #[error("Target {target} holds {cell:?}, which can never be entered")]
    UntraversableTarget { target: Position, cell: Cell },
    #[error("No path to {target} given current knowledge")]
    Unreachable { target: Position },
    #[error("Search towards {target} gave up after {expansions} expansions")]
    ExpansionLimit { target: Position, expansions: usize },
}

/// Errors raised while exchanging bytes with the game engine.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Viewport stream ended after {received} of {expected} bytes")]
    Truncated { received: usize, expected: usize },
    #[error("Unknown cell symbol {byte:#04x} at viewport index {index}")]
    UnknownCell { byte: u8, index: usize },
    #[error("Transport failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a map into the local simulator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Unknown map symbol '{symbol}' at position ({x}, {y}).")]
    UnknownSymbol { symbol: char, x: usize, y: usize },
    #[error("Multiple agent start positions found.")]
    MultipleStarts,
    #[error("No agent start position ('^', '>', 'v' or '<') found in map.")]
    MissingStart,
}
