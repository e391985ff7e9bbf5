//! Byte protocol spoken with the game engine.
//!
//! Each turn the engine sends the 24 cells around the agent (the 5x5 window
//! in row-major order, center omitted, agent facing up) and expects a single
//! action byte in reply.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, info, trace};

use crate::{
    Action, Cell, VIEW_SIZE,
    agent::DungeonAgent,
    error::ProtocolError,
    view::{Viewport, ring_from_viewport, viewport_from_ring},
};

/// Bytes in one transmitted viewport.
pub const VIEWPORT_BYTES: usize = VIEW_SIZE * VIEW_SIZE - 1;

/// Decodes one transmitted viewport.
pub fn decode_viewport(bytes: &[u8; VIEWPORT_BYTES]) -> Result<Viewport, ProtocolError> {
    let mut cells = [Cell::Floor; VIEWPORT_BYTES];
    for (index, (&byte, cell)) in bytes.iter().zip(cells.iter_mut()).enumerate() {
        *cell = Cell::from_symbol(byte as char).ok_or(ProtocolError::UnknownCell { byte, index })?;
    }
    Ok(viewport_from_ring(&cells))
}

/// Encodes a viewport the way the engine transmits it. The center is dropped.
pub fn encode_viewport(view: &Viewport) -> [u8; VIEWPORT_BYTES] {
    ring_from_viewport(view).map(|cell| cell.symbol() as u8)
}

/// Blocks until a full viewport has been read.
pub fn read_viewport<R: Read>(reader: &mut R) -> Result<Viewport, ProtocolError> {
    let mut buf = [0u8; VIEWPORT_BYTES];
    let mut received = 0;
    while received < VIEWPORT_BYTES {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(ProtocolError::Truncated {
                    received,
                    expected: VIEWPORT_BYTES,
                });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    decode_viewport(&buf)
}

/// Sends one action byte and flushes.
pub fn write_action<W: Write>(writer: &mut W, action: Action) -> Result<(), ProtocolError> {
    writer.write_all(&[action.to_byte()])?;
    writer.flush()?;
    Ok(())
}

/// How a session with the engine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Viewports answered.
    pub turns: u64,
    /// Whether the agent was back at the start with the gold.
    pub finished: bool,
}

/// Plays until the engine closes the stream or `max_turns` viewports have
/// been answered.
///
/// The engine closing the stream is only an orderly end once the agent has
/// finished; any other end of input is reported as an error.
pub fn run_session<R: Read, W: Write>(
    agent: &mut DungeonAgent,
    reader: &mut R,
    writer: &mut W,
    max_turns: u64,
) -> Result<SessionOutcome, ProtocolError> {
    let mut turns = 0;
    while turns < max_turns {
        let view = match read_viewport(reader) {
            Ok(view) => view,
            Err(ProtocolError::Truncated { received, .. }) if agent.is_done() => {
                debug!("engine closed the stream after {} turns ({} stray bytes)", turns, received);
                break;
            }
            Err(err) => return Err(err),
        };
        let action = agent.step(&view);
        trace!("turn {}: sending {}", turns, action);
        write_action(writer, action)?;
        turns += 1;
    }
    let outcome = SessionOutcome {
        turns,
        finished: agent.is_done(),
    };
    info!("session over after {} turns (finished: {})", outcome.turns, outcome.finished);
    Ok(outcome)
}
