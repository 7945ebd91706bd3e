//! Wire frames for the parent↔worker protocol.
//!
//! Task frame, parent→child:
//!
//! ```text
//! u32 node_id
//! u32 command_count          (0 == shutdown sentinel)
//! command_count times:
//!     u32 byte_length
//!     byte_length raw bytes  (one shell command)
//! ```
//!
//! Result frame, child→parent: fixed 8 bytes — `u32 node_id`, `i32
//! exit_code`. Frames reuse the codec's little-endian helpers so the whole
//! system has a single byte-order story; both endpoints are the same binary
//! on the same host.

use std::io::{self, Read};

use maku_types::{MakuError, MakuResult, NodeId, TaskResult};

use crate::codec::Encode;

/// Byte length of a result frame.
pub const RESULT_FRAME_LEN: usize = 8;

/// A task as decoded by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub node: NodeId,
    pub commands: Vec<String>,
}

/// Encode a task frame.
///
/// The caller writes the returned buffer in a single contiguous write; each
/// pipe has exactly one writer and one reader, so the frame can never
/// interleave with another.
pub fn encode_task(node: NodeId, commands: &[String]) -> MakuResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    node.encode(&mut buf)?;
    let count = u32::try_from(commands.len())
        .map_err(|_| MakuError::EncodeOverflow("command sequence"))?;
    count.encode(&mut buf)?;
    for command in commands {
        command.as_str().encode(&mut buf)?;
    }
    Ok(buf)
}

/// The frame that tells a worker to exit: node 0, command count 0.
pub fn shutdown_frame() -> [u8; 8] {
    [0; 8]
}

/// Encode a result frame.
pub fn encode_result(result: TaskResult) -> [u8; RESULT_FRAME_LEN] {
    let mut buf = [0u8; RESULT_FRAME_LEN];
    buf[..4].copy_from_slice(&result.node.0.to_le_bytes());
    buf[4..].copy_from_slice(&result.exit_code.to_le_bytes());
    buf
}

/// Decode a result frame.
pub fn decode_result(buf: [u8; RESULT_FRAME_LEN]) -> TaskResult {
    TaskResult {
        node: NodeId(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
        exit_code: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    }
}

/// Blocking worker-side read of one task frame.
///
/// Returns `Ok(None)` on clean EOF at a frame boundary or on the shutdown
/// sentinel; EOF inside a frame is an `UnexpectedEof` error.
pub fn read_task(input: &mut impl Read) -> io::Result<Option<Task>> {
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        match input.read(&mut head[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let node = NodeId(u32::from_le_bytes(head));

    let count = read_u32(input)?;
    if count == 0 {
        return Ok(None);
    }

    let mut commands = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        let len = read_u32(input)? as usize;
        let mut bytes = vec![0u8; len];
        input.read_exact(&mut bytes)?;
        let command = String::from_utf8(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "command is not utf-8"))?;
        commands.push(command);
    }

    Ok(Some(Task { node, commands }))
}

fn read_u32(input: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
