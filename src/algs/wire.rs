//! Fixed, versioned, little-endian wire layout for halo messages.
//!
//! A halo message is one [`WireHaloHdr`] followed by `len` IEEE-754 doubles,
//! each stored as its little-endian bit pattern. One message carries a whole
//! boundary row or column.

use crate::topology::Direction;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers are stored pre-LE with `.to_le()` and decoded
/// with `.from_le()`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireHaloHdr {
    pub version_le: u16,
    /// Direction of travel, see [`Direction::index`].
    pub direction_le: u16,
    /// Number of f64 values that follow.
    pub len_le: u32,
    /// Iteration the payload was computed in.
    pub iteration_le: u64,
}

impl WireHaloHdr {
    pub fn new(direction: Direction, iteration: u64, len: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            direction_le: (direction.index() as u16).to_le(),
            len_le: (len as u32).to_le(),
            iteration_le: iteration.to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn direction(&self) -> Option<Direction> {
        Direction::from_wire(u16::from_le(self.direction_le))
    }
    pub fn len(&self) -> usize {
        u32::from_le(self.len_le) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn iteration(&self) -> u64 {
        u64::from_le(self.iteration_le)
    }
}

/// One f64 carried on the wire.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireF64 {
    pub bits_le: u64,
}

impl WireF64 {
    pub fn of(v: f64) -> Self {
        Self {
            bits_le: v.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

const_assert_eq!(size_of::<WireHaloHdr>(), 16);
const_assert_eq!(size_of::<WireF64>(), 8);

/// Bytes needed for a halo message of `len` values.
#[inline]
pub const fn halo_message_len(len: usize) -> usize {
    size_of::<WireHaloHdr>() + len * size_of::<WireF64>()
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Serialize one boundary edge.
pub fn encode_halo(direction: Direction, iteration: u64, values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(halo_message_len(values.len()));
    let hdr = WireHaloHdr::new(direction, iteration, values.len());
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    for &v in values {
        out.extend_from_slice(bytemuck::bytes_of(&WireF64::of(v)));
    }
    out
}

/// Parse a halo message. Receive buffers carry no alignment guarantee, so
/// everything is read unaligned.
pub fn decode_halo(bytes: &[u8]) -> Result<(WireHaloHdr, Vec<f64>), String> {
    let hdr_len = size_of::<WireHaloHdr>();
    if bytes.len() < hdr_len {
        return Err(format!(
            "halo message of {} bytes is shorter than its header",
            bytes.len()
        ));
    }
    let hdr: WireHaloHdr = bytemuck::pod_read_unaligned(&bytes[..hdr_len]);
    if hdr.version() != WIRE_VERSION {
        return Err(format!(
            "wire version {} (expected {WIRE_VERSION})",
            hdr.version()
        ));
    }
    expect_exact_len(bytes.len(), halo_message_len(hdr.len()))?;
    let values = bytes[hdr_len..]
        .chunks_exact(size_of::<WireF64>())
        .map(|c| bytemuck::pod_read_unaligned::<WireF64>(c).get())
        .collect();
    Ok((hdr, values))
}
