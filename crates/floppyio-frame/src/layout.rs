use std::ops::Range;

use crate::codec::LENGTH_PREFIX_SIZE;
use crate::error::{FrameError, Result};

/// Smallest capacity that leaves a non-empty payload area in binary framing.
pub const MIN_CAPACITY: usize = 12;

/// Which end of the channel this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// The hypervisor, owner of the image file.
    Host,
    /// The virtual machine, reading the image as a block device.
    #[default]
    Guest,
}

impl Role {
    /// The opposite endpoint.
    pub fn peer(self) -> Self {
        match self {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Guest => "guest",
        }
    }
}

/// How a frame's payload boundary is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Payload is terminated by the first zero byte.
    #[default]
    Text,
    /// Payload is preceded by a 4-byte little-endian length.
    Binary,
}

impl Framing {
    pub fn as_str(self) -> &'static str {
        match self {
            Framing::Text => "text",
            Framing::Binary => "binary",
        }
    }
}

/// Byte geometry of one endpoint's view of the shared store.
///
/// `outbound_offset`/`inbound_offset` are where a frame starts. In binary
/// framing the first [`LENGTH_PREFIX_SIZE`] bytes of a frame hold the length
/// and `*_size` counts only the payload area behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    pub capacity: usize,
    pub role: Role,
    pub framing: Framing,
    pub outbound_offset: usize,
    pub outbound_size: usize,
    pub inbound_offset: usize,
    pub inbound_size: usize,
    pub control_out_offset: usize,
    pub control_in_offset: usize,
}

impl BufferLayout {
    /// Derive the layout for `role` from the shared constants.
    ///
    /// Deterministic: the peer calling this with the same capacity and
    /// framing gets the mirror image.
    pub fn compute(capacity: usize, role: Role, framing: Framing) -> Result<Self> {
        if capacity % 2 != 0 {
            return Err(FrameError::InvalidCapacity {
                capacity,
                reason: "capacity must be even",
            });
        }
        if capacity < MIN_CAPACITY {
            return Err(FrameError::InvalidCapacity {
                capacity,
                reason: "capacity too small for two regions and two control bytes",
            });
        }
        if capacity > u32::MAX as usize {
            return Err(FrameError::InvalidCapacity {
                capacity,
                reason: "capacity exceeds the 32-bit length prefix range",
            });
        }

        let half = capacity / 2 - 1;
        let size = match framing {
            Framing::Text => half,
            Framing::Binary => half - LENGTH_PREFIX_SIZE,
        };

        // Host -> guest data lives in the first half, its flag in the
        // second-to-last byte.
        let (first, second) = (0, half);
        let (flag_first, flag_second) = (2 * half, 2 * half + 1);

        let (outbound_offset, inbound_offset, control_out_offset, control_in_offset) = match role {
            Role::Host => (first, second, flag_first, flag_second),
            Role::Guest => (second, first, flag_second, flag_first),
        };

        Ok(Self {
            capacity,
            role,
            framing,
            outbound_offset,
            outbound_size: size,
            inbound_offset,
            inbound_size: size,
            control_out_offset,
            control_in_offset,
        })
    }

    /// The layout the other endpoint computes.
    pub fn mirror(&self) -> Self {
        Self {
            role: self.role.peer(),
            outbound_offset: self.inbound_offset,
            outbound_size: self.inbound_size,
            inbound_offset: self.outbound_offset,
            inbound_size: self.outbound_size,
            control_out_offset: self.control_in_offset,
            control_in_offset: self.control_out_offset,
            ..*self
        }
    }

    /// Largest payload a single frame can carry.
    pub fn payload_capacity(&self) -> usize {
        match self.framing {
            // One byte is reserved for the terminator.
            Framing::Text => self.outbound_size - 1,
            Framing::Binary => self.outbound_size,
        }
    }

    /// Bytes in front of the payload inside a frame.
    pub fn header_len(&self) -> usize {
        match self.framing {
            Framing::Text => 0,
            Framing::Binary => LENGTH_PREFIX_SIZE,
        }
    }

    /// Full byte range written by an outbound frame.
    pub fn outbound_span(&self) -> Range<usize> {
        self.outbound_offset..self.outbound_offset + self.header_len() + self.outbound_size
    }

    /// Full byte range read by an inbound frame.
    pub fn inbound_span(&self) -> Range<usize> {
        self.inbound_offset..self.inbound_offset + self.header_len() + self.inbound_size
    }
}
