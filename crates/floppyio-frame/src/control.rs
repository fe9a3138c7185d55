//! The single-byte control flag that sits next to each data region.
//!
//! ```text
//!  bit  7 6 5 4   3         2              1            0
//!      ┌───────┬─────────┬──────────────┬────────────┬──────────────┐
//!      │ seq   │ aborted │ length prefix│ end of data│ data present │
//!      └───────┴─────────┴──────────────┴────────────┴──────────────┘
//! ```
//!
//! Only `data present` gates synchronization. The other bits are metadata the
//! sender attaches to a frame.

/// Set by the sender after a frame is written, cleared by the receiver.
pub const DATA_PRESENT: u8 = 0x01;
/// The frame is the last one of a message.
pub const END_OF_DATA: u8 = 0x02;
/// The frame starts with a 4-byte length.
pub const LENGTH_PREFIX: u8 = 0x04;
/// The sender gave up on the message.
pub const ABORTED: u8 = 0x08;

const SEQUENCE_SHIFT: u32 = 4;
const SEQUENCE_MASK: u8 = 0x0F;

/// Decoded control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlByte {
    pub data_present: bool,
    pub end_of_data: bool,
    pub length_prefix: bool,
    pub aborted: bool,
    /// 4-bit frame tag; only the low nibble is kept.
    pub sequence: u8,
}

impl ControlByte {
    /// All flags cleared: the value a receiver writes back.
    pub const CLEAR: ControlByte = ControlByte {
        data_present: false,
        end_of_data: false,
        length_prefix: false,
        aborted: false,
        sequence: 0,
    };

    /// Pack into the on-disk byte.
    pub fn encode(self) -> u8 {
        let mut byte = (self.sequence & SEQUENCE_MASK) << SEQUENCE_SHIFT;
        if self.data_present {
            byte |= DATA_PRESENT;
        }
        if self.end_of_data {
            byte |= END_OF_DATA;
        }
        if self.length_prefix {
            byte |= LENGTH_PREFIX;
        }
        if self.aborted {
            byte |= ABORTED;
        }
        byte
    }

    /// Unpack an on-disk byte. Every value decodes.
    pub fn decode(byte: u8) -> Self {
        Self {
            data_present: byte & DATA_PRESENT != 0,
            end_of_data: byte & END_OF_DATA != 0,
            length_prefix: byte & LENGTH_PREFIX != 0,
            aborted: byte & ABORTED != 0,
            sequence: (byte >> SEQUENCE_SHIFT) & SEQUENCE_MASK,
        }
    }

    pub fn with_end_of_data(mut self, end_of_data: bool) -> Self {
        self.end_of_data = end_of_data;
        self
    }

    pub fn with_aborted(mut self, aborted: bool) -> Self {
        self.aborted = aborted;
        self
    }

    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence & SEQUENCE_MASK;
        self
    }
}

impl From<u8> for ControlByte {
    fn from(byte: u8) -> Self {
        Self::decode(byte)
    }
}

impl From<ControlByte> for u8 {
    fn from(control: ControlByte) -> Self {
        control.encode()
    }
}
