//!# CAN 2.0 frame
//!
//!```
//!# use mcp2515::frame::{CanFrame, CAN_EFF_FLAG, CAN_RTR_FLAG};
//!# use embedded_can::{ExtendedId, Frame, StandardId};
//!#
//! let frame = CanFrame::new(StandardId::new(0x102).unwrap(), &[0xAA, 0xBB]).unwrap();
//! assert_eq!(0x102, frame.raw_id());
//! assert_eq!(&[0xAA, 0xBB], frame.data());
//!
//! let remote = CanFrame::new_remote(ExtendedId::new(0x1234).unwrap(), 4).unwrap();
//! assert_eq!(CAN_EFF_FLAG | CAN_RTR_FLAG | 0x1234, remote.raw_id());
//!```
use crate::codec::MAX_PAYLOAD_LENGTH;
use embedded_can::{ExtendedId, Frame, Id, StandardId};

/// Set in [CanFrame::raw_id] for extended frames
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// Set in [CanFrame::raw_id] for remote frames
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;

/// Received or to be transmitted CAN 2.0 frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CanFrame {
    identifier: Id,
    rtr: bool,
    dlc: usize,
    data: [u8; MAX_PAYLOAD_LENGTH],
}

impl CanFrame {
    /// Builds a frame from a decoded register identifier.
    ///
    /// Returns `None` if the identifier exceeds its format or the payload exceeds 8 bytes.
    pub(crate) fn from_raw_parts(identifier: u32, extended: bool, rtr: bool, data: &[u8]) -> Option<Self> {
        let identifier = if extended {
            Id::Extended(ExtendedId::new(identifier)?)
        } else {
            Id::Standard(u16::try_from(identifier).ok().and_then(StandardId::new)?)
        };

        // Payload bytes of remote frames are stale buffer content
        if rtr {
            return Self::new_remote(identifier, data.len());
        }

        Self::new(identifier, data)
    }

    /// Returns the identifier with [CAN_EFF_FLAG] and [CAN_RTR_FLAG] folded into the upper bits
    pub fn raw_id(&self) -> u32 {
        let mut raw = match self.identifier {
            Id::Standard(sid) => sid.as_raw() as u32,
            Id::Extended(eid) => eid.as_raw() | CAN_EFF_FLAG,
        };

        if self.rtr {
            raw |= CAN_RTR_FLAG;
        }

        raw
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_PAYLOAD_LENGTH {
            return None;
        }

        let mut frame = CanFrame {
            identifier: id.into(),
            rtr: false,
            dlc: data.len(),
            data: [0; MAX_PAYLOAD_LENGTH],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_PAYLOAD_LENGTH {
            return None;
        }

        Some(CanFrame {
            identifier: id.into(),
            rtr: true,
            dlc,
            data: [0; MAX_PAYLOAD_LENGTH],
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.identifier, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        self.identifier
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        if self.rtr {
            return &[];
        }

        &self.data[..self.dlc]
    }
}
