//!# Acceptance filters and masks
//! The MCP2515 has six acceptance filters and two masks. Mask 0 and filters 0/1 belong to
//! receive buffer 0, mask 1 and filters 2 to 5 belong to receive buffer 1.
//!
//!```
//!# use mcp2515::filter::{RxFilter, RxMask};
//!#
//! assert_eq!(Some(RxFilter::F3), RxFilter::from_index(3));
//! assert_eq!(None, RxFilter::from_index(6));
//! assert_eq!(None, RxMask::from_index(2));
//!```

/// Acceptance filter
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxFilter {
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl RxFilter {
    pub const ALL: [Self; 6] = [Self::F0, Self::F1, Self::F2, Self::F3, Self::F4, Self::F5];

    /// Maps filter index 0-5
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Address of the filter's SIDH register
    pub(crate) fn register(&self) -> u8 {
        use crate::registers::*;

        match self {
            Self::F0 => RXF0SIDH,
            Self::F1 => RXF1SIDH,
            Self::F2 => RXF2SIDH,
            Self::F3 => RXF3SIDH,
            Self::F4 => RXF4SIDH,
            Self::F5 => RXF5SIDH,
        }
    }
}

/// Acceptance mask
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxMask {
    M0,
    M1,
}

impl RxMask {
    pub const ALL: [Self; 2] = [Self::M0, Self::M1];

    /// Maps mask index 0-1
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Address of the mask's SIDH register
    pub(crate) fn register(&self) -> u8 {
        match self {
            Self::M0 => crate::registers::RXM0SIDH,
            Self::M1 => crate::registers::RXM1SIDH,
        }
    }
}
