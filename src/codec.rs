//!# Identifier and length codec
//! Converts CAN identifiers and data lengths from/to the SIDH, SIDL, EID8, EID0 and DLC
//! register layout shared by the receive buffers, transmit buffers, filters and masks.
//!
//!```
//!# use mcp2515::codec::{decode_identifier, encode_identifier};
//!#
//! let bytes = encode_identifier(0x14C92A2B, true);
//! assert_eq!([0xA6, 0x49, 0x2A, 0x2B], bytes);
//!
//! let header = [bytes[0], bytes[1], bytes[2], bytes[3], 0x08];
//! assert_eq!((0x14C92A2B, true), decode_identifier(&header));
//!```
use byteorder::{BigEndian, ByteOrder};

/// Mask of the 11 bit standard identifier
pub const STANDARD_IDENTIFIER_MASK: u32 = 0x7FF;

/// Mask of the 29 bit extended identifier
pub const EXTENDED_IDENTIFIER_MASK: u32 = 0x1FFF_FFFF;

/// Maximum payload length of a CAN 2.0 frame
pub const MAX_PAYLOAD_LENGTH: usize = 8;

/// Extended identifier enable bit of SIDL
pub(crate) const SIDL_EXIDE: u8 = 0x08;

/// Remote transmission request bit of TXBnDLC
pub(crate) const DLC_RTR: u8 = 0x40;

/// Data length code bits of the DLC register
pub(crate) const DLC_MASK: u8 = 0x0F;

const SIDH: usize = 0;
const SIDL: usize = 1;
const EID8: usize = 2;

/// Decodes the identifier of a SIDH, SIDL, EID8, EID0, DLC register block.
///
/// Returns the raw identifier (11 or 29 bits) and whether the extended format is used.
pub fn decode_identifier(header: &[u8; 5]) -> (u32, bool) {
    let sidl = header[SIDL];
    let mut identifier = ((header[SIDH] as u32) << 3) | ((sidl >> 5) as u32);

    if sidl & SIDL_EXIDE == 0 {
        return (identifier, false);
    }

    identifier = (identifier << 2) | (sidl & 0x03) as u32;
    identifier = (identifier << 16) | BigEndian::read_u16(&header[EID8..EID8 + 2]) as u32;

    (identifier, true)
}

/// Extracts the data length code of a DLC register.
///
/// Values above [MAX_PAYLOAD_LENGTH] can be encoded by the register
/// and need to be rejected by the caller.
pub fn decode_length(dlc: u8) -> usize {
    (dlc & DLC_MASK) as usize
}

/// Encodes an identifier into SIDH, SIDL, EID8 and EID0 bytes.
///
/// Standard identifiers leave EID8 and EID0 zeroed.
pub fn encode_identifier(identifier: u32, extended: bool) -> [u8; 4] {
    let mut buffer = [0u8; 4];

    if !extended {
        let sid = identifier & STANDARD_IDENTIFIER_MASK;
        buffer[SIDH] = (sid >> 3) as u8;
        buffer[SIDL] = ((sid & 0x07) << 5) as u8;

        return buffer;
    }

    let identifier = identifier & EXTENDED_IDENTIFIER_MASK;
    BigEndian::write_u16(&mut buffer[EID8..EID8 + 2], identifier as u16);

    let upper = identifier >> 16;
    buffer[SIDL] = ((upper & 0x03) as u8) | (((upper & 0x1C) as u8) << 3) | SIDL_EXIDE;
    buffer[SIDH] = (upper >> 5) as u8;

    buffer
}

/// Encodes the DLC register of a transmit buffer
pub(crate) fn encode_length(length: usize, remote: bool) -> u8 {
    let mut dlc = (length as u8) & DLC_MASK;

    if remote {
        dlc |= DLC_RTR;
    }

    dlc
}
