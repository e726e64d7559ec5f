// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Packet framing and CRC-16
//!
//! ```text
//! +------------+-----+------+------------------+--------+--------+
//! | SOH or STX | SEQ | !SEQ | DATA (128/1024)  | CRC hi | CRC lo |
//! +------------+-----+------+------------------+--------+--------+
//! ```
//!
//! The CRC covers the data bytes only.

use crc::{CRC_16_XMODEM, Crc};

use crate::error::{Error, Result};
use crate::protocol::*;

/// CCITT polynomial 0x1021, initial value 0, big-endian on the wire.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Payload size selected by a header byte.
pub fn payload_len(code: u8) -> Option<usize> {
    match code {
        SOH => Some(SOH_PAYLOAD_LEN),
        STX => Some(STX_PAYLOAD_LEN),
        _ => None,
    }
}

/// Full on-wire length of a packet starting with `code`.
pub fn packet_len(code: u8) -> Option<usize> {
    payload_len(code).map(|len| HEADER_LEN + len + CRC_LEN)
}

/// Assemble a packet into `out`, returning the number of bytes used.
pub fn encode(out: &mut [u8], code: u8, seq: u8, payload: &[u8]) -> Result<usize> {
    let len = payload_len(code).ok_or(Error::WrongCode(code))?;
    if payload.len() != len {
        return Err(Error::Size { expected: len, actual: payload.len() });
    }

    let total = HEADER_LEN + len + CRC_LEN;
    if out.len() < total {
        return Err(Error::Allocation { required: total, actual: out.len() });
    }

    out[0] = code;
    out[1] = seq;
    out[2] = !seq;
    out[HEADER_LEN..HEADER_LEN + len].copy_from_slice(payload);
    let crc = crc16(payload);
    out[HEADER_LEN + len..total].copy_from_slice(&crc.to_be_bytes());

    Ok(total)
}

/// Check a complete packet and return its sequence number and payload size.
pub fn verify(packet: &[u8]) -> Result<(u8, usize)> {
    let code = *packet.first().ok_or(Error::Size { expected: SOH_PACKET_LEN, actual: 0 })?;
    let len = payload_len(code).ok_or(Error::WrongCode(code))?;
    let total = HEADER_LEN + len + CRC_LEN;
    if packet.len() < total {
        return Err(Error::Size { expected: total, actual: packet.len() });
    }

    let seq = packet[1];
    if packet[2] != !seq {
        return Err(Error::WrongSequence { expected: !packet[2], received: seq });
    }

    let received = u16::from_be_bytes([packet[total - 2], packet[total - 1]]);
    let computed = crc16(&packet[HEADER_LEN..HEADER_LEN + len]);
    if received != computed {
        return Err(Error::CrcMismatch { received, computed });
    }

    Ok((seq, len))
}

// ============================================================================
// Tests
// ============================================================================
