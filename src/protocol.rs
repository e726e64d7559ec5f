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

//! YMODEM protocol constants

use std::fmt;
use std::time::Duration;

/// Start of header - 128-byte packet follows
pub const SOH: u8 = 0x01;

/// Start of text - 1024-byte packet follows
pub const STX: u8 = 0x02;

/// End of transmission - sender has no more data for this file
pub const EOT: u8 = 0x04;

/// Acknowledge
pub const ACK: u8 = 0x06;

/// Negative acknowledge - retransmit, or confirm the first EOT
pub const NAK: u8 = 0x15;

/// Cancel - abort the transfer
pub const CAN: u8 = 0x18;

/// Receiver requests a CRC-16 mode transfer
pub const CRC_REQUEST: u8 = b'C';

/// Filler for the unused tail of the last data packet (CP/M EOF)
pub const PAD_BYTE: u8 = 0x1A;

// ============================================================================
// Packet geometry
// ============================================================================

pub const SOH_PAYLOAD_LEN: usize = 128;
pub const STX_PAYLOAD_LEN: usize = 1024;

/// Header byte, sequence and its complement
pub const HEADER_LEN: usize = 3;
pub const CRC_LEN: usize = 2;

pub const SOH_PACKET_LEN: usize = HEADER_LEN + SOH_PAYLOAD_LEN + CRC_LEN;
pub const STX_PACKET_LEN: usize = HEADER_LEN + STX_PAYLOAD_LEN + CRC_LEN;
pub const MAX_PACKET_LEN: usize = STX_PACKET_LEN;

/// Includes the terminating NUL on the wire
pub const MAX_FILENAME_LEN: usize = 256;

// ============================================================================
// Timing and retry budget
// ============================================================================

/// Wait for a single control character
pub const CHAR_TIMEOUT: Duration = Duration::from_millis(3000);

/// Wait for a packet header, or for the whole body once the header arrived
pub const PACKET_TIMEOUT: Duration = Duration::from_millis(3000);

/// Pause between handshake polls
pub const HANDSHAKE_INTERVAL: Duration = Duration::from_millis(1000);

/// Consecutive errors tolerated before giving up
pub const MAX_ERRORS: u8 = 5;

/// CAN bytes emitted when we abort a transfer ourselves
pub const CAN_SEND_COUNT: usize = 7;

/// Symbolic name of a control byte, for logs.
pub fn code_name(byte: u8) -> &'static str {
    match byte {
        SOH => "SOH",
        STX => "STX",
        EOT => "EOT",
        ACK => "ACK",
        NAK => "NAK",
        CAN => "CAN",
        CRC_REQUEST => "C",
        _ => "?",
    }
}

// ============================================================================
// Stage
// ============================================================================

/// Where a transfer is in its lifecycle. Only moves forward until cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    None,
    /// `C` sent (receiver) or awaited (sender)
    Establishing,
    /// Packet 0 exchanged and acknowledged
    Established,
    /// Data packets flowing
    Transmitting,
    /// EOT sent or received
    Finishing,
    Finished,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::None => "none",
            Stage::Establishing => "establishing",
            Stage::Established => "established",
            Stage::Transmitting => "transmitting",
            Stage::Finishing => "finishing",
            Stage::Finished => "finished",
        };
        f.write_str(name)
    }
}
