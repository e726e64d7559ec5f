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

//! Transfer error taxonomy

/// Errors surfaced by a YMODEM transfer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timed out waiting for peer")]
    Timeout,

    #[error("unexpected control byte 0x{0:02X}")]
    WrongCode(u8),

    #[error("wrong sequence number: expected {expected}, received {received}")]
    WrongSequence { expected: u8, received: u8 },

    #[error("CRC mismatch: packet carries 0x{received:04X}, payload hashes to 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    Size { expected: usize, actual: usize },

    #[error("transfer cancelled by peer")]
    Cancelled,

    #[error("peer did not acknowledge")]
    Ack,

    #[error("file error: {0}")]
    File(#[source] std::io::Error),

    #[error("buffer too small: need {required} bytes, have {actual}")]
    Allocation { required: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors the receiver answers with NAK instead of giving up at once.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout
                | Error::WrongCode(_)
                | Error::WrongSequence { .. }
                | Error::CrcMismatch { .. }
        )
    }
}
