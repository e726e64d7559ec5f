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

//! Packet 0 metadata: `name\0size\0`, zero padded

use std::io;

use crate::error::{Error, Result};
use crate::protocol::MAX_FILENAME_LEN;

/// Name and size of the file carried by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub filename: String,
    /// `None` when the sender did not declare one
    pub size: Option<u64>,
}

impl FileInfo {
    pub fn new(filename: impl Into<String>, size: Option<u64>) -> Self {
        FileInfo { filename: filename.into(), size }
    }

    /// Write this info into a packet 0 payload.
    pub fn encode(&self, payload: &mut [u8]) -> Result<()> {
        payload.fill(0);

        let name = self.filename.as_bytes();
        if name.is_empty() || name.len() >= payload.len() || name.len() >= MAX_FILENAME_LEN {
            return Err(Error::Size {
                expected: payload.len().min(MAX_FILENAME_LEN) - 1,
                actual: name.len(),
            });
        }
        payload[..name.len()].copy_from_slice(name);

        if let Some(size) = self.size {
            let digits = size.to_string();
            let start = name.len() + 1;
            // Keep a trailing NUL after the digits
            if start + digits.len() >= payload.len() {
                return Err(Error::Size {
                    expected: payload.len() - 1,
                    actual: start + digits.len(),
                });
            }
            payload[start..start + digits.len()].copy_from_slice(digits.as_bytes());
        }

        Ok(())
    }

    /// Read packet 0 metadata. `Ok(None)` means an empty name, i.e. the end of the batch.
    pub fn parse(payload: &[u8]) -> Result<Option<FileInfo>> {
        let name_end = payload
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| malformed("filename is not NUL terminated"))?;
        if name_end == 0 {
            return Ok(None);
        }

        let name = &payload[..name_end.min(MAX_FILENAME_LEN - 1)];
        let mut filename = String::from_utf8_lossy(name).into_owned();
        // Replacement characters can make the decoded name longer than the raw one
        if filename.len() >= MAX_FILENAME_LEN {
            let mut end = MAX_FILENAME_LEN - 1;
            while !filename.is_char_boundary(end) {
                end -= 1;
            }
            filename.truncate(end);
        }

        // Fields after the size (mtime, mode) are ignored
        let mut size: Option<u64> = None;
        for &b in payload[name_end + 1..].iter().take_while(|b| b.is_ascii_digit()) {
            let digit = (b - b'0') as u64;
            let value = size
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| malformed("file size does not fit in 64 bits"))?;
            size = Some(value);
        }

        Ok(Some(FileInfo { filename, size }))
    }
}

/// Strip any directory prefix, `/` or `\` separated.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn malformed(msg: &str) -> Error {
    Error::File(io::Error::new(io::ErrorKind::InvalidData, msg.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
