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

//! State shared by one transfer, and the byte/packet helpers both roles
//! drive the wire through.

use std::io;
use std::time::Duration;
use log::{debug, trace, warn};
use crate::capability::{Capabilities, Channel, Clock, FileAccess};
use crate::error::{Error, Result};
use crate::packet;
use crate::protocol::*;

pub struct Context<C, F: FileAccess, K> {
    pub(crate) caps: Capabilities<C, F, K>,
    pub(crate) stage: Stage,
    /// Incoming packets land here; the sender also stages outgoing payloads here
    pub(crate) buffer: Vec<u8>,
    pub(crate) file: Option<F::Handle>,
    pub(crate) filename: String,
    pub(crate) file_size: Option<u64>,
    pub(crate) seq: u8,
    pub(crate) error_count: u8,
}

impl<C: Channel, F: FileAccess, K: Clock> Context<C, F, K> {
    pub fn new(caps: Capabilities<C, F, K>, buffer: Vec<u8>) -> Result<Self> {
        check_buffer(&buffer)?;

        Ok(Context {
            caps,
            stage: Stage::None,
            buffer,
            file: None,
            filename: String::new(),
            file_size: None,
            seq: 0,
            error_count: 0,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Forget everything about a previous transfer except the open file.
    pub(crate) fn reset(&mut self) {
        self.stage = Stage::None;
        self.filename.clear();
        self.file_size = None;
        self.seq = 0;
        self.error_count = 0;
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        if stage != self.stage {
            debug!("Stage: {} -> {}", self.stage, stage);
            self.stage = stage;
        }
    }

    // ========================================================================
    // Byte helpers
    // ========================================================================

    pub(crate) fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.caps.send_all(&[byte])?;
        trace!("Sent: {} (0x{:02X})", code_name(byte), byte);
        Ok(())
    }

    /// `None` on timeout.
    pub(crate) fn receive_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        let byte = self.caps.receive_byte(timeout)?;
        match byte {
            Some(b) => trace!("Received: {} (0x{:02X})", code_name(b), b),
            None => trace!("Receive timed out after {:?}", timeout),
        }
        Ok(byte)
    }

    /// Receive the remainder of a packet whose header byte is already in `buffer[0]`.
    ///
    /// The whole body shares one `PACKET_TIMEOUT` window. Returns the sequence
    /// number and payload length; the payload starts at `buffer[HEADER_LEN]`.
    pub(crate) fn receive_packet(&mut self) -> Result<(u8, usize)> {
        let code = self.buffer[0];
        let len = packet::packet_len(code).ok_or(Error::WrongCode(code))?;

        let got = self.caps.receive_exact(&mut self.buffer[1..len], PACKET_TIMEOUT)?;
        if got != len - 1 {
            debug!("Short packet: {} of {} bytes", got + 1, len);
            return Err(Error::Timeout);
        }

        let (seq, payload_len) = packet::verify(&self.buffer[..len])?;
        trace!("Received: {} packet #{}", code_name(code), seq);
        Ok((seq, payload_len))
    }

    /// Payload of the packet last received, or staged for sending.
    pub(crate) fn payload(&self, len: usize) -> &[u8] {
        &self.buffer[HEADER_LEN..HEADER_LEN + len]
    }

    pub(crate) fn payload_mut(&mut self, len: usize) -> &mut [u8] {
        &mut self.buffer[HEADER_LEN..HEADER_LEN + len]
    }

    /// Tell the peer we are giving up.
    pub(crate) fn abort(&mut self) -> Result<()> {
        debug!("Aborting: sending {} CAN", CAN_SEND_COUNT);
        self.caps.send_all(&[CAN; CAN_SEND_COUNT])?;
        Ok(())
    }

    /// Abort on the way out of a failed transfer, keeping the error that caused it.
    pub(crate) fn abort_quietly(&mut self) {
        if let Err(e) = self.abort() {
            warn!("Could not send CAN to peer: {}", e);
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.caps.clock.now_ms()
    }

    /// Sleep off whatever is left of `interval` since `started`, so polling
    /// keeps its cadence even when a stray byte cut the wait short.
    pub(crate) fn finish_interval(&mut self, started: u64, interval: Duration) {
        let interval = interval.as_millis() as u64;
        let elapsed = self.caps.clock.now_ms().saturating_sub(started);
        if elapsed < interval {
            self.caps.clock.sleep_ms(interval - elapsed);
        }
    }

    // ========================================================================
    // File handle
    // ========================================================================

    pub(crate) fn open_file(&mut self, name: &str, writing: bool) -> Result<()> {
        self.close_file();
        let handle = self.caps.files.open(name, writing).map_err(Error::File)?;
        debug!("Opened {:?} for {}", name, if writing { "writing" } else { "reading" });
        self.file = Some(handle);
        Ok(())
    }

    pub(crate) fn open_file_size(&mut self) -> Result<u64> {
        let handle = self.file.as_mut().ok_or_else(no_file)?;
        self.caps.files.size(handle).map_err(Error::File)
    }

    /// Fill the first `len` payload bytes from the open file, stopping early
    /// only at end of input. Returns how many bytes were read.
    pub(crate) fn read_payload(&mut self, len: usize) -> Result<usize> {
        let handle = self.file.as_mut().ok_or_else(no_file)?;
        let buf = &mut self.buffer[HEADER_LEN..HEADER_LEN + len];

        let mut filled = 0;
        while filled < len {
            let n = self.caps.files.read(handle, &mut buf[filled..]).map_err(Error::File)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Write the first `len` payload bytes to the open file.
    pub(crate) fn write_payload(&mut self, len: usize) -> Result<()> {
        let handle = self.file.as_mut().ok_or_else(no_file)?;
        let data = &self.buffer[HEADER_LEN..HEADER_LEN + len];

        let written = self.caps.files.write(handle, data).map_err(Error::File)?;
        if written != len {
            return Err(Error::File(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("wrote {} of {} bytes", written, len),
            )));
        }
        Ok(())
    }

    pub(crate) fn close_file(&mut self) {
        if let Some(handle) = self.file.take() {
            self.caps.files.close(handle);
            debug!("Closed {:?}", self.filename);
        }
    }

    /// Close any open file and forget the transfer.
    pub fn cleanup(&mut self) {
        self.close_file();
        self.stage = Stage::None;
    }
}

fn no_file() -> Error {
    Error::File(io::Error::new(io::ErrorKind::NotFound, "no file open"))
}

pub(crate) fn check_buffer(buffer: &[u8]) -> Result<()> {
    if buffer.len() < MAX_PACKET_LEN {
        return Err(Error::Allocation { required: MAX_PACKET_LEN, actual: buffer.len() });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
