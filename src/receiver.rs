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

use std::io;
use log::{debug, info, trace, warn};
use crate::capability::{Capabilities, Channel, Clock, FileAccess};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::file_info::FileInfo;
use crate::protocol::*;

// ============================================================================
// Receiver
// ============================================================================

/// Receiving side of a YMODEM transfer.
pub struct Receiver<C, F: FileAccess, K> {
    ctx: Context<C, F, K>,
    /// Bytes written to the current file
    received: u64,
}

impl<C: Channel, F: FileAccess, K: Clock> Receiver<C, F, K> {
    /// `buffer` must hold at least `MAX_PACKET_LEN` bytes.
    pub fn new(caps: Capabilities<C, F, K>, buffer: Vec<u8>) -> Result<Self> {
        let ctx = Context::new(caps, buffer)?;
        Ok(Receiver { ctx, received: 0 })
    }

    pub fn stage(&self) -> Stage {
        self.ctx.stage()
    }

    pub fn capabilities(&self) -> &Capabilities<C, F, K> {
        &self.ctx.caps
    }

    pub fn capabilities_mut(&mut self) -> &mut Capabilities<C, F, K> {
        &mut self.ctx.caps
    }

    pub fn into_capabilities(mut self) -> Capabilities<C, F, K> {
        self.ctx.cleanup();
        self.ctx.caps
    }

    /// Receive one file, polling for a sender for up to `handshake_timeout_s` seconds.
    ///
    /// The file is created under the name the sender offers.
    pub fn receive_file(&mut self, handshake_timeout_s: u32) -> Result<FileInfo> {
        let result = self.transfer(handshake_timeout_s);
        self.ctx.close_file();

        match &result {
            Ok(info) => info!("Received {:?} ({} bytes)", info.filename, self.received),
            Err(e) => debug!("Receive failed in stage {}: {}", self.ctx.stage, e),
        }
        result
    }

    /// Give up on the transfer: tell the sender, then release the file.
    pub fn cancel(&mut self) -> Result<()> {
        let sent = self.ctx.abort();
        self.ctx.cleanup();
        sent
    }

    pub fn cleanup(&mut self) {
        self.ctx.cleanup();
    }

    fn transfer(&mut self, handshake_timeout_s: u32) -> Result<FileInfo> {
        self.ctx.reset();
        self.received = 0;

        let info = self.handshake(handshake_timeout_s)?;
        self.transmit()?;
        self.finish()?;
        Ok(info)
    }

    /// Whether everything the sender announced has been written.
    fn file_complete(&self) -> bool {
        self.ctx.file_size.is_none_or(|size| self.received >= size)
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    fn handshake(&mut self, handshake_timeout_s: u32) -> Result<FileInfo> {
        self.ctx.set_stage(Stage::Establishing);
        self.wait_for_header(handshake_timeout_s)?;

        let (seq, len) = self.ctx.receive_packet()?;
        if seq != 0 {
            return Err(Error::WrongSequence { expected: 0, received: seq });
        }

        let Some(info) = FileInfo::parse(self.ctx.payload(len))? else {
            info!("Sender has no file to offer");
            self.ctx.send_byte(ACK)?;
            return Err(Error::File(io::Error::new(io::ErrorKind::NotFound, "no file offered")));
        };

        match info.size {
            Some(size) => info!("Receiving {:?} ({} bytes)", info.filename, size),
            None => info!("Receiving {:?} (size unknown)", info.filename),
        }
        self.ctx.filename = info.filename.clone();
        self.ctx.file_size = info.size;

        if let Err(e) = self.ctx.open_file(&info.filename, true) {
            warn!("Cannot create {:?}: {}", info.filename, e);
            self.ctx.abort_quietly();
            return Err(e);
        }

        self.ctx.send_byte(ACK)?;
        self.ctx.send_byte(CRC_REQUEST)?;
        self.ctx.seq = 1;
        self.ctx.set_stage(Stage::Established);
        Ok(info)
    }

    /// Ask for CRC mode once per `HANDSHAKE_INTERVAL` until a header byte arrives.
    /// The header is left in `buffer[0]`.
    fn wait_for_header(&mut self, handshake_timeout_s: u32) -> Result<()> {
        for attempt in 1..=handshake_timeout_s {
            let started = self.ctx.now_ms();
            self.ctx.send_byte(CRC_REQUEST)?;

            match self.ctx.receive_byte(HANDSHAKE_INTERVAL)? {
                Some(code @ (SOH | STX)) => {
                    self.ctx.buffer[0] = code;
                    return Ok(());
                }
                Some(other) => {
                    trace!("Ignoring {} during handshake", code_name(other));
                    self.ctx.finish_interval(started, HANDSHAKE_INTERVAL);
                }
                None => trace!("No sender yet ({}/{})", attempt, handshake_timeout_s),
            }
        }

        warn!("No sender within {} s", handshake_timeout_s);
        Err(Error::Timeout)
    }

    // ========================================================================
    // Data
    // ========================================================================

    fn transmit(&mut self) -> Result<()> {
        self.ctx.set_stage(Stage::Transmitting);
        self.ctx.error_count = 0;
        let mut any_data = false;

        loop {
            let Some(code) = self.ctx.receive_byte(PACKET_TIMEOUT)? else {
                warn!("Sender went silent after {} bytes", self.received);
                return Err(Error::Timeout);
            };

            match code {
                SOH | STX => {}
                EOT => {
                    if !self.file_complete() {
                        warn!(
                            "EOT after {} of {} bytes",
                            self.received,
                            self.ctx.file_size.unwrap_or(0)
                        );
                    }
                    debug!("End of data after {} bytes", self.received);
                    return Ok(());
                }
                CAN => {
                    if self.ctx.receive_byte(CHAR_TIMEOUT)? == Some(CAN) {
                        warn!("Sender cancelled the transfer");
                        return Err(Error::Cancelled);
                    }
                    self.reject(Error::WrongCode(CAN))?;
                    continue;
                }
                other => {
                    self.reject(Error::WrongCode(other))?;
                    continue;
                }
            }

            self.ctx.buffer[0] = code;
            let (seq, len) = match self.ctx.receive_packet() {
                Ok(header) => header,
                Err(e) if e.is_recoverable() => {
                    self.reject(e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let expected = self.ctx.seq;
            if seq == expected.wrapping_sub(1) {
                // Our ACK got lost and the sender repeated itself
                debug!("Repeated packet #{}, acknowledging again", seq);
                self.ctx.send_byte(ACK)?;
                if !any_data && seq == 0 {
                    self.ctx.send_byte(CRC_REQUEST)?;
                }
                continue;
            }
            if seq != expected {
                self.reject(Error::WrongSequence { expected, received: seq })?;
                continue;
            }

            self.ctx.error_count = 0;
            self.store(len)?;
            self.ctx.send_byte(ACK)?;
            self.ctx.seq = expected.wrapping_add(1);
            any_data = true;
        }
    }

    /// Write the payload just received, leaving out padding past the announced size.
    fn store(&mut self, len: usize) -> Result<()> {
        let len = match self.ctx.file_size {
            Some(size) => size.saturating_sub(self.received).min(len as u64) as usize,
            None => len,
        };
        if len == 0 {
            return Ok(());
        }

        if let Err(e) = self.ctx.write_payload(len) {
            warn!("Writing {:?} failed: {}", self.ctx.filename, e);
            self.ctx.abort_quietly();
            return Err(e);
        }
        self.received += len as u64;
        trace!("Packet #{}: wrote {} bytes ({} total)", self.ctx.seq, len, self.received);
        Ok(())
    }

    /// NAK a bad byte or packet, or give up with `err` once the budget is spent.
    fn reject(&mut self, err: Error) -> Result<()> {
        self.ctx.error_count += 1;
        if self.ctx.error_count > MAX_ERRORS {
            warn!("Giving up after {} consecutive errors: {}", MAX_ERRORS, err);
            return Err(err);
        }

        debug!("Rejecting ({}/{}): {}", self.ctx.error_count, MAX_ERRORS, err);
        self.ctx.send_byte(NAK)
    }

    // ========================================================================
    // Termination
    // ========================================================================

    fn finish(&mut self) -> Result<()> {
        self.ctx.set_stage(Stage::Finishing);

        if self.confirm_eot()? {
            self.ctx.send_byte(ACK)?;
            self.ctx.send_byte(CRC_REQUEST)?;
            self.wait_for_batch_end()?;
        }

        self.ctx.set_stage(Stage::Finished);
        Ok(())
    }

    /// NAK the first EOT and wait for the confirming one.
    ///
    /// Returns false when it never came but the file is complete anyway.
    fn confirm_eot(&mut self) -> Result<bool> {
        let mut last = None;
        for _ in 0..2 {
            self.ctx.send_byte(NAK)?;
            last = self.ctx.receive_byte(PACKET_TIMEOUT)?;
            match last {
                Some(EOT) => return Ok(true),
                Some(other) => debug!("Expected second EOT, got {}", code_name(other)),
                None => debug!("Timeout waiting for second EOT"),
            }
        }

        if self.file_complete() {
            warn!("Second EOT never arrived, file is complete anyway");
            return Ok(false);
        }
        Err(match last {
            Some(code) => Error::WrongCode(code),
            None => Error::Timeout,
        })
    }

    /// After ACK + `C`, wait for the empty packet 0 that closes the batch.
    fn wait_for_batch_end(&mut self) -> Result<()> {
        for _ in 0..MAX_ERRORS {
            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(code @ (SOH | STX)) => {
                    self.ctx.buffer[0] = code;
                    match self.ctx.receive_packet() {
                        Ok((0, len)) => {
                            match FileInfo::parse(self.ctx.payload(len)) {
                                Ok(None) => debug!("Batch end received"),
                                Ok(Some(next)) => info!(
                                    "Sender offers {:?} next; only one file is received per call",
                                    next.filename
                                ),
                                Err(e) => debug!("Unreadable batch end packet: {}", e),
                            }
                            self.ctx.send_byte(ACK)?;
                            return Ok(());
                        }
                        Ok((seq, _)) => debug!("Packet #{} while waiting for batch end", seq),
                        Err(e) if e.is_recoverable() => debug!("Bad batch end packet: {}", e),
                        Err(e) => return Err(e),
                    }
                }
                Some(EOT) => {
                    debug!("Repeated EOT, acknowledging");
                    self.ctx.send_byte(ACK)?;
                }
                Some(other) => debug!("Unexpected {} while waiting for batch end", code_name(other)),
                None => debug!("Timeout waiting for batch end"),
            }
        }

        if self.file_complete() {
            warn!("No batch end packet, file is complete anyway");
            return Ok(());
        }
        Err(Error::Ack)
    }
}

// ============================================================================
// Tests
// ============================================================================
