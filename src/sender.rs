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

use log::{debug, info, trace, warn};
use crate::capability::{Capabilities, Channel, Clock, FileAccess};
use crate::context::{check_buffer, Context};
use crate::error::{Error, Result};
use crate::file_info::{basename, FileInfo};
use crate::packet;
use crate::protocol::*;

// ============================================================================
// Sender
// ============================================================================

/// Sending side of a YMODEM transfer.
pub struct Sender<C, F: FileAccess, K> {
    ctx: Context<C, F, K>,
    /// Outgoing packets are assembled here while `ctx.buffer` holds the payload
    send_buffer: Vec<u8>,
}

impl<C: Channel, F: FileAccess, K: Clock> Sender<C, F, K> {
    /// Both buffers must hold at least `MAX_PACKET_LEN` bytes.
    pub fn new(caps: Capabilities<C, F, K>, buffer: Vec<u8>, send_buffer: Vec<u8>) -> Result<Self> {
        check_buffer(&send_buffer)?;
        let ctx = Context::new(caps, buffer)?;
        Ok(Sender { ctx, send_buffer })
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

    /// Send one file and close the batch behind it.
    ///
    /// Waits up to `handshake_timeout_s` seconds for the receiver to ask for
    /// CRC mode. Only the last path component is offered as the name.
    pub fn send_file(&mut self, path: &str, handshake_timeout_s: u32) -> Result<()> {
        let result = self.transfer(path, handshake_timeout_s);
        self.ctx.close_file();

        match &result {
            Ok(()) => info!(
                "Sent {:?} ({} bytes)",
                self.ctx.filename,
                self.ctx.file_size.unwrap_or(0)
            ),
            Err(e) => debug!("Send of {:?} failed in stage {}: {}", path, self.ctx.stage, e),
        }
        result
    }

    /// Give up on the transfer: tell the receiver, then release the file.
    pub fn cancel(&mut self) -> Result<()> {
        let sent = self.ctx.abort();
        self.ctx.cleanup();
        sent
    }

    pub fn cleanup(&mut self) {
        self.ctx.cleanup();
    }

    fn transfer(&mut self, path: &str, handshake_timeout_s: u32) -> Result<()> {
        self.ctx.reset();
        self.ctx.open_file(path, false)?;

        let size = self.ctx.open_file_size()?;
        self.ctx.filename = basename(path).to_string();
        self.ctx.file_size = Some(size);
        info!("Offering {:?} ({} bytes)", self.ctx.filename, size);

        self.handshake(handshake_timeout_s)?;
        self.transmit()?;
        self.finish()
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    fn handshake(&mut self, handshake_timeout_s: u32) -> Result<()> {
        self.ctx.set_stage(Stage::Establishing);

        // Build packet 0 up front so an unsendable name fails before any traffic
        let info = FileInfo::new(self.ctx.filename.clone(), self.ctx.file_size);
        info.encode(self.ctx.payload_mut(SOH_PAYLOAD_LEN))?;

        self.wait_for_crc_request(handshake_timeout_s)?;
        debug!("Receiver wants CRC mode, sending packet 0");
        self.send_packet(SOH, 0, SOH_PAYLOAD_LEN)?;

        let mut acked = false;
        for _ in 0..MAX_ERRORS {
            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(ACK) => {
                    debug!("Packet 0 acknowledged");
                    acked = true;
                }
                Some(CRC_REQUEST) => {
                    if !acked {
                        warn!("Got 'C' without an ACK for packet 0, assuming the ACK was lost");
                    }
                    self.ctx.seq = 1;
                    self.ctx.set_stage(Stage::Established);
                    return Ok(());
                }
                Some(NAK) => {
                    debug!("Packet 0 rejected, resending");
                    self.send_packet(SOH, 0, SOH_PAYLOAD_LEN)?;
                }
                Some(CAN) => {
                    warn!("Receiver cancelled during handshake");
                    return Err(Error::Cancelled);
                }
                Some(other) => debug!("Unexpected {} while waiting for packet 0 ACK", code_name(other)),
                None => debug!("Timeout waiting for packet 0 ACK"),
            }
        }

        Err(Error::Ack)
    }

    /// Poll once per `HANDSHAKE_INTERVAL` for the receiver's `C`.
    fn wait_for_crc_request(&mut self, handshake_timeout_s: u32) -> Result<()> {
        for attempt in 1..=handshake_timeout_s {
            let started = self.ctx.now_ms();
            match self.ctx.receive_byte(HANDSHAKE_INTERVAL)? {
                Some(CRC_REQUEST) => return Ok(()),
                Some(NAK) => {
                    debug!("Receiver asked for checksum mode; only CRC mode is supported");
                    self.ctx.finish_interval(started, HANDSHAKE_INTERVAL);
                }
                Some(other) => {
                    trace!("Ignoring {} during handshake", code_name(other));
                    self.ctx.finish_interval(started, HANDSHAKE_INTERVAL);
                }
                None => trace!("No 'C' yet ({}/{})", attempt, handshake_timeout_s),
            }
        }

        warn!("Receiver did not respond within {} s", handshake_timeout_s);
        Err(Error::Timeout)
    }

    // ========================================================================
    // Data
    // ========================================================================

    fn transmit(&mut self) -> Result<()> {
        self.ctx.set_stage(Stage::Transmitting);

        loop {
            let read = match self.ctx.read_payload(STX_PAYLOAD_LEN) {
                Ok(n) => n,
                Err(e) => {
                    warn!("Reading {:?} failed: {}", self.ctx.filename, e);
                    self.ctx.abort_quietly();
                    return Err(e);
                }
            };
            if read == 0 {
                debug!("End of file");
                return Ok(());
            }

            let last = read < STX_PAYLOAD_LEN;
            let code = if last && read <= SOH_PAYLOAD_LEN { SOH } else { STX };
            if last {
                self.ctx.payload_mut(STX_PAYLOAD_LEN)[read..].fill(PAD_BYTE);
            }

            let len = packet::payload_len(code).ok_or(Error::WrongCode(code))?;
            self.send_with_retry(code, len)?;
            self.ctx.seq = self.ctx.seq.wrapping_add(1);

            if last {
                debug!("Short block of {} bytes was the last", read);
                return Ok(());
            }
        }
    }

    /// Send the staged payload until the receiver ACKs it.
    fn send_with_retry(&mut self, code: u8, len: usize) -> Result<()> {
        let seq = self.ctx.seq;
        self.ctx.error_count = 0;

        loop {
            self.send_packet(code, seq, len)?;

            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(ACK) => {
                    trace!("Packet #{} acknowledged", seq);
                    self.ctx.error_count = 0;
                    return Ok(());
                }
                Some(CAN) => {
                    warn!("Receiver cancelled at packet #{}", seq);
                    return Err(Error::Cancelled);
                }
                Some(NAK) => debug!("Packet #{} rejected", seq),
                Some(other) => debug!("Unexpected {} after packet #{}", code_name(other), seq),
                None => debug!("Timeout waiting for ACK of packet #{}", seq),
            }

            self.ctx.error_count += 1;
            if self.ctx.error_count >= MAX_ERRORS {
                warn!("Packet #{} not acknowledged after {} attempts", seq, MAX_ERRORS);
                return Err(Error::Ack);
            }
        }
    }

    fn send_packet(&mut self, code: u8, seq: u8, len: usize) -> Result<()> {
        let n = packet::encode(&mut self.send_buffer, code, seq, self.ctx.payload(len))?;
        self.ctx.caps.send_all(&self.send_buffer[..n])?;
        trace!("Sent: {} packet #{}", code_name(code), seq);
        Ok(())
    }

    // ========================================================================
    // Termination
    // ========================================================================

    fn finish(&mut self) -> Result<()> {
        self.ctx.set_stage(Stage::Finishing);

        // Every data packet is acknowledged by now, so a muddled reply to
        // the second EOT no longer fails the transfer
        let mut batch_requested = false;
        if self.send_first_eot()? {
            self.ctx.send_byte(EOT)?;
            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(ACK) => debug!("Second EOT acknowledged"),
                Some(NAK) => warn!("Second EOT answered with NAK, carrying on"),
                Some(CRC_REQUEST) => {
                    warn!("Got 'C' without an ACK for the second EOT, assuming the ACK was lost");
                    batch_requested = true;
                }
                Some(other) => warn!("Unexpected {} after second EOT, carrying on", code_name(other)),
                None => warn!("No reply to second EOT, carrying on"),
            }
        }

        if !batch_requested {
            self.wait_for_batch_request()?;
        }

        debug!("Sending batch end packet");
        self.ctx.payload_mut(SOH_PAYLOAD_LEN).fill(0);
        self.send_packet(SOH, 0, SOH_PAYLOAD_LEN)?;

        match self.ctx.receive_byte(PACKET_TIMEOUT)? {
            Some(ACK) => debug!("Batch end acknowledged"),
            Some(other) => warn!("Batch end answered with {}, file already delivered", code_name(other)),
            None => warn!("Batch end not acknowledged, file already delivered"),
        }

        self.ctx.set_stage(Stage::Finished);
        Ok(())
    }

    /// Returns whether the receiver wants the confirming second EOT.
    fn send_first_eot(&mut self) -> Result<bool> {
        for _ in 0..MAX_ERRORS {
            self.ctx.send_byte(EOT)?;
            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(NAK) => return Ok(true),
                Some(ACK) => {
                    debug!("First EOT acknowledged outright, skipping the second");
                    return Ok(false);
                }
                Some(CAN) => {
                    warn!("Receiver cancelled at EOT");
                    return Err(Error::Cancelled);
                }
                Some(other) => debug!("Unexpected {} after EOT", code_name(other)),
                None => debug!("Timeout waiting for NAK of EOT"),
            }
        }

        Err(Error::Ack)
    }

    fn wait_for_batch_request(&mut self) -> Result<()> {
        for _ in 0..MAX_ERRORS {
            match self.ctx.receive_byte(PACKET_TIMEOUT)? {
                Some(CRC_REQUEST) => return Ok(()),
                Some(other) => trace!("Ignoring {} while waiting for 'C'", code_name(other)),
                None => trace!("Timeout waiting for 'C'"),
            }
        }

        warn!("Receiver never asked for the batch end packet, sending it anyway");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
