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

//! The outside world as the protocol engine sees it: a byte channel,
//! file access and a clock.

use std::io;
use std::time::{Duration, Instant};

// ============================================================================
// Traits
// ============================================================================

/// Byte channel to the peer.
pub trait Channel {
    /// Hand `buf` to the transport, returning how many bytes it accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    /// Returns `Ok(0)` when the timeout elapses with nothing received.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// File storage the transfer reads from or writes into.
pub trait FileAccess {
    type Handle;

    fn open(&mut self, name: &str, writing: bool) -> io::Result<Self::Handle>;

    /// Returns 0 at end of input.
    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, handle: &mut Self::Handle, buf: &[u8]) -> io::Result<usize>;

    fn close(&mut self, handle: Self::Handle);

    fn size(&mut self, handle: &mut Self::Handle) -> io::Result<u64>;
}

/// Monotonic time source.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn sleep_ms(&self, ms: u64);
}

// ============================================================================
// Capability set
// ============================================================================

/// Everything a transfer needs from its surroundings.
pub struct Capabilities<C, F, K> {
    pub channel: C,
    pub files: F,
    pub clock: K,
}

impl<C: Channel, F: FileAccess, K: Clock> Capabilities<C, F, K> {
    pub fn new(channel: C, files: F, clock: K) -> Self {
        Capabilities { channel, files, clock }
    }

    /// Send all of `buf` in one call; a partial send is an error.
    pub fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let sent = self.channel.send(buf)?;
        if sent != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("channel accepted {} of {} bytes", sent, buf.len()),
            ));
        }
        Ok(())
    }

    /// `None` when nothing arrives within `timeout`.
    pub fn receive_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.channel.receive(&mut byte, timeout)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Fill `buf` within a single `timeout` window, returning how much arrived.
    ///
    /// Bytes may trickle in over several channel reads; the deadline covers all
    /// of them rather than each one.
    pub fn receive_exact(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = self.clock.now_ms() + timeout.as_millis() as u64;
        let mut filled = 0;

        while filled < buf.len() {
            let remaining = deadline.saturating_sub(self.clock.now_ms());
            if remaining == 0 {
                break;
            }
            let n = self
                .channel
                .receive(&mut buf[filled..], Duration::from_millis(remaining))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(filled)
    }
}

// ============================================================================
// System clock
// ============================================================================

/// Wall-clock-independent clock backed by `Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

// ============================================================================
// Tests
// ============================================================================
