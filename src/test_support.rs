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

//! Test doubles for the capability set and packet builders.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::capability::{Channel, Clock, FileAccess};
use crate::file_info::FileInfo;
use crate::packet;
use crate::protocol::*;

// ============================================================================
// In-memory files
// ============================================================================

#[derive(Default)]
pub struct MemFs {
    files: HashMap<String, Vec<u8>>,
    opened: usize,
    closed: usize,
    deny_writes: bool,
    fail_writes: bool,
    fail_reads: bool,
    read_chunk: Option<usize>,
}

/// Shared in-memory file store; clones see the same files.
#[derive(Clone, Default)]
pub struct MemFiles {
    state: Arc<Mutex<MemFs>>,
}

pub struct MemHandle {
    name: String,
    pos: usize,
}

impl MemFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(name: &str, data: &[u8]) -> Self {
        let files = Self::new();
        files.fs().files.insert(name.to_string(), data.to_vec());
        files
    }

    fn fs(&self) -> MutexGuard<'_, MemFs> {
        self.state.lock().unwrap()
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.fs().files.get(name).cloned()
    }

    pub fn opened(&self) -> usize {
        self.fs().opened
    }

    pub fn closed(&self) -> usize {
        self.fs().closed
    }

    /// Opening for writing fails.
    pub fn deny_writes(self) -> Self {
        self.fs().deny_writes = true;
        self
    }

    /// Writes accept nothing.
    pub fn fail_writes(self) -> Self {
        self.fs().fail_writes = true;
        self
    }

    pub fn fail_reads(self) -> Self {
        self.fs().fail_reads = true;
        self
    }

    /// Reads return at most `n` bytes at a time.
    pub fn read_chunk(self, n: usize) -> Self {
        self.fs().read_chunk = Some(n);
        self
    }
}

impl FileAccess for MemFiles {
    type Handle = MemHandle;

    fn open(&mut self, name: &str, writing: bool) -> io::Result<MemHandle> {
        let mut fs = self.fs();
        if writing {
            if fs.deny_writes {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"));
            }
            fs.files.insert(name.to_string(), Vec::new());
        } else if !fs.files.contains_key(name) {
            return Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()));
        }
        fs.opened += 1;
        Ok(MemHandle { name: name.to_string(), pos: 0 })
    }

    fn read(&mut self, handle: &mut MemHandle, buf: &mut [u8]) -> io::Result<usize> {
        let fs = self.fs();
        if fs.fail_reads {
            return Err(io::Error::other("media error"));
        }
        let data = &fs.files[&handle.name];
        let n = buf
            .len()
            .min(data.len() - handle.pos)
            .min(fs.read_chunk.unwrap_or(usize::MAX));
        buf[..n].copy_from_slice(&data[handle.pos..handle.pos + n]);
        handle.pos += n;
        Ok(n)
    }

    fn write(&mut self, handle: &mut MemHandle, buf: &[u8]) -> io::Result<usize> {
        let mut fs = self.fs();
        if fs.fail_writes {
            return Ok(0);
        }
        fs.files.get_mut(&handle.name).unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self, _handle: MemHandle) {
        self.fs().closed += 1;
    }

    fn size(&mut self, handle: &mut MemHandle) -> io::Result<u64> {
        Ok(self.fs().files[&handle.name].len() as u64)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Virtual time: only moves when slept on, or by `tick` per reading.
#[derive(Default)]
pub struct TestClock {
    now: AtomicU64,
    tick: u64,
    slept: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking(tick: u64) -> Self {
        TestClock { tick, ..Self::default() }
    }

    pub fn slept_ms(&self) -> u64 {
        self.slept.load(Ordering::SeqCst)
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.tick, Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
        self.slept.fetch_add(ms, Ordering::SeqCst);
    }
}

// ============================================================================
// In-process byte pipe
// ============================================================================

/// One end of a bidirectional in-process link.
pub struct PipeChannel {
    tx: mpsc::Sender<u8>,
    rx: mpsc::Receiver<u8>,
    sends: usize,
    corrupt_send: Option<usize>,
}

pub fn pipe_pair() -> (PipeChannel, PipeChannel) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        PipeChannel { tx: a_tx, rx: a_rx, sends: 0, corrupt_send: None },
        PipeChannel { tx: b_tx, rx: b_rx, sends: 0, corrupt_send: None },
    )
}

impl PipeChannel {
    /// Flip the middle byte of the `nth` send call (1-based).
    pub fn corrupting(mut self, nth: usize) -> Self {
        self.corrupt_send = Some(nth);
        self
    }
}

impl Channel for PipeChannel {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sends += 1;
        let corrupt = self.corrupt_send == Some(self.sends);
        for (i, &b) in buf.iter().enumerate() {
            let b = if corrupt && i == buf.len() / 2 { b ^ 0xFF } else { b };
            self.tx
                .send(b)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer hung up"))?;
        }
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(b) => {
                buf[0] = b;
                let mut n = 1;
                while n < buf.len() {
                    match self.rx.try_recv() {
                        Ok(b) => {
                            buf[n] = b;
                            n += 1;
                        }
                        Err(_) => break,
                    }
                }
                Ok(n)
            }
            // A vanished peer looks like silence
            Err(_) => Ok(0),
        }
    }
}

// ============================================================================
// Packet builders
// ============================================================================

/// Encode a packet whose payload already has the right size.
pub fn frame(code: u8, seq: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; MAX_PACKET_LEN];
    let n = packet::encode(&mut out, code, seq, payload).unwrap();
    out.truncate(n);
    out
}

/// Encode file data, padding it with `PAD_BYTE` up to the packet size.
pub fn data_packet(code: u8, seq: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = data.to_vec();
    payload.resize(packet::payload_len(code).unwrap(), PAD_BYTE);
    frame(code, seq, &payload)
}

pub fn info_packet(name: &str, size: Option<u64>) -> Vec<u8> {
    let mut payload = [0u8; SOH_PAYLOAD_LEN];
    FileInfo::new(name, size).encode(&mut payload).unwrap();
    frame(SOH, 0, &payload)
}

/// Empty packet 0 that ends a batch.
pub fn null_packet() -> Vec<u8> {
    frame(SOH, 0, &[0u8; SOH_PAYLOAD_LEN])
}

/// Script entries for `MockSerialPort`.
pub fn bytes(data: &[u8]) -> Vec<Option<u8>> {
    data.iter().copied().map(Some).collect()
}

/// Deterministic file content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
