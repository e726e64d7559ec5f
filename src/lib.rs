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

//! YMODEM file transfer (CRC-16, 128/1024 byte packets) over any byte channel.
//!
//! The protocol engine only talks to the outside world through the
//! [`Channel`], [`FileAccess`] and [`Clock`] traits, so the same code drives
//! a serial port, a socket or an in-memory pipe.
//!
//! ```no_run
//! use ymlink::{Capabilities, Sender, StdFiles, SystemClock, MAX_PACKET_LEN};
//! use ymlink::serial::RealSerialPort;
//! use serialport::{DataBits, Parity, StopBits};
//!
//! let port = RealSerialPort::open("/dev/ttyUSB0", 115200, DataBits::Eight, Parity::None, StopBits::One)?;
//! let caps = Capabilities::new(port, StdFiles::new("."), SystemClock::new());
//! let mut sender = Sender::new(caps, vec![0; MAX_PACKET_LEN], vec![0; MAX_PACKET_LEN])?;
//! sender.send_file("firmware.bin", 30)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capability;
pub mod context;
pub mod error;
pub mod file_info;
pub mod files;
pub mod packet;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod serial;

#[cfg(test)]
mod test_support;

pub use capability::{Capabilities, Channel, Clock, FileAccess, SystemClock};
pub use error::{Error, Result};
pub use file_info::FileInfo;
pub use files::StdFiles;
pub use protocol::{Stage, MAX_PACKET_LEN};
pub use receiver::Receiver;
pub use sender::Sender;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use std::thread;

    /// Run both ends against each other over an in-process pipe.
    fn transfer(
        data: &[u8],
        to_receiver: PipeChannel,
        to_sender: PipeChannel,
    ) -> (Result<()>, Result<FileInfo>, MemFiles) {
        let source = MemFiles::with_file("a.bin", data);
        let sink = MemFiles::new();

        let sending = thread::spawn(move || {
            let caps = Capabilities::new(to_receiver, source, SystemClock::new());
            let mut sender = Sender::new(caps, vec![0; MAX_PACKET_LEN], vec![0; MAX_PACKET_LEN])?;
            sender.send_file("a.bin", 5)
        });

        let caps = Capabilities::new(to_sender, sink.clone(), SystemClock::new());
        let received = Receiver::new(caps, vec![0; MAX_PACKET_LEN]).and_then(|mut rx| rx.receive_file(5));
        let sent = sending.join().unwrap();

        (sent, received, sink)
    }

    #[test]
    fn test_loopback_transfer() {
        let data = pattern(2000);
        let (tx_end, rx_end) = pipe_pair();

        let (sent, received, sink) = transfer(&data, tx_end, rx_end);
        sent.unwrap();
        assert_eq!(received.unwrap(), FileInfo::new("a.bin", Some(2000)));
        assert_eq!(sink.contents("a.bin").unwrap(), data);
        assert_eq!(sink.closed(), 1);
    }

    #[test]
    fn test_loopback_recovers_from_corrupt_packet() {
        let data = pattern(3000);
        let (tx_end, rx_end) = pipe_pair();

        // Second send from the sender is data packet #1
        let (sent, received, sink) = transfer(&data, tx_end.corrupting(2), rx_end);
        sent.unwrap();
        received.unwrap();
        assert_eq!(sink.contents("a.bin").unwrap(), data);
    }

    #[test]
    fn test_loopback_recovers_from_lost_ack() {
        let data = pattern(3000);
        let (tx_end, rx_end) = pipe_pair();

        // Receiver sends C, ACK, C, then the ACK for packet #1
        let (sent, received, sink) = transfer(&data, tx_end, rx_end.corrupting(4));
        sent.unwrap();
        received.unwrap();
        assert_eq!(sink.contents("a.bin").unwrap(), data);
    }
}
