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

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use log::warn;
use crate::capability::FileAccess;
use crate::file_info::basename;

/// Local filesystem storage.
///
/// Files are read from wherever the caller points, but received files are
/// only ever created inside `output_dir`, under the last component of the
/// name the peer offered.
pub struct StdFiles {
    output_dir: PathBuf,
}

impl StdFiles {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        StdFiles { output_dir: output_dir.into() }
    }

    fn destination(&self, name: &str) -> io::Result<PathBuf> {
        let name = basename(name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable file name {:?}", name),
            ));
        }
        Ok(self.output_dir.join(name))
    }
}

impl FileAccess for StdFiles {
    type Handle = File;

    fn open(&mut self, name: &str, writing: bool) -> io::Result<File> {
        if writing {
            File::create(self.destination(name)?)
        } else {
            File::open(name)
        }
    }

    fn read(&mut self, handle: &mut File, buf: &mut [u8]) -> io::Result<usize> {
        handle.read(buf)
    }

    fn write(&mut self, handle: &mut File, buf: &[u8]) -> io::Result<usize> {
        handle.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self, handle: File) {
        if let Err(e) = handle.sync_all() {
            warn!("Flushing file to disk failed: {}", e);
        }
    }

    fn size(&mut self, handle: &mut File) -> io::Result<u64> {
        Ok(handle.metadata()?.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
