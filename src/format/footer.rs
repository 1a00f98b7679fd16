// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The 16-byte trailer: `metadata_position (u64 LE) | major_version (u32 LE)
//! | "LANC" (4 bytes)`. Every open starts by reading this from the tail.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{self, Result};
use crate::io::endian::{read_u32_le, read_u64_le};

pub const FOOTER_LEN: usize = 16;
pub const MAGIC: &[u8; 4] = b"LANC";
pub const MAJOR_VERSION: u32 = 1;

pub struct Footer {
    pub metadata_position: u64,
    pub major_version: u32,
}

impl Footer {
    /// Parse the trailing [`FOOTER_LEN`] bytes of a file tail buffer.
    /// `tail` must already be at least that long; callers read the whole
    /// trailing 64 KiB (or the whole file) and slice into it.
    pub fn parse(tail: &Bytes) -> Result<Footer> {
        if tail.len() < FOOTER_LEN {
            return error::IoSnafu {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("file of {} bytes is smaller than the {FOOTER_LEN}-byte footer", tail.len()),
                ),
            }
            .fail();
        }
        let footer_start = tail.len() - FOOTER_LEN;
        let magic = &tail[footer_start + 12..footer_start + 16];
        if magic != MAGIC {
            return error::IoSnafu {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad magic: expected {MAGIC:?}, found {magic:?}"),
                ),
            }
            .fail();
        }
        let metadata_position = read_u64_le(tail, footer_start)?;
        let major_version = read_u32_le(tail, footer_start + 8)?;
        Ok(Footer {
            metadata_position,
            major_version,
        })
    }

    pub fn write(&self, out: &mut BytesMut) {
        out.put_u64_le(self.metadata_position);
        out.put_u32_le(self.major_version);
        out.put_slice(MAGIC);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut out = BytesMut::new();
        let footer = Footer {
            metadata_position: 12345,
            major_version: MAJOR_VERSION,
        };
        footer.write(&mut out);
        let parsed = Footer::parse(&out.freeze()).unwrap();
        assert_eq!(parsed.metadata_position, 12345);
        assert_eq!(parsed.major_version, MAJOR_VERSION);
    }

    #[test]
    fn bad_magic_is_io_error() {
        let mut out = BytesMut::new();
        out.put_u64_le(0);
        out.put_u32_le(MAJOR_VERSION);
        out.put_slice(b"NOPE");
        let err = Footer::parse(&out.freeze()).unwrap_err();
        assert!(matches!(err, error::LanceError::IoError { .. }));
    }

    #[test]
    fn too_small_is_io_error() {
        let buf = Bytes::from_static(b"short");
        assert!(Footer::parse(&buf).is_err());
    }
}
