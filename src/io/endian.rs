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

//! Little-endian fixed-width reads/writes and length-prefixed message
//! framing, against in-memory byte slices.
//!
//! The format is little-endian throughout; all multi-byte integers on disk
//! go through these helpers so there is exactly one place that encodes
//! that decision.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{self, Result};

/// Read a little-endian `u32` at `buf[offset..offset+4]`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .ok_or_else(|| too_short(buf.len(), offset, 4))?
        .try_into()
        .expect("slice length checked above");
    Ok(u32::from_le_bytes(bytes))
}

/// Read a little-endian `i64` at `buf[offset..offset+8]`.
pub fn read_i64_le(buf: &[u8], offset: usize) -> Result<i64> {
    let bytes: [u8; 8] = buf
        .get(offset..offset + 8)
        .ok_or_else(|| too_short(buf.len(), offset, 8))?
        .try_into()
        .expect("slice length checked above");
    Ok(i64::from_le_bytes(bytes))
}

/// Read a little-endian `u64` at `buf[offset..offset+8]`.
pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64> {
    let bytes: [u8; 8] = buf
        .get(offset..offset + 8)
        .ok_or_else(|| too_short(buf.len(), offset, 8))?
        .try_into()
        .expect("slice length checked above");
    Ok(u64::from_le_bytes(bytes))
}

/// Read a little-endian `i32` at `buf[offset..offset+4]`.
pub fn read_i32_le(buf: &[u8], offset: usize) -> Result<i32> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .ok_or_else(|| too_short(buf.len(), offset, 4))?
        .try_into()
        .expect("slice length checked above");
    Ok(i32::from_le_bytes(bytes))
}

fn too_short(len: usize, offset: usize, want: usize) -> error::LanceError {
    error::IoSnafu {
        source: std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "buffer of {len} bytes too short to read {want} bytes at offset {offset}"
            ),
        ),
    }
    .build()
}

/// Append a little-endian `u32` length prefix followed by `payload`.
pub fn put_framed(out: &mut BytesMut, payload: &[u8]) {
    out.put_u32_le(payload.len() as u32);
    out.put_slice(payload);
}

/// Read one length-prefixed message out of `buf` starting at `offset`.
///
/// Returns the message bytes and the offset immediately past them. The
/// 4-byte length prefix itself is little-endian.
pub fn read_framed(buf: &Bytes, offset: usize) -> Result<(Bytes, usize)> {
    let len = read_u32_le(buf, offset)? as usize;
    let start = offset + 4;
    let end = start
        .checked_add(len)
        .ok_or_else(|| too_short(buf.len(), start, len))?;
    if end > buf.len() {
        return Err(too_short(buf.len(), start, len));
    }
    Ok((buf.slice(start..end), end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_fixed_width() {
        let mut buf = vec![0u8; 4];
        buf[..4].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(read_u32_le(&buf, 0).unwrap(), 42);

        let mut buf = vec![0u8; 8];
        buf.copy_from_slice(&(-7i64).to_le_bytes());
        assert_eq!(read_i64_le(&buf, 0).unwrap(), -7);
    }

    #[test]
    fn read_u32_out_of_range_is_io_error() {
        let buf = [0u8; 2];
        let err = read_u32_le(&buf, 0).unwrap_err();
        assert!(matches!(err, error::LanceError::IoError { .. }));
    }

    #[test]
    fn frame_roundtrip() {
        let mut out = BytesMut::new();
        put_framed(&mut out, b"hello");
        put_framed(&mut out, b"world!!");
        let buf = out.freeze();

        let (msg1, next) = read_framed(&buf, 0).unwrap();
        assert_eq!(&msg1[..], b"hello");
        let (msg2, next) = read_framed(&buf, next).unwrap();
        assert_eq!(&msg2[..], b"world!!");
        assert_eq!(next, buf.len());
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let mut out = BytesMut::new();
        out.put_u32_le(100);
        out.put_slice(b"short");
        let buf = out.freeze();
        assert!(read_framed(&buf, 0).is_err());
    }
}
