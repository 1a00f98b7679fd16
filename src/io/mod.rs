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

pub mod endian;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{self, Result};

/// Primary source used to read pages and the file tail.
///
/// Implementations must support concurrent positional reads: `read_at` never
/// mutates shared cursor state, so many fan-out tasks can share one source.
pub trait RandomAccessSource: Send + Sync {
    /// Total length of the underlying file, in bytes.
    fn byte_len(&self) -> Result<u64>;

    /// Read `length` bytes starting at `position`. Reading past end of file
    /// is an `IoError`.
    fn read_at(&self, position: u64, length: u64) -> Result<Bytes>;
}

impl RandomAccessSource for File {
    fn byte_len(&self) -> Result<u64> {
        self.metadata()
            .map(|m| m.len())
            .map_err(|source| error::IoSnafu { source }.build())
    }

    /// Cheap because it clones the file descriptor rather than sharing a
    /// cursor; every call seeks its own handle.
    fn read_at(&self, position: u64, length: u64) -> Result<Bytes> {
        let mut file = self
            .try_clone()
            .map_err(|source| error::IoSnafu { source }.build())?;
        file.seek(SeekFrom::Start(position))
            .map_err(|source| error::IoSnafu { source }.build())?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)
            .map_err(|source| error::IoSnafu { source }.build())?;
        Ok(buf.into())
    }
}

impl RandomAccessSource for Bytes {
    fn byte_len(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, position: u64, length: u64) -> Result<Bytes> {
        let start = position as usize;
        let end = start + length as usize;
        if end > self.len() {
            return Err(error::IoSnafu {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "read_at({position}, {length}) beyond end of {}-byte source",
                        self.len()
                    ),
                ),
            }
            .build());
        }
        Ok(self.slice(start..end))
    }
}

impl<T: RandomAccessSource + ?Sized> RandomAccessSource for Arc<T> {
    fn byte_len(&self) -> Result<u64> {
        (**self).byte_len()
    }

    fn read_at(&self, position: u64, length: u64) -> Result<Bytes> {
        (**self).read_at(position, length)
    }
}

#[cfg(feature = "async")]
mod async_source {
    use super::*;

    /// Async counterpart of [`RandomAccessSource`], used by the reader's
    /// per-field fan-out. Any synchronous source gets one for free by
    /// running its blocking calls on a dedicated executor thread, so a
    /// single `Arc<dyn RandomAccessSource>` can back both the sync and
    /// async call paths.
    #[async_trait::async_trait]
    pub trait AsyncRandomAccessSource: Send + Sync {
        async fn byte_len(&self) -> Result<u64>;
        async fn read_at(&self, position: u64, length: u64) -> Result<Bytes>;
    }

    #[async_trait::async_trait]
    impl<T> AsyncRandomAccessSource for T
    where
        T: RandomAccessSource + Clone + 'static,
    {
        async fn byte_len(&self) -> Result<u64> {
            let this = self.clone();
            tokio::task::spawn_blocking(move || RandomAccessSource::byte_len(&this))
                .await
                .map_err(|source| error::CancelledSnafu {
                    msg: source.to_string(),
                }
                .build())?
        }

        async fn read_at(&self, position: u64, length: u64) -> Result<Bytes> {
            let this = self.clone();
            tokio::task::spawn_blocking(move || RandomAccessSource::read_at(&this, position, length))
                .await
                .map_err(|source| error::CancelledSnafu {
                    msg: source.to_string(),
                }
                .build())?
        }
    }
}

#[cfg(feature = "async")]
pub use async_source::AsyncRandomAccessSource;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_source_reads_in_range() {
        let data = Bytes::from_static(b"0123456789");
        assert_eq!(&data.read_at(2, 4).unwrap()[..], b"2345");
    }

    #[test]
    fn bytes_source_out_of_range_is_error() {
        let data = Bytes::from_static(b"0123456789");
        assert!(data.read_at(8, 4).is_err());
    }
}
