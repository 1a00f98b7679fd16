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

//! Batch layout: number of batches, each batch's row count, and the
//! positions of the manifest and page table. Wraps [`proto::Metadata`]
//! with the cumulative-offset index used by row-to-batch lookups.

use bytes::{Bytes, BytesMut};
use prost::Message;

use crate::error::{self, Result};
use crate::io::endian::{put_framed, read_framed};
use crate::proto;

pub struct Metadata {
    inner: proto::Metadata,
    cumulative: Vec<u64>,
}

impl Metadata {
    pub fn new(batch_lengths: Vec<u64>, manifest_position: u64, page_table_position: u64) -> Metadata {
        let cumulative = cumulative_offsets(&batch_lengths);
        Metadata {
            inner: proto::Metadata {
                batch_lengths,
                manifest_position,
                page_table_position,
            },
            cumulative,
        }
    }

    pub fn num_batches(&self) -> usize {
        self.inner.num_batches()
    }

    pub fn batch_length(&self, batch_id: usize) -> u64 {
        self.inner.batch_lengths[batch_id]
    }

    pub fn total_rows(&self) -> u64 {
        *self.cumulative.last().unwrap_or(&0)
    }

    pub fn manifest_position(&self) -> u64 {
        self.inner.manifest_position
    }

    pub fn page_table_position(&self) -> u64 {
        self.inner.page_table_position
    }

    /// Map an absolute row index to `(batch_id, row_in_batch)`. The boundary
    /// row of batch `b` (the first row whose cumulative offset equals
    /// `cumulative[b+1]`) belongs to batch `b+1`, never to `b`: a batch's
    /// own rows are exactly `[cumulative[b], cumulative[b+1])`.
    pub fn locate_chunk(&self, row: u64) -> Result<(usize, u64)> {
        if row >= self.total_rows() {
            return error::InvalidArgumentSnafu {
                msg: format!("row {row} out of range for {} total rows", self.total_rows()),
            }
            .fail();
        }
        let batch_id = self.cumulative.partition_point(|&c| c <= row) - 1;
        Ok((batch_id, row - self.cumulative[batch_id]))
    }

    pub fn parse(buf: &Bytes) -> Result<Metadata> {
        let inner = proto::Metadata::decode(&buf[..]).map_err(|source| error::DecodeProtoSnafu { source }.build())?;
        let cumulative = cumulative_offsets(&inner.batch_lengths);
        Ok(Metadata { inner, cumulative })
    }

    pub fn write_framed(&self, out: &mut BytesMut) {
        put_framed(out, &self.inner.encode_to_vec());
    }

    pub fn read_framed(buf: &Bytes, offset: usize) -> Result<(Metadata, usize)> {
        let (msg, next) = read_framed(buf, offset)?;
        Ok((Metadata::parse(&msg)?, next))
    }
}

fn cumulative_offsets(batch_lengths: &[u64]) -> Vec<u64> {
    let mut cumulative = Vec::with_capacity(batch_lengths.len() + 1);
    cumulative.push(0);
    let mut running = 0u64;
    for len in batch_lengths {
        running += len;
        cumulative.push(running);
    }
    cumulative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_chunk_boundaries() {
        let metadata = Metadata::new(vec![10, 0, 5], 0, 0);
        assert_eq!(metadata.locate_chunk(0).unwrap(), (0, 0));
        assert_eq!(metadata.locate_chunk(9).unwrap(), (0, 9));
        // batch 1 is empty, so row 10 falls straight into batch 2.
        assert_eq!(metadata.locate_chunk(10).unwrap(), (2, 0));
        assert_eq!(metadata.locate_chunk(14).unwrap(), (2, 4));
        assert!(metadata.locate_chunk(15).is_err());
    }

    #[test]
    fn roundtrip() {
        let metadata = Metadata::new(vec![3, 4], 100, 200);
        let mut out = BytesMut::new();
        metadata.write_framed(&mut out);
        let (parsed, _) = Metadata::read_framed(&out.freeze(), 0).unwrap();
        assert_eq!(parsed.num_batches(), 2);
        assert_eq!(parsed.total_rows(), 7);
        assert_eq!(parsed.manifest_position(), 100);
        assert_eq!(parsed.page_table_position(), 200);
    }
}
