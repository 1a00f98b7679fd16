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

//! The dense `(field_id, batch_id) -> (position, length)` page index.
//! Unlike the manifest and metadata this is not a protobuf message: it is
//! a flat row-major matrix of little-endian `i64` pairs, with `-1` marking
//! an absent entry (struct/list fields have no page of their own).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{self, Result};
use crate::io::endian::{put_framed, read_framed, read_i64_le};

const ABSENT: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub position: u64,
    pub length: u64,
}

#[derive(Clone)]
pub struct PageTable {
    num_columns: usize,
    num_batches: usize,
    entries: Vec<Option<PageEntry>>,
}

impl PageTable {
    pub fn new(num_columns: usize, num_batches: usize) -> PageTable {
        PageTable {
            num_columns,
            num_batches,
            entries: vec![None; num_columns * num_batches],
        }
    }

    fn index(&self, field_id: i32, batch_id: usize) -> Result<usize> {
        let field_id = field_id as usize;
        if field_id >= self.num_columns || batch_id >= self.num_batches {
            return error::InvalidArgumentSnafu {
                msg: format!(
                    "(field_id={field_id}, batch_id={batch_id}) out of range for a {}x{} page table",
                    self.num_columns, self.num_batches
                ),
            }
            .fail();
        }
        Ok(field_id * self.num_batches + batch_id)
    }

    pub fn set(&mut self, field_id: i32, batch_id: usize, position: u64, length: u64) -> Result<()> {
        let idx = self.index(field_id, batch_id)?;
        self.entries[idx] = Some(PageEntry { position, length });
        Ok(())
    }

    /// Look up `(field_id, batch_id)`. A struct/list field, or any field
    /// never written, has no entry — that is an invalid-argument failure,
    /// not a silent zero, since callers only ever look up leaf fields they
    /// expect to find.
    pub fn get(&self, field_id: i32, batch_id: usize) -> Result<PageEntry> {
        let idx = self.index(field_id, batch_id)?;
        self.entries[idx].ok_or_else(|| {
            error::InvalidArgumentSnafu {
                msg: format!("no page table entry for (field_id={field_id}, batch_id={batch_id})"),
            }
            .build()
        })
    }

    pub fn write_framed(&self, out: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(self.entries.len() * 16);
        for entry in &self.entries {
            match entry {
                Some(e) => {
                    payload.put_i64_le(e.position as i64);
                    payload.put_i64_le(e.length as i64);
                }
                None => {
                    payload.put_i64_le(ABSENT);
                    payload.put_i64_le(ABSENT);
                }
            }
        }
        put_framed(out, &payload);
    }

    pub fn parse(buf: &Bytes, num_columns: usize, num_batches: usize) -> Result<PageTable> {
        let expected = num_columns * num_batches * 16;
        if buf.len() != expected {
            return error::InvalidFormatSnafu {
                msg: format!(
                    "page table blob of {} bytes does not match {num_columns}x{num_batches} matrix ({expected} bytes expected)",
                    buf.len()
                ),
            }
            .fail();
        }
        let mut entries = Vec::with_capacity(num_columns * num_batches);
        for i in 0..(num_columns * num_batches) {
            let position = read_i64_le(buf, i * 16)?;
            let length = read_i64_le(buf, i * 16 + 8)?;
            entries.push(if position == ABSENT || length == ABSENT {
                None
            } else {
                Some(PageEntry {
                    position: position as u64,
                    length: length as u64,
                })
            });
        }
        Ok(PageTable {
            num_columns,
            num_batches,
            entries,
        })
    }

    pub fn read_framed(buf: &Bytes, offset: usize, num_columns: usize, num_batches: usize) -> Result<(PageTable, usize)> {
        let (msg, next) = read_framed(buf, offset)?;
        Ok((PageTable::parse(&msg, num_columns, num_batches)?, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_absent_not_zero() {
        let table = PageTable::new(2, 2);
        assert!(table.get(0, 0).is_err());
    }

    #[test]
    fn roundtrip() {
        let mut table = PageTable::new(2, 2);
        table.set(0, 0, 10, 20).unwrap();
        table.set(0, 1, 30, 20).unwrap();
        table.set(1, 0, 50, 8).unwrap();
        // (1, 1) left absent, as if field 1 were empty for batch 1.

        let mut out = BytesMut::new();
        table.write_framed(&mut out);
        let (parsed, _) = PageTable::read_framed(&out.freeze(), 0, 2, 2).unwrap();

        assert_eq!(parsed.get(0, 0).unwrap(), PageEntry { position: 10, length: 20 });
        assert_eq!(parsed.get(1, 0).unwrap(), PageEntry { position: 50, length: 8 });
        assert!(parsed.get(1, 1).is_err());
    }

    #[test]
    fn out_of_range_lookup_is_error() {
        let table = PageTable::new(1, 1);
        assert!(table.get(5, 0).is_err());
    }
}
