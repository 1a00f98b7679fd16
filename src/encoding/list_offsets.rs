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

//! A list field's own page: a validity bitmap for the `num_rows` lists,
//! followed by `num_rows + 1` little-endian `int32` offsets into the
//! element child's flattened row space. This is not one of the three leaf
//! encodings — a list field is never a decoder-table leaf — but the byte
//! layout is the same validity-then-packed-values shape `PLAIN` uses,
//! just with one more value than there are rows.

use arrow::array::{Array, GenericListArray, Int32Array, OffsetSizeTrait};
use arrow::buffer::{BooleanBuffer, NullBuffer};

use super::{bitmap_byte_len, pack_bits, unpack_bit};
use crate::error::Result;
use crate::io::RandomAccessSource;

fn validity_bytes(num_rows: usize) -> usize {
    bitmap_byte_len(num_rows)
}

/// Read the full validity bitmap and the full `num_rows + 1` offsets for
/// one list page. Callers slice into the returned offsets themselves —
/// reading the whole array is what lets the last offset double as the
/// element child's own total row count for that batch.
pub fn decode_full(
    source: &dyn RandomAccessSource,
    position: u64,
    num_rows: usize,
) -> Result<(NullBuffer, Vec<i32>)> {
    let validity_len = validity_bytes(num_rows);
    let validity_bytes = source.read_at(position, validity_len as u64)?;
    let validity = NullBuffer::from(BooleanBuffer::from_iter(
        (0..num_rows).map(|i| unpack_bit(&validity_bytes, i)),
    ));

    let offsets_len = (num_rows + 1) * 4;
    let raw = source.read_at(position + validity_len as u64, offsets_len as u64)?;
    let offsets = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().expect("chunk sized to 4 bytes")))
        .collect();
    Ok((validity, offsets))
}

/// Encode a list page: validity bitmap for `array`'s own nulls, then its
/// `offsets()` reinterpreted as `int32` (the element type is decoded
/// separately, through the ordinary leaf or struct path).
pub fn encode<O: OffsetSizeTrait>(array: &GenericListArray<O>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pack_bits((0..array.len()).map(|i| array.is_valid(i))));
    for o in array.offsets().iter() {
        out.extend_from_slice(&o.as_usize().to_le_bytes()[..4]);
    }
    out
}

/// Gather a window `[indices[0], indices[-1]+1)` is the caller's job; this
/// just exposes the two-offset window a scalar read needs.
pub fn window(offsets: &[i32], index: usize) -> (usize, usize) {
    let start = offsets[index] as usize;
    let end = offsets[index + 1] as usize;
    (start, end - start)
}

pub(crate) fn local_indices_for(offsets: &[i32], outer_indices: &Int32Array, covering_start: i32) -> Vec<i32> {
    let mut out = Vec::new();
    for idx in outer_indices.values().iter() {
        let (start, length) = window(offsets, *idx as usize);
        for i in 0..length {
            out.push(start as i32 - covering_start + i as i32);
        }
    }
    out
}
