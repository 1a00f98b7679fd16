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

//! `VAR_BINARY` page layout: a leading 8-byte total-offset count, then
//! `count` little-endian `i64` offsets, then the concatenated value bytes.
//! `string`/`binary` logical types share this layout; only the final
//! Arrow array type differs.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BinaryArray, Int32Array, StringArray};
use arrow::buffer::{Buffer, NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::DataType;
use arrow_select::take::take;

use super::{bitmap_byte_len, pack_bits, scalar_from_array, unpack_bit, Decoder, Scalar};
use crate::error::{self, Result};
use crate::io::RandomAccessSource;

pub struct VarBinaryDecoder {
    data_type: DataType,
    position: u64,
    #[allow(dead_code)]
    length: u64,
    num_rows: usize,
}

impl VarBinaryDecoder {
    pub fn new(data_type: DataType, position: u64, length: u64, num_rows: usize) -> Self {
        Self {
            data_type,
            position,
            length,
            num_rows,
        }
    }

    fn validity_bytes(&self) -> usize {
        bitmap_byte_len(self.num_rows)
    }

    fn offsets_start(&self) -> u64 {
        self.position + self.validity_bytes() as u64 + 8
    }

    fn read_validity(&self, source: &dyn RandomAccessSource, offset: usize, length: usize) -> Result<NullBuffer> {
        let bytes = source.read_at(self.position, self.validity_bytes() as u64)?;
        Ok(NullBuffer::from_iter((offset..offset + length).map(|i| unpack_bit(&bytes, i))))
    }

    /// Read the `[start, start+length+1)` offsets window, then the
    /// concatenated bytes it bounds, and rebase the offsets to start at 0.
    fn read_window(
        &self,
        source: &dyn RandomAccessSource,
        start: usize,
        length: usize,
    ) -> Result<(Vec<i32>, bytes::Bytes)> {
        let raw_offsets = source.read_at(self.offsets_start() + (start * 8) as u64, ((length + 1) * 8) as u64)?;
        let offsets: Vec<i64> = raw_offsets
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let values_start = offsets[0] as u64;
        let values_length = (offsets[length] - offsets[0]) as u64;
        let values = source.read_at(self.values_region_start() + values_start, values_length)?;
        let rebased: Vec<i32> = offsets.iter().map(|o| (o - offsets[0]) as i32).collect();
        Ok((rebased, values))
    }

    /// Start of the value-bytes region, i.e. just past the total offset
    /// count written up front.
    fn values_region_start(&self) -> u64 {
        self.offsets_start() + (self.num_rows as u64 + 1) * 8
    }

    fn bounds_check(&self, offset: usize, length: usize) -> Result<()> {
        if offset + length > self.num_rows {
            return error::InvalidArgumentSnafu {
                msg: format!(
                    "range [{offset}, {}) out of bounds for page of {} rows",
                    offset + length,
                    self.num_rows
                ),
            }
            .fail();
        }
        Ok(())
    }

    fn build_array(&self, offsets: Vec<i32>, values: bytes::Bytes, validity: NullBuffer) -> Result<ArrayRef> {
        let offset_buffer = OffsetBuffer::new(ScalarBuffer::from(offsets));
        let value_buffer = Buffer::from(values.to_vec());
        match &self.data_type {
            DataType::Utf8 => Ok(Arc::new(StringArray::new(offset_buffer, value_buffer, Some(validity)))),
            DataType::Binary => Ok(Arc::new(BinaryArray::new(offset_buffer, value_buffer, Some(validity)))),
            other => error::NotImplementedSnafu {
                msg: format!("VAR_BINARY decode not implemented for {other:?}"),
            }
            .fail(),
        }
    }
}

impl Decoder for VarBinaryDecoder {
    fn reset(&mut self, position: u64, length: u64) {
        self.position = position;
        self.length = length;
    }

    fn to_array(&self, source: &dyn RandomAccessSource) -> Result<ArrayRef> {
        self.to_array_range(source, 0, Some(self.num_rows))
    }

    fn to_array_range(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: Option<usize>,
    ) -> Result<ArrayRef> {
        let length = length.unwrap_or(self.num_rows - offset);
        self.bounds_check(offset, length)?;
        if length == 0 {
            return Ok(super::empty_array_of(&self.data_type));
        }
        let validity = self.read_validity(source, offset, length)?;
        let (offsets, values) = self.read_window(source, offset, length)?;
        self.build_array(offsets, values, validity)
    }

    fn get_scalar(&self, source: &dyn RandomAccessSource, index: usize) -> Result<Scalar> {
        self.bounds_check(index, 1)?;
        let array = self.to_array_range(source, index, Some(1))?;
        scalar_from_array(&array, 0)
    }

    fn take(&self, source: &dyn RandomAccessSource, indices: &Int32Array) -> Result<ArrayRef> {
        if indices.is_empty() {
            return error::IndexErrorSnafu {
                msg: "take requires a non-empty index array".to_string(),
            }
            .fail();
        }
        for pair in indices.values().windows(2) {
            if pair[1] <= pair[0] {
                return error::InvalidArgumentSnafu {
                    msg: "take indices must be strictly increasing".to_string(),
                }
                .fail();
            }
        }
        let start = indices.value(0) as usize;
        let end = indices.value(indices.len() - 1) as usize + 1;
        self.bounds_check(start, end - start)?;
        let covering = self.to_array_range(source, start, Some(end - start))?;
        let local: Int32Array = indices.iter().map(|v| v.map(|x| x - start as i32)).collect();
        take(&covering, &local, None).map_err(|source| error::ArrowSnafu { source }.build())
    }
}

/// Encode a page for a `Utf8`/`Binary` array: validity bitmap, an 8-byte
/// total-offset count, `count` int64 offsets, then the concatenated bytes.
pub fn encode(array: &ArrayRef) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend(pack_bits((0..array.len()).map(|i| array.is_valid(i))));

    let (offsets, values): (Vec<i64>, &[u8]) = match array.data_type() {
        DataType::Utf8 => {
            let a = array.as_any().downcast_ref::<StringArray>().expect("checked above");
            (a.offsets().iter().map(|o| *o as i64).collect(), a.values().as_slice())
        }
        DataType::Binary => {
            let a = array.as_any().downcast_ref::<BinaryArray>().expect("checked above");
            (a.offsets().iter().map(|o| *o as i64).collect(), a.values().as_slice())
        }
        other => {
            return error::NotImplementedSnafu {
                msg: format!("VAR_BINARY encode not implemented for {other:?}"),
            }
            .fail()
        }
    };

    out.extend_from_slice(&(offsets.len() as u64).to_le_bytes());
    for o in &offsets {
        out.extend_from_slice(&o.to_le_bytes());
    }
    out.extend_from_slice(values);
    Ok(out)
}
