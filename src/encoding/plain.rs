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

//! `PLAIN` page layout: a validity bitmap followed by packed fixed-width
//! values (booleans are themselves bit-packed, everything else is its
//! native little-endian byte width).

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, TimestampMicrosecondArray, UInt16Array, UInt32Array,
    UInt64Array, UInt8Array,
};
use arrow::buffer::{BooleanBuffer, NullBuffer};
use arrow::datatypes::{DataType, TimeUnit};
use arrow_select::take::take;

use super::{bitmap_byte_len, byte_width, pack_bits, scalar_from_array, unpack_bit, Decoder, Scalar};
use crate::error::{self, Result};
use crate::io::RandomAccessSource;

pub struct PlainDecoder {
    data_type: DataType,
    position: u64,
    #[allow(dead_code)]
    length: u64,
    num_rows: usize,
}

impl PlainDecoder {
    pub fn new(data_type: DataType, position: u64, length: u64, num_rows: usize) -> Result<Self> {
        if !matches!(data_type, DataType::Boolean) {
            byte_width(&data_type)?;
        }
        Ok(Self {
            data_type,
            position,
            length,
            num_rows,
        })
    }

    fn validity_bytes(&self) -> usize {
        bitmap_byte_len(self.num_rows)
    }

    fn values_offset(&self) -> u64 {
        self.validity_bytes() as u64
    }

    fn read_validity(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: usize,
    ) -> Result<NullBuffer> {
        let bytes = source.read_at(self.position, self.validity_bytes() as u64)?;
        let bits = (offset..offset + length).map(|i| unpack_bit(&bytes, i));
        Ok(NullBuffer::from(BooleanBuffer::from_iter(bits)))
    }

    fn read_values_bytes(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: usize,
        width: usize,
    ) -> Result<bytes::Bytes> {
        let start = self.position + self.values_offset() + (offset * width) as u64;
        source.read_at(start, (length * width) as u64)
    }

    fn read_values_bits(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: usize,
    ) -> Result<Vec<bool>> {
        // Boolean values are themselves bit-packed; re-derive the byte
        // window that covers [offset, offset+length) bits.
        let first_byte = offset / 8;
        let last_byte = (offset + length + 7) / 8;
        let start = self.position + self.values_offset() + first_byte as u64;
        let raw = source.read_at(start, (last_byte - first_byte) as u64)?;
        Ok((0..length)
            .map(|i| unpack_bit(&raw, offset + i - first_byte * 8))
            .collect())
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
}

macro_rules! primitive_range {
    ($self:ident, $source:ident, $offset:ident, $length:ident, $width:expr, $arr_ty:ty, $native:ty, $from_le:expr) => {{
        let validity = $self.read_validity($source, $offset, $length)?;
        let raw = $self.read_values_bytes($source, $offset, $length, $width)?;
        let values: Vec<$native> = raw
            .chunks_exact($width)
            .map(|chunk| {
                let arr: [u8; { $width }] = chunk.try_into().expect("chunk sized to width");
                $from_le(arr)
            })
            .collect();
        Arc::new(<$arr_ty>::new(values.into(), Some(validity))) as ArrayRef
    }};
}

impl Decoder for PlainDecoder {
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

        let array: ArrayRef = match &self.data_type {
            DataType::Boolean => {
                let validity = self.read_validity(source, offset, length)?;
                let values = self.read_values_bits(source, offset, length)?;
                Arc::new(BooleanArray::new(BooleanBuffer::from(values), Some(validity)))
            }
            DataType::Int8 => {
                primitive_range!(self, source, offset, length, 1, Int8Array, i8, |b: [u8; 1]| {
                    i8::from_le_bytes(b)
                })
            }
            DataType::UInt8 => {
                primitive_range!(self, source, offset, length, 1, UInt8Array, u8, |b: [u8; 1]| {
                    u8::from_le_bytes(b)
                })
            }
            DataType::Int16 => {
                primitive_range!(self, source, offset, length, 2, Int16Array, i16, |b: [u8; 2]| {
                    i16::from_le_bytes(b)
                })
            }
            DataType::UInt16 => {
                primitive_range!(self, source, offset, length, 2, UInt16Array, u16, |b: [u8; 2]| {
                    u16::from_le_bytes(b)
                })
            }
            DataType::Int32 => {
                primitive_range!(self, source, offset, length, 4, Int32Array, i32, |b: [u8; 4]| {
                    i32::from_le_bytes(b)
                })
            }
            DataType::UInt32 => {
                primitive_range!(self, source, offset, length, 4, UInt32Array, u32, |b: [u8; 4]| {
                    u32::from_le_bytes(b)
                })
            }
            DataType::Date32 => {
                primitive_range!(self, source, offset, length, 4, Date32Array, i32, |b: [u8; 4]| {
                    i32::from_le_bytes(b)
                })
            }
            DataType::Float32 => {
                primitive_range!(self, source, offset, length, 4, Float32Array, f32, |b: [u8; 4]| {
                    f32::from_le_bytes(b)
                })
            }
            DataType::Int64 => {
                primitive_range!(self, source, offset, length, 8, Int64Array, i64, |b: [u8; 8]| {
                    i64::from_le_bytes(b)
                })
            }
            DataType::UInt64 => {
                primitive_range!(self, source, offset, length, 8, UInt64Array, u64, |b: [u8; 8]| {
                    u64::from_le_bytes(b)
                })
            }
            DataType::Float64 => {
                primitive_range!(self, source, offset, length, 8, Float64Array, f64, |b: [u8; 8]| {
                    f64::from_le_bytes(b)
                })
            }
            DataType::Timestamp(TimeUnit::Microsecond, tz) => {
                let validity = self.read_validity(source, offset, length)?;
                let raw = self.read_values_bytes(source, offset, length, 8)?;
                let values: Vec<i64> = raw
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                    .collect();
                let array = TimestampMicrosecondArray::new(values.into(), Some(validity));
                Arc::new(match tz {
                    Some(tz) => array.with_timezone(tz.clone()),
                    None => array,
                })
            }
            other => {
                return error::NotImplementedSnafu {
                    msg: format!("PLAIN decode not implemented for {other:?}"),
                }
                .fail()
            }
        };
        Ok(array)
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

macro_rules! encode_primitive {
    ($array:ident, $arr_ty:ty, $out:ident) => {{
        let a = $array
            .as_any()
            .downcast_ref::<$arr_ty>()
            .expect("checked by data_type");
        for i in 0..a.len() {
            $out.extend_from_slice(&a.value(i).to_le_bytes());
        }
    }};
}
use encode_primitive;

/// Encode a page for `array` in `PLAIN` layout: validity bitmap then
/// packed values. Used by the writer for every fixed-width leaf.
pub fn encode(array: &ArrayRef) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let validity_bits = (0..array.len()).map(|i| array.is_valid(i));
    out.extend(pack_bits(validity_bits));

    match array.data_type() {
        DataType::Boolean => {
            let a = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .expect("checked by data_type");
            out.extend(pack_bits((0..a.len()).map(|i| a.value(i))));
        }
        DataType::Int8 => encode_primitive!(array, Int8Array, out),
        DataType::UInt8 => encode_primitive!(array, UInt8Array, out),
        DataType::Int16 => encode_primitive!(array, Int16Array, out),
        DataType::UInt16 => encode_primitive!(array, UInt16Array, out),
        DataType::Int32 => encode_primitive!(array, Int32Array, out),
        DataType::UInt32 => encode_primitive!(array, UInt32Array, out),
        DataType::Date32 => encode_primitive!(array, Date32Array, out),
        DataType::Float32 => encode_primitive!(array, Float32Array, out),
        DataType::Int64 => encode_primitive!(array, Int64Array, out),
        DataType::UInt64 => encode_primitive!(array, UInt64Array, out),
        DataType::Float64 => encode_primitive!(array, Float64Array, out),
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let a = array
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .expect("checked by data_type");
            for i in 0..a.len() {
                out.extend_from_slice(&a.value(i).to_le_bytes());
            }
        }
        other => {
            return error::NotImplementedSnafu {
                msg: format!("PLAIN encode not implemented for {other:?}"),
            }
            .fail()
        }
    }
    Ok(out)
}
