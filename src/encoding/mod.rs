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

//! Per-leaf page codecs: plain (fixed-width), var-binary, and dictionary.
//!
//! A decoder binds to one `(field, batch)` page extent and is built fresh
//! for every call site — nothing here is shared or cached across fan-out
//! tasks, since a decoder that has been `Reset` carries page-local state.

pub mod binary;
pub mod dictionary;
pub mod list_offsets;
pub mod plain;

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Int32Array};
use arrow_schema::DataType;

use crate::error::{self, Result};
use crate::io::RandomAccessSource;
use crate::proto;
use crate::schema::Field;

/// A single decoded value, typed per logical type. `List` holds the
/// element's values subarray directly rather than a one-element
/// `ListArray` wrapper.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    Date32(i32),
    Timestamp(i64),
    Struct(Vec<(String, Scalar)>),
    List(ArrayRef),
}

/// Decode operations available against one page extent.
///
/// `reset` rebinds the decoder to a different extent without any I/O;
/// `to_array`/`to_array_range`/`get_scalar`/`take` all perform the actual
/// positional reads against `source`.
pub trait Decoder {
    fn reset(&mut self, position: u64, length: u64);
    fn to_array(&self, source: &dyn RandomAccessSource) -> Result<ArrayRef>;
    fn to_array_range(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: Option<usize>,
    ) -> Result<ArrayRef>;
    fn get_scalar(&self, source: &dyn RandomAccessSource, index: usize) -> Result<Scalar>;
    fn take(&self, source: &dyn RandomAccessSource, indices: &Int32Array) -> Result<ArrayRef>;
}

/// Build the decoder for a leaf field's page, given the page's byte extent
/// and the number of rows (the batch length) it holds.
pub fn decoder_for(field: &Field, position: u64, length: u64, num_rows: usize) -> Result<Box<dyn Decoder>> {
    match field.encoding() {
        proto::Encoding::Plain => Ok(Box::new(plain::PlainDecoder::new(
            field.to_arrow()?.data_type().clone(),
            position,
            length,
            num_rows,
        )?)),
        proto::Encoding::VarBinary => Ok(Box::new(binary::VarBinaryDecoder::new(
            field.to_arrow()?.data_type().clone(),
            position,
            length,
            num_rows,
        ))),
        proto::Encoding::Dictionary => {
            let dictionary = field.dictionary().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("field '{}' tagged DICTIONARY has no dictionary descriptor", field.name()),
                }
                .build()
            })?;
            let values = dictionary.values().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("dictionary values for '{}' were never loaded", field.name()),
                }
                .build()
            })?;
            Ok(Box::new(dictionary::DictionaryDecoder::new(
                values.clone(),
                position,
                length,
                num_rows,
            )))
        }
        proto::Encoding::None => error::NotImplementedSnafu {
            msg: format!("field '{}' has no leaf encoding to decode", field.name()),
        }
        .fail(),
    }
}

/// Extract row `idx` out of a decoded array as a [`Scalar`]. Used by every
/// encoding's `get_scalar` once it has materialized a (possibly
/// single-row) array, and by the reader when assembling struct scalars.
pub fn scalar_from_array(array: &ArrayRef, idx: usize) -> Result<Scalar> {
    use arrow_array::{
        BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int16Array,
        Int32Array, Int64Array, Int8Array, StringArray, TimestampMicrosecondArray, UInt16Array,
        UInt32Array, UInt64Array, UInt8Array,
    };

    if array.is_null(idx) {
        return Ok(Scalar::Null);
    }

    macro_rules! downcast_scalar {
        ($ty:ty, $variant:ident) => {
            if let Some(a) = array.as_any().downcast_ref::<$ty>() {
                return Ok(Scalar::$variant(a.value(idx)));
            }
        };
    }

    downcast_scalar!(BooleanArray, Boolean);
    downcast_scalar!(Int8Array, Int8);
    downcast_scalar!(Int16Array, Int16);
    downcast_scalar!(Int32Array, Int32);
    downcast_scalar!(Int64Array, Int64);
    downcast_scalar!(UInt8Array, UInt8);
    downcast_scalar!(UInt16Array, UInt16);
    downcast_scalar!(UInt32Array, UInt32);
    downcast_scalar!(UInt64Array, UInt64);
    downcast_scalar!(Float32Array, Float32);
    downcast_scalar!(Float64Array, Float64);
    downcast_scalar!(Date32Array, Date32);
    downcast_scalar!(TimestampMicrosecondArray, Timestamp);

    if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
        return Ok(Scalar::Utf8(a.value(idx).to_string()));
    }
    if let Some(a) = array.as_any().downcast_ref::<BinaryArray>() {
        return Ok(Scalar::Binary(a.value(idx).to_vec()));
    }

    error::NotImplementedSnafu {
        msg: format!("no scalar extraction for array type {:?}", array.data_type()),
    }
    .fail()
}

/// Bytes needed to hold `num_rows` validity bits, rounded up.
pub(crate) fn bitmap_byte_len(num_rows: usize) -> usize {
    (num_rows + 7) / 8
}

/// Pack a bool iterator into a validity bitmap, LSB-first per byte —
/// matching `arrow_buffer::BooleanBuffer`'s own bit order.
pub(crate) fn pack_bits(bits: impl Iterator<Item = bool>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = 0u8;
    let mut count = 0usize;
    for bit in bits {
        if bit {
            byte |= 1 << (count % 8);
        }
        count += 1;
        if count % 8 == 0 {
            out.push(byte);
            byte = 0;
        }
    }
    if count % 8 != 0 {
        out.push(byte);
    }
    out
}

pub(crate) fn unpack_bit(bytes: &[u8], idx: usize) -> bool {
    (bytes[idx / 8] >> (idx % 8)) & 1 == 1
}

pub(crate) fn byte_width(data_type: &DataType) -> Result<usize> {
    Ok(match data_type {
        DataType::Int8 | DataType::UInt8 => 1,
        DataType::Int16 | DataType::UInt16 => 2,
        DataType::Int32 | DataType::UInt32 | DataType::Date32 | DataType::Float32 => 4,
        DataType::Int64 | DataType::UInt64 | DataType::Float64 | DataType::Timestamp(..) => 8,
        other => {
            return error::NotImplementedSnafu {
                msg: format!("no fixed-width layout for {other:?}"),
            }
            .fail()
        }
    })
}

pub(crate) fn empty_array_of(data_type: &DataType) -> ArrayRef {
    arrow_array::new_empty_array(data_type)
}

pub(crate) fn as_ref(array: impl Array + 'static) -> ArrayRef {
    Arc::new(array)
}

/// `arrow_select::take::take`, with the crate's own error type.
pub fn take_array(array: &ArrayRef, indices: &Int32Array) -> Result<ArrayRef> {
    arrow_select::take::take(array, indices, None).map_err(|source| error::ArrowSnafu { source }.build())
}
