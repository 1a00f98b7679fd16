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

//! `DICTIONARY` page layout: `PLAIN`-encoded `int32` indices into a values
//! array that is stored once per file, in its own dictionary page, rather
//! than once per batch.

use arrow::array::{Array, ArrayRef, Int32Array, PrimitiveArray};
use arrow::datatypes::{DataType, Int32Type};
use arrow_select::take::take;
use bytes::{BufMut, BytesMut};

use super::binary::VarBinaryDecoder;
use super::plain::PlainDecoder;
use super::{scalar_from_array, Decoder, Scalar};
use crate::error::Result;
use crate::io::RandomAccessSource;

pub struct DictionaryDecoder {
    indices: PlainDecoder,
    values: ArrayRef,
}

impl DictionaryDecoder {
    pub fn new(values: ArrayRef, position: u64, length: u64, num_rows: usize) -> Self {
        let indices = PlainDecoder::new(DataType::Int32, position, length, num_rows)
            .expect("Int32 is always a supported PLAIN width");
        Self { indices, values }
    }

    fn resolve(&self, indices_array: ArrayRef) -> Result<ArrayRef> {
        let indices = indices_array
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("dictionary indices are always Int32");
        take(&self.values, indices, None).map_err(|source| crate::error::ArrowSnafu { source }.build())
    }
}

impl Decoder for DictionaryDecoder {
    fn reset(&mut self, position: u64, length: u64) {
        self.indices.reset(position, length);
    }

    fn to_array(&self, source: &dyn RandomAccessSource) -> Result<ArrayRef> {
        let indices = self.indices.to_array(source)?;
        self.resolve(indices)
    }

    fn to_array_range(
        &self,
        source: &dyn RandomAccessSource,
        offset: usize,
        length: Option<usize>,
    ) -> Result<ArrayRef> {
        let indices = self.indices.to_array_range(source, offset, length)?;
        self.resolve(indices)
    }

    fn get_scalar(&self, source: &dyn RandomAccessSource, index: usize) -> Result<Scalar> {
        let array = self.to_array_range(source, index, Some(1))?;
        scalar_from_array(&array, 0)
    }

    fn take(&self, source: &dyn RandomAccessSource, indices: &Int32Array) -> Result<ArrayRef> {
        let resolved_indices = self.indices.take(source, indices)?;
        self.resolve(resolved_indices)
    }
}

/// Encode the dictionary indices page: `array`'s positions within
/// `dictionary_values`, `PLAIN`-encoded as `int32`.
pub fn encode_indices(array: &ArrayRef, dictionary_values: &ArrayRef) -> Result<Vec<u8>> {
    use std::collections::HashMap;

    let mut position_of: HashMap<String, i32> = HashMap::new();
    for i in 0..dictionary_values.len() {
        let key = format!("{:?}", scalar_from_array(dictionary_values, i)?);
        position_of.entry(key).or_insert(i as i32);
    }

    let mut indices = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            indices.push(None);
            continue;
        }
        let key = format!("{:?}", scalar_from_array(array, i)?);
        let idx = *position_of.get(&key).ok_or_else(|| {
            crate::error::InvalidFormatSnafu {
                msg: "dictionary-encoded value missing from its values array".to_string(),
            }
            .build()
        })?;
        indices.push(Some(idx));
    }
    let indices: PrimitiveArray<Int32Type> = indices.into_iter().collect();
    let array_ref: ArrayRef = std::sync::Arc::new(indices);
    super::plain::encode(&array_ref)
}

/// Read the values page at `(position, length)`: an 8-byte row count,
/// then a `PLAIN` or `VAR_BINARY` body (picked by `value_type`) sized to
/// that count, so the page is self-describing independent of any batch
/// length in the metadata.
pub fn decode_values_page(source: &dyn RandomAccessSource, position: u64, value_type: &DataType) -> Result<ArrayRef> {
    let count_bytes = source.read_at(position, 8)?;
    let num_rows = u64::from_le_bytes(count_bytes[..8].try_into().expect("8-byte prefix")) as usize;
    let body_position = position + 8;
    match value_type {
        DataType::Utf8 | DataType::Binary => {
            let decoder = VarBinaryDecoder::new(value_type.clone(), body_position, 0, num_rows);
            decoder.to_array(source)
        }
        other => {
            let decoder = PlainDecoder::new(other.clone(), body_position, 0, num_rows)?;
            decoder.to_array(source)
        }
    }
}

/// Encode a dictionary's values array as a self-describing page: an
/// 8-byte row count prefix followed by the ordinary `PLAIN`/`VAR_BINARY`
/// body for the value type.
pub fn encode_values_page(values: &ArrayRef) -> Result<Vec<u8>> {
    let mut out = BytesMut::new();
    out.put_u64_le(values.len() as u64);
    let body = match values.data_type() {
        DataType::Utf8 | DataType::Binary => super::binary::encode(values)?,
        _ => super::plain::encode(values)?,
    };
    out.extend_from_slice(&body);
    Ok(out.to_vec())
}
