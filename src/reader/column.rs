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

//! Per-type column materialization: the recursive dispatch shared by
//! every read path (`Get`, `ReadTable`, `ReadAt`, `ReadChunk`) once it has
//! a `(field, batch_id)` to turn into Arrow data.
//!
//! Every entry point takes `num_rows`, the row count of `field`'s own
//! page at this batch. For a top-level field that is the batch length;
//! for the element child of a list it is the list's total flattened
//! count for the batch, discovered by decoding the list's offsets in
//! full before slicing into the element.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, ListArray, StructArray};
use arrow::buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};

use crate::encoding::{self, decoder_for, list_offsets, Scalar};
use crate::error::{self, Result};
use crate::format::PageTable;
use crate::io::RandomAccessSource;
use crate::schema::Field;

/// Materialize `field`'s array for rows `[offset, offset+length)` of
/// batch `batch_id`, where `num_rows` is `field`'s own row count at that
/// batch (see module docs).
pub fn read_array(
    field: &Field,
    source: &dyn RandomAccessSource,
    page_table: &PageTable,
    batch_id: usize,
    num_rows: usize,
    offset: usize,
    length: usize,
) -> Result<ArrayRef> {
    if field.is_struct() {
        let children = field
            .children()
            .iter()
            .map(|child| read_array(child, source, page_table, batch_id, num_rows, offset, length))
            .collect::<Result<Vec<_>>>()?;
        let arrow_fields = field
            .children()
            .iter()
            .map(Field::to_arrow)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Arc::new(StructArray::new(arrow_fields.into(), children, None)));
    }

    if field.is_list() {
        return read_list_array(field, source, page_table, batch_id, num_rows, offset, length);
    }

    let entry = page_table.get(field.id(), batch_id)?;
    let decoder = decoder_for(field, entry.position, entry.length, num_rows)?;
    decoder.to_array_range(source, offset, Some(length))
}

fn read_list_array(
    field: &Field,
    source: &dyn RandomAccessSource,
    page_table: &PageTable,
    batch_id: usize,
    num_rows: usize,
    offset: usize,
    length: usize,
) -> Result<ArrayRef> {
    let entry = page_table.get(field.id(), batch_id)?;
    let (validity, offsets) = list_offsets::decode_full(source, entry.position, num_rows)?;

    let item_field = field.children().first().ok_or_else(|| {
        error::InvalidFormatSnafu {
            msg: format!("list field '{}' has no item child", field.name()),
        }
        .build()
    })?;

    let window = &offsets[offset..=offset + length];
    let values_start = window[0] as usize;
    let values_length = (window[length] - window[0]) as usize;
    let total_values = *offsets.last().unwrap_or(&0) as usize;

    let item_array = read_array(
        item_field,
        source,
        page_table,
        batch_id,
        total_values,
        values_start,
        values_length,
    )?;

    let rebased: Vec<i32> = window.iter().map(|o| o - window[0]).collect();
    let item_field_ref = Arc::new(item_field.to_arrow()?);
    let list_validity = validity.slice(offset, length);
    let list_array = ListArray::try_new(
        item_field_ref,
        OffsetBuffer::new(ScalarBuffer::from(rebased)),
        item_array,
        Some(list_validity),
    )
    .map_err(|source| error::ArrowSnafu { source }.build())?;
    Ok(Arc::new(list_array))
}

/// Read a single scalar at `index`, typed per `field`'s logical type.
pub fn read_scalar(
    field: &Field,
    source: &dyn RandomAccessSource,
    page_table: &PageTable,
    batch_id: usize,
    num_rows: usize,
    index: usize,
) -> Result<Scalar> {
    if field.is_struct() {
        let mut out = Vec::with_capacity(field.children().len());
        for child in field.children() {
            let value = read_scalar(child, source, page_table, batch_id, num_rows, index)?;
            out.push((child.name().to_string(), value));
        }
        return Ok(Scalar::Struct(out));
    }

    if field.is_list() {
        let entry = page_table.get(field.id(), batch_id)?;
        let (validity, offsets) = list_offsets::decode_full(source, entry.position, num_rows)?;
        if !validity.is_valid(index) {
            return Ok(Scalar::Null);
        }
        let item_field = field.children().first().ok_or_else(|| {
            error::InvalidFormatSnafu {
                msg: format!("list field '{}' has no item child", field.name()),
            }
            .build()
        })?;
        let (start, length) = list_offsets::window(&offsets, index);
        let total_values = *offsets.last().unwrap_or(&0) as usize;
        let values = read_array(item_field, source, page_table, batch_id, total_values, start, length)?;
        return Ok(Scalar::List(values));
    }

    let entry = page_table.get(field.id(), batch_id)?;
    let decoder = decoder_for(field, entry.position, entry.length, num_rows)?;
    decoder.get_scalar(source, index)
}

/// Gather rows at `indices` (strictly increasing, within `[0, num_rows)`).
pub fn gather(
    field: &Field,
    source: &dyn RandomAccessSource,
    page_table: &PageTable,
    batch_id: usize,
    num_rows: usize,
    indices: &Int32Array,
) -> Result<ArrayRef> {
    if indices.is_empty() {
        return error::IndexErrorSnafu {
            msg: "take requires a non-empty index array".to_string(),
        }
        .fail();
    }

    if field.is_struct() {
        let children = field
            .children()
            .iter()
            .map(|child| gather(child, source, page_table, batch_id, num_rows, indices))
            .collect::<Result<Vec<_>>>()?;
        let arrow_fields = field
            .children()
            .iter()
            .map(Field::to_arrow)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Arc::new(StructArray::new(arrow_fields.into(), children, None)));
    }

    if field.is_list() {
        return gather_list(field, source, page_table, batch_id, num_rows, indices);
    }

    let entry = page_table.get(field.id(), batch_id)?;
    let decoder = decoder_for(field, entry.position, entry.length, num_rows)?;
    decoder.take(source, indices)
}

fn gather_list(
    field: &Field,
    source: &dyn RandomAccessSource,
    page_table: &PageTable,
    batch_id: usize,
    num_rows: usize,
    indices: &Int32Array,
) -> Result<ArrayRef> {
    let entry = page_table.get(field.id(), batch_id)?;
    let (validity, offsets) = list_offsets::decode_full(source, entry.position, num_rows)?;
    let item_field = field.children().first().ok_or_else(|| {
        error::InvalidFormatSnafu {
            msg: format!("list field '{}' has no item child", field.name()),
        }
        .build()
    })?;

    let first = indices.value(0) as usize;
    let last = indices.value(indices.len() - 1) as usize;
    let covering_start = offsets[first];
    let covering_end = offsets[last + 1];
    let total_values = *offsets.last().unwrap_or(&0) as usize;
    let covering_item = read_array(
        item_field,
        source,
        page_table,
        batch_id,
        total_values,
        covering_start as usize,
        (covering_end - covering_start) as usize,
    )?;

    let local_item_indices: Vec<i32> = list_offsets::local_indices_for(&offsets, indices, covering_start);
    let local_item_indices = Int32Array::from(local_item_indices);
    let item_array = encoding::take_array(&covering_item, &local_item_indices)?;

    let mut rebased = Vec::with_capacity(indices.len() + 1);
    rebased.push(0i32);
    for idx in indices.values().iter() {
        let (_, len) = list_offsets::window(&offsets, *idx as usize);
        rebased.push(rebased.last().copied().unwrap() + len as i32);
    }

    let list_validity = NullBuffer::from_iter(indices.values().iter().map(|i| validity.is_valid(*i as usize)));
    let item_field_ref = Arc::new(item_field.to_arrow()?);
    let list_array = ListArray::try_new(
        item_field_ref,
        OffsetBuffer::new(ScalarBuffer::from(rebased)),
        item_array,
        Some(list_validity),
    )
    .map_err(|source| error::ArrowSnafu { source }.build())?;
    Ok(Arc::new(list_array))
}
