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

//! The reader: owns the source, the manifest-derived schema, the batch
//! layout, and the page table, and serves point lookups, full-column
//! reads, and range/indices reads against them.

pub mod column;

use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use crate::encoding::Scalar;
use crate::error::{self, Result};
use crate::format::{footer, manifest, Footer, Metadata, PageTable};
use crate::io::RandomAccessSource;
use crate::schema::Schema;

const TAIL_PREFETCH: u64 = 64 * 1024;

/// An open, read-only view of one file. Every field is immutable after
/// `open`: sharing a `FileReader` across threads (or fan-out tasks) needs
/// no synchronization.
pub struct FileReader {
    source: Arc<dyn RandomAccessSource>,
    schema: Schema,
    metadata: Metadata,
    page_table: Arc<PageTable>,
}

fn read_bytes(
    source: &dyn RandomAccessSource,
    tail_start: u64,
    tail: &Bytes,
    position: u64,
    length: u64,
) -> Result<Bytes> {
    if position >= tail_start && position + length <= tail_start + tail.len() as u64 {
        let start = (position - tail_start) as usize;
        Ok(tail.slice(start..start + length as usize))
    } else {
        source.read_at(position, length)
    }
}

fn read_framed_region(source: &dyn RandomAccessSource, tail_start: u64, tail: &Bytes, position: u64) -> Result<Bytes> {
    let len_bytes = read_bytes(source, tail_start, tail, position, 4)?;
    let len = u32::from_le_bytes(len_bytes[..4].try_into().expect("4-byte prefix")) as u64;
    read_bytes(source, tail_start, tail, position + 4, len)
}

impl FileReader {
    /// Open a file for reading. Read-only and idempotent: nothing here
    /// mutates the source, and opening the same source twice yields two
    /// independent readers over identical state.
    pub fn open(source: impl RandomAccessSource + 'static) -> Result<FileReader> {
        let source: Arc<dyn RandomAccessSource> = Arc::new(source);
        Self::open_arc(source)
    }

    pub fn open_arc(source: Arc<dyn RandomAccessSource>) -> Result<FileReader> {
        let total_len = source.byte_len()?;
        if total_len < footer::FOOTER_LEN as u64 {
            return error::IoSnafu {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("file of {total_len} bytes is smaller than the {}-byte footer", footer::FOOTER_LEN),
                ),
            }
            .fail();
        }

        let tail_len = total_len.min(TAIL_PREFETCH);
        let tail_start = total_len - tail_len;
        let tail = source.read_at(tail_start, tail_len)?;
        let footer = Footer::parse(&tail)?;

        let metadata_blob = read_framed_region(&*source, tail_start, &tail, footer.metadata_position)?;
        let metadata = Metadata::parse(&metadata_blob)?;

        let manifest_blob = read_framed_region(&*source, tail_start, &tail, metadata.manifest_position())?;
        let schema = manifest::parse(&manifest_blob)?;

        let num_columns = schema.get_fields_count() as usize;
        let page_table_blob = read_framed_region(&*source, tail_start, &tail, metadata.page_table_position())?;
        let page_table = PageTable::parse(&page_table_blob, num_columns, metadata.num_batches())?;

        load_dictionaries(&*source, schema.fields())?;

        Ok(FileReader {
            source,
            schema,
            metadata,
            page_table: Arc::new(page_table),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_batches(&self) -> usize {
        self.metadata.num_batches()
    }

    pub fn total_rows(&self) -> u64 {
        self.metadata.total_rows()
    }

    pub fn batch_length(&self, batch_id: usize) -> u64 {
        self.metadata.batch_length(batch_id)
    }

    /// Full row, one scalar per top-level field of the file's own schema.
    pub fn get(&self, row: u64) -> Result<Vec<Scalar>> {
        self.get_with_schema(row, &self.schema)
    }

    pub fn get_projected(&self, row: u64, names: &[&str]) -> Result<Vec<Scalar>> {
        let projected = self.schema.project(names)?;
        self.get_with_schema(row, &projected)
    }

    /// `schema` must be a projection of the file's own schema (the id of
    /// every field in it must resolve against this reader's page table).
    pub fn get_with_schema(&self, row: u64, schema: &Schema) -> Result<Vec<Scalar>> {
        let (batch_id, row_in_batch) = self.metadata.locate_chunk(row)?;
        let num_rows = self.metadata.batch_length(batch_id) as usize;
        schema
            .fields()
            .iter()
            .map(|field| {
                column::read_scalar(
                    field,
                    &*self.source,
                    &self.page_table,
                    batch_id,
                    num_rows,
                    row_in_batch as usize,
                )
            })
            .collect()
    }

    pub fn read_table(&self) -> Result<Vec<RecordBatch>> {
        self.read_table_with_schema(&self.schema)
    }

    pub fn read_table_named(&self, names: &[&str]) -> Result<Vec<RecordBatch>> {
        let projected = self.schema.project(names)?;
        self.read_table_with_schema(&projected)
    }

    pub fn read_table_with_schema(&self, schema: &Schema) -> Result<Vec<RecordBatch>> {
        (0..self.metadata.num_batches())
            .map(|batch_id| self.read_chunk(schema, batch_id, None))
            .collect()
    }

    /// A single `RecordBatch` of `length` rows starting at `offset`,
    /// concatenating across batch boundaries as needed. The returned
    /// length is `min(length, total_rows - offset)`.
    pub fn read_at(&self, schema: &Schema, offset: u64, length: u64) -> Result<RecordBatch> {
        let remaining = self.total_rows().saturating_sub(offset);
        let length = length.min(remaining);
        if length == 0 {
            let arrow_schema = Arc::new(schema.to_arrow()?);
            return Ok(RecordBatch::new_empty(arrow_schema));
        }

        let mut batches = Vec::new();
        let mut row = offset;
        let mut left = length;
        while left > 0 {
            let (batch_id, row_in_batch) = self.metadata.locate_chunk(row)?;
            let batch_len = self.metadata.batch_length(batch_id);
            let take_len = left.min(batch_len - row_in_batch);
            let window_start = row_in_batch as usize;
            let window_len = take_len as usize;
            batches.push(self.read_chunk_range(schema, batch_id, window_start, window_len)?);
            row += take_len;
            left -= take_len;
        }

        if batches.len() == 1 {
            return Ok(batches.into_iter().next().unwrap());
        }
        let arrow_schema = batches[0].schema();
        concat_batches(&arrow_schema, &batches).map_err(|source| error::ArrowSnafu { source }.build())
    }

    /// An entire batch, or its first `length` rows.
    pub fn read_chunk(&self, schema: &Schema, batch_id: usize, length: Option<u64>) -> Result<RecordBatch> {
        let batch_len = self.metadata.batch_length(batch_id);
        let length = length.unwrap_or(batch_len).min(batch_len) as usize;
        self.read_chunk_range(schema, batch_id, 0, length)
    }

    fn read_chunk_range(&self, schema: &Schema, batch_id: usize, offset: usize, length: usize) -> Result<RecordBatch> {
        let num_rows = self.metadata.batch_length(batch_id) as usize;
        let arrow_schema = Arc::new(schema.to_arrow()?);
        let columns: Vec<ArrayRef> = schema
            .fields()
            .iter()
            .map(|field| column::read_array(field, &*self.source, &self.page_table, batch_id, num_rows, offset, length))
            .collect::<Result<_>>()?;
        RecordBatch::try_new(arrow_schema, columns).map_err(|source| error::ArrowSnafu { source }.build())
    }

    /// Gather by row indices within one batch; `indices` must be sorted
    /// and within `[0, batch_length)`.
    pub fn read_chunk_indices(&self, schema: &Schema, batch_id: usize, indices: &Int32Array) -> Result<RecordBatch> {
        let num_rows = self.metadata.batch_length(batch_id) as usize;
        let arrow_schema = Arc::new(schema.to_arrow()?);
        let columns: Vec<ArrayRef> = schema
            .fields()
            .iter()
            .map(|field| column::gather(field, &*self.source, &self.page_table, batch_id, num_rows, indices))
            .collect::<Result<_>>()?;
        RecordBatch::try_new(arrow_schema, columns).map_err(|source| error::ArrowSnafu { source }.build())
    }
}

fn load_dictionaries(source: &dyn RandomAccessSource, fields: &[crate::schema::Field]) -> Result<()> {
    for field in fields {
        if field.is_dictionary() {
            let dictionary = field.dictionary().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("field '{}' tagged DICTIONARY has no dictionary descriptor", field.name()),
                }
                .build()
            })?;
            let value_type = value_type_of(field)?;
            let values = crate::encoding::dictionary::decode_values_page(source, dictionary.offset as u64, &value_type)?;
            dictionary.set_values(values)?;
        }
        load_dictionaries(source, field.children())?;
    }
    Ok(())
}

fn value_type_of(field: &crate::schema::Field) -> Result<arrow::datatypes::DataType> {
    let arrow_field = field.to_arrow()?;
    match arrow_field.data_type() {
        arrow::datatypes::DataType::Dictionary(_, value_type) => Ok((**value_type).clone()),
        other => error::InvalidFormatSnafu {
            msg: format!("field '{}' is tagged DICTIONARY but has arrow type {other:?}", field.name()),
        }
        .fail(),
    }
}

#[cfg(feature = "async")]
pub mod fanout {
    //! `Get`'s concurrent per-field fan-out: one task per top-level
    //! projected field, collected back in field order regardless of
    //! completion order. Each task gets its own clone of the source and
    //! the page table (both cheap: an `Arc` clone) and builds its own
    //! decoder, per the no-shared-decoder-state rule.

    use super::*;

    impl FileReader {
        pub async fn get_async(&self, row: u64) -> Result<Vec<Scalar>> {
            self.get_with_schema_async(row, &self.schema).await
        }

        pub async fn get_with_schema_async(&self, row: u64, schema: &Schema) -> Result<Vec<Scalar>> {
            let (batch_id, row_in_batch) = self.metadata.locate_chunk(row)?;
            let num_rows = self.metadata.batch_length(batch_id) as usize;

            let tasks: Vec<_> = schema
                .fields()
                .iter()
                .cloned()
                .map(|field| {
                    let source = self.source.clone();
                    let page_table = self.page_table.clone();
                    tokio::task::spawn_blocking(move || {
                        column::read_scalar(&field, &*source, &page_table, batch_id, num_rows, row_in_batch as usize)
                    })
                })
                .collect();

            let mut out = Vec::with_capacity(tasks.len());
            for task in tasks {
                let result = task.await.map_err(|source| {
                    error::CancelledSnafu {
                        msg: source.to_string(),
                    }
                    .build()
                })?;
                out.push(result?);
            }
            Ok(out)
        }
    }
}
