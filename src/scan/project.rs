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

//! Ties the file schema, the caller's projection, and an optional filter
//! together into the schema actually read off disk per chunk, and merges
//! the filter's own columns back in afterwards.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;

use crate::error::{self, Result};
use crate::reader::FileReader;
use crate::schema::Schema;

use super::filter::Filter;

pub struct Project {
    projected_schema: Schema,
    scan_schema: Schema,
    filter: Option<Filter>,
}

impl Project {
    /// `dataset_schema` is the file's own schema; `projected_names` is
    /// the caller's requested column list (dotted paths allowed).
    pub fn make(dataset_schema: &Schema, projected_names: &[&str], filter: Option<Filter>) -> Result<Project> {
        let projected_schema = dataset_schema.project(projected_names)?;
        let scan_schema = match &filter {
            Some(filter) => projected_schema.exclude(filter.schema())?,
            None => projected_schema.clone(),
        };
        Ok(Project {
            projected_schema,
            scan_schema,
            filter,
        })
    }

    pub fn projected_schema(&self) -> &Schema {
        &self.projected_schema
    }

    /// One chunk of the scan: when a filter is present, only the rows
    /// that pass it, with its columns merged back in column-order; a
    /// straight read of `scan_schema` otherwise.
    pub fn execute(&self, reader: &FileReader, batch_id: usize) -> Result<RecordBatch> {
        match &self.filter {
            Some(filter) => {
                let (indices, values) = filter.execute(reader, batch_id)?;
                let scanned = reader.read_chunk_indices(&self.scan_schema, batch_id, &indices)?;
                if values.num_rows() != scanned.num_rows() {
                    return error::InvalidFormatSnafu {
                        msg: "filter and scan chunks disagree on row count".to_string(),
                    }
                    .fail();
                }
                merge_by_schema(&self.projected_schema, &values, &scanned)
            }
            None => reader.read_chunk(&self.scan_schema, batch_id, None),
        }
    }
}

/// Reassemble a `RecordBatch` matching `schema`'s field order out of two
/// batches whose columns, taken together, cover it: the filter's own
/// columns and the rest of the scan.
fn merge_by_schema(schema: &Schema, filter_values: &RecordBatch, scanned: &RecordBatch) -> Result<RecordBatch> {
    let arrow_schema = std::sync::Arc::new(schema.to_arrow()?);
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            if let Some(array) = filter_values.column_by_name(field.name()) {
                Ok(array.clone())
            } else if let Some(array) = scanned.column_by_name(field.name()) {
                Ok(array.clone())
            } else {
                error::InvalidFormatSnafu {
                    msg: format!("projected field '{}' present in neither filter nor scan chunk", field.name()),
                }
                .fail()
            }
        })
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(arrow_schema, columns).map_err(|source| error::ArrowSnafu { source }.build())
}

/// Concatenate a scan's per-chunk results into one batch, for callers
/// that want the whole projected result rather than an iterator over it.
pub fn concat(schema: &Schema, chunks: &[RecordBatch]) -> Result<RecordBatch> {
    let arrow_schema = std::sync::Arc::new(schema.to_arrow()?);
    concat_batches(&arrow_schema, chunks).map_err(|source| error::ArrowSnafu { source }.build())
}
