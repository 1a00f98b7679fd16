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

//! Scan pipeline: `Project` + optional `Filter` compile down to one
//! schema read per chunk; `Limit`/`Offset` trim the resulting batches.
//! `ScannerBuilder` is the collaborator surface a caller assembles a scan
//! from; `Scanner` is the resulting lazy batch iterator.

pub mod filter;
pub mod limit;
pub mod project;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;

pub use filter::{Expr, Filter, Literal};
pub use limit::{Limit, Offset};
pub use project::Project;

use crate::error::{self, Result};
use crate::reader::FileReader;

/// Builds a [`Scanner`] over a [`FileReader`]. Mirrors the collaborator
/// contract of a dataset scanner builder: project, filter, and limit are
/// accumulated, then bound to the reader on `finish`.
pub struct ScannerBuilder<'a> {
    reader: &'a FileReader,
    columns: Option<Vec<String>>,
    filter_expr: Option<Expr>,
    limit: Option<u64>,
    offset: i64,
}

impl<'a> ScannerBuilder<'a> {
    pub fn new(reader: &'a FileReader) -> ScannerBuilder<'a> {
        ScannerBuilder {
            reader,
            columns: None,
            filter_expr: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn project(mut self, columns: &[&str]) -> ScannerBuilder<'a> {
        self.columns = Some(columns.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn filter(mut self, expr: Expr) -> ScannerBuilder<'a> {
        self.filter_expr = Some(expr);
        self
    }

    pub fn limit(mut self, n: u64, offset: i64) -> ScannerBuilder<'a> {
        self.limit = Some(n);
        self.offset = offset;
        self
    }

    pub fn finish(self) -> Result<Scanner<'a>> {
        if self.offset < 0 {
            return error::InvalidArgumentSnafu {
                msg: "scan offset must not be negative".to_string(),
            }
            .fail();
        }

        let dataset_schema = self.reader.schema();
        let filter = match self.filter_expr {
            Some(expr) => Filter::make(dataset_schema, Some(expr))?,
            None => None,
        };
        let column_refs: Vec<&str>;
        let columns: &[&str] = match &self.columns {
            Some(names) => {
                column_refs = names.iter().map(String::as_str).collect();
                &column_refs
            }
            None => {
                column_refs = dataset_schema.fields().iter().map(|f| f.name()).collect();
                &column_refs
            }
        };
        let project = Project::make(dataset_schema, columns, filter)?;

        Ok(Scanner {
            reader: self.reader,
            project,
            limit: self.limit.map(Limit::new),
            offset: if self.offset > 0 { Some(Offset::new(self.offset as u64)) } else { None },
            next_batch: 0,
        })
    }
}

/// A lazy, stateful iterator over a file's chunks, applying projection,
/// filtering, offset, and limit in that order.
pub struct Scanner<'a> {
    reader: &'a FileReader,
    project: Project,
    limit: Option<Limit>,
    offset: Option<Offset>,
    next_batch: usize,
}

impl<'a> Scanner<'a> {
    pub fn projected_schema(&self) -> &crate::schema::Schema {
        self.project.projected_schema()
    }

    fn next_chunk(&mut self) -> Result<Option<RecordBatch>> {
        while self.next_batch < self.reader.num_batches() {
            let batch_id = self.next_batch;
            self.next_batch += 1;

            let mut chunk = self.project.execute(self.reader, batch_id)?;
            if chunk.num_rows() == 0 {
                continue;
            }

            if let Some(offset) = &mut self.offset {
                chunk = match apply_offset(offset, &chunk)? {
                    Some(chunk) => chunk,
                    None => continue,
                };
                if chunk.num_rows() == 0 {
                    continue;
                }
            }

            if let Some(limit) = &mut self.limit {
                match apply_limit(limit, &chunk)? {
                    Some(chunk) if chunk.num_rows() > 0 => return Ok(Some(chunk)),
                    Some(_) => continue,
                    None => return Ok(None),
                }
            }

            return Ok(Some(chunk));
        }
        Ok(None)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Result<RecordBatch>> {
        self.next_chunk().transpose()
    }
}

fn apply_offset(offset: &mut Offset, batch: &RecordBatch) -> Result<Option<RecordBatch>> {
    match offset.execute(batch.num_rows() as u64) {
        None => Ok(Some(RecordBatch::new_empty(batch.schema()))),
        Some(0) => Ok(Some(batch.clone())),
        Some(pos) => Ok(Some(batch.slice(pos as usize, batch.num_rows() - pos as usize))),
    }
}

/// `None` once the limit is exhausted; a chunk (possibly zero-length)
/// otherwise, so the caller can distinguish "nothing left to scan" from
/// "this particular chunk happened to shrink to nothing".
fn apply_limit(limit: &mut Limit, batch: &RecordBatch) -> Result<Option<RecordBatch>> {
    let take = limit.execute(batch.num_rows() as u64) as usize;
    if take == batch.num_rows() {
        Ok(Some(batch.clone()))
    } else if take == 0 {
        Ok(None)
    } else {
        Ok(Some(batch.slice(0, take)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};

    use super::*;
    use crate::writer::FileWriter;

    fn sample_reader() -> FileReader {
        let schema = ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int32, true),
            ArrowField::new("b", DataType::Int32, true),
        ]);
        let mut writer = FileWriter::new(Vec::new(), &schema).unwrap();
        for chunk in [vec![1, 2, 3, 4], vec![5, 6]] {
            let a: Arc<dyn Array> = Arc::new(Int32Array::from(chunk.clone()));
            let b: Arc<dyn Array> = Arc::new(Int32Array::from(chunk));
            let batch = RecordBatch::try_new(Arc::new(schema.clone()), vec![a, b]).unwrap();
            writer.write(&batch).unwrap();
        }
        let bytes = writer.close().unwrap();
        FileReader::open(bytes::Bytes::from(bytes)).unwrap()
    }

    #[test]
    fn scan_all_batches() {
        let reader = sample_reader();
        let scanner = ScannerBuilder::new(&reader).finish().unwrap();
        let batches: Vec<RecordBatch> = scanner.collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_rows(), 4);
        assert_eq!(batches[1].num_rows(), 2);
    }

    #[test]
    fn scan_with_limit_crosses_batch_boundary() {
        let reader = sample_reader();
        let scanner = ScannerBuilder::new(&reader).limit(5, 0).finish().unwrap();
        let batches: Vec<RecordBatch> = scanner.collect::<Result<_>>().unwrap();
        let total: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn scan_with_offset_skips_leading_rows() {
        let reader = sample_reader();
        let scanner = ScannerBuilder::new(&reader).limit(100, 5).finish().unwrap();
        let batches: Vec<RecordBatch> = scanner.collect::<Result<_>>().unwrap();
        let total: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn scan_projection_selects_columns() {
        let reader = sample_reader();
        let scanner = ScannerBuilder::new(&reader).project(&["b"]).finish().unwrap();
        let batches: Vec<RecordBatch> = scanner.collect::<Result<_>>().unwrap();
        assert_eq!(batches[0].num_columns(), 1);
        assert_eq!(batches[0].schema().field(0).name(), "b");
    }

    #[test]
    fn negative_offset_is_invalid() {
        let reader = sample_reader();
        assert!(ScannerBuilder::new(&reader).limit(10, -1).finish().is_err());
    }

    #[test]
    fn scan_with_filter_merges_filter_and_scan_columns() {
        let reader = sample_reader();
        let expr = Expr::gt("a", Literal::Int64(2));
        let scanner = ScannerBuilder::new(&reader).filter(expr).finish().unwrap();
        let batches: Vec<RecordBatch> = scanner.collect::<Result<_>>().unwrap();

        assert_eq!(batches[0].num_columns(), 2);
        let a = batches[0].column_by_name("a").unwrap().as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(a.values(), &[3, 4]);
        let b = batches[0].column_by_name("b").unwrap().as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(b.values(), &[3, 4]);
    }
}
