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

//! Writes [`RecordBatch`]es to a sink in the strict append-only order the
//! format requires: pages first (column-major per batch, pre-order field
//! order), then dictionary values pages, then the manifest, page table,
//! metadata, and finally the 16-byte footer.

use std::collections::HashMap;
use std::io::Write;

use arrow::array::{Array, ArrayRef, DictionaryArray, ListArray, StructArray};
use arrow::datatypes::{Int32Type, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use bytes::BytesMut;

use crate::encoding::{binary, dictionary, list_offsets, plain, take_array};
use crate::error::{self, Result};
use crate::format::{footer, manifest, Footer, Metadata, PageTable};
use crate::proto;
use crate::schema::{Field, Schema};

/// Encodes [`RecordBatch`]es into a single file. Each call to [`write`]
/// becomes exactly one on-disk batch; there is no internal re-chunking, so
/// callers control batch boundaries by how they slice their input.
///
/// [`write`]: FileWriter::write
pub struct FileWriter<W> {
    sink: W,
    schema: Schema,
    num_columns: usize,
    position: u64,
    batch_lengths: Vec<u64>,
    page_entries: Vec<(i32, usize, u64, u64)>,
    dictionary_values: HashMap<i32, ArrayRef>,
}

impl<W: Write> FileWriter<W> {
    pub fn new(sink: W, arrow_schema: &ArrowSchema) -> Result<FileWriter<W>> {
        let schema = Schema::from_arrow(arrow_schema)?;
        let num_columns = schema.get_fields_count() as usize;
        Ok(FileWriter {
            sink,
            schema,
            num_columns,
            position: 0,
            batch_lengths: vec![],
            page_entries: vec![],
            dictionary_values: HashMap::new(),
        })
    }

    /// The schema this writer was constructed with; every batch passed to
    /// [`write`](Self::write) must have this as its Arrow schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        let expected = self.schema.to_arrow()?;
        if batch.schema().as_ref() != &expected {
            return error::InvalidArgumentSnafu {
                msg: "RecordBatch schema does not match the writer's schema".to_string(),
            }
            .fail();
        }
        let batch_id = self.batch_lengths.len();
        let fields = self.schema.fields().to_vec();
        for (field, array) in fields.iter().zip(batch.columns()) {
            self.write_field(field, array, batch_id)?;
        }
        self.batch_lengths.push(batch.num_rows() as u64);
        Ok(())
    }

    fn write_field(&mut self, field: &Field, array: &ArrayRef, batch_id: usize) -> Result<()> {
        if field.is_struct() {
            let struct_array = array.as_any().downcast_ref::<StructArray>().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("field '{}' is struct but array is {:?}", field.name(), array.data_type()),
                }
                .build()
            })?;
            for (child, column) in field.children().iter().zip(struct_array.columns()) {
                self.write_field(child, column, batch_id)?;
            }
            Ok(())
        } else if field.is_list() {
            let list_array = array.as_any().downcast_ref::<ListArray>().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("field '{}' is list but array is {:?}", field.name(), array.data_type()),
                }
                .build()
            })?;
            let page = list_offsets::encode(list_array);
            self.write_page(field.id(), batch_id, &page)?;
            let item_field = field.children().first().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("list field '{}' has no item child", field.name()),
                }
                .build()
            })?;
            self.write_field(item_field, list_array.values(), batch_id)
        } else if field.is_dictionary() {
            self.write_dictionary_field(field, array, batch_id)
        } else {
            let page = match field.encoding() {
                proto::Encoding::Plain => plain::encode(array)?,
                proto::Encoding::VarBinary => binary::encode(array)?,
                other => {
                    return error::NotImplementedSnafu {
                        msg: format!("no page writer for encoding {other:?}"),
                    }
                    .fail()
                }
            };
            self.write_page(field.id(), batch_id, &page)
        }
    }

    /// Encode a dictionary field's indices against the field's canonical
    /// values array, captured from the first batch that carries it. Later
    /// batches may arrive with their own, differently-ordered dictionary
    /// (as plain `DictionaryArray` values), so each batch's keys are first
    /// resolved back to plain values and then re-encoded against the
    /// canonical array, rather than assumed to already share its indices.
    fn write_dictionary_field(&mut self, field: &Field, array: &ArrayRef, batch_id: usize) -> Result<()> {
        let dict_array = array.as_any().downcast_ref::<DictionaryArray<Int32Type>>().ok_or_else(|| {
            error::InvalidFormatSnafu {
                msg: format!("field '{}' is dictionary but array is {:?}", field.name(), array.data_type()),
            }
            .build()
        })?;

        let canonical_values = self
            .dictionary_values
            .entry(field.id())
            .or_insert_with(|| dict_array.values().clone())
            .clone();

        let plain_values = take_array(dict_array.values(), dict_array.keys())?;
        let page = dictionary::encode_indices(&plain_values, &canonical_values)?;
        self.write_page(field.id(), batch_id, &page)
    }

    fn write_page(&mut self, field_id: i32, batch_id: usize, bytes: &[u8]) -> Result<()> {
        let position = self.position;
        self.sink.write_all(bytes).map_err(|source| error::IoSnafu { source }.build())?;
        self.position += bytes.len() as u64;
        self.page_entries.push((field_id, batch_id, position, bytes.len() as u64));
        Ok(())
    }

    fn write_blob(&mut self, bytes: &[u8]) -> Result<u64> {
        let position = self.position;
        self.sink.write_all(bytes).map_err(|source| error::IoSnafu { source }.build())?;
        self.position += bytes.len() as u64;
        Ok(position)
    }

    /// Write the dictionary values pages, manifest, page table, metadata,
    /// and footer, in that order, and return the underlying sink.
    pub fn close(mut self) -> Result<W> {
        let mut schema = self.schema.clone();
        let dictionary_fields: Vec<(i32, ArrayRef)> = self.dictionary_values.drain().collect();
        for (field_id, values) in dictionary_fields {
            let page = dictionary::encode_values_page(&values)?;
            let offset = self.write_blob(&page)?;
            schema = schema.set_dictionary_location(field_id, offset as i64, page.len() as i64);
        }

        let mut manifest_blob = BytesMut::new();
        manifest::write_framed(&schema, &mut manifest_blob);
        let manifest_position = self.write_blob(&manifest_blob)?;

        let num_batches = self.batch_lengths.len();
        let mut page_table = PageTable::new(self.num_columns, num_batches);
        for (field_id, batch_id, position, length) in &self.page_entries {
            page_table.set(*field_id, *batch_id, *position, *length)?;
        }
        let mut page_table_blob = BytesMut::new();
        page_table.write_framed(&mut page_table_blob);
        let page_table_position = self.write_blob(&page_table_blob)?;

        let metadata = Metadata::new(self.batch_lengths.clone(), manifest_position, page_table_position);
        let mut metadata_blob = BytesMut::new();
        metadata.write_framed(&mut metadata_blob);
        let metadata_position = self.write_blob(&metadata_blob)?;

        let footer = Footer {
            metadata_position,
            major_version: footer::MAJOR_VERSION,
        };
        let mut footer_blob = BytesMut::new();
        footer.write(&mut footer_blob);
        self.write_blob(&footer_blob)?;

        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int32Array, ListBuilder, StringArray, StringDictionaryBuilder};
    use arrow::datatypes::{DataType, Field as ArrowField};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::reader::FileReader;

    fn roundtrip(schema: ArrowSchema, batches: &[RecordBatch]) -> Vec<RecordBatch> {
        let mut writer = FileWriter::new(Vec::new(), &schema).unwrap();
        for batch in batches {
            writer.write(batch).unwrap();
        }
        let bytes = writer.close().unwrap();
        let reader = FileReader::open(Bytes::from(bytes)).unwrap();
        reader.read_table().unwrap()
    }

    #[test]
    fn primitive_roundtrip() {
        let schema = ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int32, true),
            ArrowField::new("b", DataType::Utf8, true),
        ]);
        let a: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        let b: ArrayRef = Arc::new(StringArray::from(vec![Some("x"), Some("y"), None]));
        let batch = RecordBatch::try_new(Arc::new(schema.clone()), vec![a, b]).unwrap();

        let batches = roundtrip(schema, &[batch.clone()]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], batch);
    }

    #[test]
    fn dictionary_roundtrip_across_batches() {
        let schema = ArrowSchema::new(vec![ArrowField::new(
            "d",
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
            true,
        )]);

        let mut b1 = StringDictionaryBuilder::<Int32Type>::new();
        b1.append_value("x");
        b1.append_value("y");
        b1.append_null();
        let batch1 = RecordBatch::try_new(Arc::new(schema.clone()), vec![Arc::new(b1.finish())]).unwrap();

        // Second batch reuses batch1's dictionary values in a different
        // order; the writer must re-resolve its indices against the
        // canonical values captured from batch1.
        let mut b2 = StringDictionaryBuilder::<Int32Type>::new();
        b2.append_value("y");
        b2.append_value("x");
        let batch2 = RecordBatch::try_new(Arc::new(schema.clone()), vec![Arc::new(b2.finish())]).unwrap();

        let mut writer = FileWriter::new(Vec::new(), &schema).unwrap();
        writer.write(&batch1).unwrap();
        writer.write(&batch2).unwrap();
        let bytes = writer.close().unwrap();

        let reader = FileReader::open(Bytes::from(bytes)).unwrap();
        assert_eq!(reader.num_batches(), 2);
        let table = reader.read_table().unwrap();
        assert_eq!(table[0].num_rows(), 3);
        assert_eq!(table[1].num_rows(), 2);
    }

    #[test]
    fn list_roundtrip() {
        let item_field = Arc::new(ArrowField::new("item", DataType::Int32, true));
        let schema = ArrowSchema::new(vec![ArrowField::new("l", DataType::List(item_field), true)]);

        let mut builder = ListBuilder::new(Int32Array::builder(0));
        builder.values().append_value(1);
        builder.values().append_value(1);
        builder.values().append_value(1);
        builder.append(true);
        builder.values().append_value(2);
        builder.append(true);
        builder.append(false);
        let list_array = builder.finish();

        let batch = RecordBatch::try_new(Arc::new(schema.clone()), vec![Arc::new(list_array.clone())]).unwrap();
        let batches = roundtrip(schema, &[batch]);
        let roundtripped = batches[0].column(0).as_any().downcast_ref::<ListArray>().unwrap();
        assert_eq!(format!("{roundtripped:?}"), format!("{list_array:?}"));
    }
}
