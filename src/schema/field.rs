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

use std::sync::{Arc, OnceLock};

use arrow_array::ArrayRef;
use arrow_schema::{DataType, Field as ArrowField};

use crate::error::{self, Result};
use crate::proto;
use crate::schema::logical_type::{arrow_primitive_to_logical_type, logical_type_to_arrow_primitive};

/// Where a dictionary field's values page lives, and (once `Open` has run)
/// the materialized values array itself.
///
/// `values` is a [`OnceLock`] rather than a plain field: the location is
/// known at manifest-parse time, but the array is loaded exactly once,
/// lazily, when the reader opens the file, and from
/// then on is immutable for the lifetime of the [`Field`].
#[derive(Debug, Default)]
pub struct DictionaryDescriptor {
    pub offset: i64,
    pub page_length: i64,
    values: OnceLock<ArrayRef>,
}

impl Clone for DictionaryDescriptor {
    fn clone(&self) -> Self {
        let cloned = Self {
            offset: self.offset,
            page_length: self.page_length,
            values: OnceLock::new(),
        };
        if let Some(v) = self.values.get() {
            let _ = cloned.values.set(v.clone());
        }
        cloned
    }
}

impl DictionaryDescriptor {
    pub fn values(&self) -> Option<&ArrayRef> {
        self.values.get()
    }

    /// Set the materialized dictionary values array. Must only be called
    /// once, by `Reader::Open`.
    pub fn set_values(&self, values: ArrayRef) -> Result<()> {
        self.values
            .set(values)
            .map_err(|_| {
                error::InvalidFormatSnafu {
                    msg: "dictionary values already loaded".to_string(),
                }
                .build()
            })
    }
}

/// One node of the on-disk schema tree.
///
/// A node owns its children, but knows its parent only as an id,
/// resolvable through the owning [`crate::schema::Schema`]'s id index
/// rather than an owning back-pointer.
#[derive(Debug, Clone)]
pub struct Field {
    id: i32,
    parent_id: i32,
    name: String,
    logical_type: String,
    encoding: proto::Encoding,
    dictionary: Option<Arc<DictionaryDescriptor>>,
    children: Vec<Field>,
}

impl Field {
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn parent_id(&self) -> i32 {
        self.parent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> &str {
        &self.logical_type
    }

    pub fn encoding(&self) -> proto::Encoding {
        self.encoding
    }

    pub fn children(&self) -> &[Field] {
        &self.children
    }

    pub fn dictionary(&self) -> Option<&DictionaryDescriptor> {
        self.dictionary.as_deref()
    }

    /// A leaf is a field with no children: every primitive, var-binary, or
    /// dictionary column.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_struct(&self) -> bool {
        self.logical_type == "struct"
    }

    pub fn is_list(&self) -> bool {
        self.logical_type == "list" || self.logical_type == "list.struct"
    }

    pub fn is_dictionary(&self) -> bool {
        self.logical_type.starts_with("dict:")
    }

    /// Direct child with the given local (non-dotted) name.
    pub fn child(&self, name: &str) -> Option<&Field> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Children visible to dotted-name resolution: for a list-of-struct,
    /// this transparently steps past the synthetic `item` wrapper and
    /// exposes the element struct's own fields; for anything else it is
    /// just `children()`. A list of a non-struct type has none.
    pub fn effective_children(&self) -> &[Field] {
        if self.is_list() {
            match self.children.first() {
                Some(item) if item.is_struct() => item.children(),
                _ => &[],
            }
        } else {
            &self.children
        }
    }

    /// Recursive lookup by id, including `self`.
    pub fn find_by_id(&self, id: i32) -> Option<&Field> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }

    /// Total node count of this subtree, including `self`.
    pub fn count(&self) -> i32 {
        1 + self.children.iter().map(Field::count).sum::<i32>()
    }

    /// Collect every id in this subtree into `out`, including `self`.
    pub fn collect_ids(&self, out: &mut std::collections::HashSet<i32>) {
        out.insert(self.id);
        for c in &self.children {
            c.collect_ids(out);
        }
    }

    /// A full, deep copy of this node (including ids) — used when lifting a
    /// whole subtree into a projection.
    pub fn copy_full(&self) -> Field {
        self.clone()
    }

    /// Same node, with a different child list (used by project/exclude,
    /// which only ever prune children, never rename or retype a node).
    pub fn with_children(&self, children: Vec<Field>) -> Field {
        Field {
            children,
            ..self.clone()
        }
    }

    /// A copy of this dictionary leaf with its on-disk values-page location
    /// filled in. Called by the writer once, after the last batch, when the
    /// location first becomes known; the materialized values array itself
    /// is loaded separately, lazily, by the reader.
    pub fn set_dictionary_location(&self, offset: i64, page_length: i64) -> Field {
        Field {
            dictionary: Some(Arc::new(DictionaryDescriptor {
                offset,
                page_length,
                values: OnceLock::new(),
            })),
            ..self.clone()
        }
    }

    /// Re-number this node and its subtree pre-order, starting at
    /// `*next_id`, with `parent_id` as this node's parent.
    pub fn assign_ids(&mut self, parent_id: i32, next_id: &mut i32) {
        self.id = *next_id;
        self.parent_id = parent_id;
        *next_id += 1;
        let this_id = self.id;
        for child in &mut self.children {
            child.assign_ids(this_id, next_id);
        }
    }

    pub fn equals(&self, other: &Field, check_id: bool) -> bool {
        if check_id && (self.id != other.id || self.parent_id != other.parent_id) {
            return false;
        }
        if self.name != other.name
            || self.logical_type != other.logical_type
            || self.encoding != other.encoding
            || self.children.len() != other.children.len()
        {
            return false;
        }
        self.children
            .iter()
            .zip(other.children.iter())
            .all(|(a, b)| a.equals(b, check_id))
    }

    /// Build an (unnumbered: caller must `assign_ids`) tree from an Arrow
    /// field. Struct fields recurse into their children; a list field gets
    /// a single synthetic `item` child representing the element type.
    pub fn from_arrow(field: &ArrowField) -> Result<Field> {
        let node = match field.data_type() {
            DataType::Struct(children) => {
                if children.is_empty() {
                    return error::InvalidFormatSnafu {
                        msg: format!("struct field '{}' must have >= 1 child", field.name()),
                    }
                    .fail();
                }
                let children = children
                    .iter()
                    .map(|c| Field::from_arrow(c))
                    .collect::<Result<Vec<_>>>()?;
                Field {
                    id: -1,
                    parent_id: -1,
                    name: field.name().clone(),
                    logical_type: "struct".to_string(),
                    encoding: proto::Encoding::None,
                    dictionary: None,
                    children,
                }
            }
            DataType::List(item) => {
                let is_struct_item = matches!(item.data_type(), DataType::Struct(_));
                let mut item_field = Field::from_arrow(item)?;
                item_field.name = "item".to_string();
                Field {
                    id: -1,
                    parent_id: -1,
                    name: field.name().clone(),
                    logical_type: if is_struct_item {
                        "list.struct".to_string()
                    } else {
                        "list".to_string()
                    },
                    encoding: proto::Encoding::None,
                    dictionary: None,
                    children: vec![item_field],
                }
            }
            DataType::Dictionary(index_type, value_type) => {
                let value_name = arrow_primitive_to_logical_type(value_type)?;
                let index_name = arrow_primitive_to_logical_type(index_type)?;
                Field {
                    id: -1,
                    parent_id: -1,
                    name: field.name().clone(),
                    logical_type: format!("dict:{value_name}:{index_name}"),
                    encoding: proto::Encoding::Dictionary,
                    dictionary: Some(Arc::new(DictionaryDescriptor::default())),
                    children: vec![],
                }
            }
            DataType::Utf8 | DataType::Binary => Field {
                id: -1,
                parent_id: -1,
                name: field.name().clone(),
                logical_type: arrow_primitive_to_logical_type(field.data_type())?,
                encoding: proto::Encoding::VarBinary,
                dictionary: None,
                children: vec![],
            },
            other => Field {
                id: -1,
                parent_id: -1,
                name: field.name().clone(),
                logical_type: arrow_primitive_to_logical_type(other)?,
                encoding: proto::Encoding::Plain,
                dictionary: None,
                children: vec![],
            },
        };
        Ok(node)
    }

    pub fn to_arrow(&self) -> Result<ArrowField> {
        let dt = self.to_arrow_data_type()?;
        Ok(ArrowField::new(&self.name, dt, true))
    }

    fn to_arrow_data_type(&self) -> Result<DataType> {
        if self.logical_type == "struct" {
            let fields: Vec<ArrowField> = self
                .children
                .iter()
                .map(Field::to_arrow)
                .collect::<Result<_>>()?;
            Ok(DataType::Struct(fields.into()))
        } else if self.is_list() {
            let item = self.children.first().ok_or_else(|| {
                error::InvalidFormatSnafu {
                    msg: format!("list field '{}' has no item child", self.name),
                }
                .build()
            })?;
            Ok(DataType::List(Arc::new(item.to_arrow()?)))
        } else if let Some(rest) = self.logical_type.strip_prefix("dict:") {
            let mut parts = rest.splitn(2, ':');
            let value_name = parts.next().unwrap_or_default();
            let index_name = parts.next().unwrap_or_default();
            let value_type = logical_type_to_arrow_primitive(value_name)?;
            let index_type = logical_type_to_arrow_primitive(index_name)?;
            Ok(DataType::Dictionary(
                Box::new(index_type),
                Box::new(value_type),
            ))
        } else {
            logical_type_to_arrow_primitive(&self.logical_type)
        }
    }

    /// Flatten this subtree, pre-order, into wire [`proto::Field`] records.
    pub fn to_proto(&self, out: &mut Vec<proto::Field>) {
        out.push(proto::Field {
            id: self.id,
            parent_id: self.parent_id,
            name: self.name.clone(),
            logical_type: self.logical_type.clone(),
            encoding: self.encoding as i32,
            dictionary_offset: self.dictionary.as_ref().map(|d| d.offset),
            dictionary_page_length: self.dictionary.as_ref().map(|d| d.page_length),
        });
        for child in &self.children {
            child.to_proto(out);
        }
    }

    /// Rebuild a forest from a flat pre-order list of wire records, wiring
    /// children up by `parent_id`. Every non-root parent id must refer to a
    /// node already seen earlier in the list.
    pub fn forest_from_proto(fields: &[proto::Field]) -> Result<Vec<Field>> {
        let mut nodes: Vec<Field> = Vec::with_capacity(fields.len());
        let mut index_of_id = std::collections::HashMap::new();
        for pb in fields {
            if pb.parent_id != -1 && !index_of_id.contains_key(&pb.parent_id) {
                return error::InvalidFormatSnafu {
                    msg: format!(
                        "field id={} references unknown parent_id={}",
                        pb.id, pb.parent_id
                    ),
                }
                .fail();
            }
            let encoding = proto::Encoding::try_from(pb.encoding).map_err(|_| {
                error::InvalidFormatSnafu {
                    msg: format!("unknown encoding tag {}", pb.encoding),
                }
                .build()
            })?;
            let dictionary = if pb.dictionary_offset.is_some() || encoding == proto::Encoding::Dictionary
            {
                Some(Arc::new(DictionaryDescriptor {
                    offset: pb.dictionary_offset.unwrap_or(-1),
                    page_length: pb.dictionary_page_length.unwrap_or(0),
                    values: OnceLock::new(),
                }))
            } else {
                None
            };
            index_of_id.insert(pb.id, nodes.len());
            nodes.push(Field {
                id: pb.id,
                parent_id: pb.parent_id,
                name: pb.name.clone(),
                logical_type: pb.logical_type.clone(),
                encoding,
                dictionary,
                children: vec![],
            });
        }

        // Re-assemble the tree bottom-up so that parents always receive
        // fully-built children; `index_of_id` still points at the flat
        // positions which is why we build a children-id map first.
        let mut children_of: std::collections::HashMap<i32, Vec<i32>> =
            std::collections::HashMap::new();
        for pb in fields {
            children_of.entry(pb.parent_id).or_default().push(pb.id);
        }

        fn build(
            id: i32,
            by_id: &std::collections::HashMap<i32, usize>,
            flat: &[Field],
            children_of: &std::collections::HashMap<i32, Vec<i32>>,
        ) -> Field {
            let mut node = flat[by_id[&id]].clone();
            if let Some(child_ids) = children_of.get(&id) {
                node.children = child_ids
                    .iter()
                    .map(|cid| build(*cid, by_id, flat, children_of))
                    .collect();
            }
            node
        }

        let roots = children_of.get(&-1).cloned().unwrap_or_default();
        Ok(roots
            .into_iter()
            .map(|id| build(id, &index_of_id, &nodes, &children_of))
            .collect())
    }
}
