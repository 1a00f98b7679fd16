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

//! The nested schema tree: an ordered sequence of top-level [`Field`]s,
//! with projection, exclusion, and name/id resolution over the whole
//! subtree.

pub mod field;
pub mod logical_type;

use std::collections::{HashMap, HashSet};

use arrow_schema::Schema as ArrowSchema;

pub use field::Field;

use crate::error::{self, Result};
use crate::proto;

/// The canonical, ordered schema of a file or a projection of one.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

#[derive(Default)]
struct Selection {
    full: bool,
    children: HashMap<usize, Selection>,
}

impl Schema {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_fields_count(&self) -> i32 {
        self.fields.iter().map(Field::count).sum()
    }

    pub fn get_field_by_id(&self, id: i32) -> Option<&Field> {
        self.fields.iter().find_map(|f| f.find_by_id(id))
    }

    /// Dotted-path lookup: `a.b.c` walks children by local name, returning
    /// absent on any miss. A list-of-struct step transparently skips its
    /// synthetic `item` wrapper, so `objects.value` reaches the `value`
    /// field of `objects: list<struct<id,value>>` directly.
    pub fn get_field_by_name(&self, name: &str) -> Option<&Field> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let mut current = self.fields.iter().find(|f| f.name() == first)?;
        for part in parts {
            current = current
                .effective_children()
                .iter()
                .find(|f| f.name() == part)?;
        }
        Some(current)
    }

    pub fn equals(&self, other: &Schema, check_id: bool) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.equals(b, check_id))
    }

    /// Re-number every node pre-order from 0; root nodes get `parent_id = -1`.
    pub fn assign_ids(&mut self) {
        let mut next_id = 0;
        for field in &mut self.fields {
            field.assign_ids(-1, &mut next_id);
        }
    }

    pub fn from_arrow(arrow_schema: &ArrowSchema) -> Result<Schema> {
        let fields = arrow_schema
            .fields()
            .iter()
            .map(|f| Field::from_arrow(f))
            .collect::<Result<Vec<_>>>()?;
        let mut schema = Schema { fields };
        schema.assign_ids();
        Ok(schema)
    }

    pub fn to_arrow(&self) -> Result<ArrowSchema> {
        let fields = self
            .fields
            .iter()
            .map(Field::to_arrow)
            .collect::<Result<Vec<_>>>()?;
        Ok(ArrowSchema::new(fields))
    }

    pub fn from_proto(manifest: &proto::Manifest) -> Result<Schema> {
        let fields = Field::forest_from_proto(&manifest.fields)?;
        Ok(Schema { fields })
    }

    pub fn to_proto(&self) -> proto::Manifest {
        let mut out = Vec::with_capacity(self.get_fields_count() as usize);
        for field in &self.fields {
            field.to_proto(&mut out);
        }
        proto::Manifest { fields: out }
    }

    /// Project by dotted names, preserving original top-level sibling
    /// order rather than the order the names were given in. A bare
    /// top-level name selects its entire subtree; a nested path selects
    /// only the ancestor spine plus the terminal node's subtree.
    pub fn project(&self, names: &[&str]) -> Result<Schema> {
        let mut selection: HashMap<usize, Selection> = HashMap::new();
        for name in names {
            let parts: Vec<&str> = name.split('.').collect();
            let indices = Self::resolve_indices(&self.fields, &parts).ok_or_else(|| {
                error::InvalidArgumentSnafu {
                    msg: format!("unknown projected field path: {name}"),
                }
                .build()
            })?;
            Self::insert_selection(&mut selection, &indices);
        }
        let fields = Self::apply_selection(&self.fields, &selection);
        Ok(Schema { fields })
    }

    /// Project driven by an Arrow schema: matches top-level fields by
    /// name and requires the logical type to agree.
    pub fn project_arrow(&self, arrow_schema: &ArrowSchema) -> Result<Schema> {
        let mut names = Vec::with_capacity(arrow_schema.fields().len());
        for arrow_field in arrow_schema.fields() {
            let field = self
                .fields
                .iter()
                .find(|f| f.name() == arrow_field.name())
                .ok_or_else(|| {
                    error::InvalidArgumentSnafu {
                        msg: format!("unknown field: {}", arrow_field.name()),
                    }
                    .build()
                })?;
            let ours = field.to_arrow()?;
            if ours.data_type() != arrow_field.data_type() {
                return error::InvalidArgumentSnafu {
                    msg: format!(
                        "projection type mismatch for '{}': have {:?}, requested {:?}",
                        arrow_field.name(),
                        ours.data_type(),
                        arrow_field.data_type()
                    ),
                }
                .fail();
            }
            names.push(arrow_field.name().as_str());
        }
        self.project(&names)
    }

    /// Set difference by id. `other`'s id-set must be a strict subset of
    /// this schema's. Removing every child of a struct/list also removes
    /// that now-empty parent.
    pub fn exclude(&self, other: &Schema) -> Result<Schema> {
        let mut other_ids = HashSet::new();
        for f in &other.fields {
            f.collect_ids(&mut other_ids);
        }
        let mut self_ids = HashSet::new();
        for f in &self.fields {
            f.collect_ids(&mut self_ids);
        }
        if !other_ids.is_subset(&self_ids) {
            return error::InvalidArgumentSnafu {
                msg: "exclude: schema is not a subset of this schema".to_string(),
            }
            .fail();
        }
        if other_ids.len() >= self_ids.len() {
            return error::InvalidArgumentSnafu {
                msg: "exclude: schema must be a strict subset of this schema".to_string(),
            }
            .fail();
        }
        Ok(Schema {
            fields: Self::exclude_fields(&self.fields, &other_ids),
        })
    }

    /// Copy of this schema with one dictionary field's values-page location
    /// filled in. Used by the writer, once per dictionary field, after the
    /// last batch has been written.
    pub fn set_dictionary_location(&self, field_id: i32, offset: i64, page_length: i64) -> Schema {
        Schema {
            fields: Self::set_dictionary_location_in(&self.fields, field_id, offset, page_length),
        }
    }

    fn set_dictionary_location_in(fields: &[Field], field_id: i32, offset: i64, page_length: i64) -> Vec<Field> {
        fields
            .iter()
            .map(|f| {
                if f.id() == field_id {
                    f.set_dictionary_location(offset, page_length)
                } else if f.children().is_empty() {
                    f.copy_full()
                } else {
                    f.with_children(Self::set_dictionary_location_in(f.children(), field_id, offset, page_length))
                }
            })
            .collect()
    }

    fn exclude_fields(fields: &[Field], excluded: &HashSet<i32>) -> Vec<Field> {
        fields
            .iter()
            .filter_map(|f| {
                if excluded.contains(&f.id()) {
                    return None;
                }
                if f.is_leaf() {
                    return Some(f.copy_full());
                }
                let children = Self::exclude_fields(f.children(), excluded);
                if children.is_empty() {
                    None
                } else {
                    Some(f.with_children(children))
                }
            })
            .collect()
    }

    /// Resolve a dotted path to a sequence of real tree indices — i.e. the
    /// index path `apply_selection`/`insert_selection` can walk directly
    /// via `children()`. Steps that cross a list-of-struct's synthetic
    /// `item` wrapper push an extra `0` for that hop, so the returned path
    /// always matches the real, unflattened tree shape.
    fn resolve_indices(level: &[Field], parts: &[&str]) -> Option<Vec<usize>> {
        let first_idx = level.iter().position(|f| f.name() == parts[0])?;
        let mut indices = vec![first_idx];
        let mut current_field = &level[first_idx];
        for part in &parts[1..] {
            let eff = current_field.effective_children();
            let idx = eff.iter().position(|f| f.name() == *part)?;
            if current_field.is_list() {
                indices.push(0);
            }
            indices.push(idx);
            current_field = &eff[idx];
        }
        Some(indices)
    }

    fn insert_selection(selection: &mut HashMap<usize, Selection>, indices: &[usize]) {
        let idx = indices[0];
        let entry = selection.entry(idx).or_default();
        if entry.full {
            return;
        }
        if indices.len() == 1 {
            entry.full = true;
            entry.children.clear();
        } else {
            Self::insert_selection(&mut entry.children, &indices[1..]);
        }
    }

    fn apply_selection(level: &[Field], selection: &HashMap<usize, Selection>) -> Vec<Field> {
        level
            .iter()
            .enumerate()
            .filter_map(|(idx, field)| {
                let sel = selection.get(&idx)?;
                if sel.full || sel.children.is_empty() {
                    Some(field.copy_full())
                } else {
                    Some(field.with_children(Self::apply_selection(field.children(), &sel.children)))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::{DataType, Field as ArrowField};
    use proptest::prelude::*;

    fn sample() -> Schema {
        let arrow = ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int32, true),
            ArrowField::new("b", DataType::Utf8, true),
            ArrowField::new(
                "objects",
                DataType::List(std::sync::Arc::new(ArrowField::new(
                    "item",
                    DataType::Struct(
                        vec![
                            ArrowField::new("id", DataType::Int32, true),
                            ArrowField::new("value", DataType::Float64, true),
                        ]
                        .into(),
                    ),
                    true,
                ))),
                true,
            ),
        ]);
        Schema::from_arrow(&arrow).unwrap()
    }

    #[test]
    fn project_preserves_original_order() {
        let arrow = ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int32, true),
            ArrowField::new("b", DataType::Int32, true),
            ArrowField::new("c", DataType::Int32, true),
        ]);
        let schema = Schema::from_arrow(&arrow).unwrap();
        let projected = schema.project(&["c", "a"]).unwrap();
        let names: Vec<_> = projected.fields().iter().map(Field::name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn project_nested_struct_in_list() {
        let schema = sample();
        let projected = schema.project(&["objects.value"]).unwrap();
        let objects = projected.get_field_by_name("objects").unwrap();
        let item = objects.child("item").unwrap();
        assert_eq!(item.children().len(), 1);
        assert_eq!(item.children()[0].name(), "value");
    }

    #[test]
    fn exclude_is_inverse_of_project() {
        let schema = sample();
        let filter_schema = schema.project(&["a"]).unwrap();
        let rest = schema.exclude(&filter_schema).unwrap();

        let mut rest_ids: HashSet<i32> = HashSet::new();
        for f in rest.fields() {
            f.collect_ids(&mut rest_ids);
        }
        let mut filter_ids: HashSet<i32> = HashSet::new();
        for f in filter_schema.fields() {
            f.collect_ids(&mut filter_ids);
        }
        let mut all_ids: HashSet<i32> = HashSet::new();
        for f in schema.fields() {
            f.collect_ids(&mut all_ids);
        }
        let union: HashSet<i32> = rest_ids.union(&filter_ids).copied().collect();
        assert_eq!(union, all_ids);
    }

    #[test]
    fn exclude_rejects_non_subset() {
        let schema = sample();
        let unrelated = ArrowSchema::new(vec![ArrowField::new("z", DataType::Int32, true)]);
        let other = Schema::from_arrow(&unrelated).unwrap();
        assert!(schema.exclude(&other).is_err());
    }

    #[test]
    fn exclude_rejects_non_strict_subset() {
        let schema = sample();
        assert!(schema.exclude(&schema).is_err());
    }

    #[test]
    fn get_field_by_name_dotted_path() {
        let schema = sample();
        let field = schema.get_field_by_name("objects.value").unwrap();
        assert_eq!(field.name(), "value");
    }

    fn flat_schema(n: usize) -> Schema {
        let fields: Vec<ArrowField> = (0..n)
            .map(|i| ArrowField::new(format!("f{i}"), DataType::Int32, true))
            .collect();
        Schema::from_arrow(&ArrowSchema::new(fields)).unwrap()
    }

    proptest! {
        #[test]
        fn project_preserves_order_for_any_subset(
            picks in prop::collection::hash_set(0usize..8, 1..8)
        ) {
            let schema = flat_schema(8);
            let names: Vec<String> = picks.iter().map(|i| format!("f{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let projected = schema.project(&name_refs).unwrap();

            let mut expected: Vec<usize> = picks.into_iter().collect();
            expected.sort_unstable();
            let got: Vec<usize> = projected
                .fields()
                .iter()
                .map(|f| f.name()[1..].parse().unwrap())
                .collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn project_then_exclude_is_closed_over_ids(
            picks in prop::collection::hash_set(0usize..8, 1..7)
        ) {
            let schema = flat_schema(8);
            let names: Vec<String> = picks.iter().map(|i| format!("f{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let filter_schema = schema.project(&name_refs).unwrap();
            let rest = schema.exclude(&filter_schema).unwrap();

            let mut rest_ids = HashSet::new();
            for f in rest.fields() {
                f.collect_ids(&mut rest_ids);
            }
            let mut filter_ids = HashSet::new();
            for f in filter_schema.fields() {
                f.collect_ids(&mut filter_ids);
            }
            let mut all_ids = HashSet::new();
            for f in schema.fields() {
                f.collect_ids(&mut all_ids);
            }

            prop_assert!(rest_ids.is_disjoint(&filter_ids));
            let union: HashSet<i32> = rest_ids.union(&filter_ids).copied().collect();
            prop_assert_eq!(union, all_ids);
        }
    }
}
