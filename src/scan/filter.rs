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

//! A small boolean expression tree evaluated directly against decoded
//! columns, and the [`Filter`] that compiles one down to the subset of
//! leaves it reads.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::record_batch::RecordBatch;

use crate::error::{self, Result};
use crate::reader::FileReader;
use crate::schema::Schema;

#[derive(Debug, Clone)]
pub enum Literal {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// A predicate over a subset of a schema's top-level leaves. Built from
/// comparisons, null checks, and boolean combinators; evaluated column by
/// column against a materialized [`RecordBatch`].
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(bool),
    IsNull(String),
    Cmp(String, CmpOp, Literal),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn eq(column: impl Into<String>, value: Literal) -> Expr {
        Expr::Cmp(column.into(), CmpOp::Eq, value)
    }

    pub fn lt(column: impl Into<String>, value: Literal) -> Expr {
        Expr::Cmp(column.into(), CmpOp::Lt, value)
    }

    pub fn lt_eq(column: impl Into<String>, value: Literal) -> Expr {
        Expr::Cmp(column.into(), CmpOp::LtEq, value)
    }

    pub fn gt(column: impl Into<String>, value: Literal) -> Expr {
        Expr::Cmp(column.into(), CmpOp::Gt, value)
    }

    pub fn gt_eq(column: impl Into<String>, value: Literal) -> Expr {
        Expr::Cmp(column.into(), CmpOp::GtEq, value)
    }

    pub fn is_null(column: impl Into<String>) -> Expr {
        Expr::IsNull(column.into())
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// The column names this expression reads, in first-seen order,
    /// de-duplicated.
    fn column_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::IsNull(name) | Expr::Cmp(name, _, _) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.column_names(out);
                r.column_names(out);
            }
            Expr::Not(e) => e.column_names(out),
        }
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        match self {
            Expr::Literal(v) => Ok(BooleanArray::from(vec![*v; batch.num_rows()])),
            Expr::IsNull(name) => {
                arrow::compute::is_null(&column(batch, name)?).map_err(|source| error::ArrowSnafu { source }.build())
            }
            Expr::Cmp(name, op, literal) => compare(&column(batch, name)?, *op, literal),
            Expr::And(l, r) => {
                arrow::compute::and(&l.evaluate(batch)?, &r.evaluate(batch)?).map_err(|source| error::ArrowSnafu { source }.build())
            }
            Expr::Or(l, r) => {
                arrow::compute::or(&l.evaluate(batch)?, &r.evaluate(batch)?).map_err(|source| error::ArrowSnafu { source }.build())
            }
            Expr::Not(e) => arrow::compute::not(&e.evaluate(batch)?).map_err(|source| error::ArrowSnafu { source }.build()),
        }
    }
}

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| {
            error::InvalidArgumentSnafu {
                msg: format!("filter references unknown column '{name}'"),
            }
            .build()
        })
}

fn compare(array: &ArrayRef, op: CmpOp, literal: &Literal) -> Result<BooleanArray> {
    fn apply<T: PartialOrd>(op: CmpOp, a: T, b: T) -> bool {
        match op {
            CmpOp::Eq => a == b,
            CmpOp::Lt => a < b,
            CmpOp::LtEq => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::GtEq => a >= b,
        }
    }

    match (array.as_any().downcast_ref::<Int32Array>(), literal) {
        (Some(a), Literal::Int64(v)) => {
            return Ok(a.iter().map(|x| x.map(|x| apply(op, x as i64, *v))).collect());
        }
        (Some(_), _) => {
            return error::InvalidArgumentSnafu {
                msg: "filter literal type does not match Int32 column".to_string(),
            }
            .fail()
        }
        _ => {}
    }
    match (array.as_any().downcast_ref::<Int64Array>(), literal) {
        (Some(a), Literal::Int64(v)) => {
            return Ok(a.iter().map(|x| x.map(|x| apply(op, x, *v))).collect());
        }
        (Some(_), _) => {
            return error::InvalidArgumentSnafu {
                msg: "filter literal type does not match Int64 column".to_string(),
            }
            .fail()
        }
        _ => {}
    }
    match (array.as_any().downcast_ref::<Float64Array>(), literal) {
        (Some(a), Literal::Float64(v)) => {
            return Ok(a.iter().map(|x| x.map(|x| apply(op, x, *v))).collect());
        }
        (Some(_), _) => {
            return error::InvalidArgumentSnafu {
                msg: "filter literal type does not match Float64 column".to_string(),
            }
            .fail()
        }
        _ => {}
    }
    match (array.as_any().downcast_ref::<StringArray>(), literal) {
        (Some(a), Literal::Utf8(v)) => {
            return Ok(a.iter().map(|x| x.map(|x| apply(op, x, v.as_str()))).collect());
        }
        (Some(_), _) => {
            return error::InvalidArgumentSnafu {
                msg: "filter literal type does not match Utf8 column".to_string(),
            }
            .fail()
        }
        _ => {}
    }
    match (array.as_any().downcast_ref::<BooleanArray>(), literal) {
        (Some(a), Literal::Boolean(v)) if op == CmpOp::Eq => {
            return Ok(a.iter().map(|x| x.map(|x| x == *v)).collect());
        }
        (Some(_), Literal::Boolean(_)) => {
            return error::InvalidArgumentSnafu {
                msg: "only equality is supported for boolean filter columns".to_string(),
            }
            .fail()
        }
        _ => {}
    }
    error::NotImplementedSnafu {
        msg: format!("no comparison support for column type {:?}", array.data_type()),
    }
    .fail()
}

/// A compiled filter: the sub-schema of leaves it reads, and the
/// expression evaluated against them. `Filter::make` returns `None` for
/// the trivial literal-true expression, matching the absent-filter scan
/// path.
pub struct Filter {
    schema: Schema,
    expr: Expr,
}

impl Filter {
    pub fn make(schema: &Schema, expr: Option<Expr>) -> Result<Option<Filter>> {
        let expr = match expr {
            None => return Ok(None),
            Some(Expr::Literal(true)) => return Ok(None),
            Some(expr) => expr,
        };
        let mut names = Vec::new();
        expr.column_names(&mut names);
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let filter_schema = schema.project(&name_refs)?;
        Ok(Some(Filter {
            schema: filter_schema,
            expr,
        }))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read this filter's own columns for `batch_id`, evaluate the
    /// predicate, and return the matching row indices alongside the
    /// already-filtered values of this filter's columns.
    pub fn execute(&self, reader: &FileReader, batch_id: usize) -> Result<(arrow::array::Int32Array, RecordBatch)> {
        let batch = reader.read_chunk(&self.schema, batch_id, None)?;
        let mask = self.expr.evaluate(&batch)?;
        let indices: arrow::array::Int32Array = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| if keep.unwrap_or(false) { Some(i as i32) } else { None })
            .collect();
        let values = arrow::compute::filter_record_batch(&batch, &mask).map_err(|source| error::ArrowSnafu { source }.build())?;
        Ok((indices, values))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};

    use super::*;
    use crate::schema::Schema as LanceSchema;

    fn batch() -> RecordBatch {
        let schema = Arc::new(ArrowSchema::new(vec![ArrowField::new("a", DataType::Int64, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 5, 9, 2]))]).unwrap()
    }

    #[test]
    fn evaluate_comparison() {
        let expr = Expr::gt("a", Literal::Int64(3));
        let mask = expr.evaluate(&batch()).unwrap();
        assert_eq!(mask, BooleanArray::from(vec![false, true, true, false]));
    }

    #[test]
    fn evaluate_and() {
        let expr = Expr::gt("a", Literal::Int64(1)).and(Expr::lt("a", Literal::Int64(9)));
        let mask = expr.evaluate(&batch()).unwrap();
        assert_eq!(mask, BooleanArray::from(vec![false, true, false, true]));
    }

    #[test]
    fn make_returns_none_for_trivial_true() {
        let arrow_schema = ArrowSchema::new(vec![ArrowField::new("a", DataType::Int32, true)]);
        let schema = LanceSchema::from_arrow(&arrow_schema).unwrap();
        let filter = Filter::make(&schema, Some(Expr::Literal(true))).unwrap();
        assert!(filter.is_none());
    }
}
