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

//! Stable string identifiers for the primitive Arrow types this format can
//! store on disk (the `logical_type` tag). Struct/list/dictionary markers
//! are handled at the [`crate::schema::Field`] level, since they need the
//! child tree, not just a type name.

use arrow_schema::{DataType, TimeUnit};

use crate::error::{self, Result};

pub fn arrow_primitive_to_logical_type(dt: &DataType) -> Result<String> {
    let name = match dt {
        DataType::Boolean => "bool".to_string(),
        DataType::Int8 => "int8".to_string(),
        DataType::Int16 => "int16".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Int64 => "int64".to_string(),
        DataType::UInt8 => "uint8".to_string(),
        DataType::UInt16 => "uint16".to_string(),
        DataType::UInt32 => "uint32".to_string(),
        DataType::UInt64 => "uint64".to_string(),
        DataType::Float32 => "float32".to_string(),
        DataType::Float64 => "float64".to_string(),
        DataType::Utf8 => "string".to_string(),
        DataType::Binary => "binary".to_string(),
        DataType::Date32 => "date32".to_string(),
        DataType::Timestamp(unit, tz) => {
            let unit = time_unit_name(*unit);
            match tz {
                Some(tz) => format!("timestamp:{unit}:{tz}"),
                None => format!("timestamp:{unit}"),
            }
        }
        other => {
            return error::InvalidFormatSnafu {
                msg: format!("unsupported primitive logical type for {other:?}"),
            }
            .fail()
        }
    };
    Ok(name)
}

pub fn logical_type_to_arrow_primitive(name: &str) -> Result<DataType> {
    let dt = match name {
        "bool" => DataType::Boolean,
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" => DataType::UInt64,
        "float32" => DataType::Float32,
        "float64" => DataType::Float64,
        "string" => DataType::Utf8,
        "binary" => DataType::Binary,
        "date32" => DataType::Date32,
        _ if name.starts_with("timestamp:") => {
            let rest = &name["timestamp:".len()..];
            let mut parts = rest.splitn(2, ':');
            let unit = parts.next().unwrap_or_default();
            let tz = parts.next().map(|s| s.into());
            let unit = time_unit_from_name(unit)?;
            DataType::Timestamp(unit, tz)
        }
        other => {
            return error::InvalidFormatSnafu {
                msg: format!("unknown logical type: {other}"),
            }
            .fail()
        }
    };
    Ok(dt)
}

fn time_unit_name(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "second",
        TimeUnit::Millisecond => "millisecond",
        TimeUnit::Microsecond => "microsecond",
        TimeUnit::Nanosecond => "nanosecond",
    }
}

fn time_unit_from_name(name: &str) -> Result<TimeUnit> {
    let unit = match name {
        "second" => TimeUnit::Second,
        "millisecond" => TimeUnit::Millisecond,
        "microsecond" => TimeUnit::Microsecond,
        "nanosecond" => TimeUnit::Nanosecond,
        other => {
            return error::InvalidFormatSnafu {
                msg: format!("unknown timestamp unit: {other}"),
            }
            .fail()
        }
    };
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        for dt in [
            DataType::Boolean,
            DataType::Int32,
            DataType::Int64,
            DataType::Float64,
            DataType::Utf8,
            DataType::Binary,
            DataType::Date32,
            DataType::Timestamp(TimeUnit::Microsecond, None),
        ] {
            let name = arrow_primitive_to_logical_type(&dt).unwrap();
            let back = logical_type_to_arrow_primitive(&name).unwrap();
            assert_eq!(dt, back);
        }
    }
}
