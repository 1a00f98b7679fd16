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

//! The manifest: the file's canonical [`Schema`], length-prefixed and
//! written once, right after the last dictionary page.

use bytes::{Bytes, BytesMut};
use prost::Message;

use crate::error::{self, Result};
use crate::io::endian::{put_framed, read_framed};
use crate::proto;
use crate::schema::Schema;

pub fn parse(buf: &Bytes) -> Result<Schema> {
    let manifest = proto::Manifest::decode(&buf[..]).map_err(|source| error::DecodeProtoSnafu { source }.build())?;
    Schema::from_proto(&manifest)
}

pub fn write_framed(schema: &Schema, out: &mut BytesMut) {
    put_framed(out, &schema.to_proto().encode_to_vec());
}

pub fn read_framed(buf: &Bytes, offset: usize) -> Result<(Schema, usize)> {
    let (msg, next) = read_framed(buf, offset)?;
    Ok((parse(&msg)?, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::{DataType, Field as ArrowField, Schema as ArrowSchema};

    #[test]
    fn roundtrip() {
        let arrow = ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int32, true),
            ArrowField::new("b", DataType::Utf8, true),
        ]);
        let schema = Schema::from_arrow(&arrow).unwrap();
        let mut out = BytesMut::new();
        write_framed(&schema, &mut out);
        let (parsed, _) = read_framed(&out.freeze(), 0).unwrap();
        assert!(schema.equals(&parsed, true));
    }
}
