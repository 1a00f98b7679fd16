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

//! Wire messages: the serialized descriptors that make up the manifest,
//! metadata, and field records. These are hand-written `prost::Message`
//! impls, not generated from a `.proto` file — kept directly in source
//! rather than pulled through a build-time codegen step.

/// One node of the schema tree, as it is serialized into the manifest.
/// `parent_id = -1` marks a root-level field.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Field {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(int32, tag = "2")]
    pub parent_id: i32,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub logical_type: ::prost::alloc::string::String,
    #[prost(enumeration = "Encoding", tag = "5")]
    pub encoding: i32,
    #[prost(int64, optional, tag = "6")]
    pub dictionary_offset: ::core::option::Option<i64>,
    #[prost(int64, optional, tag = "7")]
    pub dictionary_page_length: ::core::option::Option<i64>,
}

/// Per-leaf encoding strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Encoding {
    None = 0,
    Plain = 1,
    VarBinary = 2,
    Dictionary = 3,
}

/// The canonical schema of a file, as a flat pre-order walk of [`Field`]
/// records.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Manifest {
    #[prost(message, repeated, tag = "1")]
    pub fields: ::prost::alloc::vec::Vec<Field>,
}

/// Batch layout plus pointers to the manifest and page table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(uint64, repeated, tag = "1")]
    pub batch_lengths: ::prost::alloc::vec::Vec<u64>,
    #[prost(uint64, tag = "2")]
    pub manifest_position: u64,
    #[prost(uint64, tag = "3")]
    pub page_table_position: u64,
}

impl Metadata {
    pub fn num_batches(&self) -> usize {
        self.batch_lengths.len()
    }
}
