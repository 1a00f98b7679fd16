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

//! A columnar file format for nested, Arrow-compatible data: a manifest
//! describing the schema, a dense page table locating every leaf's pages,
//! and a reader/writer pair built around random-access positional reads
//! rather than a streaming cursor.
//!
//! ```text
//! [ pages ... ] [ dictionary pages ... ] [ manifest ] [ page table ] [ metadata ] [ footer ]
//! ```
//!
//! [`FileWriter`] encodes [`arrow::record_batch::RecordBatch`]es in that
//! order; [`FileReader`] opens a sealed file and serves point lookups,
//! full-table reads, and projected/filtered scans against it.

pub mod encoding;
pub mod error;
pub mod format;
pub mod io;
pub mod proto;
pub mod reader;
pub mod scan;
pub mod schema;
pub mod writer;

pub use error::{LanceError, Result};
pub use reader::FileReader;
pub use scan::{Scanner, ScannerBuilder};
pub use schema::Schema;
pub use writer::FileWriter;

/// The lowercase file-format identity string used by external dataset
/// integrations to recognize this format by name.
pub const FORMAT_NAME: &str = "lance";
