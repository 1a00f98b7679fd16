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

use arrow::error::ArrowError;
use snafu::prelude::*;
use snafu::Location;

/// Every fallible operation in this crate returns one of these variants,
/// matching the error-kind taxonomy of the on-disk format: a bad byte range
/// is `IoError`, a bad on-disk shape is `InvalidFormat`, a bad caller
/// argument is `InvalidArgument`, and so on.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LanceError {
    #[snafu(display("I/O error: {}", source))]
    IoError {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid file format: {}", msg))]
    InvalidFormat {
        msg: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to decode wire message, source: {}", source))]
    DecodeProto {
        source: prost::DecodeError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid argument: {}", msg))]
    InvalidArgument {
        msg: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Index error: {}", msg))]
    IndexError {
        msg: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Not implemented: {}", msg))]
    NotImplemented {
        msg: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Operation cancelled: {}", msg))]
    Cancelled {
        msg: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Arrow error: {}", source))]
    Arrow {
        source: ArrowError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T, E = LanceError> = std::result::Result<T, E>;

impl From<LanceError> for ArrowError {
    fn from(value: LanceError) -> Self {
        ArrowError::ExternalError(Box::new(value))
    }
}
