// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use thiserror::Error;

/// Errors raised while importing a model file.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The model file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No lane handles the file's extension.
    #[error("unsupported model format '{0}'")]
    UnsupportedFormat(String),

    /// The file content could not be parsed.
    #[error("failed to parse {format} data: {message}")]
    Parse {
        /// Name of the format being parsed.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// A required piece of data is absent from the file.
    #[error("missing data: {0}")]
    MissingData(String),

    /// The requested loader flags cannot be combined.
    #[error("incompatible loader flags: {0}")]
    IncompatibleFlags(String),

    /// An external resource referenced by the file could not be loaded.
    #[error("failed to resolve resource '{uri}': {message}")]
    Resolve {
        /// The URI as written in the file.
        uri: String,
        /// What went wrong.
        message: String,
    },
}
