// This file is part of Nitrogen.
//
// Nitrogen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Nitrogen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Nitrogen.  If not, see <http://www.gnu.org/licenses/>.
use std::{io, path::PathBuf};

/// Every way the precomputation can fail. None of these are retried: a
/// broken description, device, or output directory means the run is over.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{file}:{line}: {message}")]
    Parsing {
        file: String,
        line: usize,
        message: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Resource error: {0}")]
    Resource(String),
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("I/O error on \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn parsing(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parsing {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a lower level GPU failure, keeping its whole context chain.
    pub fn gpu(err: anyhow::Error) -> Self {
        Self::Gpu(format!("{:#}", err))
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Map any error escaping the pipeline to the process exit status.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(e) => e.exit_code(),
        None => 111,
    }
}
