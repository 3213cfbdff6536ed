use std::path::PathBuf;

use thiserror::Error;

/// Construction-time failures. Query methods never return these: absence
/// after a successful load is reported with `Option`/empty collections.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("namespace required for OWL input; use \"http://purl.obolibrary.org/obo/\"")]
    NamespaceRequired,

    #[error("unsupported ontology file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("malformed {what} at {path}:{line}: {detail}")]
    MalformedInput {
        what: &'static str,
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("ontology parent graph contains a cycle through {member}; cumulative propagation would not terminate")]
    CyclicOntology { member: String },
}

impl StatsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StatsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(
        what: &'static str,
        path: impl Into<PathBuf>,
        line: usize,
        detail: impl Into<String>,
    ) -> Self {
        StatsError::MalformedInput {
            what,
            path: path.into(),
            line,
            detail: detail.into(),
        }
    }
}
