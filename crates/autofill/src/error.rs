use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = AutofillError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum AutofillError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error("runtime stopped")]
    RuntimeStopped,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed source {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no step {0} in source")]
    UnknownStep(usize),

    #[error("extraction failed: {0}")]
    Extraction(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WizardError {
    #[error("step {step} is incomplete; unanswered questions: {unanswered:?}")]
    Incomplete { step: usize, unanswered: Vec<usize> },

    #[error("unknown step {0}")]
    UnknownStep(usize),

    #[error("wizard has no steps")]
    Empty,

    #[error("no step mounted")]
    NotMounted,
}
