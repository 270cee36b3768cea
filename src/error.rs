use std::path::PathBuf;

/// Every way a report run can fail. All of them abort the run.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
