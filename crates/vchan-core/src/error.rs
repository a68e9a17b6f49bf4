use std::path::PathBuf;

use thiserror::Error;

use crate::policy::ChannelKind;

/// Failure of the backing content library.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read library file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse library file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// A channel's selection filter could not be interpreted.
///
/// Never fatal: the channel simply selects nothing until its configuration
/// is corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid year filter {0:?} (expected 1994, 1990s or 1990-1995)")]
    InvalidYear(String),
    #[error("invalid series id {0:?}")]
    InvalidSeriesId(String),
    #[error("{0:?} channel has no filter value")]
    Missing(ChannelKind),
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("schedule time overflowed the calendar")]
    TimeOverflow,
    #[error("unknown channel {0}")]
    UnknownChannel(String),
}
