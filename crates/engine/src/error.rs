use std::io;

use thiserror::Error;

use crate::{archive::ArchiveError, logging::LoggerError};

/// Catégorie d'une erreur, indépendante de la source (OS, archive, JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    IsADirectory,
    PermissionDenied,
    OutOfMemory,
    Format,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::IsADirectory => "is a directory",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::Format => "format error",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0:?} not found")]
    NotFound(String),

    #[error("{0:?} is a directory")]
    IsADirectory(String),

    #[error("failed to map file")]
    Map(#[source] io::Error),

    #[error("failed to allocate {size} bytes")]
    OutOfMemory { size: u64 },

    #[error("invalid app descriptor {path:?}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive error")]
    Archive(#[from] ArchiveError),

    #[error("failed to start the logger")]
    Logger(#[from] LoggerError),

    #[error("I/O error on {path:?}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl AssetError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AssetError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AssetError::NotFound(_) => ErrorKind::NotFound,
            AssetError::IsADirectory(_) => ErrorKind::IsADirectory,
            AssetError::Map(err) => kind_of_io(err),
            AssetError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            AssetError::Format { .. } => ErrorKind::Format,
            AssetError::Archive(ArchiveError::Unrecognized | ArchiveError::Open(_)) => {
                ErrorKind::Format
            }
            AssetError::Archive(ArchiveError::Alloc(_)) => ErrorKind::OutOfMemory,
            AssetError::Archive(ArchiveError::Io(err)) => kind_of_io(err),
            AssetError::Archive(_) => ErrorKind::Io,
            AssetError::Logger(LoggerError::Open { source, .. }) => kind_of_io(source),
            AssetError::Logger(LoggerError::TooManyLogs | LoggerError::AlreadyInstalled(_)) => {
                ErrorKind::InvalidArgument
            }
            AssetError::Io { source, .. } => kind_of_io(source),
        }
    }
}

fn kind_of_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        _ => ErrorKind::Io,
    }
}
