use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use thiserror::Error;

use crate::{
    AssetError,
    mapping::{self, Mapping, Protection},
};

/// Heap copy of a file's content, always followed by one NUL byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatedBuf(Vec<u8>);

impl TerminatedBuf {
    /// Appends the terminator to `content`.
    pub fn new(mut content: Vec<u8>) -> Self {
        content.push(0);
        TerminatedBuf(content)
    }

    /// Takes a buffer whose last byte is already the terminator.
    pub(crate) fn from_terminated(buf: Vec<u8>) -> Self {
        match buf.last() {
            Some(0) => TerminatedBuf(buf),
            _ => TerminatedBuf::new(buf),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.split_last().map(|(_, content)| content).unwrap_or_default()
    }

    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Contents of a file, either copied into an owned buffer or mapped.
#[derive(Debug)]
pub enum FileContents {
    Owned(TerminatedBuf),
    Mapped(Mapping),
}

impl FileContents {
    pub fn owned(content: Vec<u8>) -> Self {
        FileContents::Owned(TerminatedBuf::new(content))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, FileContents::Mapped(_))
    }

    /// Content length, excluding the terminator of owned buffers.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            FileContents::Owned(buf) => buf.as_bytes(),
            FileContents::Mapped(map) => map.as_slice(),
        }
    }
}

/// Lit `file` en entier.
///
/// Avec `prefer_mapping`, tente d'abord une projection en lecture/écriture ; tout
/// échec de projection retombe silencieusement sur une lecture bufferisée.
pub fn read_file(file: &mut File, prefer_mapping: bool) -> Result<FileContents, ReadError> {
    if prefer_mapping {
        match mapping::map_file(Protection::ReadWrite, file) {
            Ok(map) => return Ok(FileContents::Mapped(map)),
            Err(err) => log::debug!("mapping failed, reading into a buffer instead: {err}"),
        }
    }

    read_buffered(file).map(|buf| FileContents::Owned(TerminatedBuf::from_terminated(buf)))
}

/// Ouvre `path` en lecture puis le lit comme [`read_file`].
pub fn read_path(
    path: impl AsRef<Path>,
    prefer_mapping: bool,
) -> Result<FileContents, AssetError> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    let mut file = File::open(path).map_err(|err| AssetError::io(&*name, err))?;
    if file.metadata().is_ok_and(|m| m.is_dir()) {
        return Err(AssetError::IsADirectory(name.into_owned()));
    }
    read_file(&mut file, prefer_mapping).map_err(|err| err.into_asset_error(&name))
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to allocate a buffer for {0} bytes")]
    Alloc(u64),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReadError {
    /// Attaches the name of the resource being read.
    pub fn into_asset_error(self, name: &str) -> AssetError {
        match self {
            ReadError::Alloc(size) => AssetError::OutOfMemory { size },
            ReadError::Io(source) => AssetError::io(name, source),
        }
    }
}

/// Reads the whole stream from its start into a NUL-terminated buffer of
/// `len + 1` bytes, then restores the previous position.
pub(crate) fn read_buffered<R: Read + Seek + ?Sized>(
    reader: &mut R,
) -> Result<Vec<u8>, ReadError> {
    let pos = reader.stream_position()?;
    let len = mapping::stream_len(reader)?;
    let mut buf = alloc_terminated(len)?;

    reader.seek(SeekFrom::Start(0))?;
    let read = Read::take(&mut *reader, len).read_to_end(&mut buf);
    reader.seek(SeekFrom::Start(pos))?;

    if read? as u64 != len {
        return Err(ReadError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
    }
    buf.push(0);
    Ok(buf)
}

/// An empty buffer with room for `len` bytes plus the terminator.
pub(crate) fn alloc_terminated(len: u64) -> Result<Vec<u8>, ReadError> {
    let size = len
        .checked_add(1)
        .and_then(|size| usize::try_from(size).ok())
        .ok_or(ReadError::Alloc(len))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| ReadError::Alloc(len))?;
    Ok(buf)
}
