use ::tar::Archive;

use super::{ArchiveError, ArchiveFormat, ArchiveReader, EntryHeader, EntryKind};
use crate::file_reader::alloc_terminated;

const BLOCK: usize = 512;

/// Tar backend (ustar, GNU and pax), read in place with the `tar` crate.
///
/// Each step opens an `Archive` on the bytes left after the previous entry, so
/// GNU long names and pax `path` records are resolved by the crate and the
/// reader only keeps offsets.
pub struct TarReader<'a> {
    bytes: &'a [u8],
    /// Start of the next header block.
    offset: usize,
    /// Data range of the current entry.
    current: Option<(usize, usize)>,
}

impl<'a> TarReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        TarReader {
            bytes,
            offset: 0,
            current: None,
        }
    }
}

impl ArchiveReader for TarReader<'_> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn rewind(&mut self) {
        self.offset = 0;
        self.current = None;
    }

    fn next_entry(&mut self) -> Result<Option<EntryHeader>, ArchiveError> {
        self.current = None;
        let bytes = self.bytes;
        let rest = bytes.get(self.offset..).unwrap_or_default();

        let mut archive = Archive::new(rest);
        let mut entries = archive.entries().map_err(corrupt(self.offset))?;
        let entry = match entries.next() {
            None => return Ok(None),
            Some(entry) => entry.map_err(corrupt(self.offset))?,
        };

        let size = entry.size();
        let start = usize::try_from(entry.raw_file_position())
            .ok()
            .and_then(|pos| self.offset.checked_add(pos));
        let len = usize::try_from(size).ok();
        let (start, len) = start
            .zip(len)
            .filter(|&(start, len)| {
                start
                    .checked_add(len)
                    .is_some_and(|end| end <= bytes.len())
            })
            .ok_or_else(|| {
                ArchiveError::Corrupt(format!("entry at offset {} is truncated", self.offset))
            })?;

        let entry_type = entry.header().entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        // the range check above bounds `start + len` by the slice length
        self.offset = start + len.div_ceil(BLOCK) * BLOCK;
        self.current = Some((start, len));
        Ok(Some(EntryHeader { path, kind, size }))
    }

    fn read_entry(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let (start, len) = self.current.ok_or(ArchiveError::NoEntry)?;
        let mut buf = alloc_terminated(len as u64).map_err(|_| ArchiveError::Alloc(len as u64))?;
        buf.extend_from_slice(&self.bytes[start..start + len]);
        buf.push(0);
        Ok(buf)
    }
}

fn corrupt(offset: usize) -> impl Fn(std::io::Error) -> ArchiveError {
    move |err| ArchiveError::Corrupt(format!("entry at offset {offset}: {err}"))
}
