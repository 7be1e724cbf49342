use std::io::{Cursor, Read};

use ::zip::ZipArchive;

use super::{ArchiveError, ArchiveFormat, ArchiveReader, EntryHeader, EntryKind};
use crate::file_reader::alloc_terminated;

/// Zip backend. Entries are visited in central-directory order; stored and
/// deflated entries are supported.
pub struct ZipReader<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    next: usize,
    current: Option<usize>,
}

impl<'a> ZipReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Open)?;
        Ok(ZipReader {
            archive,
            next: 0,
            current: None,
        })
    }
}

impl ArchiveReader for ZipReader<'_> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn rewind(&mut self) {
        self.next = 0;
        self.current = None;
    }

    fn next_entry(&mut self) -> Result<Option<EntryHeader>, ArchiveError> {
        if self.next >= self.archive.len() {
            self.current = None;
            return Ok(None);
        }

        let header = {
            let file = self.archive.by_index(self.next)?;
            let kind = if file.is_dir() {
                EntryKind::Directory
            } else if file.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            EntryHeader {
                path: file.name().to_owned(),
                kind,
                size: file.size(),
            }
        };

        self.current = Some(self.next);
        self.next += 1;
        Ok(Some(header))
    }

    fn read_entry(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let index = self.current.ok_or(ArchiveError::NoEntry)?;
        let mut file = self.archive.by_index(index)?;
        let size = file.size();

        let mut buf = alloc_terminated(size).map_err(|_| ArchiveError::Alloc(size))?;
        let read = file.by_ref().take(size).read_to_end(&mut buf)?;
        if read as u64 != size {
            return Err(ArchiveError::Corrupt(format!(
                "{:?}: expected {size} bytes, got {read}",
                file.name()
            )));
        }
        buf.push(0);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures::{self, Fixture};

    #[test]
    fn reads_deflated_entries() {
        let text = "sprite ".repeat(512);
        let bytes = fixtures::zip(&[Fixture::File("sprites.txt", text.as_bytes())]);
        assert!(bytes.len() < text.len());

        let mut reader = ZipReader::new(&bytes).unwrap();
        let header = reader.next_entry().unwrap().unwrap();
        assert_eq!(header.size, text.len() as u64);

        let data = reader.read_entry().unwrap();
        assert_eq!(&data[..text.len()], text.as_bytes());
        assert_eq!(data.last(), Some(&0));
    }

    #[test]
    fn read_without_entry_fails() {
        let bytes = fixtures::zip(&[Fixture::File("a.txt", b"hello")]);
        let mut reader = ZipReader::new(&bytes).unwrap();
        assert!(matches!(reader.read_entry(), Err(ArchiveError::NoEntry)));
    }

    #[test]
    fn truncated_archive_does_not_open() {
        let bytes = fixtures::zip(&[Fixture::File("a.txt", b"hello")]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ZipReader::new(truncated),
            Err(ArchiveError::Open(_))
        ));
    }
}
