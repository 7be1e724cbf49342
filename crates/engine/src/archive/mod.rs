//! Lecture séquentielle d'archives en mémoire.
//!
//! Une archive est vue comme un flux d'entrées terminé par une marque de fin :
//! [`ArchiveReader::next_entry`] avance d'une entrée, [`ArchiveReader::read_entry`]
//! lit le contenu de l'entrée courante. Deux backends : zip et tar.

mod tar;
mod zip;

use std::io;

use thiserror::Error;

pub use self::tar::TarReader;
pub use self::zip::ZipReader;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unrecognized archive format")]
    Unrecognized,

    #[error("archive could not be opened")]
    Open(#[source] ::zip::result::ZipError),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("no current entry to read")]
    NoEntry,

    #[error("failed to allocate {0} bytes for an archive entry")]
    Alloc(u64),

    #[error(transparent)]
    Zip(#[from] ::zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Links, devices and anything else that is neither.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Path exactly as stored in the archive.
    pub path: String,
    pub kind: EntryKind,
    /// Declared size of the entry's data.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    /// Guesses the container format from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<ArchiveFormat> {
        const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

        if ZIP_MAGICS.iter().any(|magic| bytes.starts_with(magic)) {
            return Some(ArchiveFormat::Zip);
        }
        if bytes.get(257..262) == Some(&b"ustar"[..]) {
            return Some(ArchiveFormat::Tar);
        }
        None
    }
}

/// Sequential access to the entries of one archive.
///
/// Readers carry a position: callers needing a full scan call [`rewind`] first.
/// Closing happens on drop.
///
/// [`rewind`]: ArchiveReader::rewind
pub trait ArchiveReader {
    fn format(&self) -> ArchiveFormat;

    /// Moves back before the first entry.
    fn rewind(&mut self);

    /// Advances to the next entry, `None` once the end of the archive is reached.
    fn next_entry(&mut self) -> Result<Option<EntryHeader>, ArchiveError>;

    /// Reads the data of the current entry into a NUL-terminated buffer of
    /// declared size + 1 bytes.
    fn read_entry(&mut self) -> Result<Vec<u8>, ArchiveError>;
}

/// Opens a reader bound to `bytes`, without copying them.
pub fn open_reader<'a>(bytes: &'a [u8]) -> Result<Box<dyn ArchiveReader + 'a>, ArchiveError> {
    match ArchiveFormat::detect(bytes) {
        Some(ArchiveFormat::Zip) => Ok(Box::new(ZipReader::new(bytes)?)),
        Some(ArchiveFormat::Tar) => Ok(Box::new(TarReader::new(bytes))),
        None => Err(ArchiveError::Unrecognized),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Archives built in memory for tests.

    use std::io::{Cursor, Write};

    use ::tar::{EntryType, Header};
    use ::zip::{ZipWriter, write::SimpleFileOptions};

    pub enum Fixture<'a> {
        File(&'a str, &'a [u8]),
        Dir(&'a str),
    }

    pub fn zip(entries: &[Fixture<'_>]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for entry in entries {
            match entry {
                Fixture::File(name, data) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(data).unwrap();
                }
                Fixture::Dir(name) => writer.add_directory(*name, options).unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }

    /// Names are written into the header verbatim, trailing slashes included.
    pub fn tar(entries: &[Fixture<'_>]) -> Vec<u8> {
        let mut builder = ::tar::Builder::new(Vec::new());
        for entry in entries {
            let (name, data, kind) = match entry {
                Fixture::File(name, data) => (*name, *data, EntryType::Regular),
                Fixture::Dir(name) => (*name, &b""[..], EntryType::Directory),
            };
            let mut header = Header::new_ustar();
            header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_entry_type(kind);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, data).unwrap();
        }
        builder.into_inner().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{self, Fixture};
    use super::*;

    #[test]
    fn detects_both_formats() {
        let zip = fixtures::zip(&[Fixture::File("a.txt", b"hello")]);
        let tar = fixtures::tar(&[Fixture::File("a.txt", b"hello")]);

        assert_eq!(ArchiveFormat::detect(&zip), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(&tar), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(b"{\"name\": 1}"), None);
        assert!(matches!(
            open_reader(b"not an archive").err(),
            Some(ArchiveError::Unrecognized)
        ));
    }

    #[test]
    fn both_backends_list_the_same_entries() {
        let entries = [
            Fixture::File("a.txt", b"hello"),
            Fixture::Dir("dir/"),
            Fixture::File("dir/b.txt", b"world!"),
        ];

        for bytes in [fixtures::zip(&entries), fixtures::tar(&entries)] {
            let mut reader = open_reader(&bytes).unwrap();
            let mut seen = Vec::new();
            while let Some(header) = reader.next_entry().unwrap() {
                seen.push((header.path, header.kind, header.size));
            }
            assert_eq!(
                seen,
                vec![
                    ("a.txt".to_string(), EntryKind::File, 5),
                    ("dir/".to_string(), EntryKind::Directory, 0),
                    ("dir/b.txt".to_string(), EntryKind::File, 6),
                ],
                "{:?}",
                reader.format()
            );

            // the end marker is sticky until rewound
            assert!(reader.next_entry().unwrap().is_none());
            reader.rewind();
            assert_eq!(reader.next_entry().unwrap().unwrap().path, "a.txt");
            assert_eq!(reader.read_entry().unwrap(), b"hello\0");
        }
    }
}
