//! Projection de fichiers en mémoire.
//!
//! Enveloppe `memmap2` derrière un handle uniforme [`Mapping`] : les octets projetés,
//! leur longueur et le niveau de protection réellement obtenu. Si l'OS refuse une
//! protection (ex: exécution sur un montage `noexec`), on redescend d'un cran
//! (exécution -> écriture -> lecture) au lieu d'échouer.

use std::{
    fs::File,
    io::{self, Seek, SeekFrom},
};

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::AssetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protection {
    ReadOnly,
    /// Private copy-on-write view; writes never reach the file.
    ReadWrite,
    /// Executable view. Hosts enforcing W^X hand out read+execute pages.
    ReadWriteExecute,
}

impl Protection {
    /// The next protection level down, if any.
    pub fn downgrade(self) -> Option<Protection> {
        match self {
            Protection::ReadWriteExecute => Some(Protection::ReadWrite),
            Protection::ReadWrite => Some(Protection::ReadOnly),
            Protection::ReadOnly => None,
        }
    }
}

enum Region {
    Shared(Mmap),
    Private(MmapMut),
}

/// One live memory mapping of a file. Unmapped exactly once, on [`Mapping::unmap`]
/// or drop.
pub struct Mapping {
    region: Region,
    protection: Protection,
    requested: Protection,
}

impl Mapping {
    pub fn as_slice(&self) -> &[u8] {
        match &self.region {
            Region::Shared(map) => map,
            Region::Private(map) => map,
        }
    }

    /// Mutable access, only for copy-on-write mappings.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match &mut self.region {
            Region::Private(map) => Some(map),
            Region::Shared(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The protection the OS actually granted.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn requested_protection(&self) -> Protection {
        self.requested
    }

    pub fn is_downgraded(&self) -> bool {
        self.protection != self.requested
    }

    pub fn unmap(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("len", &self.len())
            .field("protection", &self.protection)
            .field("requested", &self.requested)
            .finish()
    }
}

/// Projette le fichier entier avec `protection`, en redescendant d'un niveau à
/// chaque refus de permission.
///
/// La position de lecture de `file` est restaurée.
pub fn map_file(protection: Protection, file: &mut File) -> Result<Mapping, AssetError> {
    map_with(protection, file, map_region)
}

fn map_with<F>(requested: Protection, file: &mut File, mut map: F) -> Result<Mapping, AssetError>
where
    F: FnMut(Protection, &File, usize) -> io::Result<Region>,
{
    let len = stream_len(file).map_err(AssetError::Map)?;
    let len = usize::try_from(len).map_err(|_| AssetError::OutOfMemory { size: len })?;

    let mut protection = requested;
    loop {
        match retry_interrupted(|| map(protection, file, len)) {
            Ok(region) => {
                if protection != requested {
                    log::debug!("mapping downgraded from {requested:?} to {protection:?}");
                }
                return Ok(Mapping {
                    region,
                    protection,
                    requested,
                });
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                match protection.downgrade() {
                    Some(lower) => protection = lower,
                    None => return Err(AssetError::Map(err)),
                }
            }
            Err(err) => return Err(AssetError::Map(err)),
        }
    }
}

fn map_region(protection: Protection, file: &File, len: usize) -> io::Result<Region> {
    let mut options = MmapOptions::new();
    options.len(len);

    // SAFETY: the file is opened read-only by the engine and assets are not
    // expected to be truncated while mapped. Writable views are private copies.
    unsafe {
        match protection {
            Protection::ReadOnly => options.map(file).map(Region::Shared),
            Protection::ReadWrite => options.map_copy(file).map(Region::Private),
            Protection::ReadWriteExecute => options.map_exec(file).map(Region::Shared),
        }
    }
}

/// Retries `op` as long as it fails with `Interrupted`.
pub(crate) fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Length of `stream`, measured by seeking to the end and back to where it was.
pub(crate) fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use tempfile::tempdir;

    use super::*;
    use crate::ErrorKind;

    fn fixture(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents)
            .unwrap();
        (dir, path)
    }

    #[test]
    fn map_read_only_keeps_file_position() {
        let (_dir, path) = fixture(b"hello mapped world");
        let mut file = File::open(&path).unwrap();
        file.seek(SeekFrom::Start(6)).unwrap();

        let mapping = map_file(Protection::ReadOnly, &mut file).unwrap();
        assert_eq!(mapping.as_slice(), b"hello mapped world");
        assert_eq!(mapping.protection(), Protection::ReadOnly);
        assert!(!mapping.is_downgraded());

        // a degraded reader can resume where it was
        let mut rest = String::new();
        file.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "mapped world");
        mapping.unmap();
    }

    #[test]
    fn read_write_mapping_is_private() {
        let (_dir, path) = fixture(b"abc");
        let mut file = File::open(&path).unwrap();

        let mut mapping = map_file(Protection::ReadWrite, &mut file).unwrap();
        mapping.as_mut_slice().unwrap()[0] = b'x';
        assert_eq!(mapping.as_slice(), b"xbc");
        mapping.unmap();

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn execute_mapping_succeeds_at_some_level() {
        let (_dir, path) = fixture(b"code");
        let mut file = File::open(&path).unwrap();

        let mapping = map_file(Protection::ReadWriteExecute, &mut file).unwrap();
        assert_eq!(mapping.as_slice(), b"code");
        assert_eq!(mapping.requested_protection(), Protection::ReadWriteExecute);
        assert_eq!(
            mapping.is_downgraded(),
            mapping.protection() != Protection::ReadWriteExecute
        );
    }

    #[test]
    fn permission_denied_downgrades_one_step() {
        let (_dir, path) = fixture(b"noexec");
        let mut file = File::open(&path).unwrap();

        let mut attempts = Vec::new();
        let mapping = map_with(Protection::ReadWriteExecute, &mut file, |prot, file, len| {
            attempts.push(prot);
            if prot == Protection::ReadWriteExecute {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                map_region(prot, file, len)
            }
        })
        .unwrap();

        assert_eq!(
            attempts,
            vec![Protection::ReadWriteExecute, Protection::ReadWrite]
        );
        assert_eq!(mapping.protection(), Protection::ReadWrite);
        assert_eq!(mapping.requested_protection(), Protection::ReadWriteExecute);
        assert!(mapping.is_downgraded());
        assert_eq!(mapping.as_slice(), b"noexec");
    }

    #[test]
    fn gives_up_after_read_only_is_denied() {
        let (_dir, path) = fixture(b"locked");
        let mut file = File::open(&path).unwrap();

        let err = map_with(Protection::ReadWriteExecute, &mut file, |_, _, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn interrupted_calls_are_retried() {
        let (_dir, path) = fixture(b"retry");
        let mut file = File::open(&path).unwrap();

        let mut calls = 0;
        let mapping = map_with(Protection::ReadOnly, &mut file, |prot, file, len| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                map_region(prot, file, len)
            }
        })
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(mapping.as_slice(), b"retry");
    }

    #[test]
    fn other_failures_are_preserved() {
        let (_dir, path) = fixture(b"x");
        let mut file = File::open(&path).unwrap();

        let err = map_with(Protection::ReadOnly, &mut file, |_, _, _| {
            Err(io::Error::from(io::ErrorKind::OutOfMemory))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert!(matches!(err, AssetError::Map(_)));
    }
}
