//! Chargement des assets depuis le système de fichiers ou depuis une archive.
//!
//! - [`load_asset_from_file`] cherche un nom relatif dans une liste ordonnée de
//!   dossiers ; le contenu est projeté en mémoire ou lu dans un buffer.
//! - [`load_asset_from_archive`] parcourt les entrées d'une archive jusqu'au
//!   chemin demandé ; le contenu est toujours copié dans un buffer.
//!
//! Un [`Asset`] possède son contenu : la libération (munmap ou free) découle du
//! variant de [`FileContents`], jamais d'un drapeau à vérifier à la main.

use std::str::Utf8Error;

use crate::{
    AssetError, SearchPaths,
    archive::{ArchiveReader, EntryKind},
    file_reader::{self, FileContents, TerminatedBuf},
    mapping::Mapping,
};

/// Une ressource chargée, nommée par son chemin résolu.
#[derive(Debug)]
pub struct Asset {
    name: String,
    contents: FileContents,
}

impl Asset {
    pub fn new(name: impl Into<String>, contents: FileContents) -> Self {
        Asset {
            name: name.into(),
            contents,
        }
    }

    /// Chemin résolu sur le disque, ou chemin de l'entrée dans l'archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        self.contents.bytes()
    }

    pub fn size(&self) -> usize {
        self.contents.len()
    }

    pub fn is_mapped(&self) -> bool {
        self.contents.is_mapped()
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        match &self.contents {
            FileContents::Mapped(map) => Some(map),
            FileContents::Owned(_) => None,
        }
    }

    pub fn contents(&self) -> &FileContents {
        &self.contents
    }

    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(self.data())
    }

    /// The content followed by its NUL terminator. Mapped assets have none.
    pub fn as_bytes_with_nul(&self) -> Option<&[u8]> {
        match &self.contents {
            FileContents::Owned(buf) => Some(buf.as_bytes_with_nul()),
            FileContents::Mapped(_) => None,
        }
    }

    /// Libère le contenu : démappe une projection, libère un buffer.
    pub fn release(self) {
        log::trace!("releasing asset {:?}", self.name);
        drop(self);
    }
}

/// Charge `name` depuis le premier dossier de `search_paths` qui permet de
/// l'ouvrir.
///
/// `search_paths` est une liste jointe par [`SEARCH_PATH_SEPARATOR`]. Le nom de
/// l'asset retourné est le chemin complet résolu.
///
/// [`SEARCH_PATH_SEPARATOR`]: crate::SEARCH_PATH_SEPARATOR
pub fn load_asset_from_file(
    search_paths: &str,
    prefer_mapping: bool,
    name: &str,
) -> Result<Asset, AssetError> {
    if name.is_empty() {
        return Err(AssetError::InvalidArgument("empty asset name".into()));
    }
    let search_paths = SearchPaths::parse(search_paths)?;
    let (path, mut file) = search_paths.open(name)?;
    let resolved = path.to_string_lossy().into_owned();

    let contents = file_reader::read_file(&mut file, prefer_mapping)
        .map_err(|err| err.into_asset_error(&resolved))?;

    log::debug!(
        "loaded {resolved:?} ({} bytes, mapped: {})",
        contents.len(),
        contents.is_mapped()
    );
    Ok(Asset::new(resolved, contents))
}

/// Cherche `path` dans l'archive, depuis la première entrée.
///
/// La comparaison est exacte (pas de normalisation). Une entrée dossier donne
/// `IsADirectory` ; une entrée de taille nulle est traitée comme absente.
pub fn load_asset_from_archive<R: ArchiveReader + ?Sized>(
    reader: &mut R,
    path: &str,
) -> Result<Asset, AssetError> {
    if path.is_empty() {
        return Err(AssetError::InvalidArgument("empty archive path".into()));
    }

    reader.rewind();
    while let Some(entry) = reader.next_entry()? {
        if entry.path != path {
            continue;
        }
        if entry.kind == EntryKind::Directory {
            return Err(AssetError::IsADirectory(entry.path));
        }
        // empty entries are indistinguishable from missing ones
        if entry.size == 0 {
            return Err(AssetError::NotFound(entry.path));
        }

        let data = reader.read_entry()?;
        log::debug!("loaded {:?} from {:?} archive", entry.path, reader.format());
        let contents = FileContents::Owned(TerminatedBuf::from_terminated(data));
        return Ok(Asset::new(entry.path, contents));
    }

    Err(AssetError::NotFound(path.to_string()))
}
