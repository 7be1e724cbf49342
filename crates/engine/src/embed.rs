use crate::{
    Asset, AssetError,
    archive::{self, ArchiveFormat, ArchiveReader},
    load_asset_from_archive,
};

/// Archive ouverte sur une plage d'octets empruntée (typiquement des octets
/// liés dans l'exécutable via `include_bytes!`).
///
/// L'embed ne possède jamais la plage ; il possède seulement le lecteur
/// d'archive, fermé au drop.
pub struct Embed<'a> {
    bytes: &'a [u8],
    reader: Box<dyn ArchiveReader + 'a>,
}

impl<'a> Embed<'a> {
    /// Détecte le format et ouvre l'archive, sans copier les octets.
    pub fn open(bytes: &'a [u8]) -> Result<Self, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::InvalidArgument("empty embed range".into()));
        }
        let reader = archive::open_reader(bytes)?;
        log::debug!(
            "opened {:?} embed at {:p} ({} bytes)",
            reader.format(),
            bytes.as_ptr(),
            bytes.len()
        );
        Ok(Embed { bytes, reader })
    }

    pub fn start(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn end(&self) -> *const u8 {
        self.bytes.as_ptr_range().end
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn format(&self) -> ArchiveFormat {
        self.reader.format()
    }

    pub fn reader(&mut self) -> &mut (dyn ArchiveReader + 'a) {
        self.reader.as_mut()
    }

    /// Charge l'entrée `path` de l'archive dans un buffer.
    pub fn load_asset(&mut self, path: &str) -> Result<Asset, AssetError> {
        load_asset_from_archive(self.reader.as_mut(), path)
    }

    /// Ferme le lecteur d'archive. La plage d'octets reste au propriétaire.
    pub fn close(self) {
        log::trace!("closing embed at {:p}", self.bytes.as_ptr());
    }
}

impl std::fmt::Debug for Embed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embed")
            .field("format", &self.format())
            .field("start", &self.start())
            .field("size", &self.size())
            .finish()
    }
}
