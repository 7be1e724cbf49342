use std::{fs::File, path::PathBuf, str::FromStr};

use crate::AssetError;

/// Séparateur entre les dossiers d'une liste de chemins de recherche.
pub const SEARCH_PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Nombre maximal de dossiers retenus ; les suivants sont ignorés sans erreur.
pub const MAX_SEARCH_PATHS: usize = 255;

/// Liste ordonnée de dossiers où chercher les assets.
/// Le premier dossier qui contient le fichier gagne.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    /// Découpe une liste jointe par [`SEARCH_PATH_SEPARATOR`].
    ///
    /// Les segments vides sont ignorés ; une liste sans aucun dossier est une
    /// erreur. Au-delà de [`MAX_SEARCH_PATHS`] dossiers, la liste est tronquée.
    pub fn parse(joined: &str) -> Result<Self, AssetError> {
        let mut segments = joined.split(SEARCH_PATH_SEPARATOR).filter(|s| !s.is_empty());
        let dirs: Vec<PathBuf> = segments
            .by_ref()
            .take(MAX_SEARCH_PATHS)
            .map(PathBuf::from)
            .collect();

        if dirs.is_empty() {
            return Err(AssetError::InvalidArgument(format!(
                "no directory in search path list {joined:?}"
            )));
        }
        if segments.next().is_some() {
            log::debug!("search path list truncated to {MAX_SEARCH_PATHS} entries");
        }

        Ok(SearchPaths { dirs })
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Recompose la liste jointe.
    pub fn joined(&self) -> String {
        let sep = SEARCH_PATH_SEPARATOR.to_string();
        self.dirs
            .iter()
            .map(|d| d.to_string_lossy())
            .collect::<Vec<_>>()
            .join(sep.as_str())
    }

    /// Ouvre `name` en lecture dans le premier dossier où l'ouverture réussit.
    ///
    /// Un dossier portant ce nom n'est pas un fichier : la recherche continue.
    /// Retourne le chemin complet résolu et le fichier ouvert.
    pub fn open(&self, name: &str) -> Result<(PathBuf, File), AssetError> {
        for dir in &self.dirs {
            let path = dir.join(name);
            match File::open(&path) {
                Ok(file) if is_dir(&file) => {
                    log::debug!("{path:?} is a directory, skipping");
                }
                Ok(file) => return Ok((path, file)),
                Err(err) => log::trace!("{path:?}: {err}"),
            }
        }
        Err(AssetError::NotFound(name.to_string()))
    }

    /// Vérifie si `name` existe dans un des dossiers.
    pub fn exists(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| d.join(name).is_file())
    }
}

impl FromStr for SearchPaths {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchPaths::parse(s)
    }
}

fn is_dir(file: &File) -> bool {
    file.metadata().map(|m| m.is_dir()).unwrap_or(false)
}
