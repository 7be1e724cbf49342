use serde::Deserialize;
use serde_json::Value;

use crate::{Asset, AssetError, Embed, SEARCH_PATH_SEPARATOR, load_asset_from_file};

/// Chemin du descripteur quand l'application n'en donne pas.
pub const DEFAULT_APP_INFO_PATH: &str = "app.json";

/// Descripteur d'application, lu depuis un petit document JSON :
///
/// ```json
/// {
///     "name": "Demo",
///     "log_path": "demo.log",
///     "ver_maj": 1,
///     "ver_min": 2,
///     "search_paths": ["assets", "/usr/share/demo"]
/// }
/// ```
///
/// Les clés supplémentaires restent accessibles via [`AppDescriptor::get`].
#[derive(Debug)]
pub struct AppDescriptor {
    name: String,
    log_path: String,
    version_major: i32,
    version_minor: i32,
    search_paths: String,
    // dropped before the asset it was parsed from
    document: Value,
    source: Asset,
}

#[derive(Deserialize)]
struct RawDescriptor {
    name: String,
    log_path: String,
    ver_maj: i32,
    ver_min: i32,
    search_paths: Vec<String>,
}

impl AppDescriptor {
    /// Charge le descripteur `path`, cherché dans le dossier courant.
    ///
    /// Voir [`AppDescriptor::load_from`].
    pub fn load(
        embed: Option<&mut Embed<'_>>,
        allow_external: bool,
        path: &str,
    ) -> Result<Self, AssetError> {
        Self::load_from(".", embed, allow_external, path)
    }

    /// Charge le descripteur `path`.
    ///
    /// Sans embed, ou avec `allow_external`, le fichier est d'abord cherché
    /// dans `external_dir` ; l'archive n'est consultée que si ce fichier est
    /// absent. Sinon seule l'archive est lue.
    pub fn load_from(
        external_dir: &str,
        embed: Option<&mut Embed<'_>>,
        allow_external: bool,
        path: &str,
    ) -> Result<Self, AssetError> {
        if path.is_empty() {
            return Err(AssetError::InvalidArgument("empty app descriptor path".into()));
        }
        let source = load_source(external_dir, embed, allow_external, path)?;
        Self::parse(source)
    }

    /// Parse un descripteur déjà chargé. Aucun descripteur partiel : la moindre
    /// clé manquante ou mal typée est une erreur de format.
    pub fn parse(source: Asset) -> Result<Self, AssetError> {
        let format_error = |source_err| AssetError::Format {
            path: source.name().to_string(),
            source: source_err,
        };

        let document: Value = serde_json::from_slice(source.data()).map_err(format_error)?;
        let raw = RawDescriptor::deserialize(&document).map_err(format_error)?;

        let search_paths = raw
            .search_paths
            .join(SEARCH_PATH_SEPARATOR.to_string().as_str());

        log::debug!(
            "app descriptor {:?}: {} v{}.{}",
            source.name(),
            raw.name,
            raw.ver_maj,
            raw.ver_min
        );

        Ok(AppDescriptor {
            name: raw.name,
            log_path: raw.log_path,
            version_major: raw.ver_maj,
            version_minor: raw.ver_min,
            search_paths,
            document,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_path(&self) -> &str {
        &self.log_path
    }

    pub fn version_major(&self) -> i32 {
        self.version_major
    }

    pub fn version_minor(&self) -> i32 {
        self.version_minor
    }

    pub fn version(&self) -> (i32, i32) {
        (self.version_major, self.version_minor)
    }

    /// Dossiers de recherche joints par [`SEARCH_PATH_SEPARATOR`], dans l'ordre
    /// du document.
    pub fn search_paths(&self) -> &str {
        &self.search_paths
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// L'asset brut d'où vient le descripteur.
    pub fn source(&self) -> &Asset {
        &self.source
    }
}

fn load_source(
    external_dir: &str,
    embed: Option<&mut Embed<'_>>,
    allow_external: bool,
    path: &str,
) -> Result<Asset, AssetError> {
    let embed = match embed {
        Some(embed) if !allow_external => return embed.load_asset(path),
        embed => embed,
    };

    match (load_asset_from_file(external_dir, false, path), embed) {
        (Ok(asset), _) => Ok(asset),
        (Err(err), Some(embed)) => {
            log::debug!("no external app descriptor ({err}), reading the embedded one");
            embed.load_asset(path)
        }
        (Err(err), None) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        ErrorKind,
        archive::fixtures::{self, Fixture},
        file_reader::FileContents,
    };

    const DEMO: &str = r#"{
        "name": "Demo",
        "log_path": "demo.log",
        "ver_maj": 1,
        "ver_min": 2,
        "search_paths": ["assets", "/usr/share/demo"],
        "window": { "width": 1280 }
    }"#;

    const EMBEDDED: &str = r#"{
        "name": "Embedded",
        "log_path": "embedded.log",
        "ver_maj": 0,
        "ver_min": 1,
        "search_paths": ["."]
    }"#;

    fn asset(json: &str) -> Asset {
        Asset::new("app.json", FileContents::owned(json.as_bytes().to_vec()))
    }

    #[test]
    fn parses_the_demo_descriptor() {
        let info = AppDescriptor::parse(asset(DEMO)).unwrap();

        assert_eq!(info.name(), "Demo");
        assert_eq!(info.log_path(), "demo.log");
        assert_eq!(info.version(), (1, 2));
        let sep = SEARCH_PATH_SEPARATOR;
        assert_eq!(info.search_paths(), format!("assets{sep}/usr/share/demo"));
        assert_eq!(
            info.get("window").and_then(|w| w.get("width")),
            Some(&serde_json::json!(1280))
        );
        assert!(info.get("missing").is_none());
        assert_eq!(info.source().name(), "app.json");
    }

    #[test]
    fn missing_or_mistyped_keys_are_format_errors() {
        let cases = [
            r#"{"name": "Demo", "log_path": "demo.log", "ver_maj": 1, "ver_min": 2}"#,
            r#"{"name": "Demo", "log_path": "demo.log", "ver_maj": "1", "ver_min": 2, "search_paths": []}"#,
            r#"{"name": "Demo", "log_path": "demo.log", "ver_maj": 1.5, "ver_min": 2, "search_paths": []}"#,
            r#"{"name": 7, "log_path": "demo.log", "ver_maj": 1, "ver_min": 2, "search_paths": []}"#,
            r#"{"name": "Demo", "log_path": "demo.log", "ver_maj": 1, "ver_min": 2, "search_paths": [1]}"#,
            r#"{"name": "Demo""#,
            "",
        ];
        for json in cases {
            let err = AppDescriptor::parse(asset(json)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{json}");
        }
    }

    #[test]
    fn external_file_without_embed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.json"), DEMO).unwrap();
        let dir = dir.path().to_string_lossy();

        let info = AppDescriptor::load_from(&dir, None, false, DEFAULT_APP_INFO_PATH).unwrap();
        assert_eq!(info.name(), "Demo");
        assert!(!info.source().is_mapped());
    }

    #[test]
    fn external_file_overrides_the_embed_only_when_allowed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.json"), DEMO).unwrap();
        let dir = dir.path().to_string_lossy();

        let bytes = fixtures::zip(&[Fixture::File("app.json", EMBEDDED.as_bytes())]);
        let mut embed = Embed::open(&bytes).unwrap();

        let info = AppDescriptor::load_from(&dir, Some(&mut embed), true, "app.json").unwrap();
        assert_eq!(info.name(), "Demo");

        let info = AppDescriptor::load_from(&dir, Some(&mut embed), false, "app.json").unwrap();
        assert_eq!(info.name(), "Embedded");
        assert_eq!(info.source().name(), "app.json");
    }

    #[test]
    fn falls_back_to_the_embed() {
        let dir = tempdir().unwrap();
        let dir = dir.path().to_string_lossy();

        let bytes = fixtures::tar(&[Fixture::File("app.json", EMBEDDED.as_bytes())]);
        let mut embed = Embed::open(&bytes).unwrap();

        let info = AppDescriptor::load_from(&dir, Some(&mut embed), true, "app.json").unwrap();
        assert_eq!(info.name(), "Embedded");
        assert_eq!(info.search_paths(), ".");
    }

    #[test]
    fn no_source_is_not_found() {
        let dir = tempdir().unwrap();
        let dir = dir.path().to_string_lossy();

        let err = AppDescriptor::load_from(&dir, None, true, "app.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let bytes = fixtures::zip(&[Fixture::File("other.json", b"{}")]);
        let mut embed = Embed::open(&bytes).unwrap();
        let err = AppDescriptor::load_from(&dir, Some(&mut embed), true, "app.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = AppDescriptor::load_from(&dir, None, true, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
