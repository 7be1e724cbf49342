use std::collections::HashMap;

use log::LevelFilter;

use crate::{
    AppDescriptor, Asset, AssetError, DEFAULT_APP_INFO_PATH, Embed, LoggerError, Logs,
    load_asset_from_file, logging,
};

/// Paramètres de création d'une [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig<'a> {
    /// Archive liée à l'exécutable, typiquement via `include_bytes!`.
    pub embed: Option<&'a [u8]>,
    /// Un descripteur posé à côté de l'exécutable remplace celui de l'archive.
    pub allow_external_app_info: bool,
    /// Démarre le logger vers le `log_path` du descripteur.
    pub start_log: bool,
    /// Niveau de la première sortie ; `RUST_LOG` ou `info` si absent.
    pub log_level: Option<LevelFilter>,
    pub app_info_path: &'a str,
}

impl Default for EngineConfig<'_> {
    fn default() -> Self {
        EngineConfig {
            embed: None,
            allow_external_app_info: true,
            start_log: false,
            log_level: None,
            app_info_path: DEFAULT_APP_INFO_PATH,
        }
    }
}

/// Engine: structure principale du moteur, propriétaire du descripteur de
/// l'application, de l'archive embarquée et de la table des assets chargés.
///
/// Les assets sont indexés par leur nom résolu ; chacun est libéré une seule
/// fois, au retrait de la table ou à la destruction de l'instance.
pub struct Engine<'a> {
    assets: HashMap<String, Asset>,
    info: AppDescriptor,
    embed: Option<Embed<'a>>,
    logs: Option<Logs>,
}

impl<'a> Engine<'a> {
    pub const NAME: &'static str = "Gena";

    pub fn create(config: EngineConfig<'a>) -> Result<Self, AssetError> {
        log::info!("Starting engine...");

        let mut embed = config
            .embed
            .map(Embed::open)
            .transpose()
            .inspect_err(|err| log_failure("failed to open the embed", err))?;

        let info = AppDescriptor::load(
            embed.as_mut(),
            config.allow_external_app_info,
            config.app_info_path,
        )
        .inspect_err(|err| log_failure("failed to load the app descriptor", err))?;

        let mut logs = None;
        if config.start_log {
            let level = config.log_level.unwrap_or_else(logging::default_level);
            match logging::init_logger(info.log_path(), level) {
                Ok(started) => {
                    log::info!("Logger started");
                    logs = Some(started);
                }
                Err(LoggerError::AlreadyInstalled(_)) => log::warn!(
                    "a logger is already installed, not logging to {:?}",
                    info.log_path()
                ),
                Err(err) => {
                    let err = AssetError::from(err);
                    log_failure("failed to start the logger", &err);
                    return Err(err);
                }
            }
        }

        log::info!(
            "{} v{}.{} ready ({})",
            info.name(),
            info.version_major(),
            info.version_minor(),
            Self::NAME
        );
        Ok(Engine {
            assets: HashMap::new(),
            info,
            embed,
            logs,
        })
    }

    /// Charge `name` depuis les dossiers de recherche du descripteur et
    /// retourne la clé de l'asset dans la table.
    pub fn load_asset(&mut self, name: &str, map: bool) -> Result<String, AssetError> {
        let asset = load_asset_from_file(self.info.search_paths(), map, name)
            .inspect_err(|err| log_failure(&format!("failed to load {name:?}"), err))?;
        Ok(self.insert(asset))
    }

    /// Charge l'entrée `path` de l'archive embarquée.
    pub fn load_asset_from_embed(&mut self, path: &str) -> Result<String, AssetError> {
        let Some(embed) = self.embed.as_mut() else {
            let err = AssetError::InvalidArgument(format!("no embed to load {path:?} from"));
            log_failure("failed to load from the embed", &err);
            return Err(err);
        };
        let asset = embed.load_asset(path).inspect_err(|err| {
            log_failure(&format!("failed to load {path:?} from the embed"), err)
        })?;
        Ok(self.insert(asset))
    }

    fn insert(&mut self, asset: Asset) -> String {
        let key = asset.name().to_string();
        if let Some(previous) = self.assets.insert(key.clone(), asset) {
            log::debug!("replacing asset {key:?}");
            previous.release();
        }
        key
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    /// Retire l'asset de la table ; l'appelant en devient propriétaire.
    pub fn take_asset(&mut self, name: &str) -> Option<Asset> {
        self.assets.remove(name)
    }

    /// Retire puis libère l'asset. Retourne `false` s'il n'était pas chargé.
    pub fn free_asset(&mut self, name: &str) -> bool {
        match self.take_asset(name) {
            Some(asset) => {
                asset.release();
                true
            }
            None => false,
        }
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn app_info(&self) -> &AppDescriptor {
        &self.info
    }

    pub fn embed(&self) -> Option<&Embed<'a>> {
        self.embed.as_ref()
    }

    /// Les sorties du logger démarré par cette instance, pour en ouvrir
    /// d'autres ou changer leur niveau.
    pub fn logs(&self) -> Option<&Logs> {
        self.logs.as_ref()
    }

    /// Détruit l'instance : libère les assets, puis le descripteur et l'embed,
    /// et ferme enfin les sorties du logger.
    pub fn end(self) {
        log::info!(
            "Stopping {} ({} assets loaded)",
            self.info.name(),
            self.assets.len()
        );
        let Engine {
            assets,
            info,
            embed,
            logs,
        } = self;
        assets.into_values().for_each(Asset::release);
        drop(info);
        if let Some(embed) = embed {
            embed.close();
        }
        if let Some(logs) = logs {
            logs.close_all();
        }
    }
}

impl std::fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("app", &self.info.name())
            .field("assets", &self.assets.len())
            .field("embed", &self.embed)
            .field("logs", &self.logs)
            .finish()
    }
}

fn log_failure(what: &str, err: &AssetError) {
    log::error!("{what}: {err} ({})", err.kind());
}
