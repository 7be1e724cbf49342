use anyhow::{Context, Result};
use engine::{Engine, EngineConfig};

/// Application de démo : une instance du moteur et les noms des assets à
/// charger au démarrage.
pub struct App<'a> {
    engine: Engine<'a>,
}

impl<'a> App<'a> {
    pub fn new(config: EngineConfig<'a>) -> Result<Self> {
        let engine = Engine::create(config).context("failed to create the engine")?;
        Ok(Self { engine })
    }

    /// Charge chaque asset depuis les dossiers de recherche du descripteur.
    pub fn load_files(&mut self, names: &[String], map: bool) -> Result<()> {
        for name in names {
            let key = self
                .engine
                .load_asset(name, map)
                .with_context(|| format!("failed to load {name:?}"))?;
            self.report(&key);
        }
        Ok(())
    }

    /// Charge chaque entrée depuis l'archive embarquée.
    pub fn load_embedded(&mut self, paths: &[String]) -> Result<()> {
        for path in paths {
            let key = self
                .engine
                .load_asset_from_embed(path)
                .with_context(|| format!("failed to load {path:?} from the embed"))?;
            self.report(&key);
        }
        Ok(())
    }

    fn report(&self, key: &str) {
        if let Some(asset) = self.engine.asset(key) {
            log::info!(
                "{key}: {} bytes{}",
                asset.size(),
                if asset.is_mapped() { " (mapped)" } else { "" }
            );
        }
    }

    pub fn summary(&self) {
        let info = self.engine.app_info();
        println!(
            "{} v{}.{} (descriptor: {})",
            info.name(),
            info.version_major(),
            info.version_minor(),
            info.source().name()
        );
        println!("  log path:     {}", info.log_path());
        println!("  search paths: {}", info.search_paths());
        if let Some(embed) = self.engine.embed() {
            println!("  embed:        {:?}, {} bytes", embed.format(), embed.size());
        }

        let mut names: Vec<&str> = self.engine.asset_names().collect();
        names.sort_unstable();
        for name in names {
            if let Some(asset) = self.engine.asset(name) {
                println!("  {name} ({} bytes)", asset.size());
            }
        }
    }

    pub fn end(self) {
        self.engine.end();
    }
}
