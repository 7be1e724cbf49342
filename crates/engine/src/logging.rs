use std::{
    fs::File,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use env_logger::{Builder, Env, Target, fmt::Formatter};
use log::{LevelFilter, Log, Metadata, Record};
use thiserror::Error;

/// Nombre maximal de sorties ouvertes en même temps.
pub const MAX_LOGS: usize = 64;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to open log file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("too many open logs (at most {MAX_LOGS})")]
    TooManyLogs,

    #[error("a logger is already installed")]
    AlreadyInstalled(#[from] log::SetLoggerError),
}

/// Niveau par défaut : celui de `RUST_LOG`, `info` sinon.
pub fn default_level() -> LevelFilter {
    Builder::from_env(Env::default().default_filter_or("info"))
        .build()
        .filter()
}

/// Ouvre une première sortie vers `target` et installe [`Logs`] comme logger
/// global.
///
/// `target` vaut `"stdout"`, `"stderr"` ou un chemin de fichier (tronqué à
/// l'ouverture). D'autres sorties s'ajoutent ensuite avec [`Logs::open_log`].
pub fn init_logger(target: &str, max_level: LevelFilter) -> Result<Logs, LoggerError> {
    let logs = Logs::new();
    logs.open_log(target, max_level)?;
    logs.install()?;

    log::info!("logging to {target} (up to {max_level})");
    Ok(logs)
}

/// Logger à plusieurs sorties, chacune avec son propre niveau maximal.
///
/// Chaque enregistrement est écrit dans toutes les sorties dont le niveau le
/// permet. Les clones partagent les mêmes sorties : une fois installé, le
/// logger global reste pilotable depuis n'importe quel clone.
#[derive(Clone, Default)]
pub struct Logs {
    sinks: Arc<Mutex<Sinks>>,
}

#[derive(Default)]
struct Sinks {
    slots: Vec<Option<Sink>>,
    installed: bool,
}

struct Sink {
    target: String,
    max_level: LevelFilter,
    logger: env_logger::Logger,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ouvre une sortie et retourne son index, réutilisé après
    /// [`Logs::close_log`].
    pub fn open_log(&self, target: &str, max_level: LevelFilter) -> Result<usize, LoggerError> {
        let mut sinks = self.lock();
        let index = sinks.free_slot().ok_or(LoggerError::TooManyLogs)?;
        let sink = Sink::open(target, max_level)?;

        if index == sinks.slots.len() {
            sinks.slots.push(Some(sink));
        } else {
            sinks.slots[index] = Some(sink);
        }
        sinks.publish_max_level();
        Ok(index)
    }

    /// Ferme la sortie `index`. Retourne `false` si elle n'était pas ouverte.
    pub fn close_log(&self, index: usize) -> bool {
        let mut sinks = self.lock();
        let Some(sink) = sinks.slots.get_mut(index).and_then(Option::take) else {
            return false;
        };
        sink.logger.flush();
        sinks.publish_max_level();
        true
    }

    /// Ferme toutes les sorties.
    pub fn close_all(&self) {
        let mut sinks = self.lock();
        for sink in sinks.slots.drain(..).flatten() {
            sink.logger.flush();
        }
        sinks.publish_max_level();
    }

    /// Change le niveau de la sortie `index` et retourne l'ancien.
    pub fn set_max_level(&self, index: usize, level: LevelFilter) -> Option<LevelFilter> {
        let mut sinks = self.lock();
        let sink = sinks.slots.get_mut(index)?.as_mut()?;
        let previous = std::mem::replace(&mut sink.max_level, level);
        sinks.publish_max_level();
        Some(previous)
    }

    pub fn log_level(&self, index: usize) -> Option<LevelFilter> {
        let sinks = self.lock();
        sinks.slots.get(index)?.as_ref().map(|sink| sink.max_level)
    }

    pub fn log_count(&self) -> usize {
        self.lock().slots.iter().flatten().count()
    }

    /// Le niveau le plus verbeux parmi les sorties ouvertes.
    pub fn max_level(&self) -> LevelFilter {
        self.lock().max_level()
    }

    fn install(&self) -> Result<(), LoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        let mut sinks = self.lock();
        sinks.installed = true;
        sinks.publish_max_level();
        Ok(())
    }

    // never log while holding this: the installed logger takes it too
    fn lock(&self) -> MutexGuard<'_, Sinks> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sinks {
    fn free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(Option::is_none)
            .or((self.slots.len() < MAX_LOGS).then_some(self.slots.len()))
    }

    fn max_level(&self) -> LevelFilter {
        self.slots
            .iter()
            .flatten()
            .map(|sink| sink.max_level)
            .max()
            .unwrap_or(LevelFilter::Off)
    }

    fn publish_max_level(&self) {
        if self.installed {
            log::set_max_level(self.max_level());
        }
    }
}

impl Sink {
    fn open(target: &str, max_level: LevelFilter) -> Result<Self, LoggerError> {
        // filtering happens per sink, against `max_level`
        let logger = Builder::new()
            .filter_level(LevelFilter::Trace)
            .format(write_record)
            .target(open_target(target)?)
            .build();
        Ok(Sink {
            target: target.to_string(),
            max_level,
            logger,
        })
    }
}

impl Log for Logs {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.lock()
            .slots
            .iter()
            .flatten()
            .any(|sink| metadata.level() <= sink.max_level)
    }

    fn log(&self, record: &Record) {
        for sink in self.lock().slots.iter().flatten() {
            if record.level() <= sink.max_level {
                sink.logger.log(record);
            }
        }
    }

    fn flush(&self) {
        for sink in self.lock().slots.iter().flatten() {
            sink.logger.flush();
        }
    }
}

impl std::fmt::Debug for Logs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinks = self.lock();
        f.debug_map()
            .entries(
                sinks
                    .slots
                    .iter()
                    .enumerate()
                    .filter_map(|(index, sink)| Some((index, sink.as_ref()?)))
                    .map(|(index, sink)| (index, format!("{} <= {}", sink.target, sink.max_level))),
            )
            .finish()
    }
}

fn write_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "[{}] {}:{} {}",
        record.level(),
        record.file().unwrap_or("?"),
        record.line().unwrap_or(0),
        record.args()
    )
}

fn open_target(target: &str) -> Result<Target, LoggerError> {
    match target {
        "stdout" => Ok(Target::Stdout),
        "stderr" => Ok(Target::Stderr),
        path => {
            let file = File::create(path).map_err(|source| LoggerError::Open {
                path: PathBuf::from(path),
                source,
            })?;
            Ok(Target::Pipe(Box::new(file)))
        }
    }
}
