pub mod archive;

mod app_info;
mod assets;
mod embed;
mod engine;
mod error;
mod file_reader;
mod fs;
mod logging;
mod mapping;

pub use app_info::*;
pub use assets::*;
pub use embed::*;
pub use engine::*;
pub use error::*;
pub use file_reader::*;
pub use fs::*;
pub use logging::*;
pub use mapping::*;
