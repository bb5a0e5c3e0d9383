pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{
    http::HttpSearchBackend,
    storage::{FileStorage, MemoryStorage},
    watch::FileWatchFeed,
};
pub use crate::core::{
    change_feed::InProcessFeed,
    merger::CatalogBrowser,
    search_controller::{SearchController, SearchSettings},
    selection::{AddOutcome, SelectionConfig, SelectionStore},
};
pub use domain::model::{CatalogRecord, SearchContext, SelectionItem};
pub use utils::error::{CatalogError, Result};
