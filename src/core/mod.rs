pub mod change_feed;
pub mod local_filter;
pub mod merger;
pub mod normalize;
pub mod search_controller;
pub mod selection;

pub use crate::domain::model::{CatalogRecord, SearchContext, SelectionItem};
pub use crate::domain::ports::{ChangeFeed, DurableStorage, SearchBackend};
pub use crate::utils::error::Result;
