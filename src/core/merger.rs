use crate::core::local_filter::filter;
use crate::core::search_controller::SearchController;
use crate::domain::model::{CatalogRecord, SearchContext};

/// Picks the list to show. An accepted remote response replaces the local
/// result entirely; the two are never interleaved.
pub fn display<'a>(
    local: Vec<&'a CatalogRecord>,
    remote: Option<&'a [CatalogRecord]>,
) -> Vec<&'a CatalogRecord> {
    match remote {
        Some(records) => records.iter().collect(),
        None => local,
    }
}

/// One list view: the records it was handed, the current query, and the
/// remote search backing it.
pub struct CatalogBrowser {
    records: Vec<CatalogRecord>,
    query: String,
    context: SearchContext,
    search: SearchController,
}

impl CatalogBrowser {
    pub fn new(records: Vec<CatalogRecord>, search: SearchController) -> Self {
        Self {
            records,
            query: String::new(),
            context: SearchContext::default(),
            search,
        }
    }

    pub fn with_context(mut self, context: SearchContext) -> Self {
        self.context = context;
        self
    }

    pub fn set_records(&mut self, records: Vec<CatalogRecord>) {
        self.records = records;
    }

    /// Must be called from within a Tokio runtime.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.search.set_query(&self.query, &self.context);
    }

    pub fn set_context(&mut self, context: SearchContext) {
        self.context = context;
        self.search.set_query(&self.query, &self.context);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    /// Always in sync with the current query.
    pub fn local_results(&self) -> Vec<&CatalogRecord> {
        filter(&self.records, &self.query)
    }

    pub fn display(&self) -> Vec<CatalogRecord> {
        let remote = self.search.remote_override();
        display(self.local_results(), remote.as_deref().map(Vec::as_slice))
            .into_iter()
            .cloned()
            .collect()
    }
}
