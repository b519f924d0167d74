//! Shared application state

use std::sync::Arc;

use crate::assemble::PdfAssembler;
use crate::config::Config;
use crate::matcher::{QueryMatcher, QuestionRanker};
use crate::store::PageStore;

/// Shared application state, cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: PageStore,
    matcher: QueryMatcher,
    assembler: PdfAssembler,
}

impl AppState {
    /// Wire the pipeline components around one shared page store.
    pub fn new(config: Config, ranker: Arc<dyn QuestionRanker>) -> Self {
        let store = PageStore::new(config.cache.clone());
        let matcher = QueryMatcher::new(store.clone(), ranker, config.matcher.clone());
        let assembler = PdfAssembler::new(store.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                matcher,
                assembler,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &PageStore {
        &self.inner.store
    }

    pub fn matcher(&self) -> &QueryMatcher {
        &self.inner.matcher
    }

    pub fn assembler(&self) -> &PdfAssembler {
        &self.inner.assembler
    }
}
