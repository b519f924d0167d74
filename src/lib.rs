//! ExamForge server
//!
//! Upload exam papers as PDFs, search them with natural-language queries
//! through an external ranking provider, and assemble the matched (and
//! optionally cropped) pages into a fresh output PDF.
//!
//! The pipeline: `store` caches uploaded batches and their rendered pages,
//! `matcher` answers queries against a cache entry, `crop` normalizes UI
//! selections, and `assemble` builds the output document. `routes` is the
//! HTTP surface over all of it.

pub mod assemble;
pub mod config;
pub mod crop;
pub mod matcher;
pub mod pdf;
pub mod routes;
pub mod state;
pub mod store;
