//! paperforge-store: Question bank and result stores.
//!
//! Implements the `QuestionRepository` and `ResultSink` traits for an
//! in-memory store, a JSON question-bank file, and a remote document store
//! reached over HTTP.

pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod memory;

pub use config::{create_store, load_config, load_config_from, PaperforgeConfig, Store, StoreConfig};
pub use error::StoreError;
pub use file::{load_bank, save_bank, FileStore, JsonlResultSink, QuestionBank};
pub use http::HttpStore;
pub use memory::InMemoryStore;
