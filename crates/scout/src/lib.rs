//! Scout: candidate acquisition, deduplication and hybrid retrieval
//!
//! Acquisition grows a corpus of candidate profiles from an external scraping
//! vendor without duplicate ingestion or budget overrun. Retrieval answers
//! free-text queries with a cheap vector recall stage followed by a
//! generative rerank of the shortlist.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod identity;
pub mod index;
pub mod membership;
pub mod models;
pub mod rerank;
pub mod retrieval;
pub mod server;
pub mod services;
pub mod store;
pub mod vendors;

pub use error::{Capability, Result, ScoutError};
pub use identity::normalize;
