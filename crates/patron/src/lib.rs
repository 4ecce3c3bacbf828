//! Patron - donor and fundraising event affinity matching
//!
//! Donors and events are rendered as short descriptive texts and embedded with
//! a sentence-transformer model. Donor vectors are kept in an exact
//! inner-product index that events are ranked against. A separate cause-tag
//! matcher picks donors for one event without using embeddings at all.

pub mod commands;
pub mod config;
pub mod display;
pub mod donor;
pub mod embedding_model;
pub mod encoder;
pub mod error;
pub mod event;
pub mod index;
pub mod matcher;
pub mod ranker;
pub mod similarity;

pub use error::{PatronError, Result};
