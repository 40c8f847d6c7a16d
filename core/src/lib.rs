//! reach-core: reconciles identity exports against messaging-platform
//! exports, per country, and reports who can be contacted on which channel.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod identity_loader;
pub mod messaging_loader;
pub mod reconciler;
pub mod report_writer;
pub mod segment_import;
pub mod source;
pub mod store;
pub mod types;
