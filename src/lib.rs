//! Activity feed for an agent gateway: classifies gateway log lines and
//! session transcripts into uniform events, keeps a bounded persisted window
//! of live events, and serves filtered queries over HTTP.

pub mod activity;
pub mod api;
pub mod config;
pub mod events;
pub mod ingest;
pub mod query;
pub mod report;
pub mod store;
pub mod tail;
