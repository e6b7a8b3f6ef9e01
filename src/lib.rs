//! pricescout - hospital price transparency file discovery.
//!
//! Finds, validates and tracks the machine-readable standard-charges
//! files hospitals are required to publish. The pipeline searches the
//! web for each hospital, crawls the most promising pages, downloads
//! candidate files, validates their structure and confirms the file
//! actually belongs to the hospital before recording it.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod llm;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod search;
pub mod tracker;
pub mod validator;
