//! Headline Keeper - a news scraper with saved articles and notes.
//!
//! This crate fetches a single news-listing page, extracts article summaries
//! into storage, and serves a small web interface for saving and annotating
//! them.

pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod memory;
pub mod models;
pub mod routes;
pub mod scrape;
pub mod store;
