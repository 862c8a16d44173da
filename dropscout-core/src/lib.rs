// src/lib.rs

pub mod cache;
pub mod catalog;
pub mod differ;
pub mod embeds;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod platforms;
pub mod render;
pub mod stores;

pub use error::Error;
