// src/platforms/twitch/mod.rs

pub mod auth;
pub mod client;
pub mod gql;

pub use auth::TokenManager;
pub use client::{TwitchClient, TwitchConfig};
