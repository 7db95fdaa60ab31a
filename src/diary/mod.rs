//! HTTP client for the diary server.

mod client;

pub use client::DiaryClient;
