//! Xiaohongshu post extraction library.
//!
//! Turns post URLs into structured notes (watermark-free media, author,
//! engagement counters, tags) and serves that over a small HTTP API.

pub mod config;
pub mod constants;
pub mod extractor;
pub mod web;
