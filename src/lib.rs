//! Core library for chart-playlist-sync
pub mod config;
pub mod error;
pub mod models;
pub mod api;
pub mod cancel;
pub mod retry;
pub mod chart;
pub mod ticket;
pub mod sync;
pub mod worker;
pub mod playlist;
