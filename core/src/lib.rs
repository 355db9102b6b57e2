//! Core library for caltrack: the household nutrition tracker.
//!
//! Persistence lives in [`db`], validation and orchestration in [`service`],
//! and normalization of Open Food Facts payloads in [`openfoodfacts`].

pub mod db;
pub mod error;
pub mod models;
pub mod openfoodfacts;
pub mod service;

pub use error::{Error, Result};
