//! Tracuu NNT Library
//!
//! Automated taxpayer lookup against the Vietnamese tax authority portal:
//! browser-driven form fill, captcha solving, result scraping and reporting.

pub mod browser;
pub mod captcha;
pub mod checker;
pub mod config;
pub mod input;
pub mod logging;
pub mod portal;
pub mod report;
pub mod scrape;
pub mod screenshot;
pub mod state;
pub mod types;

pub use types::*;
