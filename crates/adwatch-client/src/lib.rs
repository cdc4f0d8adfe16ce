//! Boundary implementation of the adwatch [`Extractor`]: headless-Chromium
//! page capture plus CSS-selector field extraction.
//!
//! [`Extractor`]: adwatch_core::traits::Extractor

pub mod browser;
pub mod listing;

pub use browser::BrowserExtractor;
pub use listing::ListingParser;
