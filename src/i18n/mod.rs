//! Internationalization (i18n) module for multi-locale support.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for the supported locale allow-list
//! - `language`: Type-safe Language type validated against the registry
//! - `metrics`: Translation cache and provider counters
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_translate::i18n::{Language, LanguageRegistry};
//!
//! let french = Language::from_code("fr")?;
//! assert!(!french.is_canonical());
//!
//! let targets = LanguageRegistry::get().list_targets();
//! ```

mod language;
mod metrics;
mod registry;

pub use language::{Language, LanguageError};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry};
