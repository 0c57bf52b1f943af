//! Wire contract shared by the translation endpoint and its clients.
//!
//! Request: `{ "texts": ["Add to cart", ...], "target": "fr" }`
//! Response: `{ "translations": { "Add to cart": "Ajouter au panier", ... } }`
//!
//! A degraded response keeps the same body shape but is sent with a non-2xx
//! status; entries the provider could not translate map to themselves.

use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Body of `POST /translate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Body of a `POST /translate` answer, successful or degraded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translations: BTreeMap<String, String>,
}

/// Body of a 422 answer: a message plus per-field messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// A client-side outgoing batch: distinct texts in first-seen order plus the
/// locale they were requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationBatch {
    locale: Language,
    texts: Vec<String>,
}

impl TranslationBatch {
    /// Build a batch, dropping duplicates. Returns `None` when nothing is left
    /// to send.
    pub fn new<I>(locale: Language, texts: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let texts = dedup_preserving_order(texts);
        if texts.is_empty() {
            return None;
        }
        Some(Self { locale, texts })
    }

    pub fn locale(&self) -> Language {
        self.locale
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn to_request(&self) -> TranslateRequest {
        TranslateRequest {
            texts: self.texts.clone(),
            target: Some(self.locale.code().to_string()),
        }
    }
}

/// Remove duplicates while keeping the first occurrence of each text.
pub fn dedup_preserving_order<I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|text| seen.insert(text.clone()))
        .collect()
}
