use crate::i18n::Language;
use crate::wire::{ErrorResponse, TranslateRequest};
use std::collections::BTreeMap;
use thiserror::Error;

/// A malformed translation request. Rejected before any cache or provider work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The texts field is required.")]
    MissingTexts,
    #[error("The texts.{0} field is required.")]
    EmptyText(usize),
    #[error("The selected target is invalid.")]
    UnsupportedLocale(String),
    #[error("The request body is not valid JSON: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    pub fn field(&self) -> String {
        match self {
            ValidationError::MissingTexts => "texts".to_string(),
            ValidationError::EmptyText(index) => format!("texts.{}", index),
            ValidationError::UnsupportedLocale(_) => "target".to_string(),
            ValidationError::MalformedBody(_) => "body".to_string(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let mut errors = BTreeMap::new();
        errors.insert(self.field(), vec![self.to_string()]);
        ErrorResponse {
            message: self.to_string(),
            errors,
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub texts: Vec<String>,
    /// `None` when the target was absent or empty.
    pub target: Option<Language>,
}

pub fn validate(request: TranslateRequest) -> Result<ValidatedRequest, ValidationError> {
    if request.texts.is_empty() {
        return Err(ValidationError::MissingTexts);
    }

    if let Some(index) = request.texts.iter().position(|t| t.trim().is_empty()) {
        return Err(ValidationError::EmptyText(index));
    }

    let target = match request.target.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(code) => Some(
            Language::from_code(code)
                .map_err(|_| ValidationError::UnsupportedLocale(code.to_string()))?,
        ),
    };

    Ok(ValidatedRequest {
        texts: request.texts,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(texts: &[&str], target: Option<&str>) -> TranslateRequest {
        TranslateRequest {
            texts: texts.iter().map(|s| s.to_string()).collect(),
            target: target.map(String::from),
        }
    }

    #[test]
    fn test_valid_request() {
        let validated = validate(request(&["Hello", "World"], Some("fr"))).expect("Valid");

        assert_eq!(validated.texts, vec!["Hello", "World"]);
        assert_eq!(validated.target, Some(Language::FRENCH));
    }

    #[test]
    fn test_every_allow_listed_locale_is_accepted() {
        for code in ["en", "es", "it", "fr", "de", "ar", "hi", "ur"] {
            assert!(validate(request(&["Hi"], Some(code))).is_ok(), "{}", code);
        }
    }

    #[test]
    fn test_unsupported_locale_rejected() {
        assert_eq!(
            validate(request(&["Hello"], Some("zz"))),
            Err(ValidationError::UnsupportedLocale("zz".to_string()))
        );
    }

    #[test]
    fn test_missing_texts_rejected() {
        assert_eq!(
            validate(request(&[], Some("fr"))),
            Err(ValidationError::MissingTexts)
        );
    }

    #[test]
    fn test_empty_text_entry_rejected() {
        let err = validate(request(&["Hello", "  "], Some("fr"))).unwrap_err();

        assert_eq!(err, ValidationError::EmptyText(1));
        assert_eq!(err.field(), "texts.1");
    }

    #[test]
    fn test_absent_or_empty_target_means_no_translation() {
        assert_eq!(validate(request(&["Hello"], None)).unwrap().target, None);
        assert_eq!(validate(request(&["Hello"], Some(""))).unwrap().target, None);
    }

    #[test]
    fn test_error_response_shape() {
        let response = ValidationError::UnsupportedLocale("zz".to_string()).to_response();

        assert_eq!(response.message, "The selected target is invalid.");
        assert_eq!(
            response.errors["target"],
            vec!["The selected target is invalid.".to_string()]
        );
    }
}
