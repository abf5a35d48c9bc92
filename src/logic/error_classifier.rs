use itertools::Itertools;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SaveError;

lazy_static! {
    static ref DUPLICATED_KEY: Regex = Regex::new(r"E11000 duplicate key error").unwrap();
    static ref FIELDS_FRAGMENT: Regex = Regex::new(r"\{.*\}").unwrap();
    static ref RELAXED_KEY: Regex = Regex::new(r#"(['"])?([a-z0-9A-Z_]+)(['"])?:"#).unwrap();
}

/// Maps raw storage and hook failures onto the [`SaveError`] taxonomy.
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a failure raised after validation.
    ///
    /// Errors that already are a [`SaveError`] pass through untouched.
    /// Duplicate-key store errors become `DuplicatedKey` naming the offending
    /// fields; everything else is `Internal` with the original error kept.
    pub fn classify(err: anyhow::Error) -> SaveError {
        let err = match err.downcast::<SaveError>() {
            Ok(save_error) => return save_error,
            Err(err) => err,
        };

        let text = format!("{:#}", err);
        if !DUPLICATED_KEY.is_match(&text) {
            warn!("Save failed: {}", text);
            return SaveError::Internal {
                message: err.to_string(),
                previous: Some(err),
            };
        }

        let fields = Self::duplicated_fields(&err.root_cause().to_string()).unwrap_or_default();
        let message = if fields.is_empty() {
            "A document already exists".to_string()
        } else {
            format!(
                "A document for field or fields: {} already exists",
                fields.iter().map(|field| format!("'{}'", field)).join(", ")
            )
        };
        warn!("Duplicated key on save: {}", text);

        SaveError::DuplicatedKey {
            message,
            fields,
            previous: err,
        }
    }

    /// Field names embedded in a duplicate-key message as a (possibly
    /// relaxed) JSON object, in the order the store reported them. `None`
    /// when there is no such fragment or it cannot be parsed.
    pub fn duplicated_fields(message: &str) -> Option<Vec<String>> {
        let fragment = FIELDS_FRAGMENT.find(message)?.as_str();
        let parsed = sanitize_and_parse(fragment)?;
        Some(parsed.keys().cloned().collect())
    }
}

/// Normalize relaxed JSON (`{ name: "x" }`, `{ 'name': "x" }`) into JSON.
pub fn sanitize_relaxed_json(relaxed: &str) -> String {
    RELAXED_KEY.replace_all(relaxed, "\"${2}\": ").into_owned()
}

fn sanitize_and_parse(relaxed: &str) -> Option<Map<String, Value>> {
    serde_json::from_str(&sanitize_relaxed_json(relaxed)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use anyhow::{anyhow, Context};

    fn store_error(message: &str) -> anyhow::Error {
        anyhow::Error::msg(message.to_string())
    }

    #[test]
    fn test_sanitize_relaxed_json() {
        assert_eq!(sanitize_relaxed_json(r#"{ some: "data" }"#), r#"{ "some":  "data" }"#);
        assert_eq!(sanitize_relaxed_json(r#"{'a': 1}"#), r#"{"a":  1}"#);
    }

    #[test]
    fn test_single_duplicated_field() {
        let err = ErrorClassifier::classify(store_error(
            r#"E11000 duplicate key error collection: db.product index: code_1 dup key: {"code":"X-1"}"#
        ));

        assert_eq!(err.code(), ErrorCode::DuplicatedKeyError);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "A document for field or fields: 'code' already exists");
    }

    #[test]
    fn test_two_duplicated_fields_keep_declaration_order() {
        let err = ErrorClassifier::classify(store_error(
            r#"E11000 duplicate key error index: z_1_a_1 dup key: { z: "x", a: 2 }"#
        ));

        assert_eq!(err.to_string(), "A document for field or fields: 'z', 'a' already exists");
        match err {
            SaveError::DuplicatedKey { fields, .. } => assert_eq!(fields, vec!["z", "a"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_fragment_degrades_to_generic_message() {
        let err = ErrorClassifier::classify(store_error(
            r#"E11000 duplicate key error index: code_1 dup key: { : "X-1" }"#
        ));
        assert_eq!(err.code(), ErrorCode::DuplicatedKeyError);
        assert_eq!(err.to_string(), "A document already exists");

        let err = ErrorClassifier::classify(anyhow!("E11000 duplicate key error"));
        assert_eq!(err.to_string(), "A document already exists");
    }

    #[test]
    fn test_duplicate_detected_through_context_chain() {
        let err = Err::<(), _>(store_error(r#"E11000 duplicate key error dup key: { code: 1 }"#))
            .context("Failed to insert product")
            .unwrap_err();

        let classified = ErrorClassifier::classify(err);
        assert_eq!(classified.code(), ErrorCode::DuplicatedKeyError);
        assert_eq!(classified.to_string(), "A document for field or fields: 'code' already exists");
        assert_eq!(
            classified.previous_error().unwrap().to_string(),
            "Failed to insert product"
        );
    }

    #[test]
    fn test_braces_in_context_do_not_hide_fields() {
        let err = Err::<(), _>(store_error(r#"E11000 duplicate key error dup key: { code: 1 }"#))
            .context("Failed to insert {product}")
            .unwrap_err();

        let classified = ErrorClassifier::classify(err);
        assert_eq!(classified.to_string(), "A document for field or fields: 'code' already exists");
    }

    #[test]
    fn test_other_errors_are_internal_with_previous() {
        let err = ErrorClassifier::classify(anyhow!("connection reset"));

        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.previous_error().is_some());
    }

    #[test]
    fn test_typed_errors_pass_through() {
        let err = ErrorClassifier::classify(anyhow::Error::new(SaveError::invalid_request("nope")));

        assert_eq!(err.code(), ErrorCode::InvalidRequestData);
        assert_eq!(err.to_string(), "nope");
    }
}
