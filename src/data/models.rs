//! Chapter records and their validated wire form.
//!
//! Serialized `Chapter` snapshots travel through the response cache, so the
//! camelCase wire names are part of the cache contract, not just the HTTP one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A persisted chapter row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: uuid::Uuid,
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    /// Arbitrary year → question-count mapping, stored as JSONB.
    pub year_wise_question_count: Value,
    pub question_solved: i32,
    pub status: String,
    pub is_weak_chapter: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming chapter payload. Every field is required, and unknown fields are
/// rejected so a typoed key fails validation instead of silently dropping data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChapterInput {
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    pub year_wise_question_count: BTreeMap<String, i64>,
    pub question_solved: i32,
    pub status: String,
    pub is_weak_chapter: bool,
}

/// A document that failed validation, reported by its position in the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub index: usize,
    pub error: String,
    pub doc: Value,
}

/// Parse one JSON document into a `ChapterInput`, with a field-path-qualified
/// message on failure.
pub fn parse_chapter(value: &Value) -> Result<ChapterInput, String> {
    serde_path_to_error::deserialize(value.clone()).map_err(|e| e.to_string())
}

/// Validate a batch. Either every document parses, or the per-index failures
/// are returned and nothing should be inserted.
pub fn validate_chapters(values: &[Value]) -> Result<Vec<ChapterInput>, Vec<ValidationFailure>> {
    let mut inputs = Vec::with_capacity(values.len());
    let mut failures = Vec::new();
    for (index, value) in values.iter().enumerate() {
        match parse_chapter(value) {
            Ok(input) => inputs.push(input),
            Err(error) => failures.push(ValidationFailure {
                index,
                error,
                doc: value.clone(),
            }),
        }
    }
    if failures.is_empty() {
        Ok(inputs)
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_chapter(name: &str) -> Value {
        json!({
            "subject": "Physics",
            "chapter": name,
            "class": "Class 11",
            "unit": "Mechanics",
            "yearWiseQuestionCount": {"2023": 4, "2024": 7},
            "questionSolved": 12,
            "status": "In Progress",
            "isWeakChapter": false
        })
    }

    #[test]
    fn parses_a_complete_chapter() {
        let input = parse_chapter(&valid_chapter("Laws of Motion")).unwrap();
        assert_eq!(input.chapter, "Laws of Motion");
        assert_eq!(input.year_wise_question_count.get("2024"), Some(&7));
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut doc = valid_chapter("Waves");
        doc.as_object_mut().unwrap().remove("status");
        let err = parse_chapter(&doc).unwrap_err();
        assert!(err.contains("status"), "unexpected message: {err}");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut doc = valid_chapter("Waves");
        doc.as_object_mut()
            .unwrap()
            .insert("isweakchapter".to_owned(), json!(true));
        assert!(parse_chapter(&doc).is_err());
    }

    #[test]
    fn batch_reports_only_failing_indexes() {
        let mut bad = valid_chapter("Optics");
        bad.as_object_mut().unwrap().remove("unit");
        let batch = vec![valid_chapter("Kinematics"), bad, valid_chapter("Gravitation")];

        let failures = validate_chapters(&batch).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert!(failures[0].error.contains("unit"));
    }

    #[test]
    fn batch_of_valid_chapters_parses_in_order() {
        let batch = vec![valid_chapter("Kinematics"), valid_chapter("Gravitation")];
        let inputs = validate_chapters(&batch).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].chapter, "Gravitation");
    }
}
