//! Database query functions for the chapters collection.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::data::models::{Chapter, ChapterInput};

const CHAPTER_SELECT: &str = "SELECT id, subject, chapter, class, unit, year_wise_question_count, \
            question_solved, status, is_weak_chapter, created_at, updated_at \
     FROM chapters";

const CHAPTER_INSERT: &str = "INSERT INTO chapters \
            (subject, chapter, class, unit, year_wise_question_count, question_solved, status, is_weak_chapter) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
     RETURNING id, subject, chapter, class, unit, year_wise_question_count, \
            question_solved, status, is_weak_chapter, created_at, updated_at";

/// Optional equality filters for list queries.
///
/// All filter parameters are nullable -- passing `None` disables that filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChapterFilter {
    pub class: Option<String>,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub subject: Option<String>,
    pub weak_chapters: Option<bool>,
}

/// A store-level write failure for one document of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct WriteError {
    pub index: usize,
    pub error: String,
    pub doc: Value,
}

/// Outcome of an unordered batch insert: documents that landed and per-index
/// failures for those that did not.
#[derive(Debug)]
pub struct InsertManyOutcome {
    pub inserted: Vec<Chapter>,
    pub errors: Vec<WriteError>,
}

/// Fetch one page of chapters matching the filter, in stable insertion order.
pub async fn list(
    pool: &PgPool,
    filter: &ChapterFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Chapter>> {
    let rows = sqlx::query_as::<_, Chapter>(&format!(
        "{CHAPTER_SELECT} \
         WHERE ($1::text IS NULL OR class = $1) \
           AND ($2::text IS NULL OR unit = $2) \
           AND ($3::text IS NULL OR status = $3) \
           AND ($4::text IS NULL OR subject = $4) \
           AND ($5::boolean IS NULL OR is_weak_chapter = $5) \
         ORDER BY created_at, id LIMIT $6 OFFSET $7"
    ))
    .bind(filter.class.as_deref())
    .bind(filter.unit.as_deref())
    .bind(filter.status.as_deref())
    .bind(filter.subject.as_deref())
    .bind(filter.weak_chapters)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Count all chapters matching the filter (for pagination totals).
pub async fn count(pool: &PgPool, filter: &ChapterFilter) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chapters \
         WHERE ($1::text IS NULL OR class = $1) \
           AND ($2::text IS NULL OR unit = $2) \
           AND ($3::text IS NULL OR status = $3) \
           AND ($4::text IS NULL OR subject = $4) \
           AND ($5::boolean IS NULL OR is_weak_chapter = $5)",
    )
    .bind(filter.class.as_deref())
    .bind(filter.unit.as_deref())
    .bind(filter.status.as_deref())
    .bind(filter.subject.as_deref())
    .bind(filter.weak_chapters)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Fetch a single chapter by id, or `None` if absent.
pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Chapter>> {
    let row = sqlx::query_as::<_, Chapter>(&format!("{CHAPTER_SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Insert a single chapter and return the persisted row.
pub async fn insert(pool: &PgPool, input: &ChapterInput) -> Result<Chapter> {
    let row = sqlx::query_as::<_, Chapter>(CHAPTER_INSERT)
        .bind(&input.subject)
        .bind(&input.chapter)
        .bind(&input.class)
        .bind(&input.unit)
        .bind(serde_json::to_value(&input.year_wise_question_count)?)
        .bind(input.question_solved)
        .bind(&input.status)
        .bind(input.is_weak_chapter)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Unordered batch insert: every document is attempted, failures are recorded
/// by index (with the offending document) instead of aborting the batch.
pub async fn insert_many(pool: &PgPool, inputs: &[ChapterInput]) -> InsertManyOutcome {
    let mut outcome = InsertManyOutcome {
        inserted: Vec::with_capacity(inputs.len()),
        errors: Vec::new(),
    };
    for (index, input) in inputs.iter().enumerate() {
        match insert(pool, input).await {
            Ok(row) => outcome.inserted.push(row),
            Err(e) => outcome.errors.push(WriteError {
                index,
                error: e.to_string(),
                doc: serde_json::to_value(input).unwrap_or(Value::Null),
            }),
        }
    }
    outcome
}
