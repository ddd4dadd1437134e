//! Chapter list, detail, and create handlers.

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::data;
use crate::data::chapters::ChapterFilter;
use crate::data::models::{Chapter, parse_chapter, validate_chapters};
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::middleware::admin_auth::AdminToken;
use crate::web::response_cache;

/// Uploaded JSON files and request bodies are read fully into memory.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

const BAD_BODY: &str =
    "Request body must be a chapter object, an array of chapters, or a valid JSON file.";

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub class: Option<String>,
    pub unit: Option<String>,
    pub status: Option<String>,
    /// Only the literal string `true` activates the weak-chapter filter.
    pub weak_chapters: Option<String>,
    pub subject: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// List response envelope. Cached in serialized form, so the field set and
/// order are part of the cache contract.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChapterListEnvelope {
    pub message: String,
    pub success: bool,
    pub data: Vec<Chapter>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Detail response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChapterEnvelope {
    pub message: String,
    pub success: bool,
    pub data: Chapter,
}

/// `GET /api/v1/chapters`
pub(super) async fn list_chapters(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ChapterListEnvelope>, ApiError> {
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 500);
    let filter = ChapterFilter {
        class: params.class,
        unit: params.unit,
        status: params.status,
        subject: params.subject,
        weak_chapters: (params.weak_chapters.as_deref() == Some("true")).then_some(true),
    };

    let key = response_cache::list_key(&filter, page, limit);
    let db_pool = &state.db_pool;
    let filter = &filter;
    let envelope = response_cache::lookup_or_compute(&state.kv, &key, state.cache_ttl, || async move {
        let data = data::chapters::list(db_pool, filter, limit, (page - 1) * limit)
            .await
            .map_err(|e| db_error("Chapter list", e))?;
        let total = data::chapters::count(db_pool, filter)
            .await
            .map_err(|e| db_error("Chapter count", e))?;
        Ok(ChapterListEnvelope {
            message: "Chapters fetched successfully".to_owned(),
            success: true,
            data,
            total,
            page,
            limit,
        })
    })
    .await?;

    Ok(Json(envelope))
}

/// `GET /api/v1/chapters/:id`
pub(super) async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChapterEnvelope>, ApiError> {
    let key = response_cache::detail_key(id);
    let db_pool = &state.db_pool;
    // 404s are not cached: only a found chapter produces an envelope to store.
    let envelope = response_cache::lookup_or_compute(&state.kv, &key, state.cache_ttl, || async move {
        let chapter = data::chapters::get(db_pool, id)
            .await
            .map_err(|e| db_error("Chapter lookup", e))?
            .or_not_found("Chapter")?;
        Ok(ChapterEnvelope {
            message: "Chapter fetched successfully".to_owned(),
            success: true,
            data: chapter,
        })
    })
    .await?;

    Ok(Json(envelope))
}

/// `POST /api/v1/chapters`
///
/// Accepts a single chapter object, an array of chapters, or a multipart
/// upload with a JSON `file` field containing either. Validation failures
/// reject the whole request before any insert; store-level failures inside a
/// batch are reported per index with 207.
pub(super) async fn create_chapter(
    State(state): State<AppState>,
    _admin: AdminToken,
    request: Request,
) -> Result<Response, ApiError> {
    let payload = read_payload(request).await?;

    match payload {
        Value::Array(values) => create_many(&state, values).await,
        Value::Object(_) => create_single(&state, &payload).await,
        _ => Err(ApiError::bad_request(BAD_BODY)),
    }
}

async fn create_many(state: &AppState, values: Vec<Value>) -> Result<Response, ApiError> {
    if values.is_empty() {
        return Err(ApiError::bad_request("No chapters provided"));
    }

    let inputs = match validate_chapters(&values) {
        Ok(inputs) => inputs,
        Err(failures) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Validation failed for some chapters",
                    "success": false,
                    "errors": failures,
                })),
            )
                .into_response());
        }
    };

    // Sweep before the write to shrink the read-repopulation race, and again
    // after so nothing cached mid-write survives.
    response_cache::invalidate_all(&state.kv).await;
    let outcome = data::chapters::insert_many(&state.db_pool, &inputs).await;
    response_cache::invalidate_all(&state.kv).await;

    Ok(batch_response(outcome))
}

/// 201 when every document landed, 207 with both the inserted rows and the
/// per-index errors when only part of the batch did.
fn batch_response(outcome: data::chapters::InsertManyOutcome) -> Response {
    if outcome.errors.is_empty() {
        (
            StatusCode::CREATED,
            Json(json!({
                "message": "Chapters created successfully",
                "success": true,
                "data": outcome.inserted,
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::MULTI_STATUS,
            Json(json!({
                "message": "Some chapters failed to insert",
                "success": false,
                "inserted": outcome.inserted,
                "errors": outcome.errors,
            })),
        )
            .into_response()
    }
}

async fn create_single(state: &AppState, payload: &Value) -> Result<Response, ApiError> {
    let input = match parse_chapter(payload) {
        Ok(input) => input,
        Err(error) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Validation failed",
                    "success": false,
                    "error": error,
                })),
            )
                .into_response());
        }
    };

    response_cache::invalidate_all(&state.kv).await;
    let chapter = data::chapters::insert(&state.db_pool, &input)
        .await
        .map_err(|e| db_error("Chapter insert", e))?;
    response_cache::invalidate_all(&state.kv).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Chapter created successfully",
            "success": true,
            "data": chapter,
        })),
    )
        .into_response())
}

/// Pull the chapter payload out of the request: either a JSON body or a
/// multipart upload carrying a `.json` file under the `file` field.
async fn read_payload(request: Request) -> Result<Value, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| ApiError::bad_request(BAD_BODY))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::bad_request("Invalid JSON file uploaded"))?
        {
            if field.name() != Some("file") {
                continue;
            }
            if !field.file_name().is_some_and(|name| name.ends_with(".json")) {
                return Err(ApiError::bad_request("Only JSON files allowed"));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Invalid JSON file uploaded"))?;
            return serde_json::from_slice(&bytes)
                .map_err(|_| ApiError::bad_request("Invalid JSON file uploaded"));
        }
        Err(ApiError::bad_request(BAD_BODY))
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), BODY_LIMIT)
            .await
            .map_err(|_| ApiError::bad_request(BAD_BODY))?;
        serde_json::from_slice(&bytes).map_err(|_| ApiError::bad_request(BAD_BODY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::chapters::{InsertManyOutcome, WriteError};
    use chrono::Utc;

    fn chapter(name: &str) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            subject: "Physics".to_owned(),
            chapter: name.to_owned(),
            class: "Class 11".to_owned(),
            unit: "Mechanics".to_owned(),
            year_wise_question_count: json!({"2024": 3}),
            question_solved: 5,
            status: "In Progress".to_owned(),
            is_weak_chapter: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_batch_success_is_created() {
        let response = batch_response(InsertManyOutcome {
            inserted: vec![chapter("Kinematics"), chapter("Waves")],
            errors: Vec::new(),
        });
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn partial_batch_failure_is_multi_status() {
        // Document #2 of 3 hit a store-level conflict; the other two landed.
        let response = batch_response(InsertManyOutcome {
            inserted: vec![chapter("Kinematics"), chapter("Gravitation")],
            errors: vec![WriteError {
                index: 1,
                error: "duplicate key value violates unique constraint \"chapters_identity_idx\""
                    .to_owned(),
                doc: json!({"chapter": "Kinematics"}),
            }],
        });
        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    }
}
