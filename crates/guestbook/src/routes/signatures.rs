//! Displaying and signing the guestbook.

use axum::Json;
use axum::extract::Query;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use couch_store::CouchDatabase;
use manager::{Couch, Page, paginate};
use mapping::Record;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Signature;

/// Signatures shown per page.
pub const PAGE_SIZE: usize = 5;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct DisplayParams {
    pub start: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub message: Option<String>,
    pub author: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub id: Option<String>,
    pub message: String,
    pub author: String,
    pub time: DateTime<Utc>,
}

impl From<Record<Signature>> for SignatureResponse {
    fn from(record: Record<Signature>) -> Self {
        let id = record.id().map(ToString::to_string);
        let Signature {
            message,
            author,
            time,
        } = record.into_inner();
        Self {
            id,
            message,
            author,
            time,
        }
    }
}

// -- Handlers --

/// GET / - one page of signatures, newest first. `?start=` selects the page.
pub async fn display<D: CouchDatabase>(
    Couch(db): Couch<D>,
    Query(params): Query<DisplayParams>,
) -> Result<Json<Page<SignatureResponse>>, ApiError> {
    let view = Signature::all();
    let page = paginate(&view.bind(&db), PAGE_SIZE, params.start.as_deref()).await?;
    let page = page.try_map(Record::<Signature>::from_row)?;
    Ok(Json(page.map(SignatureResponse::from)))
}

/// POST / - stores a new signature. Both fields are required.
pub async fn sign<D: CouchDatabase>(
    Couch(db): Couch<D>,
    Json(req): Json<SignRequest>,
) -> Result<(StatusCode, Json<SignatureResponse>), ApiError> {
    let (Some(message), Some(author)) = (non_blank(req.message), non_blank(req.author)) else {
        return Err(ApiError::BadRequest(
            "You must fill in both a message and an author".to_string(),
        ));
    };

    let mut record = Record::new(Signature::new(message, author));
    let id = record.store(&db).await?;
    metrics::counter!("guestbook_signatures_stored").increment(1);
    tracing::info!(%id, author = %record.author, "signature stored");

    Ok((StatusCode::CREATED, Json(SignatureResponse::from(record))))
}

fn non_blank(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
