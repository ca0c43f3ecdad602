//! Cursor-based pagination over view results.
//!
//! A cursor token names the first row of a page by its `(key, doc id)`
//! pair, so paging needs no offsets. Tokens stay valid only while the rows
//! around them do not change.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use couch_store::{BoundView, CouchDatabase, Row, ViewQuery};
use serde::Serialize;
use serde_json::Value;

use crate::{ManagerError, Result};

/// One page of view results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token of the previous page, `None` on the first page.
    pub prev: Option<String>,
    /// Token of the next page, `None` on the last page.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Converts every item, keeping the cursors.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            prev: self.prev,
            next: self.next,
        }
    }

    /// Converts every item, stopping at the first failure.
    pub fn try_map<U, E>(
        self,
        f: impl FnMut(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Page<U>, E> {
        Ok(Page {
            items: self
                .items
                .into_iter()
                .map(f)
                .collect::<std::result::Result<_, _>>()?,
            prev: self.prev,
            next: self.next,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Returns the page of `count` rows starting at the `start` token, or the
/// first page without one.
pub async fn paginate<D: CouchDatabase>(
    view: &BoundView<'_, D>,
    count: usize,
    start: Option<&str>,
) -> Result<Page<Row>> {
    paginate_with(view, count, start, ViewQuery::new()).await
}

/// Like [`paginate`], with extra query options (range, `include_docs`, ...)
/// layered over the view's defaults.
///
/// `skip` and `limit` in `query` are replaced by the pager.
#[tracing::instrument(skip(view, query), fields(view = %view.definition().name()))]
pub async fn paginate_with<D: CouchDatabase>(
    view: &BoundView<'_, D>,
    count: usize,
    start: Option<&str>,
    query: ViewQuery,
) -> Result<Page<Row>> {
    if count == 0 {
        return Err(ManagerError::InvalidPageSize);
    }
    let base = ViewQuery {
        skip: None,
        limit: None,
        ..query.or(view.definition().defaults())
    };

    // One extra row tells whether a next page exists.
    let mut forward = base.clone().limit(count.saturating_add(1));
    if let Some(token) = start {
        let (key, doc_id) = decode_token(token)?;
        forward.start_key = Some(key);
        forward.start_key_doc_id = doc_id;
    }
    let mut items = view.query(forward).await?.rows;

    let next = if items.len() > count {
        items.truncate(count.saturating_add(1));
        items.pop().map(|row| encode_token(&row))
    } else {
        None
    };

    let prev = match (start, items.first()) {
        (Some(_), Some(first)) => {
            let backward = ViewQuery {
                start_key: Some(first.key.clone()),
                start_key_doc_id: first.id.clone(),
                end_key: base.start_key.clone(),
                end_key_doc_id: base.start_key_doc_id.clone(),
                inclusive_end: Some(true),
                descending: Some(!base.is_descending()),
                skip: Some(1),
                limit: Some(count),
                ..base.clone()
            };
            view.query(backward)
                .await?
                .rows
                .last()
                .map(encode_token)
        }
        _ => None,
    };

    Ok(Page { items, prev, next })
}

/// Encodes the cursor token pointing at `row`.
pub fn encode_token(row: &Row) -> String {
    let pair = Value::Array(vec![
        row.key.clone(),
        row.id.clone().map_or(Value::Null, Value::String),
    ]);
    URL_SAFE_NO_PAD.encode(pair.to_string())
}

/// Decodes a cursor token into its `(key, doc id)` pair.
pub fn decode_token(token: &str) -> Result<(Value, Option<String>)> {
    let invalid = || ManagerError::InvalidCursor(token.to_string());
    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
    let pair: Value = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

    match pair {
        Value::Array(mut pair) if pair.len() == 2 => {
            let doc_id = match pair.pop() {
                Some(Value::String(id)) => Some(id),
                Some(Value::Null) => None,
                _ => return Err(invalid()),
            };
            let key = pair.pop().ok_or_else(invalid)?;
            Ok((key, doc_id))
        }
        _ => Err(invalid()),
    }
}
