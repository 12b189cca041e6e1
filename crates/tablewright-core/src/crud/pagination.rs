//! Runtime side of keyset pagination.
//!
//! The generated List statement fetches one row more than requested. The
//! extra row only signals that another page exists; it is dropped and the
//! cursor is taken from the last row actually returned.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position after which the next page starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// `created_at` of the last returned row, as the database rendered it.
    pub created_at: String,
    /// `public_id` of the last returned row.
    pub public_id: String,
}

impl Cursor {
    /// Creates a cursor.
    #[must_use]
    pub fn new(created_at: impl Into<String>, public_id: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            public_id: public_id.into(),
        }
    }

    /// Encodes the cursor as an opaque URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        // serializing two strings cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::validation(format!("malformed cursor token: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::validation(format!("malformed cursor token: {e}")))
    }
}

/// Rows that can produce a cursor pointing at themselves.
pub trait CursorRow {
    /// The cursor positioned on this row.
    fn cursor(&self) -> Cursor;
}

/// A validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    cursor: Option<Cursor>,
}

impl PageRequest {
    /// Requests the first page. `limit` must be positive.
    pub fn first(limit: u32) -> Result<Self> {
        if limit == 0 {
            return Err(Error::validation("page limit must be at least 1"));
        }
        Ok(Self {
            limit,
            cursor: None,
        })
    }

    /// Requests the page after `token`; `None` means the first page.
    pub fn after(limit: u32, token: Option<&str>) -> Result<Self> {
        let mut request = Self::first(limit)?;
        request.cursor = token.map(Cursor::decode).transpose()?;
        Ok(request)
    }

    /// Requested page size.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Decoded cursor, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Rows to fetch: one more than the page size.
    #[must_use]
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Rows of this page, at most `limit`.
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Turns the rows fetched for `request` into a page.
pub fn paginate<T: CursorRow>(mut rows: Vec<T>, request: &PageRequest) -> Page<T> {
    let limit = request.limit as usize;
    let next_cursor = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(|row| row.cursor().encode())
    } else {
        None
    };
    Page {
        items: rows,
        next_cursor,
    }
}
