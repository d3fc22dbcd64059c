//! Cursor pagination for list endpoints.
//!
//! Every list endpoint takes Relay-style arguments (`first`/`after` or
//! `last`/`before`) straight off the query string and answers with a
//! [`Page<T>`]. Cursors are the base64 of a row's UUID; ids are UUIDv7,
//! so the id itself is the sort key and no separate cursor column exists.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i32 = 25;
const MAX_PAGE_SIZE: i32 = 100;

fn encode_cursor(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

fn decode_cursor(s: &str) -> Result<Uuid> {
    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .context("Invalid cursor: not valid base64")?;
    Uuid::from_slice(&bytes).context("Invalid cursor: not a UUID")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationDirection {
    Forward,
    Backward,
}

/// Pagination arguments as they arrive on the query string. Call
/// [`validate`](Self::validate) before touching the database.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationArgs {
    pub first: Option<i32>,
    pub after: Option<String>,
    pub last: Option<i32>,
    pub before: Option<String>,
}

impl PaginationArgs {
    pub fn forward(first: i32, after: Option<String>) -> Self {
        PaginationArgs {
            first: Some(first),
            after,
            last: None,
            before: None,
        }
    }

    /// Apply the default and ceiling to the limit, pick the direction and
    /// decode the cursor. `first`/`after` and `last`/`before` are mutually
    /// exclusive.
    pub fn validate(&self) -> Result<ValidatedPaginationArgs, &'static str> {
        if (self.first.is_some() || self.after.is_some())
            && (self.last.is_some() || self.before.is_some())
        {
            return Err("Cannot use first/after with last/before");
        }

        let direction = if self.last.is_some() || self.before.is_some() {
            PaginationDirection::Backward
        } else {
            PaginationDirection::Forward
        };

        let limit = self
            .first
            .or(self.last)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let raw_cursor = match direction {
            PaginationDirection::Forward => self.after.as_deref(),
            PaginationDirection::Backward => self.before.as_deref(),
        };
        let cursor = raw_cursor
            .map(decode_cursor)
            .transpose()
            .map_err(|_| "Invalid cursor")?;

        Ok(ValidatedPaginationArgs {
            limit,
            cursor,
            direction,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedPaginationArgs {
    pub limit: i32,
    pub cursor: Option<Uuid>,
    pub direction: PaginationDirection,
}

impl ValidatedPaginationArgs {
    /// SQL LIMIT to use: one past the page size, so the extra row reveals
    /// whether more pages exist.
    pub fn fetch_limit(&self) -> i64 {
        (self.limit + 1) as i64
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One page of results plus the cursors to fetch its neighbors. The shape
/// of every list endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Assemble the response page. `items` must already be trimmed to the
    /// limit; `has_more` reports whether the query saw a limit+1'th row.
    pub fn build<F>(
        items: Vec<T>,
        has_more: bool,
        args: &ValidatedPaginationArgs,
        cursor_of: F,
    ) -> Self
    where
        F: Fn(&T) -> Uuid,
    {
        let start_cursor = items.first().map(|item| encode_cursor(cursor_of(item)));
        let end_cursor = items.last().map(|item| encode_cursor(cursor_of(item)));

        // Whatever direction the caller walked, the opposite side is only
        // known to exist when a cursor got us here.
        let (has_next_page, has_previous_page) = match args.direction {
            PaginationDirection::Forward => (has_more, args.cursor.is_some()),
            PaginationDirection::Backward => (args.cursor.is_some(), has_more),
        };

        Page {
            items,
            page_info: PageInfo {
                has_next_page,
                has_previous_page,
                start_cursor,
                end_cursor,
            },
        }
    }
}
