use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};
use serde::Serialize;

use crate::db::Credo;
use crate::entity::Row;
use crate::error::{CredoError, Result};
use crate::query::Query;

/// One page of a query result together with the total row count.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination<T> {
    #[serde(skip)]
    query: Query<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> Pagination<T> {
    /// A page that matched nothing.
    pub fn empty(query: Query<T>, page: i64, per_page: i64) -> Self {
        Self {
            query,
            page,
            per_page,
            total: 0,
            items: Vec::new(),
        }
    }

    pub fn query(&self) -> &Query<T> {
        &self.query
    }

    pub fn pages(&self) -> i64 {
        if self.per_page <= 0 {
            0
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn prev_num(&self) -> Option<i64> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next_num(&self) -> Option<i64> {
        self.has_next().then(|| self.page + 1)
    }

    /// Page numbers for a pager widget. `None` marks a gap.
    ///
    /// Keeps the first `left_edge` pages, the last `right_edge` pages, and a
    /// window of `left_current` pages before and `right_current - 1` pages
    /// after the current one.
    pub fn page_numbers(
        &self,
        left_edge: i64,
        left_current: i64,
        right_current: i64,
        right_edge: i64,
    ) -> Vec<Option<i64>> {
        let pages = self.pages();
        let mut out = Vec::new();
        let mut last = 0;
        for num in 1..=pages {
            let shown = num <= left_edge
                || (num > self.page - left_current - 1 && num < self.page + right_current)
                || num > pages - right_edge;
            if shown {
                if last + 1 != num {
                    out.push(None);
                }
                out.push(Some(num));
                last = num;
            }
        }
        out
    }
}

impl<T: Row> Pagination<T> {
    pub(crate) async fn fetch(
        query: Query<T>,
        credo: &Credo,
        page: i64,
        per_page: i64,
    ) -> Result<Self> {
        if page < 1 {
            return Err(CredoError::invalid(format!("page must be >= 1, got {page}")));
        }
        if per_page < 1 {
            return Err(CredoError::invalid(format!(
                "per_page must be >= 1, got {per_page}"
            )));
        }

        let total = query.count(credo).await?;
        let items = query.clone().page(page, per_page).all(credo).await?;

        Ok(Self {
            query,
            page,
            per_page,
            total,
            items,
        })
    }

    pub async fn next(&self, credo: &Credo) -> Result<Option<Self>> {
        match self.next_num() {
            Some(page) => Ok(Some(
                Self::fetch(self.query.clone(), credo, page, self.per_page).await?,
            )),
            None => Ok(None),
        }
    }

    pub async fn prev(&self, credo: &Credo) -> Result<Option<Self>> {
        match self.prev_num() {
            Some(page) => Ok(Some(
                Self::fetch(self.query.clone(), credo, page, self.per_page).await?,
            )),
            None => Ok(None),
        }
    }

    /// This page followed by every later one, each fetched when the stream
    /// is polled for it.
    pub fn into_stream(self, credo: &Credo) -> impl Stream<Item = Result<Self>> + use<T> {
        let credo = credo.clone();
        pages_from(self, move |query, page, per_page| {
            let credo = credo.clone();
            async move { Self::fetch(query, &credo, page, per_page).await }
        })
    }

    /// Every item from this page onwards.
    pub fn into_item_stream(self, credo: &Credo) -> impl Stream<Item = Result<T>> + use<T> {
        self.into_stream(credo)
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<T, CredoError>)))
            .try_flatten()
    }
}

enum Cursor<T> {
    Ready(Pagination<T>),
    Fetch { query: Query<T>, page: i64, per_page: i64 },
    Done,
}

/// Walks forward from `first`, calling `fetch` for each following page.
fn pages_from<T, F, Fut>(first: Pagination<T>, fetch: F) -> impl Stream<Item = Result<Pagination<T>>>
where
    F: FnMut(Query<T>, i64, i64) -> Fut,
    Fut: Future<Output = Result<Pagination<T>>>,
{
    stream::try_unfold((Cursor::Ready(first), fetch), |(cursor, mut fetch)| async move {
        let current = match cursor {
            Cursor::Ready(current) => current,
            Cursor::Fetch {
                query,
                page,
                per_page,
            } => fetch(query, page, per_page).await?,
            Cursor::Done => return Ok::<_, CredoError>(None),
        };
        let cursor = match current.next_num() {
            Some(page) => Cursor::Fetch {
                query: current.query.clone(),
                page,
                per_page: current.per_page,
            },
            None => Cursor::Done,
        };
        Ok::<_, CredoError>(Some((current, (cursor, fetch))))
    })
}
