//! Incremental list loading
//!
//! A `ListLoader` accumulates pages of items fetched one after another.
//! The only signal that the source is exhausted is an empty page. A failed
//! page discards everything loaded so far and leaves the list in `Err`,
//! so a caller never renders a partial list next to an error.
//!
//! Loaders are cheap handles over shared state: clone one into the task
//! that fetches and keep another for reading snapshots. At most one `more`
//! runs at a time; a second call while a page is in flight returns at once.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use libhubs::types::Cursor;

use crate::fetch::CancelHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Loading,
    Ok,
    Err,
}

/// Snapshot of a list
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub status: ListStatus,
    /// More items may exist past the last one
    pub has_more: bool,
}

impl<T> ListState<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            status: ListStatus::Loading,
            has_more: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ListStatus::Loading
    }
}

struct Shared<T> {
    list: ListState<T>,
    /// Bumped by `reload`; pages requested under an older epoch are dropped
    epoch: u64,
    /// Epoch of the `more` currently in flight
    pending_more: Option<u64>,
}

/// Clears the in-flight marker however `more` ends, including being dropped
struct PendingMore<'a, T> {
    shared: &'a Mutex<Shared<T>>,
    epoch: u64,
}

impl<T> Drop for PendingMore<'_, T> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        if shared.pending_more == Some(self.epoch) {
            shared.pending_more = None;
        }
    }
}

pub struct ListLoader<T> {
    shared: Arc<Mutex<Shared<T>>>,
    cancel: CancelHandle,
}

impl<T> Clone for ListLoader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Clone> ListLoader<T> {
    /// Fresh loader: `Loading` with `has_more` set
    pub fn new(initial: Vec<T>) -> Self {
        Self::with_cancel(initial, CancelHandle::new())
    }

    /// Loader whose late pages are dropped once `cancel` fires
    pub fn with_cancel(initial: Vec<T>, cancel: CancelHandle) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                list: ListState::new(initial),
                epoch: 0,
                pending_more: None,
            })),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ListState<T> {
        self.lock().list.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().list.items.clone()
    }

    pub fn status(&self) -> ListStatus {
        self.lock().list.status
    }

    pub fn has_more(&self) -> bool {
        self.lock().list.has_more
    }

    pub fn len(&self) -> usize {
        self.lock().list.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle for the owner's teardown path
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Replace every item; status and `has_more` are left alone
    pub fn set_items(&self, items: Vec<T>) {
        self.lock().list.items = items;
    }

    /// Put `item` in front of the loaded items
    pub fn prepend(&self, item: T) {
        self.lock().list.items.insert(0, item);
    }

    /// Fetch the next page and append it
    ///
    /// While the request is in flight the list reports `Loading` with
    /// `has_more` cleared. If another `more` is already in flight this
    /// returns `Loading` without calling `fetch_page`. Returns the resulting
    /// status.
    pub async fn more<F, Fut, E>(&self, fetch_page: F) -> ListStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        E: fmt::Display,
    {
        let epoch = {
            let mut shared = self.lock();
            if shared.pending_more == Some(shared.epoch) {
                tracing::debug!("Next page already in flight");
                return shared.list.status;
            }
            shared.pending_more = Some(shared.epoch);
            shared.list.status = ListStatus::Loading;
            shared.list.has_more = false;
            shared.epoch
        };
        let _pending = PendingMore {
            shared: &self.shared,
            epoch,
        };

        self.fetch(epoch, fetch_page, false).await
    }

    /// Drop every item and load the first page again
    ///
    /// Any page still in flight from before the reload is discarded when it
    /// arrives.
    pub async fn reload<F, Fut, E>(&self, fetch_page: F) -> ListStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        E: fmt::Display,
    {
        let epoch = {
            let mut shared = self.lock();
            shared.epoch += 1;
            shared.list.items.clear();
            shared.list.status = ListStatus::Loading;
            shared.list.has_more = false;
            shared.epoch
        };

        self.fetch(epoch, fetch_page, true).await
    }

    async fn fetch<F, Fut, E>(&self, epoch: u64, fetch_page: F, replace: bool) -> ListStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        E: fmt::Display,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("List torn down while a page was in flight");
                self.status()
            }
            result = fetch_page() => self.apply(epoch, result, replace),
        }
    }

    fn apply<E: fmt::Display>(
        &self,
        epoch: u64,
        result: Result<Vec<T>, E>,
        replace: bool,
    ) -> ListStatus {
        if self.cancel.is_cancelled() {
            tracing::debug!("Discarding page for cancelled list");
            return self.status();
        }

        let mut shared = self.lock();
        if shared.epoch != epoch {
            tracing::debug!("Discarding page for reloaded list");
            return shared.list.status;
        }

        let list = &mut shared.list;
        match result {
            Ok(page) => {
                list.has_more = !page.is_empty();
                if replace {
                    list.items = page;
                } else {
                    list.items.extend(page);
                }
                list.status = ListStatus::Ok;
            }
            Err(e) => {
                tracing::warn!("Failed to load list page: {}", e);
                list.items.clear();
                list.status = ListStatus::Err;
                list.has_more = false;
            }
        }
        list.status
    }
}

impl<T: Clone + Cursor> ListLoader<T> {
    /// Cursor for the next page: the id of the last loaded item
    pub fn after(&self) -> Option<String> {
        self.lock()
            .list
            .items
            .last()
            .map(|item| item.cursor().to_string())
    }
}

impl<T: fmt::Debug> fmt::Debug for ListLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("ListLoader")
            .field("status", &shared.list.status)
            .field("has_more", &shared.list.has_more)
            .field("len", &shared.list.items.len())
            .finish()
    }
}
