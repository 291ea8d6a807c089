//! Web Storage exposed as a [`KeyValueStore`].

use crate::script;
use adwatch_core::{KeyValueStore, StorageError};
use async_trait::async_trait;
use chromiumoxide::Page;
use serde::Deserialize;

/// Which Web Storage area to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// `sessionStorage`: tab-scoped, holds the per-path memo
    Session,
    /// `localStorage`: survives reloads, holds the cooldown timestamp and modal choice
    Local,
}

impl StorageArea {
    fn global(self) -> &'static str {
        match self {
            Self::Session => "sessionStorage",
            Self::Local => "localStorage",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// One storage area of a page.
///
/// A page that forbids storage (sandboxed frames, some private modes) answers
/// with [`StorageError::Unavailable`].
#[derive(Clone)]
pub struct PageStorage {
    page: Page,
    area: StorageArea,
}

impl PageStorage {
    /// Storage `area` of `page`.
    pub fn new(page: Page, area: StorageArea) -> Self {
        Self { page, area }
    }

    /// `sessionStorage` of `page`.
    pub fn session(page: Page) -> Self {
        Self::new(page, StorageArea::Session)
    }

    /// `localStorage` of `page`.
    pub fn local(page: Page) -> Self {
        Self::new(page, StorageArea::Local)
    }

    async fn call(&self, op: &str, key: &str, value: Option<&str>) -> Result<Option<String>, StorageError> {
        let reply: Reply =
            script::evaluate(&self.page, script::storage(self.area.global(), op, key, value)).await?;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(StorageError::Unavailable(
                reply.error.unwrap_or_else(|| format!("{} refused access", self.area.global())),
            ))
        }
    }
}

#[async_trait]
impl KeyValueStore for PageStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.call("get", key, None).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.call("set", key, Some(value)).await.map(|_| ())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.call("remove", key, None).await.map(|_| ())
    }
}
