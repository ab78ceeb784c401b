use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{ObjectId, Reference, UserSummary};

use super::display;
use super::http::ClientError;

/// 用户资料来源 / Where user summaries come from
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// 不存在时返回 Ok(None) / Ok(None) when the user is unknown
    async fn fetch_user(&self, id: ObjectId) -> Result<Option<UserSummary>, ClientError>;
}

/// 资料缓存：命中与未命中都会缓存，错误不缓存
/// Profile cache: hits and misses are cached, errors are not
pub struct ProfileCache<S> {
    source: S,
    entries: DashMap<ObjectId, Option<UserSummary>>,
}

impl<S: ProfileSource> ProfileCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cached(&self, id: ObjectId) -> Option<Option<UserSummary>> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub async fn user(&self, id: ObjectId) -> Result<Option<UserSummary>, ClientError> {
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }
        let fetched = self.source.fetch_user(id).await?;
        debug!("👤 Profile {} fetched (found={})", id, fetched.is_some());
        self.entries.insert(id, fetched.clone());
        Ok(fetched)
    }

    /// 展开引用；仅有 ID 时按需拉取 / Resolve a reference, fetching on demand for bare ids
    pub async fn resolve(&self, reference: &Reference<UserSummary>) -> Result<Option<UserSummary>, ClientError> {
        match reference {
            Reference::Resolved { value } => Ok(Some(value.clone())),
            Reference::Id { id } => self.user(*id).await,
        }
    }

    /// 显示名；拉取失败时退回占位名 / Display name, placeholder when fetching fails
    pub async fn display_name(&self, reference: &Reference<UserSummary>) -> String {
        match self.resolve(reference).await {
            Ok(Some(user)) => display::name_of(&user),
            Ok(None) => display::placeholder(reference.id()),
            Err(e) => {
                debug!("Profile lookup for {} failed: {}", reference.id(), e);
                display::placeholder(reference.id())
            }
        }
    }
}
