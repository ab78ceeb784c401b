use serde::{Deserialize, Serialize};

use super::id::ObjectId;

/// 带 ID 的实体 / Entity that carries its own id
pub trait Identified {
    fn id(&self) -> ObjectId;
}

/// 引用：仅 ID 或已展开的实体 / Reference: bare id or resolved entity
///
/// 序列化为 `{"kind":"id","id":..}` 或 `{"kind":"resolved","value":{..}}`。
/// Serialized as `{"kind":"id","id":..}` or `{"kind":"resolved","value":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference<T> {
    Id { id: ObjectId },
    Resolved { value: T },
}

impl<T: Identified> Reference<T> {
    /// 有实体则展开，否则仅保留 ID / Resolved when the entity is known, bare id otherwise
    pub fn from_lookup(id: ObjectId, found: Option<T>) -> Self {
        match found {
            Some(value) => Reference::Resolved { value },
            None => Reference::Id { id },
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Reference::Id { id } => *id,
            Reference::Resolved { value } => value.id(),
        }
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Reference::Resolved { value } => Some(value),
            Reference::Id { .. } => None,
        }
    }
}
