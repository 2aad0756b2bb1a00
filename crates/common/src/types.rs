//! 通用类型定义

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 主体 ID（被授予角色的用户或凭证）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

/// 记录时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_id_round_trip() {
        let id = PrincipalId::new();
        let parsed = PrincipalId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(PrincipalId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_touch_moves_updated_at_only() {
        let mut stamps = Timestamps::new();
        let created = stamps.created_at;
        stamps.touch();
        assert_eq!(stamps.created_at, created);
        assert!(stamps.updated_at >= created);
    }
}
