use serde::{Deserialize, Serialize};

/// 批量操作的原子性策略
///
/// `PartialSuccess` 逐个元素生效，遇到第一个失败即返回，之前已生效的元素保留。
/// `AllOrNothing` 先校验整批（包括批内重复），任一元素会失败则整批不生效。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    #[default]
    PartialSuccess,
    AllOrNothing,
}

impl BulkMode {
    pub fn is_all_or_nothing(self) -> bool {
        self == BulkMode::AllOrNothing
    }
}
