use serde::{Deserialize, Serialize};

/// 已持久化的用户记录
///
/// 以 (username, euid) 唯一标识，创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub euid: String,
}

/// 写入事件时的调用者身份
///
/// 在提权运行（sudo等）时登录名和有效身份会不同，因此两者都要记录。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub euid: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, euid: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            euid: euid.into(),
        }
    }

    /// 是否处于提权运行状态
    pub fn is_elevated(&self) -> bool {
        self.username != self.euid
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (effective {})", self.username, self.euid)
    }
}
