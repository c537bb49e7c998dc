use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 无法从版本控制取得校验值时使用的占位符
pub const CHECKSUM_UNAVAILABLE: &str = "NA";

/// 一次自动化脚本运行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Playbook {
    pub id: i64,
    pub path: String,
    pub uuid: String,
    pub user_id: i64,
    pub connection: String,
    pub starttime: DateTime<Utc>,
    pub endtime: Option<DateTime<Utc>>,
    pub checksum: String,
}

impl Playbook {
    pub fn is_finished(&self) -> bool {
        self.endtime.is_some()
    }

    /// 运行耗时，未结束的运行返回None
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.endtime.map(|end| end - self.starttime)
    }

    pub fn entity_description(&self) -> String {
        format!("运行 '{}' (ID: {}, UUID: {})", self.path, self.id, self.uuid)
    }
}

/// 创建运行记录所需的字段
#[derive(Debug, Clone)]
pub struct NewPlaybook {
    pub path: String,
    pub uuid: String,
    pub connection: String,
    pub starttime: DateTime<Utc>,
    pub checksum: String,
}

impl NewPlaybook {
    /// 生成带时间有序UUID的新运行
    pub fn new(path: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            uuid: uuid::Uuid::now_v7().to_string(),
            connection: connection.into(),
            starttime: Utc::now(),
            checksum: CHECKSUM_UNAVAILABLE.to_string(),
        }
    }

    pub fn with_starttime(mut self, starttime: DateTime<Utc>) -> Self {
        self.starttime = starttime;
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_playbook_defaults() {
        let first = NewPlaybook::new("site.yml", "ssh");
        let second = NewPlaybook::new("site.yml", "ssh");

        assert_eq!(first.checksum, CHECKSUM_UNAVAILABLE);
        assert_ne!(first.uuid, second.uuid);
        assert!(first.starttime <= Utc::now());
    }

    #[test]
    fn test_duration_requires_endtime() {
        let start = Utc::now();
        let mut playbook = Playbook {
            id: 1,
            path: "site.yml".to_string(),
            uuid: "u".to_string(),
            user_id: 1,
            connection: "ssh".to_string(),
            starttime: start,
            endtime: None,
            checksum: CHECKSUM_UNAVAILABLE.to_string(),
        };
        assert!(!playbook.is_finished());
        assert_eq!(playbook.duration(), None);

        playbook.endtime = Some(start + chrono::Duration::seconds(42));
        assert_eq!(playbook.duration(), Some(chrono::Duration::seconds(42)));
    }
}
