//! 仓库操作的错误上下文
//!
//! 为数据库错误附加实体与操作信息并记录日志。驱动错误本身原样保留在
//! [`ReportError::Database`] 中，重试执行器依赖它判断错误是否可重试。

use std::fmt;

use chrono::{DateTime, Utc};
use report_core::ReportError;
use sqlx::Error as SqlxError;
use tracing::{debug, error, info};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Schema,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "读取"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Schema => write!(f, "建表"),
            RepositoryOperation::Migrate => write!(f, "迁移"),
        }
    }
}

/// 一次仓库操作的上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: &'static str,
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn entity_description(&self) -> String {
        match (self.id, &self.additional_info) {
            (Some(id), Some(info)) => format!("{} (ID: {}, {})", self.entity, id, info),
            (Some(id), None) => format!("{} (ID: {})", self.entity, id),
            (None, Some(info)) => format!("{} ({})", self.entity, info),
            (None, None) => self.entity.to_string(),
        }
    }
}

/// Error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// 记录数据库错误并转换为 [`ReportError`]
    pub fn database_error(context: &OperationContext, error: SqlxError) -> ReportError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();
        let error = ReportError::Database(error);

        if error.is_transient() {
            debug!(error = %error, "{}{}时遇到瞬时错误", operation_desc, entity_desc);
        } else if error.is_unique_violation() {
            debug!(error = %error, "{}{}时发生唯一约束冲突", operation_desc, entity_desc);
        } else {
            error!(
                error = %error,
                operation = %context.operation,
                timestamp = %context.timestamp,
                "{}{}时发生数据库错误",
                operation_desc,
                entity_desc
            );
        }

        error
    }

    pub fn log_operation_success(context: &OperationContext, additional_info: Option<&str>) {
        let base_msg = format!(
            "{}{}成功",
            context.operation,
            context.entity_description()
        );

        if let Some(info) = additional_info {
            info!("{}: {}", base_msg, info);
        } else {
            info!("{}", base_msg);
        }
    }
}

/// 快速构造操作上下文
#[macro_export]
macro_rules! op_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_id($id)
    };
    ($operation:expr, $entity:expr, info = $info:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
            .with_additional_info($info)
    };
}
