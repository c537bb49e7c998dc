//! 谓词构建器
//!
//! 把 `列名 -> 值` 的映射翻译为过滤条件。构建过程是纯函数：只读取映射和表的列元数据，
//! 不做任何I/O。得到的 [`Filter`] 再由 [`push_where`] 渲染进具体后端的
//! [`sqlx::QueryBuilder`]，占位符由后端决定。

use chrono::{DateTime, Utc};
use report_core::{
    parse_time_expression, CombineMode, ComparisonOp, FilterArgs, FilterScalar, FilterValue,
    ReportError, ReportResult, TaskResult,
};
use sqlx::QueryBuilder;
use tracing::warn;

/// 列的值类型，决定绑定参数的类型和谓词形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Bool,
    /// 时间列使用调用方指定的比较运算符
    Time,
    /// 任务结果，大小写不敏感并规范化为存储形式
    Result,
}

/// 可过滤的实体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Playbook,
}

const TASK_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Integer),
    ("timestamp", ColumnKind::Time),
    ("hostname", ColumnKind::Text),
    ("module", ColumnKind::Text),
    ("result", ColumnKind::Result),
    ("changed", ColumnKind::Bool),
    ("user_id", ColumnKind::Integer),
    ("playbook_id", ColumnKind::Integer),
];

const PLAYBOOK_COLUMNS: &[(&str, ColumnKind)] = &[
    ("id", ColumnKind::Integer),
    ("path", ColumnKind::Text),
    ("uuid", ColumnKind::Text),
    ("user_id", ColumnKind::Integer),
    ("connection", ColumnKind::Text),
    ("starttime", ColumnKind::Time),
    ("endtime", ColumnKind::Time),
    ("checksum", ColumnKind::Text),
];

impl Entity {
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Task => "task",
            Entity::Playbook => "playbook",
        }
    }

    pub fn columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Entity::Task => TASK_COLUMNS,
            Entity::Playbook => PLAYBOOK_COLUMNS,
        }
    }

    /// 返回列的静态名称和类型，未知列返回None
    pub fn column(&self, name: &str) -> Option<(&'static str, ColumnKind)> {
        self.columns()
            .iter()
            .find(|(column, _)| *column == name)
            .copied()
    }

    /// 查询结果的排序（降序），未结束的运行排在最后
    pub fn order_by(&self) -> &'static str {
        match self {
            Entity::Task => "timestamp DESC",
            Entity::Playbook => "endtime DESC NULLS LAST",
        }
    }
}

/// 已按列类型规范化的绑定值
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Integer(i64),
    Text(String),
    Bool(bool),
    Time(DateTime<Utc>),
}

/// 单列谓词
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        column: &'static str,
        value: BindValue,
    },
    OneOf {
        column: &'static str,
        values: Vec<BindValue>,
    },
    Compare {
        column: &'static str,
        op: ComparisonOp,
        value: BindValue,
    },
}

impl Predicate {
    pub fn column(&self) -> &'static str {
        match self {
            Predicate::Equals { column, .. }
            | Predicate::OneOf { column, .. }
            | Predicate::Compare { column, .. } => column,
        }
    }
}

/// 构建完成的过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub entity: Entity,
    pub mode: CombineMode,
    pub predicates: Vec<Predicate>,
}

impl Filter {
    /// 不带任何条件的过滤器，匹配全部记录
    pub fn all(entity: Entity) -> Self {
        Self {
            entity,
            mode: CombineMode::Intersection,
            predicates: Vec::new(),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// 从映射构建过滤条件
///
/// 目标实体没有的列会被跳过并记录警告；列表值生成成员测试；时间列使用 `op`
/// 比较；其余列使用相等比较。值与列类型不符时返回 [`ReportError::InvalidFilter`]。
pub fn build_filter(
    entity: Entity,
    args: &FilterArgs,
    op: ComparisonOp,
    mode: CombineMode,
) -> ReportResult<Filter> {
    let now = Utc::now();
    let mut predicates = Vec::with_capacity(args.len());

    for (name, value) in args.iter() {
        let Some((column, kind)) = entity.column(name) else {
            warn!("{} 表没有列 '{}'，忽略该过滤条件", entity.table(), name);
            continue;
        };

        let predicate = match value {
            FilterValue::Many(values) => Predicate::OneOf {
                column,
                values: values
                    .iter()
                    .map(|scalar| normalize(column, kind, scalar, now))
                    .collect::<ReportResult<Vec<_>>>()?,
            },
            FilterValue::One(scalar) if kind == ColumnKind::Time => Predicate::Compare {
                column,
                op,
                value: normalize(column, kind, scalar, now)?,
            },
            FilterValue::One(scalar) => Predicate::Equals {
                column,
                value: normalize(column, kind, scalar, now)?,
            },
        };
        predicates.push(predicate);
    }

    Ok(Filter {
        entity,
        mode,
        predicates,
    })
}

fn normalize(
    column: &str,
    kind: ColumnKind,
    scalar: &FilterScalar,
    now: DateTime<Utc>,
) -> ReportResult<BindValue> {
    let invalid = || {
        ReportError::InvalidFilter(format!("列 '{column}' 不接受值 {scalar:?}"))
    };

    match (kind, scalar) {
        (ColumnKind::Integer, FilterScalar::Integer(i)) => Ok(BindValue::Integer(*i)),
        (ColumnKind::Integer, FilterScalar::Text(s)) => {
            s.trim().parse().map(BindValue::Integer).map_err(|_| invalid())
        }
        (ColumnKind::Text, FilterScalar::Text(s)) => Ok(BindValue::Text(s.clone())),
        (ColumnKind::Text, FilterScalar::Integer(i)) => Ok(BindValue::Text(i.to_string())),
        (ColumnKind::Bool, FilterScalar::Bool(b)) => Ok(BindValue::Bool(*b)),
        (ColumnKind::Bool, FilterScalar::Integer(i)) => Ok(BindValue::Bool(*i != 0)),
        (ColumnKind::Bool, FilterScalar::Text(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(BindValue::Bool(true)),
            "false" | "no" | "0" => Ok(BindValue::Bool(false)),
            _ => Err(invalid()),
        },
        (ColumnKind::Time, FilterScalar::Time(t)) => Ok(BindValue::Time(*t)),
        (ColumnKind::Time, FilterScalar::Text(s)) => parse_time_expression(s, now)
            .map(BindValue::Time)
            .ok_or_else(invalid),
        (ColumnKind::Result, FilterScalar::Text(s)) => s
            .parse::<TaskResult>()
            .map(|result| BindValue::Text(result.as_str().to_string())),
        _ => Err(invalid()),
    }
}

fn push_value<'args, DB>(qb: &mut QueryBuilder<'args, DB>, value: &BindValue)
where
    DB: sqlx::Database,
    i64: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    String: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    bool: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    DateTime<Utc>: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
{
    match value {
        BindValue::Integer(i) => qb.push_bind(*i),
        BindValue::Text(s) => qb.push_bind(s.clone()),
        BindValue::Bool(b) => qb.push_bind(*b),
        BindValue::Time(t) => qb.push_bind(*t),
    };
}

fn push_predicate<'args, DB>(qb: &mut QueryBuilder<'args, DB>, predicate: &Predicate)
where
    DB: sqlx::Database,
    i64: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    String: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    bool: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    DateTime<Utc>: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
{
    match predicate {
        Predicate::Equals { column, value } => {
            qb.push(*column).push(" = ");
            push_value(qb, value);
        }
        Predicate::Compare { column, op, value } => {
            qb.push(*column).push(" ").push(op.as_sql()).push(" ");
            push_value(qb, value);
        }
        // 空列表不匹配任何记录
        Predicate::OneOf { values, .. } if values.is_empty() => {
            qb.push("1 = 0");
        }
        Predicate::OneOf { column, values } => {
            qb.push(*column).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
    }
}

/// 追加WHERE子句；没有谓词时不追加任何内容
pub fn push_where<'args, DB>(qb: &mut QueryBuilder<'args, DB>, filter: &Filter)
where
    DB: sqlx::Database,
    i64: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    String: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    bool: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
    DateTime<Utc>: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
{
    if filter.predicates.is_empty() {
        return;
    }

    let joiner = match filter.mode {
        CombineMode::Intersection => " AND ",
        CombineMode::Union => " OR ",
    };

    qb.push(" WHERE ");
    for (i, predicate) in filter.predicates.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        qb.push("(");
        push_predicate(qb, predicate);
        qb.push(")");
    }
}

/// 追加排序与数量限制，`limit` 为0表示不限制
pub fn push_order_and_limit<'args, DB>(qb: &mut QueryBuilder<'args, DB>, entity: Entity, limit: u64)
where
    DB: sqlx::Database,
    i64: sqlx::Encode<'args, DB> + sqlx::Type<DB>,
{
    qb.push(" ORDER BY ")
        .push(entity.order_by())
        .push(", id DESC");

    if limit > 0 {
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, Sqlite};

    fn render_pg(filter: &Filter) -> String {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM task");
        push_where(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn test_unknown_columns_are_skipped() {
        let args = FilterArgs::new()
            .with("hostname", "web1")
            .with("no_such_column", "x");
        let filter =
            build_filter(Entity::Task, &args, ComparisonOp::Ge, CombineMode::Intersection).unwrap();

        assert_eq!(filter.predicates.len(), 1);
        assert_eq!(filter.predicates[0].column(), "hostname");
    }

    #[test]
    fn test_predicate_kinds() {
        let since = Utc::now();
        let args = FilterArgs::new()
            .with("result", vec!["failed", "ERROR"])
            .with("timestamp", since)
            .with("changed", "yes");
        let filter =
            build_filter(Entity::Task, &args, ComparisonOp::Ge, CombineMode::Intersection).unwrap();

        assert_eq!(
            filter.predicates,
            vec![
                Predicate::Equals {
                    column: "changed",
                    value: BindValue::Bool(true)
                },
                Predicate::OneOf {
                    column: "result",
                    values: vec![
                        BindValue::Text("FAILED".into()),
                        BindValue::Text("ERROR".into())
                    ]
                },
                Predicate::Compare {
                    column: "timestamp",
                    op: ComparisonOp::Ge,
                    value: BindValue::Time(since)
                },
            ]
        );
    }

    #[test]
    fn test_intersection_and_union_rendering() {
        let args = FilterArgs::new()
            .with("hostname", vec!["a", "b"])
            .with("module", "copy");

        let and = build_filter(Entity::Task, &args, ComparisonOp::Ge, CombineMode::Intersection)
            .unwrap();
        assert_eq!(
            render_pg(&and),
            "SELECT id FROM task WHERE (hostname IN ($1, $2)) AND (module = $3)"
        );

        let or = build_filter(Entity::Task, &args, ComparisonOp::Ge, CombineMode::Union).unwrap();
        assert_eq!(
            render_pg(&or),
            "SELECT id FROM task WHERE (hostname IN ($1, $2)) OR (module = $3)"
        );
    }

    #[test]
    fn test_time_column_uses_operator() {
        let args = FilterArgs::new().with("endtime", "2 days ago");
        let filter =
            build_filter(Entity::Playbook, &args, ComparisonOp::Lt, CombineMode::Intersection)
                .unwrap();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM playbook");
        push_where(&mut qb, &filter);
        assert_eq!(qb.sql(), "DELETE FROM playbook WHERE (endtime < ?)");
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let args = FilterArgs::new().with("hostname", Vec::<String>::new());
        let filter =
            build_filter(Entity::Task, &args, ComparisonOp::Ge, CombineMode::Intersection).unwrap();
        assert_eq!(render_pg(&filter), "SELECT id FROM task WHERE (1 = 0)");
    }

    #[test]
    fn test_no_predicates_no_where() {
        let filter = build_filter(
            Entity::Task,
            &FilterArgs::new().with("bogus", 1),
            ComparisonOp::Ge,
            CombineMode::Union,
        )
        .unwrap();
        assert!(filter.is_unscoped());
        assert_eq!(render_pg(&filter), "SELECT id FROM task");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_result = FilterArgs::new().with("result", "exploded");
        assert!(matches!(
            build_filter(Entity::Task, &bad_result, ComparisonOp::Ge, CombineMode::Intersection),
            Err(ReportError::InvalidFilter(_))
        ));

        let bad_time = FilterArgs::new().with("timestamp", "whenever");
        assert!(
            build_filter(Entity::Task, &bad_time, ComparisonOp::Ge, CombineMode::Intersection)
                .is_err()
        );
    }

    #[test]
    fn test_order_and_limit() {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM playbook");
        push_order_and_limit(&mut qb, Entity::Playbook, 10);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM playbook ORDER BY endtime DESC NULLS LAST, id DESC LIMIT $1"
        );

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM task");
        push_order_and_limit(&mut qb, Entity::Task, 0);
        assert_eq!(qb.sql(), "SELECT id FROM task ORDER BY timestamp DESC, id DESC");
    }
}
