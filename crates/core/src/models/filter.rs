use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个过滤值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterScalar {
    Bool(bool),
    Integer(i64),
    Time(DateTime<Utc>),
    Text(String),
}

impl FilterScalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterScalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FilterScalar {
    fn from(value: &str) -> Self {
        FilterScalar::Text(value.to_string())
    }
}

impl From<String> for FilterScalar {
    fn from(value: String) -> Self {
        FilterScalar::Text(value)
    }
}

impl From<i64> for FilterScalar {
    fn from(value: i64) -> Self {
        FilterScalar::Integer(value)
    }
}

impl From<bool> for FilterScalar {
    fn from(value: bool) -> Self {
        FilterScalar::Bool(value)
    }
}

impl From<DateTime<Utc>> for FilterScalar {
    fn from(value: DateTime<Utc>) -> Self {
        FilterScalar::Time(value)
    }
}

/// 列的过滤值：单值（相等/比较）或列表（成员测试）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(FilterScalar),
    Many(Vec<FilterScalar>),
}

macro_rules! impl_filter_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::One(value.into())
                }
            }

            impl From<Vec<$ty>> for FilterValue {
                fn from(values: Vec<$ty>) -> Self {
                    FilterValue::Many(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

impl_filter_value_from!(&str, String, i64, bool, DateTime<Utc>);

impl From<FilterScalar> for FilterValue {
    fn from(value: FilterScalar) -> Self {
        FilterValue::One(value)
    }
}

impl From<Vec<FilterScalar>> for FilterValue {
    fn from(values: Vec<FilterScalar>) -> Self {
        FilterValue::Many(values)
    }
}

/// 列名到过滤值的映射
///
/// 使用有序映射，生成的SQL与参数顺序因此是确定的。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterArgs(BTreeMap<String, FilterValue>);

impl FilterArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, column: &str) -> Option<&FilterValue> {
        self.0.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for FilterArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 多列条件的组合方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMode {
    /// 各列条件AND
    #[default]
    Intersection,
    /// 各列条件OR
    Union,
}

/// 时间列使用的比较运算符
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    #[default]
    Ge,
    Eq,
    Ne,
}

impl ComparisonOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_args_builder() {
        let args = FilterArgs::new()
            .with("hostname", "web1")
            .with("result", vec!["FAILED", "ERROR"])
            .with("changed", true);

        assert_eq!(args.len(), 3);
        assert_eq!(
            args.get("hostname"),
            Some(&FilterValue::One(FilterScalar::Text("web1".into())))
        );
        assert!(matches!(args.get("result"), Some(FilterValue::Many(v)) if v.len() == 2));

        // 按列名排序
        let columns: Vec<_> = args.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(columns, vec!["changed", "hostname", "result"]);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(CombineMode::default(), CombineMode::Intersection);
        assert_eq!(ComparisonOp::default().as_sql(), ">=");
        assert_eq!(ComparisonOp::Lt.as_sql(), "<");
    }
}
