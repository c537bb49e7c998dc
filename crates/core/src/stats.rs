//! 任务结果聚合
//!
//! 把任务序列折叠为 `主机 -> 结果分类 -> 计数`。每台出现过的主机都会先填充所有
//! 分类为0，缺失的结果因此表现为0而不是缺键。

use std::collections::BTreeMap;

use crate::models::{Task, TaskResult};

/// 单台主机的分类计数
pub type OutcomeCounts = BTreeMap<String, u64>;

/// 按主机汇总的计数
pub type HostStats = BTreeMap<String, OutcomeCounts>;

/// 所有分类都为0的计数表
pub fn empty_counts() -> OutcomeCounts {
    TaskResult::ALL
        .iter()
        .map(|result| (result.key().to_string(), 0))
        .collect()
}

fn record(stats: &mut HostStats, task: &Task) {
    let counts = stats
        .entry(task.hostname.clone())
        .or_insert_with(empty_counts);

    *counts.entry(task.result.key().to_string()).or_insert(0) += 1;

    // CHANGED结果本身已经计入changed
    if task.changed && task.result != TaskResult::Changed {
        *counts
            .entry(TaskResult::Changed.key().to_string())
            .or_insert(0) += 1;
    }
}

/// 单个任务的统计
pub fn task_stats(task: &Task) -> HostStats {
    let mut stats = HostStats::new();
    record(&mut stats, task);
    stats
}

/// 一次运行下所有任务的统计
pub fn playbook_stats<'a, I>(tasks: I) -> HostStats
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut stats = HostStats::new();
    for task in tasks {
        record(&mut stats, task);
    }
    stats
}

/// 把 `other` 累加进 `into`
pub fn merge_stats(into: &mut HostStats, other: &HostStats) {
    for (host, counts) in other {
        let target = into.entry(host.clone()).or_insert_with(empty_counts);
        for (category, count) in counts {
            *target.entry(category.clone()).or_insert(0) += count;
        }
    }
}

/// 所有主机按分类求和
pub fn totals(stats: &HostStats) -> OutcomeCounts {
    let mut totals = empty_counts();
    for counts in stats.values() {
        for (category, count) in counts {
            *totals.entry(category.clone()).or_insert(0) += count;
        }
    }
    totals
}
