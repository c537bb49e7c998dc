//! # 数据模型
//!
//! 报告系统的三类记录及其辅助类型：
//!
//! - [`User`] - 触发事件的用户身份（登录名 + 有效身份）
//! - [`Playbook`] - 一次自动化脚本运行
//! - [`Task`] - 某台主机在某次运行中的一条执行结果
//!
//! ## 数据库映射
//!
//! ```text
//! user(id, username, euid)                          UNIQUE(username, euid)
//! playbook(id, path, uuid, user_id, connection, starttime, endtime, checksum)
//! task(id, timestamp, hostname, module, result, changed, data, user_id, playbook_id)
//! ```
//!
//! `task.data` 以JSON文本存储，读取时解析失败会原样保留（见 [`Payload`]）。
//! 删除用户或运行记录会级联删除其下的任务。

pub mod filter;
pub mod playbook;
pub mod task;
pub mod user;

pub use filter::*;
pub use playbook::*;
pub use task::*;
pub use user::*;
