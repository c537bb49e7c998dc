//! 跨进程写锁
//!
//! 嵌入式数据库只允许单个写者，多个独立进程同时写入时通过锁文件上的
//! `flock` 互斥。锁与打开的文件描述符绑定，持有者进程退出后由操作系统自动回收。

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use report_core::{DatabaseConfig, ReportError, ReportResult};
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// 锁文件
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 根据数据库配置推导锁文件路径
    ///
    /// 优先使用 `lock_path`；文件数据库使用同目录下的 `.<文件名>.lock`；
    /// 内存数据库使用按有效uid区分的临时路径。
    pub fn for_database(config: &DatabaseConfig) -> Self {
        if let Some(path) = &config.lock_path {
            return Self::new(path);
        }

        if config.is_memory() {
            // SAFETY: geteuid 总是成功且没有副作用
            let uid = unsafe { libc::geteuid() };
            return Self::new(std::env::temp_dir().join(format!("ansible-report-{uid}.lock")));
        }

        let db_path = Path::new(&config.name);
        let dir = match db_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = db_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ansible-report".to_string());

        Self::new(dir.join(format!(".{file_name}.lock")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 阻塞直到获得排他锁
    ///
    /// 加锁在阻塞线程池中进行，不会占用异步运行时的工作线程。返回的 [`LockGuard`]
    /// 被释放或丢弃时解锁。
    pub async fn acquire(&self) -> ReportResult<LockGuard> {
        let path = self.path.clone();
        let (acquired_tx, acquired_rx) = oneshot::channel::<ReportResult<()>>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        tokio::task::spawn_blocking(move || {
            let file = match OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)
            {
                Ok(file) => file,
                Err(e) => {
                    let _ = acquired_tx.send(Err(ReportError::lock(format!(
                        "无法打开锁文件 {}: {e}",
                        path.display()
                    ))));
                    return;
                }
            };

            let mut lock = fd_lock::RwLock::new(file);
            let guard = match lock.write() {
                Ok(guard) => guard,
                Err(e) => {
                    let _ = acquired_tx.send(Err(ReportError::lock(format!(
                        "无法锁定 {}: {e}",
                        path.display()
                    ))));
                    return;
                }
            };

            // 等待方已经放弃
            if acquired_tx.send(Ok(())).is_err() {
                return;
            }

            // 发送端被丢弃同样视为释放
            let _ = release_rx.blocking_recv();
            drop(guard);
            trace!("已释放锁 {}", path.display());
        });

        match acquired_rx.await {
            Ok(Ok(())) => {
                debug!("已获得锁 {}", self.path.display());
                Ok(LockGuard {
                    release: Some(release_tx),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ReportError::lock(format!(
                "加锁线程意外退出: {}",
                self.path.display()
            ))),
        }
    }
}

/// 持有中的锁
#[derive(Debug)]
pub struct LockGuard {
    release: Option<oneshot::Sender<()>>,
}

impl LockGuard {
    /// 释放锁，可重复调用
    pub fn release(&mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_held(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}
