use std::path::Path;

use report_core::models::CHECKSUM_UNAVAILABLE;
use tokio::process::Command;
use tracing::debug;

const CHECKSUM_LEN: usize = 10;

/// 脚本所在目录的版本控制提交号（前10位）
///
/// 任何失败（目录不存在、不在仓库中、git不可用）都返回 "NA"。
pub async fn playbook_checksum(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let head = String::from_utf8_lossy(&output.stdout);
            let head = head.trim();
            if head.is_empty() {
                return CHECKSUM_UNAVAILABLE.to_string();
            }
            head.chars().take(CHECKSUM_LEN).collect()
        }
        Ok(output) => {
            debug!(
                "无法获取 {} 的提交号: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            CHECKSUM_UNAVAILABLE.to_string()
        }
        Err(e) => {
            debug!("无法执行git: {e}");
            CHECKSUM_UNAVAILABLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        assert_eq!(
            playbook_checksum("/nonexistent/dir/site.yml").await,
            CHECKSUM_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_untracked_directory_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let playbook = dir.path().join("site.yml");
        assert_eq!(playbook_checksum(&playbook).await, CHECKSUM_UNAVAILABLE);
    }
}
