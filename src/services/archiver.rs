//! 归档服务 - 业务能力层
//!
//! 批处理结束后把下载的文件和台账移动到带时间戳的目录

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{CdaError, Result};

/// 浏览器下载未完成时的临时文件扩展名
const PARTIAL_DOWNLOAD_EXTENSIONS: [&str; 3] = ["crdownload", "part", "tmp"];

/// 归档结果
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub folder: PathBuf,
    /// 已移入归档目录的文件（新路径）
    pub moved: Vec<PathBuf>,
    /// 台账的新位置；台账移动失败时为 `None`
    pub ledger_path: Option<PathBuf>,
    /// 部分文件移动失败时的说明
    pub warnings: Vec<String>,
}

/// 归档服务
pub struct Archiver {
    extension: String,
}

impl Archiver {
    /// `extension` 不区分大小写，可带或不带前导点
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim().trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// 等待下载目录中未完成的下载结束，超时返回 `false`
    pub async fn await_pending_downloads(&self, download_dir: &Path, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = count_matching(download_dir, is_partial_download).await;
            if pending == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    "⚠️ 仍有 {} 个下载未完成，等待 {:?} 后继续归档",
                    pending, timeout
                );
                return false;
            }
            debug!("等待 {} 个下载完成...", pending);
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// 创建归档目录，移动所有下载文件，再移动台账
    ///
    /// 只有归档目录无法创建时返回错误；单个文件移动失败记录在 `warnings` 中。
    pub async fn archive(
        &self,
        download_dir: &Path,
        ledger_path: Option<&Path>,
    ) -> Result<ArchiveReport> {
        let folder = create_archive_folder(download_dir).await?;
        let mut report = ArchiveReport {
            folder: folder.clone(),
            ..Default::default()
        };

        let mut entries = fs::read_dir(download_dir)
            .await
            .map_err(|e| CdaError::archive(download_dir, e))?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report
                        .warnings
                        .push(format!("读取目录 {} 失败: {}", download_dir.display(), e));
                    break;
                }
            };

            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !self.is_artifact(&path) {
                continue;
            }

            let target = folder.join(entry.file_name());
            match move_file(&path, &target).await {
                Ok(()) => report.moved.push(target),
                Err(e) => {
                    warn!("⚠️ 移动 {} 失败: {}", path.display(), e);
                    report.warnings.push(format!("移动 {} 失败: {}", path.display(), e));
                }
            }
        }

        if let Some(ledger) = ledger_path {
            report.ledger_path = self.move_ledger(ledger, &folder, &mut report.warnings).await;
        }

        info!(
            "✅ 已归档 {} 个文件到: {}",
            report.moved.len(),
            folder.display()
        );
        Ok(report)
    }

    async fn move_ledger(
        &self,
        ledger: &Path,
        folder: &Path,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        let Some(name) = ledger.file_name() else {
            warnings.push(format!("台账路径无效: {}", ledger.display()));
            return None;
        };
        let target = folder.join(name);
        match move_file(ledger, &target).await {
            Ok(()) => Some(target),
            Err(e) => {
                warn!("⚠️ 移动台账 {} 失败: {}", ledger.display(), e);
                warnings.push(format!("移动台账 {} 失败: {}", ledger.display(), e));
                None
            }
        }
    }

    fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

/// 在下载目录下创建 `CDAs_<时间戳>`，同名已存在时追加序号
async fn create_archive_folder(download_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(download_dir)
        .await
        .map_err(|e| CdaError::archive(download_dir, e))?;

    let base = format!("CDAs_{}", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let mut candidate = download_dir.join(&base);
    let mut suffix = 1;

    loop {
        match fs::create_dir(&candidate).await {
            Ok(()) => {
                debug!("归档目录已创建: {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                suffix += 1;
                candidate = download_dir.join(format!("{}_{}", base, suffix));
            }
            Err(e) => return Err(CdaError::archive(&candidate, e)),
        }
    }
}

/// 移动文件；跨文件系统时退化为复制后删除
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if fs::copy(from, to).await.is_err() {
                return Err(rename_err);
            }
            fs::remove_file(from).await
        }
    }
}

fn is_partial_download(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PARTIAL_DOWNLOAD_EXTENSIONS
                .iter()
                .any(|p| ext.eq_ignore_ascii_case(p))
        })
        .unwrap_or(false)
}

async fn count_matching(dir: &Path, matches: impl Fn(&str) -> bool) -> usize {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if matches(&entry.file_name().to_string_lossy()) {
            count += 1;
        }
    }
    count
}
