//! 单次批处理 - 编排层
//!
//! ## 职责
//!
//! 1. **加载清单**：读取 CDA 列表，按配置去重
//! 2. **续跑过滤**：跳过历史台账中已成功的 CDA
//! 3. **建立会话**：登录并进入提交页面（失败则整个运行中止）
//! 4. **顺序处理**：逐个委托 `RetrievalFlow`，每个 CDA 之间检查取消
//! 5. **归档**：循环结束后把下载文件和台账移到时间戳目录

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CdaError, Result};
use crate::models::{apply_duplicate_policy, load_certificate_list, CertificateId, Credentials, RunSummary};
use crate::services::progress::COMPLETION_MESSAGE;
use crate::services::{compute_resume_set, Archiver, ProgressSink, ResultLedger, SessionDriver};
use crate::utils::logging::log_list_loaded;
use crate::workflow::{ProcessResult, RetrievalCtx, RetrievalFlow, RetryPolicy};

/// 一次批处理的输入
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub list_path: PathBuf,
    pub credentials: Credentials,
    pub download_dir: PathBuf,
    /// 续跑：追加到 `Config::ledger_path` 并跳过其中已成功的 CDA
    pub continuation: bool,
}

impl BatchRequest {
    pub fn from_config(config: &Config) -> Result<Self> {
        let list_path = config
            .list_file
            .clone()
            .ok_or_else(|| CdaError::Config("未指定 CDA 清单文件 (CDA_LIST_FILE)".into()))?;

        Ok(Self {
            list_path,
            credentials: config.credentials.clone(),
            download_dir: config.download_dir.clone(),
            continuation: config.continuation,
        })
    }
}

/// 创建（如不存在）并返回下载目录的绝对路径
pub fn prepare_download_dir(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        info!("📁 下载目录已存在: {}", path.display());
    } else {
        std::fs::create_dir_all(path).map_err(|e| {
            CdaError::Config(format!("无法创建下载目录 {}: {}", path.display(), e))
        })?;
        info!("📁 下载目录不存在，已创建: {}", path.display());
    }

    path.canonicalize()
        .map_err(|e| CdaError::Config(format!("无法解析下载目录 {}: {}", path.display(), e)))
}

/// 执行一次完整的批处理
///
/// 清单错误、配置错误、登录或导航失败、台账读写失败时返回错误；其余情况
/// 总是返回 `RunSummary`（单个 CDA 的失败和归档问题都记录在其中）。
pub async fn run_batch<D>(
    driver: &D,
    request: &BatchRequest,
    config: &Config,
    progress: Option<&dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<RunSummary>
where
    D: SessionDriver,
{
    config.validate()?;

    // ========== 会话之前：清单与续跑集合 ==========
    let ids = load_certificate_list(&request.list_path).await?;
    let ids = apply_duplicate_policy(ids, config.duplicate_policy);

    let ledger_path = resolve_ledger_path(request, config)?;
    let resume = if request.continuation {
        compute_resume_set(&ledger_path)?
    } else {
        HashSet::new()
    };

    let (pending, skipped) = filter_resumed(ids, &resume);
    log_list_loaded(pending.len(), skipped);

    if !request.credentials.is_complete() {
        return Err(CdaError::Config("缺少登录凭据".into()));
    }
    let download_dir = prepare_download_dir(&request.download_dir)?;

    // ========== 登录并进入提交页面 ==========
    let session = driver.authenticate(&request.credentials).await?;
    driver.navigate_to_submission_page(&session).await?;

    // ========== 逐个处理 ==========
    let mut ledger = ResultLedger::open_for_run(&ledger_path, request.continuation)?;
    let flow = RetrievalFlow::new(RetryPolicy::from_config(config));
    let total = pending.len();

    let mut summary = RunSummary {
        total,
        skipped,
        ..Default::default()
    };

    info!("📥 开始下载 {} 个 CDA...", total);

    for (index, id) in pending.into_iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("🛑 收到取消请求，剩余 {} 个 CDA 未处理", total - index);
            summary.cancelled = true;
            break;
        }

        let ctx = RetrievalCtx::new(index + 1, total, id);
        if let Some(sink) = progress {
            sink.notify(ctx.index, total, ctx.id.as_str());
        }

        match flow.run(&session, &ctx, &mut ledger).await? {
            ProcessResult::Success { .. } => summary.success += 1,
            ProcessResult::Failed { .. } => summary.failed += 1,
        }
    }

    if let Some(sink) = progress {
        if total > 0 && !summary.cancelled {
            sink.notify(total, total, COMPLETION_MESSAGE);
        }
    }

    info!("✅ 下载结束: 成功 {}/{}", summary.success, total);

    // ========== 归档 ==========
    let ledger_path = ledger.close()?;
    archive_outputs(config, &download_dir, ledger_path, &mut summary).await;

    Ok(summary)
}

/// 续跑时使用配置的台账，否则在日志目录新建
fn resolve_ledger_path(request: &BatchRequest, config: &Config) -> Result<PathBuf> {
    if request.continuation {
        config
            .ledger_path
            .clone()
            .ok_or_else(|| CdaError::Config("续跑模式需要指定 ledger_path".into()))
    } else {
        Ok(ResultLedger::fresh_path(&config.log_dir))
    }
}

/// 去掉已成功的 CDA，返回 (待处理, 跳过数量)
fn filter_resumed(
    ids: Vec<CertificateId>,
    resume: &HashSet<CertificateId>,
) -> (Vec<CertificateId>, usize) {
    if resume.is_empty() {
        return (ids, 0);
    }
    let before = ids.len();
    let pending: Vec<_> = ids.into_iter().filter(|id| !resume.contains(id)).collect();
    let skipped = before - pending.len();
    (pending, skipped)
}

/// 归档失败只记录警告，不影响已写入的台账
async fn archive_outputs(
    config: &Config,
    download_dir: &Path,
    ledger_path: PathBuf,
    summary: &mut RunSummary,
) {
    let archiver = Archiver::new(&config.artifact_extension());
    archiver
        .await_pending_downloads(download_dir, config.download_wait())
        .await;

    match archiver.archive(download_dir, Some(&ledger_path)).await {
        Ok(report) => {
            summary.archive_folder = Some(report.folder);
            summary.ledger_path = report.ledger_path.unwrap_or(ledger_path);
            summary.archive_warnings = report.warnings;
        }
        Err(e) => {
            warn!("⚠️ 归档失败: {}", e);
            summary.ledger_path = ledger_path;
            summary.archive_warnings.push(e.to_string());
        }
    }
}
