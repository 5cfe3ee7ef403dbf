//! CDA 下载流程 - 流程层
//!
//! 核心职责：定义"一个 CDA"的完整处理流程
//!
//! 流程顺序：
//! 1. 填入编号 → 搜索 → 等待下载按钮 → 点击下载
//! 2. 任一步失败视为本次尝试失败，短暂停顿后重试
//! 3. 成功或重试耗尽时写入台账（每个 CDA 只写一行）

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, RetrievalError};
use crate::models::LedgerEntry;
use crate::services::{CertificatePortal, ResultLedger};
use crate::utils::logging::truncate_text;
use crate::workflow::retrieval_ctx::RetrievalCtx;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 首次尝试之外最多再试几次
    pub max_retries: u32,
    /// 两次尝试之间的停顿
    pub retry_pause: Duration,
    /// 下载成功后等待文件落盘的停顿
    pub settle_pause: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_pause: config.retry_pause(),
            settle_pause: config.settle_pause(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 单个 CDA 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// 第 `attempts` 次尝试成功
    Success { attempts: u32 },
    /// 共尝试 `attempts` 次均失败
    Failed { attempts: u32 },
}

impl ProcessResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessResult::Success { .. })
    }
}

/// CDA 下载流程
///
/// - 只处理单个 CDA
/// - 不持有页面资源，只依赖 `CertificatePortal`
/// - 页面错误在这里被吸收为重试，只有台账写入失败才向上返回
pub struct RetrievalFlow {
    policy: RetryPolicy,
}

impl RetrievalFlow {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn run<P>(
        &self,
        portal: &P,
        ctx: &RetrievalCtx,
        ledger: &mut ResultLedger,
    ) -> Result<ProcessResult>
    where
        P: CertificatePortal + ?Sized,
    {
        let mut failures: u32 = 0;

        loop {
            let attempt = failures + 1;
            info!("{} 📥 第 {} 次尝试", ctx, attempt);

            match self.attempt(portal, ctx).await {
                Ok(()) => {
                    ledger.append(&LedgerEntry::success(ctx.id.clone(), attempt))?;
                    info!("{} ✅ 下载成功", ctx);
                    // 等待文件落盘再处理下一个
                    sleep(self.policy.settle_pause).await;
                    return Ok(ProcessResult::Success { attempts: attempt });
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "{} ⚠️ 第 {} 次尝试失败: {}",
                        ctx,
                        attempt,
                        truncate_text(&e.to_string(), 200)
                    );

                    if failures > self.policy.max_retries {
                        let exhausted = RetrievalError::RetrievalExhausted {
                            attempts: failures,
                            last: Box::new(e),
                        };
                        ledger.append(&LedgerEntry::failed(
                            ctx.id.clone(),
                            exhausted.diagnostic_trace(),
                        ))?;
                        error!("{} ❌ 已重试 {} 次，放弃", ctx, self.policy.max_retries);
                        return Ok(ProcessResult::Failed { attempts: failures });
                    }

                    sleep(self.policy.retry_pause).await;
                }
            }
        }
    }

    /// 一次完整的尝试：填号 → 搜索 → 下载
    async fn attempt<P>(&self, portal: &P, ctx: &RetrievalCtx) -> std::result::Result<(), RetrievalError>
    where
        P: CertificatePortal + ?Sized,
    {
        portal.submit_identifier(&ctx.id).await?;
        portal.trigger_search().await?;
        portal.trigger_retrieval().await?;
        Ok(())
    }
}
