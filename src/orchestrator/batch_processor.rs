//! 应用外壳 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源管理。
//!
//! 1. **应用初始化**：校验配置、准备下载目录、启动或连接浏览器
//! 2. **资源管理**：持有 Browser 和门户驱动，确保生命周期正确
//! 3. **取消**：第一次 Ctrl-C 只停止后续 CDA，已写入的台账保持完整；第二次立即退出
//! 4. **全局统计**：输出最终结果
//!
//! 单次批处理的细节委托给 `batch_runner`。

use anyhow::Result;
use chromiumoxide::Browser;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::browser::{self, SitafeDriver};
use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::RunSummary;
use crate::orchestrator::batch_runner::{prepare_download_dir, run_batch, BatchRequest};
use crate::services::LogProgress;
use crate::utils::logging::{log_startup, print_final_stats};

/// 第二次 Ctrl-C 时的退出码（128 + SIGINT）
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    driver: SitafeDriver,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用
    pub async fn initialize(mut config: Config) -> Result<Self> {
        config.validate()?;
        log_startup(&config);

        config.download_dir = prepare_download_dir(&config.download_dir)?;

        let (browser, page) = match config.browser_debug_port {
            Some(port) => {
                browser::connect_to_browser(port, &config.download_dir).await?
            }
            None => browser::launch_browser(&config.download_dir, &config).await?,
        };

        let page_driver = PageDriver::new(page, config.element_timeout());
        let driver = SitafeDriver::new(page_driver, config.portal_url.clone(), &config.selectors);

        Ok(Self {
            config,
            _browser: browser,
            driver,
            cancel: CancellationToken::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        let request = BatchRequest::from_config(&self.config)?;

        let cancel = self.cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            let signals = futures::stream::unfold((), |()| async {
                tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
            });
            if watch_interrupts(Box::pin(signals), cancel).await {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        });

        let result = run_batch(
            &self.driver,
            &request,
            &self.config,
            Some(&LogProgress),
            &self.cancel,
        )
        .await;
        ctrl_c.abort();

        let summary = result?;
        print_final_stats(&summary, &self.config.output_log_file);
        Ok(summary)
    }
}

/// 第一个信号取消运行，第二个信号要求立即退出（返回 true）
async fn watch_interrupts<S>(mut signals: S, cancel: CancellationToken) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if signals.next().await.is_none() {
        return false;
    }
    warn!("🛑 收到 Ctrl-C，当前 CDA 完成后停止（再按一次立即退出）");
    cancel.cancel();

    if signals.next().await.is_none() {
        return false;
    }
    warn!("🛑 再次收到 Ctrl-C，立即退出；台账中已写入的记录保持完整");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let force_exit = watch_interrupts(futures::stream::iter(vec![()]), cancel.clone()).await;
        assert!(cancel.is_cancelled());
        assert!(!force_exit);
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let cancel = CancellationToken::new();
        let force_exit =
            watch_interrupts(futures::stream::iter(vec![(), ()]), cancel.clone()).await;
        assert!(cancel.is_cancelled());
        assert!(force_exit);
    }

    #[tokio::test]
    async fn test_no_interrupt_leaves_run_alone() {
        let cancel = CancellationToken::new();
        let force_exit = watch_interrupts(futures::stream::empty(), cancel.clone()).await;
        assert!(!cancel.is_cancelled());
        assert!(!force_exit);
    }
}
