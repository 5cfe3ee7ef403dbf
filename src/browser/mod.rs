//! 浏览器层
//!
//! 启动或连接 Chromium，并把下载目录交给浏览器；`sitafe` 是门户的具体实现。

pub mod connection;
pub mod headless;
pub mod sitafe;

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error};

pub use connection::connect_to_browser;
pub use headless::launch_browser;
pub use sitafe::{PortalSelectors, SitafeDriver, SitafeSession};

/// 等待浏览器状态同步
const SYNC_DELAY: Duration = Duration::from_millis(300);

/// 在后台处理浏览器事件，设置下载目录，并返回可用的页面
///
/// `reuse_existing` 为真时优先使用已打开的第一个标签页。
pub(crate) async fn prepare_page(
    browser: &Browser,
    mut handler: Handler,
    download_dir: &Path,
    reuse_existing: bool,
) -> Result<Page> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(SYNC_DELAY).await;

    allow_downloads(browser, download_dir).await?;

    if reuse_existing {
        let pages = browser.pages().await?;
        debug!("获取到 {} 个页面", pages.len());
        if let Some(page) = pages.into_iter().next() {
            return Ok(page);
        }
    }

    browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow!("创建页面失败: {}", e)
    })
}

/// 允许下载并把文件保存到指定目录（不弹出保存对话框）
async fn allow_downloads(browser: &Browser, download_dir: &Path) -> Result<()> {
    let params = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(download_dir.to_string_lossy().to_string())
        .build()
        .map_err(|e| anyhow!("无法设置下载目录: {}", e))?;

    browser.execute(params).await?;
    debug!("下载目录已设置: {}", download_dir.display());
    Ok(())
}
