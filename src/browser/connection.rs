use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use tracing::{error, info};

use super::prepare_page;

/// 连接到已打开的浏览器（远程调试端口）
///
/// 复用第一个已打开的标签页；下载目录通过 CDP 设置，不依赖浏览器启动参数。
/// 已运行浏览器的偏好设置无法修改：需要在该浏览器的设置中关闭内置 PDF 阅读器
/// （"下载 PDF 文件"），否则 PDF 会在标签页中打开而不会保存。
pub async fn connect_to_browser(port: u16, download_dir: &Path) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("🔌 正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;

    let page = prepare_page(&browser, handler, download_dir, true).await?;

    info!("✅ 已连接浏览器，下载目录: {}", download_dir.display());
    Ok((browser, page))
}
