//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::models::RunSummary;

/// 初始化日志
///
/// 控制台输出 + 可选的日志文件（无颜色）。默认级别 `info`，可用 `RUST_LOG` 覆盖。
/// 重复调用时保留第一次安装的订阅者。
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("无法打开日志文件: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();

    Ok(())
}

/// 初始化日志文件（写入本次运行的标题）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nCDA 下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - CDA 批量下载");
    info!("🔁 最大重试次数: {}", config.max_retries);
    info!("📂 下载目录: {}", config.download_dir.display());
    if config.continuation {
        info!("📜 续跑模式，台账: {:?}", config.ledger_path);
    }
    info!("{}", "=".repeat(60));
}

/// 记录清单加载信息
///
/// # 参数
/// - `total`: 需要处理的数量
/// - `skipped`: 续跑跳过的数量
pub fn log_list_loaded(total: usize, skipped: usize) {
    info!("✓ 本次需要处理 {} 个 CDA", total);
    if skipped > 0 {
        info!("⏭️ 跳过 {} 个已成功的 CDA", skipped);
    }
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📋 已处理: {}/{}", summary.attempted(), summary.total);
    info!("✅ 成功: {}/{}", summary.success, summary.total);
    info!("❌ 失败: {}", summary.failed);
    if summary.skipped > 0 {
        info!("⏭️ 跳过: {}", summary.skipped);
    }
    if summary.cancelled {
        info!("🛑 运行被取消，部分 CDA 未处理");
    }
    if let Some(folder) = &summary.archive_folder {
        info!("📁 归档目录: {}", folder.display());
    }
    info!("📜 台账: {}", summary.ledger_path.display());
    for warning in &summary.archive_warnings {
        info!("⚠️ {}", warning);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("certidão", 4), "cert...");
    }

    #[test]
    fn test_init_log_file_and_init_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let path_str = path.to_string_lossy().to_string();

        init_log_file(&path_str).unwrap();
        init(Some(path.as_path())).unwrap();
        init(None).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("CDA 下载日志"));
    }
}
