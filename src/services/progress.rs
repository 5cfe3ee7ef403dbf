//! 进度通知

use tracing::info;

/// 进度接收者
///
/// 每个 CDA 第一次尝试前收到 `(当前序号, 总数, 当前编号)`，全部处理完后再收到一次
/// `(总数, 总数, 完成提示)`。实现不应明显阻塞。
pub trait ProgressSink: Send + Sync {
    fn notify(&self, processed: usize, total: usize, current: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn notify(&self, processed: usize, total: usize, current: &str) {
        self(processed, total, current)
    }
}

/// 把进度写到日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn notify(&self, processed: usize, total: usize, current: &str) {
        info!("🔄 已处理 {}/{}: {}", processed, total, current);
    }
}

/// 全部完成时发送的提示
pub const COMPLETION_MESSAGE: &str = "✅ 所有 CDA 已处理完毕";
