use std::path::PathBuf;

/// 一次运行的最终结果
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// 过滤掉已成功编号之后参与处理的数量
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// 因续跑而跳过的数量
    pub skipped: usize,
    pub ledger_path: PathBuf,
    /// 归档目录；归档目录创建失败时为 `None`
    pub archive_folder: Option<PathBuf>,
    /// 归档过程中出现的问题（不影响已写入的台账）
    pub archive_warnings: Vec<String>,
    /// 运行是否被中途取消
    pub cancelled: bool,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.success + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.archive_warnings.is_empty() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_run_requires_no_failures_warnings_or_cancel() {
        let mut summary = RunSummary {
            total: 3,
            success: 3,
            ..Default::default()
        };
        assert!(summary.is_clean());
        assert_eq!(summary.attempted(), 3);

        summary.archive_warnings.push("移动 1001.pdf 失败".into());
        assert!(!summary.is_clean());

        let cancelled = RunSummary {
            total: 3,
            success: 1,
            cancelled: true,
            ..Default::default()
        };
        assert!(!cancelled.is_clean());
        assert_eq!(cancelled.attempted(), 1);

        let failed = RunSummary {
            total: 2,
            success: 1,
            failed: 1,
            ..Default::default()
        };
        assert!(!failed.is_clean());
        assert_eq!(failed.attempted(), 2);
    }
}
