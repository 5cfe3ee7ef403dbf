use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 批处理级别的错误
///
/// 除 `ArchiveIo` 之外，这里的错误都会中止整个运行。
#[derive(Debug, Error)]
pub enum CdaError {
    /// 输入清单文件不存在
    #[error("输入文件不存在: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// 输入清单没有表头，或者缺少必需的列
    #[error("输入文件格式错误 ({}): {reason}", path.display())]
    SchemaInvalid { path: PathBuf, reason: String },

    /// 登录失败（凭据错误或登录后页面无法识别）
    #[error("登录失败: {0}")]
    AuthenticationFailure(String),

    /// 登录后无法进入 CDA 提交页面
    #[error("导航到 CDA 页面失败: {0}")]
    Navigation(String),

    /// 结果台账读写失败
    #[error("台账读写失败 ({}): {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// 归档时移动文件失败
    #[error("归档失败 ({}): {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置不合法
    #[error("配置错误: {0}")]
    Config(String),

    /// 浏览器启动或连接失败
    #[error("浏览器错误: {0}")]
    Browser(String),
}

impl CdaError {
    pub fn ledger(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        CdaError::Ledger {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CdaError::ArchiveIo {
            path: path.into(),
            source,
        }
    }
}

/// 单次下载尝试中的错误
///
/// 由重试循环捕获并转换为重试，不会直接返回给调用方。
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 页面控件在限定时间内没有就绪
    #[error("元素 `{selector}` 在 {timeout:?} 内未就绪")]
    ElementTimeout { selector: String, timeout: Duration },

    /// 浏览器命令执行失败
    #[error("浏览器操作失败 ({step}): {message}")]
    Browser { step: &'static str, message: String },

    /// 重试次数耗尽
    #[error("重试耗尽，共尝试 {attempts} 次: {last}")]
    RetrievalExhausted {
        attempts: u32,
        #[source]
        last: Box<RetrievalError>,
    },
}

impl RetrievalError {
    pub fn browser(step: &'static str, err: impl std::fmt::Display) -> Self {
        RetrievalError::Browser {
            step,
            message: err.to_string(),
        }
    }

    /// 完整的诊断信息（包含错误链），写入台账的 Message 列
    pub fn diagnostic_trace(&self) -> String {
        let mut trace = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            trace.push_str("\n原因: ");
            trace.push_str(&err.to_string());
            source = err.source();
        }
        trace
    }
}

pub type Result<T, E = CdaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_trace_includes_chain() {
        let err = RetrievalError::RetrievalExhausted {
            attempts: 2,
            last: Box::new(RetrievalError::ElementTimeout {
                selector: "//button".to_string(),
                timeout: Duration::from_secs(15),
            }),
        };

        let trace = err.diagnostic_trace();
        assert!(trace.starts_with("重试耗尽，共尝试 2 次"));
        assert!(trace.contains("原因: 元素 `//button` 在 15s 内未就绪"));
    }
}
