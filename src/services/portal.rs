//! 门户能力接口
//!
//! 核心流程只依赖这两个 trait，具体的页面操作（选择器、点击目标）由实现方提供。

use async_trait::async_trait;

use crate::error::{CdaError, RetrievalError};
use crate::models::{CertificateId, Credentials};

/// 会话驱动：登录并进入 CDA 提交页面
#[async_trait]
pub trait SessionDriver: Send + Sync {
    type Session: CertificatePortal;

    /// 登录门户，凭据错误或登录后页面无法识别时返回 `AuthenticationFailure`
    async fn authenticate(&self, credentials: &Credentials) -> Result<Self::Session, CdaError>;

    /// 从登录后的首页进入 CDA 提交页面
    async fn navigate_to_submission_page(&self, session: &Self::Session) -> Result<(), CdaError>;
}

/// 已登录、位于提交页面的会话
///
/// 每一步都自带超时，任何错误都只影响当前这次尝试。
#[async_trait]
pub trait CertificatePortal: Send + Sync {
    /// 清空输入框并填入 CDA 编号
    async fn submit_identifier(&self, id: &CertificateId) -> Result<(), RetrievalError>;

    /// 点击搜索
    async fn trigger_search(&self) -> Result<(), RetrievalError>;

    /// 等待下载按钮可点击后点击
    async fn trigger_retrieval(&self) -> Result<(), RetrievalError>;
}
