//! CDA 处理上下文
//!
//! 封装"我正在处理清单中的第几个 CDA"这一信息

use std::fmt::Display;

use crate::models::CertificateId;

/// CDA 处理上下文
#[derive(Debug, Clone)]
pub struct RetrievalCtx {
    /// 当前序号（从1开始，仅用于日志和进度）
    pub index: usize,

    /// 本次运行需要处理的总数
    pub total: usize,

    /// CDA 编号
    pub id: CertificateId,
}

impl RetrievalCtx {
    pub fn new(index: usize, total: usize, id: CertificateId) -> Self {
        Self { index, total, id }
    }
}

impl Display for RetrievalCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[CDA {}/{} #{}]", self.index, self.total, self.id)
    }
}
