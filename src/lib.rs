//! # CDA Downloader
//!
//! 从 SitafeWeb 门户批量下载 CDA（债务证明）PDF 的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `PageDriver` - 元素定位、等待、输入与点击
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `SessionDriver` / `CertificatePortal` - 门户能力接口
//! - `ResultLedger` - 逐条写入结果台账，支持续跑
//! - `Archiver` - 把下载结果移动到时间戳目录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个 CDA"的完整处理流程
//! - `RetrievalCtx` - 上下文封装（序号 + 编号）
//! - `RetrievalFlow` - 重试状态机（submit → search → retrieve → ledger）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 应用外壳，管理浏览器和取消
//! - `orchestrator/batch_runner` - 单次批处理：清单 → 会话 → 循环 → 归档
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser, launch_browser, SitafeDriver};
pub use config::{Config, DuplicatePolicy};
pub use error::{CdaError, Result, RetrievalError};
pub use infrastructure::PageDriver;
pub use models::{CertificateId, Credentials, EntryStatus, LedgerEntry, RunSummary};
pub use orchestrator::{run_batch, App, BatchRequest};
pub use services::{CertificatePortal, ProgressSink, SessionDriver};
pub use workflow::{ProcessResult, RetrievalCtx, RetrievalFlow};
