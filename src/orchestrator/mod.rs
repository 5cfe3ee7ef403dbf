//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用外壳
//! - 管理应用生命周期（初始化、运行）
//! - 准备下载目录，启动或连接浏览器
//! - 安装 Ctrl-C 取消
//! - 输出全局统计信息
//!
//! ### `batch_runner` - 一次批处理
//! - 加载清单、计算续跑集合
//! - 登录并进入提交页面
//! - 顺序处理每个 CDA（委托 `RetrievalFlow`）
//! - 批处理结束后归档
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (App)
//!     ↓
//! batch_runner (处理 Vec<CertificateId>)
//!     ↓
//! workflow::RetrievalFlow (处理单个 CDA)
//!     ↓
//! services (能力层：ledger / archiver / portal)
//!     ↓
//! infrastructure (基础设施：PageDriver)
//! ```

pub mod batch_processor;
pub mod batch_runner;

pub use batch_processor::App;
pub use batch_runner::{prepare_download_dir, run_batch, BatchRequest};
