pub mod retrieval_ctx;
pub mod retrieval_flow;

pub use retrieval_ctx::RetrievalCtx;
pub use retrieval_flow::{ProcessResult, RetrievalFlow, RetryPolicy};
