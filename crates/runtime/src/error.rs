use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("gateway: {0}")]
    Gateway(#[from] crate::model::GatewayError),

    #[error("tools: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("no final answer after {rounds} gateway rounds")]
    LoopBound { rounds: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
