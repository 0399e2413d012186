//! Model gateway types and the chat-completion backend.

mod errors;
mod openai;
mod types;

pub use errors::GatewayError;
pub use openai::OpenAiGateway;
pub use types::{
    Gateway, GatewayReply, GatewayRequest, Message, ToolArguments, ToolCallRequest,
    ToolDeclaration,
};
