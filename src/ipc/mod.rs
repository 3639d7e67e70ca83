//! 任务间通信
//!
//! 前端任务与后端任务之间的命令通道。每个方向一个有界缓冲区，
//! 恰好容纳一条最大消息，协议严格半双工：一次只有一个请求在途。
//!
//! - [`CommandMessage`] - 命令消息及其二进制帧格式
//! - [`MessageBuffer`] - 单方向的有界消息缓冲区（仅传输，不解释内容）
//! - [`Requester`] / [`Responder`] - 前端与后端持有的通道端点

mod message;
#[cfg(feature = "std")]
mod buffer;
#[cfg(feature = "std")]
mod channel;

pub use message::{CommandMessage, HostCommand};
#[cfg(feature = "std")]
pub use buffer::MessageBuffer;
#[cfg(feature = "std")]
pub use channel::{command_channel, Requester, Responder};
