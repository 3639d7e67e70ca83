//! 远程命令协议
//!
//! 后端任务从命令通道取出请求，为每个请求在已认证的会话上新开一个执行通道，
//! 把请求翻译成一条 shell 命令执行，收集输出后把响应送回前端。
//!
//! # 主要组件
//!
//! - [`RemoteSession`] / [`ExecChannel`] - 外部提供的会话与执行通道能力
//! - [`RemoteCommand`] - 三种命令模板的类型化构造
//! - [`Backend`] - 每请求一次的状态机：等待、打开、翻译、执行、收集、响应、关闭
//! - [`ProcessSession`] - 通过外部程序（`ssh` 或 `sh -c`）执行命令的会话
//!
//! 会话的建立与认证（主机身份校验、密钥登录）不在本模块范围内。

mod command;
mod session;
#[cfg(feature = "std")]
mod backend;
#[cfg(feature = "std")]
mod process;
#[cfg(all(test, feature = "std"))]
pub(crate) mod mock;

pub use command::RemoteCommand;
pub use session::{ChannelState, ExecChannel, RemoteSession};
#[cfg(feature = "std")]
pub use backend::Backend;
#[cfg(feature = "std")]
pub use process::{ProcessChannel, ProcessSession};
