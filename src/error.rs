//! 错误类型定义
//!
//! 提供缓存、命令通道和远程协议共用的错误类型。

use core::fmt;

/// 核心操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 传输层 I/O 错误（远程通道读写失败）
    Io,
    /// 无效参数
    InvalidInput,
    /// 协议错误（帧格式错误或收到意外消息）
    Protocol,
    /// 对端已断开（通道端点被丢弃或远程会话不可用）
    Disconnected,
    /// 远程命令以非零状态退出
    RemoteFailure,
    /// 远程输出在 `data_length` 字节之前结束
    ShortRead,
    /// 不支持的操作
    Unsupported,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        log::debug!("[REMOTE] io error: {}", err);
        match err.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => {
                Error::new(ErrorKind::Disconnected, "Remote stream closed")
            }
            _ => Error::new(ErrorKind::Io, "Remote stream I/O error"),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
