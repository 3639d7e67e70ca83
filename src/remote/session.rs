//! 远程会话接口
//!
//! 协议只需要一种能力："在已存在的认证会话上打开一个执行通道，
//! 双向字节流，显式关闭"。实现者负责会话建立与主机身份校验。

use crate::error::{Error, ErrorKind, Result};
use bitflags::bitflags;

bitflags! {
    /// 执行通道生命周期标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelState: u8 {
        /// 通道已打开
        const OPEN     = 0x01;
        /// 命令已提交执行
        const EXEC     = 0x02;
        /// 已发送输入结束
        const EOF_SENT = 0x04;
        /// 通道已关闭
        const CLOSED   = 0x08;
    }
}

/// 远程执行通道
///
/// 一次性使用：打开后执行一条命令，读写字节流，然后关闭。
pub trait ExecChannel {
    /// 提交命令行执行
    fn request_exec(&mut self, command: &str) -> Result<()>;

    /// 向命令的标准输入写入，返回写入字节数
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// 从命令的标准输出读取，返回 0 表示输出结束
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// 发送输入结束
    fn send_eof(&mut self) -> Result<()>;

    /// 命令退出状态，未知时返回 `None`
    ///
    /// 在读到输出结束之后调用。
    fn exit_status(&mut self) -> Result<Option<i32>> {
        Ok(None)
    }

    /// 关闭并释放通道
    fn close(&mut self) -> Result<()>;

    /// 写入全部数据
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(Error::new(ErrorKind::Disconnected, "Remote input closed"));
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// 已认证的远程会话
pub trait RemoteSession {
    /// 执行通道类型
    type Channel: ExecChannel;

    /// 打开一个新的执行通道
    fn open_channel(&mut self) -> Result<Self::Channel>;

    /// 断开会话并释放资源
    fn disconnect(&mut self);
}
