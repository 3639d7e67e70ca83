//! 远程命令模板
//!
//! 远程主机只需要普通的文件工具（`test`、`truncate`、`dd`、`cat`）。
//! 命令行格式与偏移/大小算术必须逐字符保持一致：
//!
//! | 命令                | 命令行                                                      |
//! |---------------------|-------------------------------------------------------------|
//! | `CreateBackingFile` | `test -f F \|\| truncate --size S F`                        |
//! | `ReadBlocks`        | `dd if=F bs=B skip=L count=C of=/dev/shm/$(basename F).buf 2>/dev/null; cat /dev/shm/$(basename F).buf` |
//! | `WriteBlocks`       | `dd of=F conv=notrunc bs=B seek=L count=C 2>/dev/null`      |
//! | 其他                | `false`                                                     |
//!
//! 其中 `S = lba * sector_size`，`C = data_length / sector_size`。

use crate::config::BackingFile;
use crate::ipc::{CommandMessage, HostCommand};
use core::fmt;

/// 类型化的远程命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand<'a> {
    /// 文件不存在时创建指定大小的稀疏文件
    CreateIfAbsent {
        /// 后备文件
        file: &'a BackingFile,
        /// 文件大小（字节）
        size: u64,
    },
    /// 读取一段块并输出到标准输出
    ReadRange {
        /// 后备文件
        file: &'a BackingFile,
        /// 块大小（字节）
        block_size: u32,
        /// 起始块号
        skip: u32,
        /// 块数
        count: u32,
    },
    /// 从标准输入写入一段块，不截断文件
    WriteRange {
        /// 后备文件
        file: &'a BackingFile,
        /// 块大小（字节）
        block_size: u32,
        /// 起始块号
        seek: u32,
        /// 块数
        count: u32,
    },
    /// 总是失败的命令，用于无法翻译的请求
    AlwaysFail,
}

impl<'a> RemoteCommand<'a> {
    /// 把命令消息翻译成远程命令
    ///
    /// 未知命令以及 `sector_size == 0` 的读写请求都翻译为 [`RemoteCommand::AlwaysFail`]。
    pub fn for_message(msg: &CommandMessage, file: &'a BackingFile) -> Self {
        let sector_size = msg.sector_size;
        let lba = msg.logical_block_address;
        let count = || msg.data_length() as u32 / sector_size;

        match msg.command {
            HostCommand::CreateBackingFile => RemoteCommand::CreateIfAbsent {
                file,
                size: lba as u64 * sector_size as u64,
            },
            HostCommand::ReadBlocks if sector_size != 0 => RemoteCommand::ReadRange {
                file,
                block_size: sector_size,
                skip: lba,
                count: count(),
            },
            HostCommand::WriteBlocks if sector_size != 0 => RemoteCommand::WriteRange {
                file,
                block_size: sector_size,
                seek: lba,
                count: count(),
            },
            HostCommand::ReadBlocks | HostCommand::WriteBlocks => {
                log::error!("[REMOTE] {:?} with zero sector size", msg.command);
                RemoteCommand::AlwaysFail
            }
            HostCommand::Other(tag) => {
                log::error!("[REMOTE] unknown host command tag {}", tag);
                RemoteCommand::AlwaysFail
            }
        }
    }

    /// 命令是否向标准输出写入块数据
    pub fn produces_output(&self) -> bool {
        matches!(self, RemoteCommand::ReadRange { .. })
    }

    /// 命令是否从标准输入读取块数据
    pub fn consumes_input(&self) -> bool {
        matches!(self, RemoteCommand::WriteRange { .. })
    }
}

impl fmt::Display for RemoteCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RemoteCommand::CreateIfAbsent { file, size } => {
                write!(f, "test -f {file} || truncate --size {size} {file}")
            }
            RemoteCommand::ReadRange {
                file,
                block_size,
                skip,
                count,
            } => write!(
                f,
                "dd if={file} bs={block_size} skip={skip} count={count} \
                 of=/dev/shm/$(basename {file}).buf 2>/dev/null; \
                 cat /dev/shm/$(basename {file}).buf"
            ),
            RemoteCommand::WriteRange {
                file,
                block_size,
                seek,
                count,
            } => write!(
                f,
                "dd of={file} conv=notrunc bs={block_size} seek={seek} count={count} 2>/dev/null"
            ),
            RemoteCommand::AlwaysFail => f.write_str("false"),
        }
    }
}
