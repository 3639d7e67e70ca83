//! 配置
//!
//! 缓存尺寸策略、远程后备文件路径和前端磁盘几何参数。

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::string::String;

/// 扇区缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 为系统其余部分保留的内存（字节）
    pub reserve_bytes: usize,
    /// 空闲内存低于此值时不建立缓存（0 表示不设门槛）
    pub min_free_bytes: usize,
}

impl CacheConfig {
    /// 固件部署的配置：空闲内存至少 1 MiB，保留 0.5 MiB
    pub const fn firmware() -> Self {
        Self {
            reserve_bytes: DEFAULT_RESERVE_BYTES,
            min_free_bytes: FIRMWARE_MIN_FREE_BYTES,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reserve_bytes: DEFAULT_RESERVE_BYTES,
            min_free_bytes: 0,
        }
    }
}

/// 远程后备文件路径
///
/// 路径会被原样拼进 shell 命令行，因此构造时只接受
/// `[A-Za-z0-9._/+~-]` 字符，且不能以 `-` 开头。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingFile(String);

impl BackingFile {
    /// 校验并创建后备文件路径
    pub fn new(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "Backing file path is empty"));
        }
        if path.starts_with('-') {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Backing file path must not start with '-'",
            ));
        }
        let safe = path
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'/' | b'+' | b'~' | b'-'));
        if !safe {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Backing file path contains shell-unsafe characters",
            ));
        }
        Ok(Self(String::from(path)))
    }

    /// 路径字符串
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BackingFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 前端磁盘配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteDiskConfig {
    /// 扇区大小（字节）
    pub sector_size: u32,
    /// 扇区总数，同时决定后备文件大小
    pub total_sectors: u64,
}

impl RemoteDiskConfig {
    /// 创建配置
    pub const fn new(sector_size: u32, total_sectors: u64) -> Self {
        Self {
            sector_size,
            total_sectors,
        }
    }

    /// 后备文件大小（字节）
    pub const fn backing_size(&self) -> u64 {
        self.total_sectors * self.sector_size as u64
    }
}

impl Default for RemoteDiskConfig {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            total_sectors: 0,
        }
    }
}
