//! remote_msc_core: 远程稀疏文件支撑的块存储核心
//!
//! 本地暴露的大容量存储设备，其块数据实际保存在远程主机上的稀疏文件中，
//! 通过已认证的远程执行通道访问。本 crate 提供三块核心：
//! - **扇区缓存**：固定容量、启动时一次性分配的 MRU/LRU 扇区缓存
//! - **命令通道**：前端任务与后端任务之间的有界、半双工请求/响应消息通道
//! - **远程命令协议**：把逻辑块操作翻译成远程 shell 命令并执行
//!
//! # 示例
//!
//! ```rust,ignore
//! use remote_msc_core::{
//!     command_channel, Backend, BackingFile, BlockDevice, CacheConfig, FixedHeap,
//!     ProcessSession, RemoteDisk, RemoteDiskConfig, SectorCache,
//! };
//!
//! let (requester, responder) = command_channel();
//! let session = ProcessSession::new("ssh", ["-T", "user@host"]);
//! let backing = BackingFile::new("disk.img")?;
//! std::thread::spawn(move || Backend::new(session, responder, backing).run());
//!
//! let cache = SectorCache::init(512, 256, &FixedHeap(4 << 20), &CacheConfig::default());
//! let mut disk = RemoteDisk::new(requester, cache, RemoteDiskConfig::new(512, 2048))?;
//! disk.open()?;
//!
//! let mut buf = vec![0u8; 512];
//! disk.read_blocks(0, 1, &mut buf)?;
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`config`] - 配置
//! - [`cache`] - 扇区缓存
//! - [`ipc`] - 命令消息与命令通道
//! - [`remote`] - 远程命令协议
//! - [`block`] - 块设备接口与前端

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 配置
pub mod config;

/// 扇区缓存
pub mod cache;

/// 任务间通信
pub mod ipc;

/// 远程命令协议
pub mod remote;

/// 块设备接口
pub mod block;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 配置
pub use config::{BackingFile, CacheConfig, RemoteDiskConfig};

// Cache
pub use cache::{CacheEntry, CacheStats, FixedHeap, HeapProbe, SectorCache};

// IPC
pub use ipc::{CommandMessage, HostCommand};
#[cfg(feature = "std")]
pub use ipc::{command_channel, MessageBuffer, Requester, Responder};

// Remote
pub use remote::{ChannelState, ExecChannel, RemoteCommand, RemoteSession};
#[cfg(feature = "std")]
pub use remote::{Backend, ProcessChannel, ProcessSession};

// 块设备
pub use block::BlockDevice;
#[cfg(feature = "std")]
pub use block::{DiskStats, RemoteDisk};
