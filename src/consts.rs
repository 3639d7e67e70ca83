//! 常量定义
//!
//! 这个模块包含：
//! - 扇区与缓存相关常量
//! - 命令消息帧布局
//! - 命令通道容量

//=============================================================================
// 扇区与缓存
//=============================================================================

/// 默认扇区大小（512 字节）
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// 默认为系统其余部分保留的内存（0.5 MiB）
pub const DEFAULT_RESERVE_BYTES: usize = 512 * 1024;

/// 原固件只在空闲内存不少于 1 MiB 时才建立缓存
pub const FIRMWARE_MIN_FREE_BYTES: usize = 1024 * 1024;

/// 缓存启用所需的最少槽位数
pub const MIN_CACHE_SLOTS: usize = 2;

/// 槽位索引为 u16，容量不能超过该值
pub const MAX_CACHE_SLOTS: usize = u16::MAX as usize;

//=============================================================================
// 命令消息
//=============================================================================

/// 单条消息可携带的最大负载（字节）
pub const MAX_PAYLOAD: usize = 4096;

/// 帧头大小：tag(4) + sector_size(4) + lba(4) + data_length(2)
pub const FRAME_HEADER_SIZE: usize = 14;

/// 最大帧大小
pub const MAX_FRAME_SIZE: usize = FRAME_HEADER_SIZE + MAX_PAYLOAD;

/// "会话就绪" 信号帧的长度
pub const READY_FRAME_SIZE: usize = 1;

/// 命令标签：创建后备文件
pub const TAG_CREATE_BACKING_FILE: u32 = 0;

/// 命令标签：读块
pub const TAG_READ_BLOCKS: u32 = 1;

/// 命令标签：写块
pub const TAG_WRITE_BLOCKS: u32 = 2;

//=============================================================================
// 命令通道
//=============================================================================

/// 每条消息在缓冲区中的长度前缀大小
pub const ENVELOPE_SIZE: usize = 4;

/// 单个方向的通道容量：恰好容纳一条最大消息
pub const PASSAGE_CAPACITY: usize = MAX_FRAME_SIZE + ENVELOPE_SIZE;
