//! 扇区缓存模块
//!
//! 固定容量的内存扇区缓存，MRU/LRU 排序，启动后不再分配内存。
//!
//! # 主要组件
//!
//! - [`SectorCache`] - 缓存管理器：槽位池 + 按索引链接的双向链表
//! - [`CacheEntry`] - 单个槽位的元数据（是否在用、逻辑块号、槽位索引）
//! - [`CacheStats`] - 缓存统计信息
//! - [`HeapProbe`] - 查询当前最大连续空闲内存，用于启动时确定容量
//!
//! # 设计原理
//!
//! 链表节点不使用指针，而是存放在一个固定长度的 `Vec<CacheEntry>` 中，
//! 通过 `prev`/`next` 索引相互链接。条目 i 永远对应槽位 i，
//! 槽位数据地址始终为 `i * block_size`。
//!
//! | 操作        | 行为                                           |
//! |-------------|------------------------------------------------|
//! | `get`       | 从 MRU 端线性查找，命中则提升到 MRU            |
//! | `put` 命中  | 原地覆盖数据并提升到 MRU                       |
//! | `put` 未命中 | 驱逐 LRU 尾部条目，重新链接到 MRU 并写入数据 |
//!
//! 缓存不保存脏数据，驱逐时不写回。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use remote_msc_core::cache::{SectorCache, FixedHeap};
//! use remote_msc_core::CacheConfig;
//!
//! let mut cache = SectorCache::init(512, 100, &FixedHeap(2 << 20), &CacheConfig::default());
//! cache.put(7, &[0u8; 512])?;
//! assert!(cache.get(7).is_some());
//! ```
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，只在构造时分配一次。

mod entry;
mod heap;
mod sector_cache;

pub use entry::CacheEntry;
pub use heap::{FixedHeap, HeapProbe};
pub use sector_cache::{Blocks, CacheStats, SectorCache};
