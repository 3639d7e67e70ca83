//! 缓存条目
//!
//! 每个槽位一条元数据记录，外加它在排序链表中的位置。

/// 缓存条目
///
/// `slot_index` 在分配时确定，之后不再改变；会变化的只有链表位置
/// 以及 `(in_use, logical_block)` 两个字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub(super) in_use: bool,
    pub(super) logical_block: u32,
    slot_index: u16,
    /// 更靠近 MRU 的邻居
    pub(super) prev: Option<u16>,
    /// 更靠近 LRU 的邻居
    pub(super) next: Option<u16>,
}

impl CacheEntry {
    pub(super) const fn new(slot_index: u16) -> Self {
        Self {
            in_use: false,
            logical_block: 0,
            slot_index,
            prev: None,
            next: None,
        }
    }

    /// 单个槽位占用的内存：元数据 + 块数据
    pub const fn footprint(block_size: usize) -> usize {
        core::mem::size_of::<CacheEntry>() + block_size
    }

    /// 是否持有有效数据
    pub const fn in_use(&self) -> bool {
        self.in_use
    }

    /// 逻辑块号（仅在 `in_use` 时有意义）
    pub const fn logical_block(&self) -> u32 {
        self.logical_block
    }

    /// 槽位索引
    pub const fn slot_index(&self) -> u16 {
        self.slot_index
    }

    pub(super) fn matches(&self, logical_block: u32) -> bool {
        self.in_use && self.logical_block == logical_block
    }
}
