//! 扇区缓存实现
//!
//! # 结构
//!
//! ```text
//! entries: [E0][E1][E2][E3]        条目 i 永远对应槽位 i
//! pool:    [S0][S1][S2][S3]        槽位 i 位于 i * block_size
//!
//! head(MRU) -> E2 <-> E0 <-> E3 <-> E1 <- tail(LRU)
//! ```
//!
//! 链表只保存索引，不会出现悬垂或循环引用；容量在构造时确定，
//! 之后 `entries` 与 `pool` 都不再增长。

use crate::{
    config::CacheConfig,
    consts::{MAX_CACHE_SLOTS, MIN_CACHE_SLOTS},
    error::{Error, ErrorKind, Result},
};

use super::entry::CacheEntry;
use super::heap::HeapProbe;
use alloc::vec::Vec;

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数（get 与 put）
    pub hits: u64,
    /// 未命中次数（get 与 put）
    pub misses: u64,
    /// 命中时被移动到 MRU 的次数
    pub promotions: u64,
    /// 写入新块的次数
    pub insertions: u64,
    /// 驱逐有效块的次数
    pub evictions: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 扇区缓存
///
/// 没有内部同步，假定只有一个所有者调用；多个调用者需在外部串行化。
/// 容量为 0 时缓存处于禁用状态：`get` 总是未命中，`put` 不产生任何效果。
pub struct SectorCache {
    /// 条目元数据，条目 i 对应槽位 i
    entries: Vec<CacheEntry>,
    /// 槽位数据池
    pool: Vec<u8>,
    /// MRU 端
    head: Option<u16>,
    /// LRU 端
    tail: Option<u16>,
    /// 块大小（字节）
    block_size: usize,
    /// 统计信息
    stats: CacheStats,
}

impl SectorCache {
    /// 根据当前空闲内存建立缓存
    ///
    /// # 参数
    ///
    /// * `block_size` - 块大小（字节）
    /// * `max_capacity` - 容量上限（块数）
    /// * `probe` - 空闲内存探针
    /// * `config` - 保留内存配置
    ///
    /// 必须在其他固定分配完成之后调用，因为它依据剩余空闲内存确定容量。
    /// 能容纳的槽位少于 2 个时返回禁用的缓存。
    pub fn init<P: HeapProbe + ?Sized>(
        block_size: usize,
        max_capacity: usize,
        probe: &P,
        config: &CacheConfig,
    ) -> Self {
        let free = probe.largest_free_block();
        let capacity = Self::capacity_for(free, block_size, max_capacity, config);
        log::info!(
            "[CACHE] free={} reserve={} block_size={} -> capacity={}",
            free,
            config.reserve_bytes,
            block_size,
            capacity
        );
        Self::with_capacity(block_size, capacity)
    }

    /// 计算给定空闲内存下的缓存容量
    pub fn capacity_for(
        free: usize,
        block_size: usize,
        max_capacity: usize,
        config: &CacheConfig,
    ) -> usize {
        if block_size == 0 || free < config.min_free_bytes || free <= config.reserve_bytes {
            return 0;
        }
        let blocks = ((free - config.reserve_bytes) / CacheEntry::footprint(block_size))
            .min(max_capacity)
            .min(MAX_CACHE_SLOTS);
        if blocks < MIN_CACHE_SLOTS {
            0
        } else {
            blocks
        }
    }

    /// 创建指定容量的缓存（不查询空闲内存）
    ///
    /// 容量小于 2 时返回禁用的缓存。
    pub fn with_capacity(block_size: usize, capacity: usize) -> Self {
        if capacity < MIN_CACHE_SLOTS || block_size == 0 {
            return Self::disabled(block_size);
        }
        let capacity = capacity.min(MAX_CACHE_SLOTS);

        let mut entries = Vec::with_capacity(capacity);
        for ix in 0..capacity as u16 {
            let mut entry = CacheEntry::new(ix);
            entry.prev = ix.checked_sub(1);
            entry.next = if (ix as usize) + 1 < capacity { Some(ix + 1) } else { None };
            entries.push(entry);
        }

        Self {
            entries,
            pool: alloc::vec![0u8; capacity * block_size],
            head: Some(0),
            tail: Some((capacity - 1) as u16),
            block_size,
            stats: CacheStats::default(),
        }
    }

    /// 创建禁用的缓存
    pub fn disabled(block_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            pool: Vec::new(),
            head: None,
            tail: None,
            block_size,
            stats: CacheStats::default(),
        }
    }

    /// 查找块并提升到 MRU
    ///
    /// 命中返回槽位数据，未命中返回 `None`。未命中路径不修改链表。
    pub fn get(&mut self, logical_block: u32) -> Option<&[u8]> {
        let Some(ix) = self.find(logical_block) else {
            self.stats.misses += 1;
            log::trace!("[CACHE] get block={} MISS", logical_block);
            return None;
        };

        self.stats.hits += 1;
        self.promote(ix);
        log::trace!("[CACHE] get block={} HIT slot={}", logical_block, ix);
        Some(self.slot(ix))
    }

    /// 写入块
    ///
    /// 命中时原地覆盖并提升到 MRU；未命中时驱逐 LRU 尾部条目，
    /// 不写回，重新链接到 MRU 后写入数据。
    ///
    /// # 错误
    ///
    /// `data` 长度与块大小不符时返回 `InvalidInput`。
    pub fn put(&mut self, logical_block: u32, data: &[u8]) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if data.len() != self.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Cache data length must equal block size",
            ));
        }

        let ix = match self.find(logical_block) {
            Some(ix) => {
                self.stats.hits += 1;
                self.promote(ix);
                log::trace!("[CACHE] put block={} overwrite slot={}", logical_block, ix);
                ix
            }
            None => {
                self.stats.misses += 1;
                self.evict_into_head(logical_block)?
            }
        };

        let start = self.slot_offset(ix);
        let end = start + self.block_size;
        self.pool[start..end].copy_from_slice(data);
        Ok(())
    }

    /// 是否缓存了某块（不提升）
    pub fn contains(&self, logical_block: u32) -> bool {
        self.find(logical_block).is_some()
    }

    /// 从 MRU 到 LRU 遍历在用的逻辑块号
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            cache: self,
            cursor: self.head,
        }
    }

    /// 按槽位索引获取条目
    pub fn entry(&self, slot_index: u16) -> Option<&CacheEntry> {
        self.entries.get(slot_index as usize)
    }

    /// 缓存容量（块数），0 表示禁用
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        !self.entries.is_empty()
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 当前在用的块数量
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.in_use).count()
    }

    /// 是否没有在用的块
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    // 内部辅助方法

    /// 从 MRU 端开始查找
    fn find(&self, logical_block: u32) -> Option<u16> {
        let mut cursor = self.head;
        while let Some(ix) = cursor {
            let entry = &self.entries[ix as usize];
            if entry.matches(logical_block) {
                return Some(ix);
            }
            cursor = entry.next;
        }
        None
    }

    /// 驱逐 LRU 尾部条目并把它重新链接到 MRU
    fn evict_into_head(&mut self, logical_block: u32) -> Result<u16> {
        let Some(ix) = self.tail else {
            return Err(Error::new(ErrorKind::Unsupported, "Cache has no slots"));
        };

        let victim = self.entries[ix as usize];
        if victim.in_use {
            self.stats.evictions += 1;
            log::trace!(
                "[CACHE] evict block={} slot={} for block={}",
                victim.logical_block,
                ix,
                logical_block
            );
        }

        self.unlink(ix);
        self.push_front(ix);

        let entry = &mut self.entries[ix as usize];
        entry.in_use = true;
        entry.logical_block = logical_block;
        self.stats.insertions += 1;
        Ok(ix)
    }

    fn promote(&mut self, ix: u16) {
        if self.head != Some(ix) {
            self.unlink(ix);
            self.push_front(ix);
            self.stats.promotions += 1;
        }
    }

    fn unlink(&mut self, ix: u16) {
        let CacheEntry { prev, next, .. } = self.entries[ix as usize];
        match prev {
            Some(p) => self.entries[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.entries[n as usize].prev = prev,
            None => self.tail = prev,
        }
        let entry = &mut self.entries[ix as usize];
        entry.prev = None;
        entry.next = None;
    }

    fn push_front(&mut self, ix: u16) {
        let old_head = self.head;
        {
            let entry = &mut self.entries[ix as usize];
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => self.entries[h as usize].prev = Some(ix),
            None => self.tail = Some(ix),
        }
        self.head = Some(ix);
    }

    fn slot_offset(&self, ix: u16) -> usize {
        self.entries[ix as usize].slot_index() as usize * self.block_size
    }

    fn slot(&self, ix: u16) -> &[u8] {
        let start = self.slot_offset(ix);
        &self.pool[start..start + self.block_size]
    }

    /// 校验链表不变量
    ///
    /// 链表无环、每个条目恰好出现一次、head/tail 与链表两端一致。
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let n = self.entries.len();
        if n == 0 {
            assert!(self.head.is_none() && self.tail.is_none());
            return;
        }
        let mut seen = alloc::vec![false; n];
        let mut prev = None;
        let mut cursor = self.head;
        let mut count = 0;
        while let Some(ix) = cursor {
            assert!(!seen[ix as usize], "cycle at entry {}", ix);
            seen[ix as usize] = true;
            let entry = &self.entries[ix as usize];
            assert_eq!(entry.prev, prev, "broken back link at entry {}", ix);
            assert_eq!(entry.slot_index(), ix, "slot index moved");
            prev = cursor;
            cursor = entry.next;
            count += 1;
        }
        assert_eq!(count, n, "chain does not cover every entry");
        assert_eq!(prev, self.tail, "tail does not match chain end");
    }
}

/// 在用逻辑块号的迭代器（MRU 到 LRU）
pub struct Blocks<'a> {
    cache: &'a SectorCache,
    cursor: Option<u16>,
}

impl Iterator for Blocks<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while let Some(ix) = self.cursor {
            let entry = &self.cache.entries[ix as usize];
            self.cursor = entry.next;
            if entry.in_use {
                return Some(entry.logical_block);
            }
        }
        None
    }
}

impl core::fmt::Debug for SectorCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SectorCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("block_size", &self.block_size)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("stats", &self.stats)
            .finish()
    }
}
