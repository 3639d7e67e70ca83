//! 空闲内存查询

/// 查询当前最大的连续空闲内存块
///
/// 在 ESP32 之类的控制器上对应 `heap_caps_get_largest_free_block`。
/// 缓存容量只在初始化时查询一次，必须在其他固定分配完成之后调用。
pub trait HeapProbe {
    /// 最大连续空闲块（字节）
    fn largest_free_block(&self) -> usize;
}

/// 固定值探针
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeap(pub usize);

impl HeapProbe for FixedHeap {
    fn largest_free_block(&self) -> usize {
        self.0
    }
}

impl<F: Fn() -> usize> HeapProbe for F {
    fn largest_free_block(&self) -> usize {
        self()
    }
}
