//! 块设备核心类型

use crate::error::Result;

/// 块设备接口
///
/// 以扇区为单位寻址。
///
/// # 示例
///
/// ```rust,ignore
/// use remote_msc_core::{BlockDevice, Result};
///
/// struct RamDisk {
///     data: Vec<u8>,
/// }
///
/// impl BlockDevice for RamDisk {
///     fn block_size(&self) -> u32 {
///         512
///     }
///
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_blocks(&self) -> u64 {
///         self.data.len() as u64 / 512
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         let start = lba as usize * 512;
///         let len = count as usize * 512;
///         buf[..len].copy_from_slice(&self.data[start..start + len]);
///         Ok(len)
///     }
///
///     fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         let start = lba as usize * 512;
///         let len = count as usize * 512;
///         self.data[start..start + len].copy_from_slice(&buf[..len]);
///         Ok(len)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 逻辑块大小
    fn block_size(&self) -> u32;

    /// 物理扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址（以扇区为单位）
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 写入扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址（以扇区为单位）
    /// * `count` - 要写入的扇区数
    /// * `buf` - 源缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 刷新缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 打开设备
    ///
    /// 在开始使用设备前调用。默认实现什么都不做。
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// 关闭设备
    ///
    /// 默认实现什么都不做。
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
