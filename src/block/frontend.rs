//! 远程磁盘前端
//!
//! 在命令通道上实现 [`BlockDevice`]。前端独占扇区缓存，后端只看到缓存未命中的请求。

use super::device::BlockDevice;
use crate::cache::SectorCache;
use crate::config::RemoteDiskConfig;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::ipc::{CommandMessage, HostCommand, Requester};

/// 前端统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    /// 逻辑读取次数（包括缓存命中）
    pub read_count: u64,
    /// 逻辑写入次数
    pub write_count: u64,
    /// 完全由缓存满足的读取次数
    pub cached_read_count: u64,
    /// 发往后端的读请求数
    pub remote_read_count: u64,
    /// 发往后端的写请求数
    pub remote_write_count: u64,
}

/// 远程磁盘
///
/// 扇区大小即块大小。写操作是直写的：远程确认之后才更新缓存，
/// 因此缓存里从不存在唯一的数据副本，`flush` 无事可做。
pub struct RemoteDisk {
    requester: Requester,
    cache: SectorCache,
    config: RemoteDiskConfig,
    message: CommandMessage,
    opened: bool,
    stats: DiskStats,
}

impl RemoteDisk {
    /// 创建远程磁盘
    ///
    /// # 参数
    ///
    /// * `requester` - 命令通道前端端点
    /// * `cache` - 扇区缓存，启用时块大小必须等于扇区大小
    /// * `config` - 磁盘几何参数
    pub fn new(requester: Requester, cache: SectorCache, config: RemoteDiskConfig) -> Result<Self> {
        let sector_size = config.sector_size as usize;
        if sector_size == 0 || sector_size > MAX_PAYLOAD {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Sector size must be between 1 and the maximum payload",
            ));
        }
        if config.total_sectors > u32::MAX as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Total sectors exceed 32-bit block addressing",
            ));
        }
        if cache.is_enabled() && cache.block_size() != sector_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Cache block size must equal sector size",
            ));
        }

        Ok(Self {
            requester,
            cache,
            config,
            message: CommandMessage::new(),
            opened: false,
            stats: DiskStats::default(),
        })
    }

    /// 请求后端创建后备文件（文件已存在时保持不变）
    pub fn create_backing_file(&mut self) -> Result<()> {
        self.message
            .set_create(self.config.sector_size, self.config.total_sectors as u32);
        self.requester.transact(&mut self.message)?;
        self.expect_response(HostCommand::CreateBackingFile)?;
        log::info!(
            "[DISK] backing file ready: {} sectors of {} bytes",
            self.config.total_sectors,
            self.config.sector_size
        );
        Ok(())
    }

    /// 统计信息
    pub fn stats(&self) -> DiskStats {
        self.stats
    }

    /// 扇区缓存
    pub fn cache(&self) -> &SectorCache {
        &self.cache
    }

    /// 磁盘配置
    pub fn config(&self) -> &RemoteDiskConfig {
        &self.config
    }

    /// 是否已打开
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// 校验请求范围，返回请求的字节数
    fn check_request(&self, lba: u64, count: u32, buf_len: usize) -> Result<usize> {
        if !self.opened {
            return Err(Error::new(ErrorKind::InvalidInput, "Disk is not open"));
        }
        let end = lba
            .checked_add(count as u64)
            .ok_or(Error::new(ErrorKind::InvalidInput, "Sector range overflows"))?;
        if end > self.config.total_sectors {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Sector range beyond end of disk",
            ));
        }
        let len = count as usize * self.config.sector_size as usize;
        if buf_len < len {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Buffer too small for requested sectors",
            ));
        }
        Ok(len)
    }

    /// 每个请求最多携带的扇区数
    fn sectors_per_request(&self) -> u32 {
        (MAX_PAYLOAD / self.config.sector_size as usize) as u32
    }

    fn expect_response(&self, command: HostCommand) -> Result<()> {
        if self.message.command != command {
            log::error!(
                "[DISK] expected {:?} response, got {:?}",
                command,
                self.message.command
            );
            return Err(Error::new(ErrorKind::Protocol, "Mismatched response command"));
        }
        Ok(())
    }

    /// 全部扇区都在缓存中时从缓存读取
    fn read_cached(&mut self, lba: u32, buf: &mut [u8]) -> bool {
        let sector_size = self.config.sector_size as usize;
        let count = (buf.len() / sector_size) as u32;
        if !(0..count).all(|i| self.cache.contains(lba + i)) {
            return false;
        }
        for (i, chunk) in buf.chunks_exact_mut(sector_size).enumerate() {
            match self.cache.get(lba + i as u32) {
                Some(data) => chunk.copy_from_slice(data),
                None => return false,
            }
        }
        true
    }

    fn read_remote(&mut self, lba: u32, buf: &mut [u8]) -> Result<()> {
        let sector_size = self.config.sector_size;
        let chunk_len = self.sectors_per_request() as usize * sector_size as usize;

        let mut sector = lba;
        for chunk in buf.chunks_mut(chunk_len) {
            self.message.set_read(sector_size, sector, chunk.len())?;
            self.requester.transact(&mut self.message)?;
            self.stats.remote_read_count += 1;
            self.expect_response(HostCommand::ReadBlocks)?;

            let got = self.message.data_length() as usize;
            if got < chunk.len() {
                log::error!(
                    "[DISK] short read at sector {}: {}/{} bytes",
                    sector,
                    got,
                    chunk.len()
                );
                return Err(Error::new(ErrorKind::ShortRead, "Remote returned fewer bytes"));
            }
            chunk.copy_from_slice(&self.message.data()[..chunk.len()]);

            for data in chunk.chunks_exact(sector_size as usize) {
                self.cache.put(sector, data)?;
                sector += 1;
            }
        }
        Ok(())
    }

    fn write_remote(&mut self, lba: u32, buf: &[u8]) -> Result<()> {
        let sector_size = self.config.sector_size;
        let chunk_len = self.sectors_per_request() as usize * sector_size as usize;

        let mut sector = lba;
        for chunk in buf.chunks(chunk_len) {
            self.message.set_write(sector_size, sector, chunk)?;
            self.requester.transact(&mut self.message)?;
            self.stats.remote_write_count += 1;
            self.expect_response(HostCommand::WriteBlocks)?;

            // 远程确认之后才进入缓存
            for data in chunk.chunks_exact(sector_size as usize) {
                self.cache.put(sector, data)?;
                sector += 1;
            }
        }
        Ok(())
    }
}

impl BlockDevice for RemoteDisk {
    fn block_size(&self) -> u32 {
        self.config.sector_size
    }

    fn sector_size(&self) -> u32 {
        self.config.sector_size
    }

    fn total_blocks(&self) -> u64 {
        self.config.total_sectors
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let len = self.check_request(lba, count, buf.len())?;
        self.stats.read_count += 1;
        if len == 0 {
            return Ok(0);
        }

        let lba = lba as u32;
        let buf = &mut buf[..len];
        if self.read_cached(lba, buf) {
            self.stats.cached_read_count += 1;
            log::trace!("[DISK] read {}+{} from cache", lba, count);
            return Ok(len);
        }

        log::debug!("[DISK] read {}+{} from remote", lba, count);
        self.read_remote(lba, buf)?;
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        let len = self.check_request(lba, count, buf.len())?;
        self.stats.write_count += 1;
        if len == 0 {
            return Ok(0);
        }

        log::debug!("[DISK] write {}+{}", lba, count);
        self.write_remote(lba as u32, &buf[..len])?;
        Ok(len)
    }

    fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        self.requester.wait_ready()?;
        self.create_backing_file()?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.opened {
            log::info!("[DISK] closed: {:?}, cache {:?}", self.stats, self.cache.stats());
        }
        self.opened = false;
        Ok(())
    }
}
