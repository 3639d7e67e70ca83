//! 命令消息
//!
//! 帧格式（小端）：
//!
//! ```text
//! +--------+-------------+-----+-------------+----------------------+
//! | tag u32| sector_size | lba | data_length | payload[data_length] |
//! |        | u32         | u32 | u16         |                      |
//! +--------+-------------+-----+-------------+----------------------+
//! ```
//!
//! 负载缓冲区固定为 [`MAX_PAYLOAD`] 字节，超出 `data_length` 的部分无意义。

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 主机命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// 创建后备文件（`lba` 字段表示扇区总数）
    CreateBackingFile,
    /// 读块
    ReadBlocks,
    /// 写块
    WriteBlocks,
    /// 未知标签，原样保留以便后端按协议错误处理
    Other(u32),
}

impl HostCommand {
    /// 从线上标签解析
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            TAG_CREATE_BACKING_FILE => HostCommand::CreateBackingFile,
            TAG_READ_BLOCKS => HostCommand::ReadBlocks,
            TAG_WRITE_BLOCKS => HostCommand::WriteBlocks,
            other => HostCommand::Other(other),
        }
    }

    /// 线上标签
    pub const fn tag(self) -> u32 {
        match self {
            HostCommand::CreateBackingFile => TAG_CREATE_BACKING_FILE,
            HostCommand::ReadBlocks => TAG_READ_BLOCKS,
            HostCommand::WriteBlocks => TAG_WRITE_BLOCKS,
            HostCommand::Other(tag) => tag,
        }
    }
}

/// 命令消息
///
/// 负载缓冲区在构造时一次性分配，之后消息在前端与后端各自复用。
#[derive(Clone, PartialEq, Eq)]
pub struct CommandMessage {
    /// 命令
    pub command: HostCommand,
    /// 扇区大小（字节）
    pub sector_size: u32,
    /// 逻辑块地址；对 `CreateBackingFile` 表示扇区总数
    pub logical_block_address: u32,
    data_length: u16,
    payload: Vec<u8>,
}

impl CommandMessage {
    /// 创建空消息
    pub fn new() -> Self {
        Self {
            command: HostCommand::CreateBackingFile,
            sector_size: 0,
            logical_block_address: 0,
            data_length: 0,
            payload: alloc::vec![0u8; MAX_PAYLOAD],
        }
    }

    /// 设置为创建后备文件请求
    pub fn set_create(&mut self, sector_size: u32, total_sectors: u32) {
        self.command = HostCommand::CreateBackingFile;
        self.sector_size = sector_size;
        self.logical_block_address = total_sectors;
        self.data_length = 0;
    }

    /// 设置为读请求
    pub fn set_read(&mut self, sector_size: u32, lba: u32, length: usize) -> Result<()> {
        self.command = HostCommand::ReadBlocks;
        self.sector_size = sector_size;
        self.logical_block_address = lba;
        self.set_data_length(length)
    }

    /// 设置为写请求，复制负载
    pub fn set_write(&mut self, sector_size: u32, lba: u32, data: &[u8]) -> Result<()> {
        self.command = HostCommand::WriteBlocks;
        self.sector_size = sector_size;
        self.logical_block_address = lba;
        self.set_data_length(data.len())?;
        self.payload[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// 有效负载长度
    pub fn data_length(&self) -> u16 {
        self.data_length
    }

    /// 设置有效负载长度
    pub fn set_data_length(&mut self, length: usize) -> Result<()> {
        if length > MAX_PAYLOAD {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Payload exceeds maximum message size",
            ));
        }
        self.data_length = length as u16;
        Ok(())
    }

    /// 有效负载
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.data_length as usize]
    }

    /// 完整负载缓冲区（`MAX_PAYLOAD` 字节）
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// 起始字节偏移
    pub fn byte_offset(&self) -> u64 {
        self.logical_block_address as u64 * self.sector_size as u64
    }

    /// 编码后的帧长度
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.data_length as usize
    }

    /// 编码到帧缓冲区，返回帧长度
    pub fn encode(&self, frame: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if frame.len() < len {
            return Err(Error::new(ErrorKind::InvalidInput, "Frame buffer too small"));
        }
        LittleEndian::write_u32(&mut frame[0..4], self.command.tag());
        LittleEndian::write_u32(&mut frame[4..8], self.sector_size);
        LittleEndian::write_u32(&mut frame[8..12], self.logical_block_address);
        LittleEndian::write_u16(&mut frame[12..14], self.data_length);
        frame[FRAME_HEADER_SIZE..len].copy_from_slice(self.data());
        Ok(len)
    }

    /// 从帧解码，复用本消息的负载缓冲区
    pub fn decode_from(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(Error::new(ErrorKind::Protocol, "Frame shorter than header"));
        }
        let data_length = LittleEndian::read_u16(&frame[12..14]) as usize;
        if data_length > MAX_PAYLOAD {
            return Err(Error::new(ErrorKind::Protocol, "Frame data length exceeds maximum"));
        }
        if frame.len() < FRAME_HEADER_SIZE + data_length {
            return Err(Error::new(ErrorKind::Protocol, "Frame payload truncated"));
        }

        self.command = HostCommand::from_tag(LittleEndian::read_u32(&frame[0..4]));
        self.sector_size = LittleEndian::read_u32(&frame[4..8]);
        self.logical_block_address = LittleEndian::read_u32(&frame[8..12]);
        self.data_length = data_length as u16;
        self.payload[..data_length]
            .copy_from_slice(&frame[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + data_length]);
        Ok(())
    }
}

impl Default for CommandMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CommandMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandMessage")
            .field("command", &self.command)
            .field("sector_size", &self.sector_size)
            .field("lba", &self.logical_block_address)
            .field("data_length", &self.data_length)
            .finish()
    }
}
