//! 有界消息缓冲区
//!
//! 单方向、按字节计容量的消息缓冲区。每条消息前有 4 字节长度前缀，
//! 发送方在空间不足时阻塞，接收方在缓冲区为空时阻塞，都没有超时。
//! 缓冲区只负责传输，不解释消息内容。

use crate::consts::ENVELOPE_SIZE;
use crate::error::{Error, ErrorKind, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct PassageState {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// 有界消息缓冲区
///
/// 只支持一个发送方和一个接收方；FIFO，不重复、不重排、不丢弃。
#[derive(Debug)]
pub struct MessageBuffer {
    state: Mutex<PassageState>,
    readable: Condvar,
    writable: Condvar,
    capacity: usize,
}

impl MessageBuffer {
    /// 创建容量为 `capacity` 字节（含长度前缀）的缓冲区
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PassageState {
                bytes: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            capacity,
        }
    }

    /// 发送一条消息
    ///
    /// 阻塞直到缓冲区有足够空间。永远放不下的消息立即返回 `InvalidInput`；
    /// 缓冲区已关闭时返回 `Disconnected`。
    pub fn send(&self, message: &[u8]) -> Result<()> {
        let needed = message.len() + ENVELOPE_SIZE;
        if needed > self.capacity {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Message larger than buffer capacity",
            ));
        }

        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(Error::new(ErrorKind::Disconnected, "Message buffer closed"));
            }
            if self.capacity - state.bytes.len() >= needed {
                break;
            }
            state = self
                .writable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let mut envelope = [0u8; ENVELOPE_SIZE];
        LittleEndian::write_u32(&mut envelope, message.len() as u32);
        state.bytes.extend(envelope);
        state.bytes.extend(message.iter().copied());
        log::trace!("[IPC] sent {} bytes, buffered={}", message.len(), state.bytes.len());
        drop(state);

        self.readable.notify_one();
        Ok(())
    }

    /// 接收一条消息到 `buf`，返回消息长度
    ///
    /// 阻塞直到有消息可读。`buf` 放不下队首消息时返回 `InvalidInput`，
    /// 消息保留在队列中。缓冲区已关闭且为空时返回 `Disconnected`。
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        loop {
            if !state.bytes.is_empty() {
                break;
            }
            if state.closed {
                return Err(Error::new(ErrorKind::Disconnected, "Message buffer closed"));
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let mut envelope = [0u8; ENVELOPE_SIZE];
        for (dst, src) in envelope.iter_mut().zip(state.bytes.iter()) {
            *dst = *src;
        }
        let len = LittleEndian::read_u32(&envelope) as usize;
        if len > buf.len() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Receive buffer smaller than queued message",
            ));
        }

        state.bytes.drain(..ENVELOPE_SIZE);
        for (dst, src) in buf.iter_mut().zip(state.bytes.drain(..len)) {
            *dst = src;
        }
        log::trace!("[IPC] received {} bytes, buffered={}", len, state.bytes.len());
        drop(state);

        self.writable.notify_one();
        Ok(len)
    }

    /// 关闭缓冲区并唤醒所有等待者
    ///
    /// 已排队的消息仍可被接收。
    pub fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 已占用的字节数（含长度前缀）
    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 容量（字节）
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, PassageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
