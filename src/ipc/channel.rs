//! 命令通道端点
//!
//! ```text
//!  Requester (前端)  --- requests  --->  Responder (后端)
//!                    <-- responses ---
//! ```
//!
//! 任一端点被丢弃时两个方向都会关闭：已排队的消息仍会送达，
//! 之后对端的接收与发送都返回 `Disconnected`。

use super::buffer::MessageBuffer;
use super::message::CommandMessage;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// 创建一对通道端点
pub fn command_channel() -> (Requester, Responder) {
    let requests = Arc::new(MessageBuffer::new(PASSAGE_CAPACITY));
    let responses = Arc::new(MessageBuffer::new(PASSAGE_CAPACITY));

    let requester = Requester {
        link: Link::new(Arc::clone(&requests), Arc::clone(&responses)),
    };
    let responder = Responder {
        link: Link::new(requests, responses),
    };
    (requester, responder)
}

/// 端点共享的两个方向，以及本端复用的帧缓冲区
struct Link {
    requests: Arc<MessageBuffer>,
    responses: Arc<MessageBuffer>,
    frame: Vec<u8>,
}

impl Link {
    fn new(requests: Arc<MessageBuffer>, responses: Arc<MessageBuffer>) -> Self {
        Self {
            requests,
            responses,
            frame: alloc::vec![0u8; MAX_FRAME_SIZE],
        }
    }

    fn send_message(&mut self, passage: Passage, msg: &CommandMessage) -> Result<()> {
        let len = msg.encode(&mut self.frame)?;
        self.buffer(passage).send(&self.frame[..len])
    }

    /// 接收一帧，返回帧长度
    fn receive_frame(&mut self, passage: Passage) -> Result<usize> {
        let buffer = match passage {
            Passage::Requests => &self.requests,
            Passage::Responses => &self.responses,
        };
        buffer.receive(&mut self.frame)
    }

    fn receive_message(&mut self, passage: Passage, msg: &mut CommandMessage) -> Result<()> {
        let len = self.receive_frame(passage)?;
        if len == READY_FRAME_SIZE {
            return Err(Error::new(ErrorKind::Protocol, "Unexpected ready signal"));
        }
        msg.decode_from(&self.frame[..len])
    }

    fn buffer(&self, passage: Passage) -> &MessageBuffer {
        match passage {
            Passage::Requests => &self.requests,
            Passage::Responses => &self.responses,
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.requests.close();
        self.responses.close();
    }
}

#[derive(Debug, Clone, Copy)]
enum Passage {
    Requests,
    Responses,
}

/// 前端端点：发送请求，接收响应
pub struct Requester {
    link: Link,
}

impl Requester {
    /// 发送请求
    pub fn send(&mut self, msg: &CommandMessage) -> Result<()> {
        log::trace!("[IPC] request {:?}", msg);
        self.link.send_message(Passage::Requests, msg)
    }

    /// 接收响应
    pub fn receive(&mut self, msg: &mut CommandMessage) -> Result<()> {
        self.link.receive_message(Passage::Responses, msg)
    }

    /// 发送请求并等待对应响应，响应覆盖 `msg`
    pub fn transact(&mut self, msg: &mut CommandMessage) -> Result<()> {
        self.send(msg)?;
        self.receive(msg)
    }

    /// 等待后端的会话就绪信号
    pub fn wait_ready(&mut self) -> Result<()> {
        let len = self.link.receive_frame(Passage::Responses)?;
        if len != READY_FRAME_SIZE {
            return Err(Error::new(ErrorKind::Protocol, "Expected ready signal"));
        }
        log::debug!("[IPC] backend ready");
        Ok(())
    }
}

/// 后端端点：接收请求，发送响应
pub struct Responder {
    link: Link,
}

impl Responder {
    /// 接收请求
    pub fn receive(&mut self, msg: &mut CommandMessage) -> Result<()> {
        self.link.receive_message(Passage::Requests, msg)
    }

    /// 发送响应
    pub fn send(&mut self, msg: &CommandMessage) -> Result<()> {
        log::trace!("[IPC] response {:?}", msg);
        self.link.send_message(Passage::Responses, msg)
    }

    /// 通知前端远程会话已就绪
    pub fn signal_ready(&mut self) -> Result<()> {
        self.link.buffer(Passage::Responses).send(&[0u8; READY_FRAME_SIZE])
    }
}
