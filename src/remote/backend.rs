//! 后端协议循环
//!
//! 每个请求走一遍同一个状态机，没有终止状态：
//!
//! ```text
//! 等待 -> 打开 -> 翻译 -> 执行 -> 收集 -> 响应 -> 关闭 -> 等待 ...
//! ```
//!
//! 任何一步出错都会中止当前执行通道并断开会话，错误返回给调用者；
//! 在途的请求不会在这里重试，重建会话由调用者负责。

use super::command::RemoteCommand;
use super::session::{ChannelState, ExecChannel, RemoteSession};
use crate::config::BackingFile;
use crate::error::{Error, ErrorKind, Result};
use crate::ipc::{CommandMessage, Responder};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

/// 丢弃多余输出时使用的缓冲区大小
const SCRATCH_SIZE: usize = 512;

/// 后端任务
///
/// 持有已认证的会话和命令通道的后端端点。
pub struct Backend<S: RemoteSession> {
    session: S,
    responder: Responder,
    backing: BackingFile,
    /// 复用的请求/响应消息
    message: CommandMessage,
    /// 复用的命令行缓冲区
    command_line: String,
    scratch: Vec<u8>,
    served: u64,
}

impl<S: RemoteSession> Backend<S> {
    /// 创建后端
    ///
    /// # 参数
    ///
    /// * `session` - 已完成认证与主机校验的会话
    /// * `responder` - 命令通道后端端点
    /// * `backing` - 远程后备文件
    pub fn new(session: S, responder: Responder, backing: BackingFile) -> Self {
        Self {
            session,
            responder,
            backing,
            message: CommandMessage::new(),
            command_line: String::with_capacity(256),
            scratch: alloc::vec![0u8; SCRATCH_SIZE],
            served: 0,
        }
    }

    /// 发送就绪信号后持续服务请求
    ///
    /// 只在出错时返回；返回前会话已经断开。
    pub fn run(mut self) -> Result<()> {
        if let Err(err) = self.responder.signal_ready() {
            self.session.disconnect();
            return Err(err);
        }
        log::info!("[REMOTE] session ready, serving {}", self.backing);

        loop {
            if let Err(err) = self.serve_one() {
                log::error!(
                    "[REMOTE] backend stopped after {} requests: {}",
                    self.served,
                    err
                );
                return Err(err);
            }
        }
    }

    /// 服务一个请求
    ///
    /// 出错时执行通道被关闭、会话被断开。
    pub fn serve_one(&mut self) -> Result<()> {
        let result = self.serve_request();
        if let Err(err) = &result {
            log::error!("[REMOTE] request failed, disconnecting session: {}", err);
            self.session.disconnect();
        }
        result
    }

    /// 已成功服务的请求数
    pub fn served(&self) -> u64 {
        self.served
    }

    /// 底层会话
    pub fn session(&self) -> &S {
        &self.session
    }

    fn serve_request(&mut self) -> Result<()> {
        self.responder.receive(&mut self.message)?;

        let mut channel = ChannelGuard::new(self.session.open_channel()?);
        let outcome = self.execute(&mut channel);
        let closed = channel.close();
        outcome.and(closed)
    }

    fn execute<C: ExecChannel>(&mut self, channel: &mut ChannelGuard<C>) -> Result<()> {
        let command = RemoteCommand::for_message(&self.message, &self.backing);
        self.command_line.clear();
        write!(self.command_line, "{}", command)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Failed to format command line"))?;
        log::debug!("[REMOTE] {:?} -> {}", self.message, self.command_line);

        channel.request_exec(&self.command_line)?;
        if command.consumes_input() {
            channel.write_all(self.message.data())?;
            channel.send_eof()?;
        }

        if command.produces_output() {
            let want = self.message.data_length() as usize;
            let got = drain(channel, &mut self.message.payload_mut()[..want], &mut self.scratch)?;
            if got < want {
                log::warn!(
                    "[REMOTE] short read at lba={}: {}/{} bytes",
                    self.message.logical_block_address,
                    got,
                    want
                );
            }
            self.message.set_data_length(got)?;
        } else {
            discard_to_end(channel, &mut self.scratch)?;
        }

        match channel.exit_status()? {
            Some(0) | None => {}
            Some(code) => {
                log::error!("[REMOTE] `{}` exited with status {}", self.command_line, code);
                return Err(Error::new(
                    ErrorKind::RemoteFailure,
                    "Remote command exited with non-zero status",
                ));
            }
        }

        self.responder.send(&self.message)?;
        self.served += 1;
        Ok(())
    }
}

/// 读取输出直到填满 `buf` 或输出结束，返回累积的字节数
///
/// 每次部分读取的字节数都累加到总数上，下一次读取从总数处继续；
/// 读到 0 表示输出结束。填满后继续读到输出结束，多余字节写入 `scratch` 丢弃。
pub(crate) fn drain<C: ExecChannel + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
    scratch: &mut [u8],
) -> Result<usize> {
    let want = buf.len();
    let mut total = 0;
    while total < want {
        let n = channel.read(&mut buf[total..])?;
        if n == 0 {
            return Ok(total);
        }
        total += n;
    }

    let surplus = discard_to_end(channel, scratch)?;
    if surplus > 0 {
        log::warn!("[REMOTE] discarded {} surplus output bytes", surplus);
    }
    Ok(total)
}

/// 读到输出结束，返回丢弃的字节数
pub(crate) fn discard_to_end<C: ExecChannel + ?Sized>(
    channel: &mut C,
    scratch: &mut [u8],
) -> Result<usize> {
    let mut discarded = 0;
    loop {
        match channel.read(scratch)? {
            0 => return Ok(discarded),
            n => discarded += n,
        }
    }
}

/// 跟踪执行通道生命周期，保证 EOF 与关闭各只发送一次
struct ChannelGuard<C: ExecChannel> {
    inner: C,
    state: ChannelState,
}

impl<C: ExecChannel> ChannelGuard<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            state: ChannelState::OPEN,
        }
    }
}

impl<C: ExecChannel> ExecChannel for ChannelGuard<C> {
    fn request_exec(&mut self, command: &str) -> Result<()> {
        self.inner.request_exec(command)?;
        self.state.insert(ChannelState::EXEC);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn send_eof(&mut self) -> Result<()> {
        if self.state.contains(ChannelState::EOF_SENT) {
            return Ok(());
        }
        self.state.insert(ChannelState::EOF_SENT);
        self.inner.send_eof()
    }

    fn exit_status(&mut self) -> Result<Option<i32>> {
        self.inner.exit_status()
    }

    fn close(&mut self) -> Result<()> {
        if self.state.contains(ChannelState::CLOSED) {
            return Ok(());
        }
        let eof = if self.state.contains(ChannelState::EXEC) {
            self.send_eof()
        } else {
            Ok(())
        };
        self.state.insert(ChannelState::CLOSED);
        let closed = self.inner.close();
        log::trace!("[REMOTE] channel closed, state={:?}", self.state);
        eof.and(closed)
    }
}

impl<C: ExecChannel> Drop for ChannelGuard<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("[REMOTE] failed to close channel: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{command_channel, HostCommand, Requester};
    use crate::remote::mock::MockSession;
    use std::collections::VecDeque;

    const FILE: &str = "/srv/msc.img";

    fn setup() -> (Requester, Backend<MockSession>, MockSession) {
        let (requester, responder) = command_channel();
        let session = MockSession::new();
        let backend = Backend::new(session.clone(), responder, BackingFile::new(FILE).unwrap());
        (requester, backend, session)
    }

    /// 单线程地跑一次请求：容量恰好容纳一条消息
    fn round_trip(
        requester: &mut Requester,
        backend: &mut Backend<MockSession>,
        msg: &mut CommandMessage,
    ) -> Result<()> {
        requester.send(msg)?;
        backend.serve_one()?;
        requester.receive(msg)
    }

    #[test]
    fn test_create_backing_file_is_idempotent() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();

        msg.set_create(512, 64);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        assert_eq!(session.file(FILE).unwrap().len(), 64 * 512);

        msg.set_write(512, 3, &[0x77; 512]).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        msg.set_create(512, 64);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        let data = session.file(FILE).unwrap();
        assert_eq!(data.len(), 64 * 512);
        assert_eq!(&data[3 * 512..4 * 512], &[0x77; 512][..]);
        assert_eq!(msg.command, HostCommand::CreateBackingFile);
        assert_eq!(backend.served(), 3);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 32);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        let pattern: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();
        msg.set_write(512, 10, &pattern).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        assert_eq!(msg.data_length() as usize, pattern.len());

        msg.set_read(512, 10, pattern.len()).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        assert_eq!(msg.data(), &pattern[..]);

        let host = session.host();
        assert_eq!(host.opened, 3);
        assert_eq!(host.closed, 3);
        assert_eq!(
            host.commands[1],
            "dd of=/srv/msc.img conv=notrunc bs=512 seek=10 count=4 2>/dev/null"
        );
        assert_eq!(host.disconnects, 0);
    }

    #[test]
    fn test_partial_reads_accumulate() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 8);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        let pattern: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();
        msg.set_write(512, 2, &pattern).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        session.host().chunk_plan = alloc::vec![1, 3];
        msg.set_read(512, 2, 1024).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        assert_eq!(msg.data_length(), 1024);
        assert_eq!(msg.data(), &pattern[..]);
    }

    #[test]
    fn test_short_read_reports_received_length() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 8);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        session.host().truncate_output = Some(700);
        msg.set_read(512, 0, 1024).unwrap();
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();
        assert_eq!(msg.data_length(), 700);
    }

    #[test]
    fn test_unknown_command_fails_and_tears_down() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.command = HostCommand::Other(9);
        requester.send(&msg).unwrap();

        let err = backend.serve_one().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        {
            let host = session.host();
            assert_eq!(host.commands, ["false"]);
            assert_eq!(host.closed, 1);
            assert_eq!(host.disconnects, 1);
        }

        // 没有响应；后端退出后前端看到断开
        drop(backend);
        let err = requester.receive(&mut msg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disconnected);
    }

    #[test]
    fn test_exec_failure_closes_channel_and_session() {
        let (mut requester, mut backend, session) = setup();
        session.host().fail_exec = true;

        let mut msg = CommandMessage::new();
        msg.set_read(512, 0, 512).unwrap();
        requester.send(&msg).unwrap();
        let err = backend.serve_one().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let host = session.host();
        assert_eq!(host.closed, 1);
        // 命令未执行，不发送 EOF
        assert_eq!(host.eofs, 0);
        assert_eq!(host.disconnects, 1);
    }

    #[test]
    fn test_read_failure_closes_channel_and_session() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 8);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        session.host().fail_read = true;
        msg.set_read(512, 0, 512).unwrap();
        requester.send(&msg).unwrap();
        let err = backend.serve_one().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let host = session.host();
        assert_eq!(host.opened, 2);
        assert_eq!(host.closed, 2);
        assert_eq!(host.disconnects, 1);
    }

    #[test]
    fn test_write_failure_closes_channel_and_session() {
        let (mut requester, mut backend, session) = setup();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 8);
        round_trip(&mut requester, &mut backend, &mut msg).unwrap();

        session.host().fail_write = true;
        msg.set_write(512, 2, &[0x5a; 512]).unwrap();
        requester.send(&msg).unwrap();
        let err = backend.serve_one().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        {
            let host = session.host();
            assert_eq!(host.opened, 2);
            assert_eq!(host.closed, 2);
            // 两次都是关闭前补发的 EOF
            assert_eq!(host.eofs, 2);
            assert_eq!(host.disconnects, 1);
            assert_eq!(&host.files[FILE][2 * 512..3 * 512], &[0u8; 512][..]);
        }

        drop(backend);
        let err = requester.receive(&mut msg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disconnected);
    }

    #[test]
    fn test_open_failure_disconnects() {
        let (mut requester, mut backend, session) = setup();
        session.host().fail_open = true;
        let mut msg = CommandMessage::new();
        msg.set_create(512, 8);
        requester.send(&msg).unwrap();

        let err = backend.serve_one().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(session.host().disconnects, 1);
        assert_eq!(session.host().closed, 0);
    }

    #[test]
    fn test_run_signals_ready_and_stops_on_disconnect() {
        let (mut requester, backend, session) = setup();
        let worker = std::thread::spawn(move || backend.run());

        requester.wait_ready().unwrap();
        let mut msg = CommandMessage::new();
        msg.set_create(512, 16);
        requester.transact(&mut msg).unwrap();
        msg.set_write(512, 1, &[9u8; 512]).unwrap();
        requester.transact(&mut msg).unwrap();
        msg.set_read(512, 1, 512).unwrap();
        requester.transact(&mut msg).unwrap();
        assert_eq!(msg.data(), &[9u8; 512][..]);

        drop(requester);
        let err = worker.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disconnected);
        assert_eq!(session.host().disconnects, 1);
    }

    /// 按脚本逐块输出的通道
    struct Scripted {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Scripted {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl ExecChannel for Scripted {
        fn request_exec(&mut self, _command: &str) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let Some(mut chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn send_eof(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_drain_chunks_of_one_three_and_rest() {
        let mut channel = Scripted::new(&[b"a", b"bcd", b"efghij"]);
        let mut buf = [0u8; 10];
        let mut scratch = [0u8; 4];
        let got = drain(&mut channel, &mut buf, &mut scratch).unwrap();
        assert_eq!(got, 10);
        assert_eq!(&buf, b"abcdefghij");
    }

    #[test]
    fn test_drain_distinguishes_early_end() {
        let mut channel = Scripted::new(&[b"ab", b"c"]);
        let mut buf = [0u8; 10];
        let mut scratch = [0u8; 4];
        let got = drain(&mut channel, &mut buf, &mut scratch).unwrap();
        assert_eq!(got, 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn test_drain_discards_surplus() {
        let mut channel = Scripted::new(&[b"abcdef", b"ghij"]);
        let mut buf = [0u8; 4];
        let mut scratch = [0u8; 3];
        let got = drain(&mut channel, &mut buf, &mut scratch).unwrap();
        assert_eq!(got, 4);
        assert_eq!(&buf, b"abcd");
        assert!(channel.chunks.is_empty());
    }

    #[test]
    fn test_guard_sends_eof_and_close_once() {
        let session = MockSession::new();
        let mut opener = session.clone();
        let mut guard = ChannelGuard::new(opener.open_channel().unwrap());
        guard.request_exec("false").unwrap();
        guard.send_eof().unwrap();
        guard.close().unwrap();
        drop(guard);

        let host = session.host();
        assert_eq!(host.eofs, 1);
        assert_eq!(host.closed, 1);
    }
}
