//! 基于外部程序的远程会话
//!
//! 每个执行通道就是一个子进程：`program args.. <command>`。
//! 用 `ssh -T user@host` 时命令在远程主机上执行；用 `sh -c` 时在本机执行，
//! 便于在没有远程主机的环境下验证协议。会话的认证由外部程序负责。

use super::session::{ChannelState, ExecChannel, RemoteSession};
use crate::error::{Error, ErrorKind, Result};
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// 通过外部程序执行命令的会话
#[derive(Debug, Clone)]
pub struct ProcessSession {
    program: String,
    args: Vec<String>,
}

impl ProcessSession {
    /// 创建会话，命令行作为最后一个参数追加在 `args` 之后
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 在本机 `sh -c` 中执行命令的会话
    pub fn shell() -> Self {
        Self::new("sh", ["-c"])
    }
}

impl RemoteSession for ProcessSession {
    type Channel = ProcessChannel;

    fn open_channel(&mut self) -> Result<ProcessChannel> {
        Ok(ProcessChannel {
            program: self.program.clone(),
            args: self.args.clone(),
            child: None,
            stdin: None,
            stdout: None,
            state: ChannelState::OPEN,
        })
    }

    fn disconnect(&mut self) {
        log::info!("[REMOTE] {} session disconnected", self.program);
    }
}

/// 子进程执行通道
pub struct ProcessChannel {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    state: ChannelState,
}

impl ProcessChannel {
    /// 通道状态
    pub fn state(&self) -> ChannelState {
        self.state
    }
}

impl ExecChannel for ProcessChannel {
    fn request_exec(&mut self, command: &str) -> Result<()> {
        if self.state.contains(ChannelState::EXEC) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Channel already executed a command",
            ));
        }
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.state.insert(ChannelState::EXEC);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(Error::new(ErrorKind::Disconnected, "Remote input closed"))?;
        Ok(stdin.write(data)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => Ok(stdout.read(buf)?),
            None => Ok(0),
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        // 关闭管道即输入结束
        self.stdin.take();
        self.state.insert(ChannelState::EOF_SENT);
        Ok(())
    }

    fn exit_status(&mut self) -> Result<Option<i32>> {
        self.stdin.take();
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child.wait()?;
        // 被信号终止没有退出码
        Ok(Some(status.code().unwrap_or(-1)))
    }

    fn close(&mut self) -> Result<()> {
        if self.state.contains(ChannelState::CLOSED) {
            return Ok(());
        }
        self.state.insert(ChannelState::CLOSED);
        self.stdin.take();
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                log::debug!("[REMOTE] killing unfinished command");
                child.kill()?;
            }
            child.wait()?;
        }
        Ok(())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("[REMOTE] failed to reap command: {}", err);
        }
    }
}
