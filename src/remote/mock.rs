//! 测试用的模拟远程主机
//!
//! 在内存中解释三种命令模板，后备文件保存在 `HashMap` 中。
//! 输出可以按预设的分块大小逐块交付，用于验证部分读取的累积。

use super::session::{ExecChannel, RemoteSession};
use crate::error::{Error, ErrorKind, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// 模拟主机状态
#[derive(Debug, Default)]
pub(crate) struct SimulatedHost {
    pub files: HashMap<String, Vec<u8>>,
    /// 收到的命令行，按顺序
    pub commands: Vec<String>,
    /// 下一条命令的输出分块大小，剩余部分一次交付
    pub chunk_plan: Vec<usize>,
    /// 输出截断到该长度（模拟提前结束的流）
    pub truncate_output: Option<usize>,
    /// 在读取时返回传输错误
    pub fail_read: bool,
    /// 在写入时返回传输错误
    pub fail_write: bool,
    /// 打开通道失败
    pub fail_open: bool,
    /// 执行命令失败
    pub fail_exec: bool,
    pub opened: usize,
    pub closed: usize,
    pub eofs: usize,
    pub disconnects: usize,
}

impl SimulatedHost {
    /// 执行一条命令，返回 (输出, 退出状态)
    fn run(&mut self, command: &str, input: &[u8]) -> (Vec<u8>, i32) {
        self.commands.push(command.to_string());

        if command == "false" {
            return (Vec::new(), 1);
        }
        if let Some(rest) = command.strip_prefix("test -f ") {
            // test -f F || truncate --size S F
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            let (file, size) = (tokens[0], tokens[4].parse::<usize>().unwrap_or(0));
            self.files
                .entry(file.to_string())
                .or_insert_with(|| alloc::vec![0u8; size]);
            return (Vec::new(), 0);
        }
        if command.starts_with("dd if=") {
            let args = parse_args(command);
            let Some(data) = self.files.get(args["if"]) else {
                return (Vec::new(), 1);
            };
            let bs: usize = args["bs"].parse().unwrap_or(0);
            let start = (args["skip"].parse::<usize>().unwrap_or(0) * bs).min(data.len());
            let end = (start + args["count"].parse::<usize>().unwrap_or(0) * bs).min(data.len());
            return (data[start..end].to_vec(), 0);
        }
        if command.starts_with("dd of=") {
            let args = parse_args(command);
            let Some(data) = self.files.get_mut(args["of"]) else {
                return (Vec::new(), 1);
            };
            let bs: usize = args["bs"].parse().unwrap_or(0);
            let start = args["seek"].parse::<usize>().unwrap_or(0) * bs;
            let len = (args["count"].parse::<usize>().unwrap_or(0) * bs).min(input.len());
            if data.len() < start + len {
                data.resize(start + len, 0);
            }
            data[start..start + len].copy_from_slice(&input[..len]);
            return (Vec::new(), 0);
        }
        (Vec::new(), 127)
    }
}

/// 取每个 `key=value` 的第一次出现
fn parse_args(command: &str) -> HashMap<&str, &str> {
    let mut args = HashMap::new();
    for token in command.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            args.entry(key).or_insert(value);
        }
    }
    args
}

/// 模拟会话
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSession {
    host: Arc<Mutex<SimulatedHost>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> MutexGuard<'_, SimulatedHost> {
        self.host.lock().unwrap()
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.host().files.get(name).cloned()
    }
}

impl RemoteSession for MockSession {
    type Channel = MockChannel;

    fn open_channel(&mut self) -> Result<MockChannel> {
        let mut host = self.host();
        if host.fail_open {
            return Err(Error::new(ErrorKind::Io, "simulated open failure"));
        }
        host.opened += 1;
        Ok(MockChannel {
            host: Arc::clone(&self.host),
            command: None,
            input: Vec::new(),
            output: VecDeque::new(),
            chunks: VecDeque::new(),
            status: None,
        })
    }

    fn disconnect(&mut self) {
        self.host().disconnects += 1;
    }
}

/// 模拟执行通道
///
/// 命令在第一次读取（或发送 EOF）时执行，此时输入已经写完。
pub(crate) struct MockChannel {
    host: Arc<Mutex<SimulatedHost>>,
    command: Option<String>,
    input: Vec<u8>,
    output: VecDeque<u8>,
    chunks: VecDeque<usize>,
    status: Option<i32>,
}

impl MockChannel {
    fn run_if_pending(&mut self) {
        if self.status.is_some() {
            return;
        }
        let Some(command) = self.command.take() else {
            return;
        };
        let mut host = self.host.lock().unwrap();
        let (mut output, status) = host.run(&command, &self.input);
        if let Some(limit) = host.truncate_output {
            output.truncate(limit);
        }
        self.chunks = host.chunk_plan.drain(..).collect();
        self.output = output.into();
        self.status = Some(status);
    }
}

impl ExecChannel for MockChannel {
    fn request_exec(&mut self, command: &str) -> Result<()> {
        if self.host.lock().unwrap().fail_exec {
            return Err(Error::new(ErrorKind::Io, "simulated exec failure"));
        }
        self.command = Some(command.to_string());
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.host.lock().unwrap().fail_write {
            return Err(Error::new(ErrorKind::Io, "simulated write failure"));
        }
        self.input.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.run_if_pending();
        if self.host.lock().unwrap().fail_read {
            return Err(Error::new(ErrorKind::Io, "simulated read failure"));
        }
        let chunk = self.chunks.pop_front().unwrap_or(usize::MAX);
        let n = chunk.min(buf.len()).min(self.output.len());
        for (dst, src) in buf.iter_mut().zip(self.output.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn send_eof(&mut self) -> Result<()> {
        self.host.lock().unwrap().eofs += 1;
        self.run_if_pending();
        Ok(())
    }

    fn exit_status(&mut self) -> Result<Option<i32>> {
        self.run_if_pending();
        Ok(self.status)
    }

    fn close(&mut self) -> Result<()> {
        self.host.lock().unwrap().closed += 1;
        Ok(())
    }
}
