//! 子进程执行（有界等待）。
//!
//! 实现策略：
//! - 启动子进程后轮询退出状态，超过时限则终止子进程并返回 [`ProcessError::TimedOut`]
//! - stdout/stderr 由独立线程读取，避免输出过多时管道写满导致子进程阻塞
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 子进程执行失败（无法得到退出码的情况）。
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("启动 {program} 失败: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("等待 {program} 失败: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} 在 {}s 内未结束，已终止", timeout.as_secs_f32())]
    TimedOut { program: String, timeout: Duration },
}

/// 已结束子进程的输出。
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// 退出码（被信号终止时为 -1）。
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// 用于错误信息的摘要：退出码 + stdout + stderr。
    pub fn summary(&self) -> String {
        let mut s = format!("退出码 {}", self.code());
        for part in [self.stdout.trim(), self.stderr.trim()] {
            if !part.is_empty() {
                s.push('\n');
                s.push_str(part);
            }
        }
        s
    }
}

/// 执行命令并在时限内等待其结束。
///
/// 参数：
/// - `cmd`：待执行的命令（stdin/stdout/stderr 会被重定向）
/// - `timeout`：最长等待时间
///
/// 返回值：
/// - 子进程正常结束（无论退出码）：返回 [`CommandOutput`]，由调用方检查退出码
///
/// 异常处理：
/// - 启动失败 / 等待失败 / 超时：返回 [`ProcessError`]；超时时子进程会被终止
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, ProcessError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("执行命令: {:?}", cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::TimedOut { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ProcessError::Wait { program, source });
            }
        }
    };

    Ok(CommandOutput {
        status,
        stdout: join(stdout),
        stderr: join(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
