use crate::core::{log_ctx, PlayerError, Result};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use log::warn;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// 工作线程命令
///
/// 参数在提交方校验，校验失败时工作线程完全不会被打扰
pub trait WorkerCommand: Send + 'static {
    type Reply: Send + 'static;

    fn name(&self) -> &'static str;

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

type ReplySender<R> = Sender<Result<R>>;

struct Envelope<C: WorkerCommand> {
    command: C,
    reply: Option<ReplySender<C::Reply>>,
}

/// 创建命令通道
///
/// - capacity: 通道深度（未被工作线程取走的命令数上限）
/// - timeout: 阻塞提交的等待上限，None 为无限等待
pub fn command_channel<C: WorkerCommand>(
    capacity: usize,
    timeout: Option<Duration>,
) -> (CommandSender<C>, CommandReceiver<C>) {
    let (tx, rx) = bounded(capacity.max(1));
    let worker_thread = Arc::new(Mutex::new(None));
    (
        CommandSender {
            tx,
            submit_lock: Mutex::new(()),
            timeout,
            worker_thread: worker_thread.clone(),
        },
        CommandReceiver { rx, worker_thread },
    )
}

/// 提交端（控制线程持有）
pub struct CommandSender<C: WorkerCommand> {
    tx: Sender<Envelope<C>>,
    // 提交方互斥：同一时刻只有一个提交在途
    submit_lock: Mutex<()>,
    timeout: Option<Duration>,
    worker_thread: Arc<Mutex<Option<ThreadId>>>,
}

impl<C: WorkerCommand> CommandSender<C> {
    /// 提交命令
    ///
    /// - 非阻塞：通道满返回 ChannelFull，成功返回 Ok(None)
    /// - 阻塞：等待通道有空位，再等待工作线程执行完毕，返回 Ok(Some(reply))
    pub fn submit(&self, command: C, blocking: bool) -> Result<Option<C::Reply>> {
        command.validate()?;

        if blocking && self.is_worker_thread() {
            return Err(PlayerError::WouldDeadlock);
        }

        let _guard = self.submit_lock.lock();

        if !blocking {
            return match self.tx.try_send(Envelope { command, reply: None }) {
                Ok(()) => Ok(None),
                Err(TrySendError::Full(_)) => Err(PlayerError::ChannelFull),
                Err(TrySendError::Disconnected(_)) => Err(PlayerError::WorkerGone),
            };
        }

        let (reply_tx, reply_rx) = bounded(1);
        let envelope = Envelope {
            command,
            reply: Some(reply_tx),
        };
        let deadline = self.timeout.map(|t| Instant::now() + t);

        match deadline {
            Some(deadline) => self
                .tx
                .send_timeout(envelope, remaining(deadline))
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => PlayerError::Timeout,
                    SendTimeoutError::Disconnected(_) => PlayerError::WorkerGone,
                })?,
            None => self.tx.send(envelope).map_err(|_| PlayerError::WorkerGone)?,
        }

        let reply = match deadline {
            Some(deadline) => reply_rx
                .recv_timeout(remaining(deadline))
                .map_err(|e| match e {
                    RecvTimeoutError::Timeout => PlayerError::Timeout,
                    RecvTimeoutError::Disconnected => PlayerError::WorkerGone,
                })?,
            None => reply_rx.recv().map_err(|_| PlayerError::WorkerGone)?,
        };

        reply.map(Some)
    }

    /// 阻塞提交并取回结果
    pub fn request(&self, command: C) -> Result<C::Reply> {
        self.submit(command, true)?
            .ok_or(PlayerError::NullResource("命令回复"))
    }

    fn is_worker_thread(&self) -> bool {
        *self.worker_thread.lock() == Some(thread::current().id())
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// 收件结果
pub enum Inbox<C: WorkerCommand> {
    Command(PendingCommand<C>),
    Empty,
    /// 提交端已全部释放
    Closed,
}

/// 接收端（工作线程持有）
pub struct CommandReceiver<C: WorkerCommand> {
    rx: Receiver<Envelope<C>>,
    worker_thread: Arc<Mutex<Option<ThreadId>>>,
}

impl<C: WorkerCommand> CommandReceiver<C> {
    /// 在工作线程启动时调用，之后该线程内的阻塞提交会被拒绝
    pub fn bind_current_thread(&self) {
        *self.worker_thread.lock() = Some(thread::current().id());
    }

    /// 取一条命令（不等待）
    pub fn try_next(&self) -> Inbox<C> {
        match self.rx.try_recv() {
            Ok(envelope) => Inbox::Command(PendingCommand::new(envelope)),
            Err(TryRecvError::Empty) => Inbox::Empty,
            Err(TryRecvError::Disconnected) => Inbox::Closed,
        }
    }

    /// 最多等待 timeout，有命令到达立即返回
    pub fn next_timeout(&self, timeout: Duration) -> Inbox<C> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => Inbox::Command(PendingCommand::new(envelope)),
            Err(RecvTimeoutError::Timeout) => Inbox::Empty,
            Err(RecvTimeoutError::Disconnected) => Inbox::Closed,
        }
    }
}

/// 已取出、尚未回复的命令
pub struct PendingCommand<C: WorkerCommand> {
    command: C,
    reply: CommandReply<C::Reply>,
}

impl<C: WorkerCommand> PendingCommand<C> {
    fn new(envelope: Envelope<C>) -> Self {
        let name = envelope.command.name();
        Self {
            command: envelope.command,
            reply: CommandReply {
                name,
                tx: envelope.reply,
            },
        }
    }

    pub fn into_parts(self) -> (C, CommandReply<C::Reply>) {
        (self.command, self.reply)
    }
}

/// 回复句柄
pub struct CommandReply<R> {
    name: &'static str,
    tx: Option<ReplySender<R>>,
}

impl<R> CommandReply<R> {
    pub fn send(self, result: Result<R>) {
        match self.tx {
            Some(tx) => {
                if tx.send(result).is_err() {
                    warn!("{} ⚠ 命令 {} 的等待方已放弃（超时），回复被丢弃", log_ctx(), self.name);
                }
            }
            None => {
                if let Err(e) = result {
                    warn!("{} ⚠ 非阻塞命令 {} 执行失败: {}", log_ctx(), self.name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Counter {
        Get,
        Set(u32),
    }

    impl WorkerCommand for Counter {
        type Reply = u32;

        fn name(&self) -> &'static str {
            match self {
                Counter::Get => "GET",
                Counter::Set(_) => "SET",
            }
        }

        fn validate(&self) -> Result<()> {
            match self {
                Counter::Set(v) if *v > 100 => Err(PlayerError::InvalidArgument(format!("{}", v))),
                _ => Ok(()),
            }
        }
    }

    fn spawn_counter(rx: CommandReceiver<Counter>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            rx.bind_current_thread();
            let mut value = 0;
            loop {
                match rx.next_timeout(Duration::from_millis(1)) {
                    Inbox::Command(pending) => {
                        let (cmd, reply) = pending.into_parts();
                        if let Counter::Set(v) = cmd {
                            value = v;
                        }
                        reply.send(Ok(value));
                    }
                    Inbox::Empty => {}
                    Inbox::Closed => break,
                }
            }
        })
    }

    #[test]
    fn blocking_set_then_get_round_trips() {
        let (tx, rx) = command_channel::<Counter>(1, None);
        let worker = spawn_counter(rx);

        assert_eq!(tx.request(Counter::Set(42)).unwrap(), 42);
        assert_eq!(tx.request(Counter::Get).unwrap(), 42);

        drop(tx);
        worker.join().unwrap();
    }

    #[test]
    fn non_blocking_submit_reports_full_channel() {
        let (tx, _rx) = command_channel::<Counter>(1, None);

        assert!(tx.submit(Counter::Set(1), false).unwrap().is_none());
        assert!(matches!(tx.submit(Counter::Set(2), false), Err(PlayerError::ChannelFull)));
    }

    #[test]
    fn invalid_argument_never_reaches_worker() {
        let (tx, rx) = command_channel::<Counter>(1, None);

        assert!(matches!(
            tx.submit(Counter::Set(500), false),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert!(matches!(rx.try_next(), Inbox::Empty));
    }

    #[test]
    fn blocking_submit_times_out_without_worker() {
        let (tx, _rx) = command_channel::<Counter>(1, Some(Duration::from_millis(20)));

        let started = Instant::now();
        assert!(matches!(tx.submit(Counter::Get, true), Err(PlayerError::Timeout)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocking_submit_from_worker_thread_is_rejected() {
        let (tx, rx) = command_channel::<Counter>(1, None);
        rx.bind_current_thread();

        assert!(matches!(tx.submit(Counter::Get, true), Err(PlayerError::WouldDeadlock)));
        // 非阻塞提交仍然允许
        assert!(tx.submit(Counter::Get, false).is_ok());
    }

    #[test]
    fn dropped_pending_command_wakes_waiter() {
        let (tx, rx) = command_channel::<Counter>(1, None);
        let worker = thread::spawn(move || {
            // 取出命令但不回复
            loop {
                if let Inbox::Command(pending) = rx.next_timeout(Duration::from_millis(1)) {
                    drop(pending);
                    break;
                }
            }
        });

        assert!(matches!(tx.submit(Counter::Get, true), Err(PlayerError::WorkerGone)));
        worker.join().unwrap();
    }

    #[test]
    fn receiver_sees_closed_after_sender_dropped() {
        let (tx, rx) = command_channel::<Counter>(1, None);
        drop(tx);
        assert!(matches!(rx.try_next(), Inbox::Closed));
    }
}
