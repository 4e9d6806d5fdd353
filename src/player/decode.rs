use crate::core::{alloc_buffer, log_ctx, DecodedFrame, MediaClock, PlayerConfig, PlayerError, Result, TrackKind};
use crate::player::codec::{Codec, CodecOutcome};
use crate::player::command::{command_channel, CommandReceiver, CommandSender, Inbox, PendingCommand, WorkerCommand};
use crate::player::packet_list::{Packet, PacketList};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 解码输出回调，帧数据只在回调期间有效
pub type FlushCallback = Box<dyn FnMut(&DecodedFrame<'_>) + Send>;

/// 解码线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeState {
    Init,
    Idle,
    Run,
    ToExit,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeCommand {
    GetState,
    SetState(DecodeState),
}

impl WorkerCommand for DecodeCommand {
    type Reply = DecodeState;

    fn name(&self) -> &'static str {
        match self {
            DecodeCommand::GetState => "GET_STATE",
            DecodeCommand::SetState(_) => "SET_STATE",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            DecodeCommand::SetState(state @ (DecodeState::Init | DecodeState::Exit)) => Err(
                PlayerError::InvalidArgument(format!("状态 {:?} 只能由解码线程自己设置", state)),
            ),
            _ => Ok(()),
        }
    }
}

/// 解码致命错误记录，Status() 据此报告 Error
#[derive(Clone, Default)]
pub struct FaultLatch {
    inner: Arc<Mutex<Option<String>>>,
}

impl FaultLatch {
    pub fn raise(&self, track: TrackKind, err: &PlayerError) {
        let mut inner = self.inner.lock();
        if inner.is_none() {
            *inner = Some(format!("{}解码失败: {}", track, err));
        }
    }

    pub fn is_raised(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn message(&self) -> Option<String> {
        self.inner.lock().clone()
    }
}

/// 解码线程资源
pub struct DecodeResources {
    pub track: TrackKind,
    pub codec: Box<dyn Codec>,
    pub list: Arc<PacketList>,
    pub flush: FlushCallback,
    /// 单个输出槽位字节数
    pub slot_bytes: usize,
    pub clock: MediaClock,
    pub config: PlayerConfig,
    pub fault: FaultLatch,
}

struct DecodeLoop {
    track: TrackKind,
    codec: Box<dyn Codec>,
    list: Arc<PacketList>,
    flush: FlushCallback,
    slots: Vec<Vec<u8>>,
    slot_idx: usize,
    clock: MediaClock,
    poll_interval: Duration,
    fault: FaultLatch,
    commands: CommandReceiver<DecodeCommand>,
    state: DecodeState,
    decoded: u64,
}

impl DecodeLoop {
    fn new(res: DecodeResources, commands: CommandReceiver<DecodeCommand>) -> Result<Self> {
        let slots = match (0..res.config.decoded_frame_slots)
            .map(|_| alloc_buffer(res.slot_bytes))
            .collect::<Result<Vec<_>>>()
        {
            Ok(slots) => slots,
            Err(e) => {
                // 线程没有启动，编解码器在这里关闭
                let mut codec = res.codec;
                codec.close();
                return Err(e);
            }
        };
        Ok(Self {
            track: res.track,
            codec: res.codec,
            list: res.list,
            flush: res.flush,
            slots,
            slot_idx: 0,
            clock: res.clock,
            poll_interval: res.config.poll_interval(),
            fault: res.fault,
            commands,
            state: DecodeState::Init,
            decoded: 0,
        })
    }

    /// 线程结束时交还编解码器，由管理端关闭
    fn run(mut self) -> Box<dyn Codec> {
        self.commands.bind_current_thread();
        info!("{} 🎞 {}解码线程启动（{} 个输出槽位）", log_ctx(), self.track, self.slots.len());
        self.state = DecodeState::Idle;

        while self.state != DecodeState::ToExit {
            let wait = match self.state {
                DecodeState::Run => self.step(),
                _ => self.poll_interval,
            };

            match self.commands.next_timeout(wait) {
                Inbox::Command(pending) => self.dispatch(pending),
                Inbox::Empty => {}
                Inbox::Closed => {
                    warn!("{} ⚠ 命令通道已关闭，{}解码线程退出", log_ctx(), self.track);
                    self.state = DecodeState::ToExit;
                }
            }
        }

        self.state = DecodeState::Exit;
        info!("{} 🛑 {}解码线程退出（共输出 {} 帧）", log_ctx(), self.track, self.decoded);
        self.codec
    }

    fn dispatch(&mut self, pending: PendingCommand<DecodeCommand>) {
        let (command, reply) = pending.into_parts();
        if let DecodeCommand::SetState(state) = command {
            if state != self.state {
                info!("{} 🔄 {}解码状态 {:?} -> {:?}", log_ctx(), self.track, self.state, state);
            }
            self.state = state;
        }
        reply.send(Ok(self.state));
    }

    /// 处理一个已就绪的包，返回下一次等待命令的时长
    fn step(&mut self) -> Duration {
        match self.list.acquire_closed_packet(self.clock.now_ms()) {
            Some(packet) => {
                self.decode_packet(&packet);
                self.list.release(packet);
                self.slot_idx = (self.slot_idx + 1) % self.slots.len();
                Duration::ZERO
            }
            None if self.list.is_empty() => {
                // 条件变量等待新包，命令最多延迟一个轮询间隔
                self.list.wait_ready(self.poll_interval);
                Duration::ZERO
            }
            None => self.poll_interval,
        }
    }

    fn decode_packet(&mut self, packet: &Packet) {
        let slot = &mut self.slots[self.slot_idx];
        match self.codec.decode(&packet.data, packet.header.data_time, slot) {
            CodecOutcome::Emitted { size, remaining } => {
                if remaining > 0 {
                    debug!(
                        "{} ✂ {}分片 #{} 剩余 {} 字节未解码，丢弃",
                        log_ctx(),
                        self.track,
                        packet.header.chunk_id,
                        remaining
                    );
                }
                if size > 0 {
                    let frame = DecodedFrame {
                        track: self.track,
                        data: &slot[..size],
                        data_time: packet.header.data_time,
                        present_at: packet.header.pts,
                    };
                    (self.flush)(&frame);
                    self.decoded += 1;
                }
            }
            CodecOutcome::NeedMoreInput => {
                debug!("{} ⏳ {}分片 #{} 需要更多输入", log_ctx(), self.track, packet.header.chunk_id);
            }
            CodecOutcome::Fatal(e) => {
                error!("{} ❌ {}分片 #{} 解码失败: {}", log_ctx(), self.track, packet.header.chunk_id, e);
                self.fault.raise(self.track, &e);
            }
        }
    }
}

/// 解码线程管理器
pub struct DecodeWorker {
    track: TrackKind,
    thread_handle: Option<JoinHandle<Box<dyn Codec>>>,
    commands: CommandSender<DecodeCommand>,
    poll_interval: Duration,
}

impl DecodeWorker {
    /// 启动解码线程（IDLE 状态），等待其离开 INIT 后返回
    pub fn start(resources: DecodeResources) -> Result<Self> {
        let track = resources.track;
        let config = resources.config.clone();
        let (commands, receiver) = command_channel(config.command_capacity, config.command_timeout());
        let decode = DecodeLoop::new(resources, receiver)?;

        let thread_handle = thread::Builder::new()
            .name(format!("chunk-decode-{:?}", track).to_lowercase())
            .spawn(move || decode.run())
            .map_err(|e| PlayerError::OsError(format!("创建{}解码线程失败: {}", track, e)))?;

        let worker = Self {
            track,
            thread_handle: Some(thread_handle),
            commands,
            poll_interval: config.poll_interval(),
        };
        while worker.state()? == DecodeState::Init {
            thread::sleep(worker.poll_interval);
        }
        Ok(worker)
    }

    pub fn track(&self) -> TrackKind {
        self.track
    }

    pub fn state(&self) -> Result<DecodeState> {
        self.commands.request(DecodeCommand::GetState)
    }

    /// 进入 RUN（阻塞）
    pub fn run(&self) -> Result<()> {
        self.commands
            .request(DecodeCommand::SetState(DecodeState::Run))
            .map(|_| ())
    }

    /// 回到 IDLE（阻塞）
    pub fn stop(&self) -> Result<()> {
        self.commands
            .request(DecodeCommand::SetState(DecodeState::Idle))
            .map(|_| ())
    }

    /// 退出线程并关闭编解码器
    pub fn destroy(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        let exit = DecodeCommand::SetState(DecodeState::ToExit);
        let posted = match self.commands.submit(exit, false) {
            Err(PlayerError::ChannelFull) => self.commands.submit(exit, true).map(|_| ()),
            other => other.map(|_| ()),
        };
        if let Err(e) = posted {
            warn!("{} ⚠ 投递{}解码线程退出命令失败: {}", log_ctx(), self.track, e);
        }

        match handle.join() {
            Ok(mut codec) => {
                codec.close();
                info!("{} ✅ {}解码器已关闭", log_ctx(), self.track);
            }
            Err(_) => error!("{} ❌ {}解码线程 panic", log_ctx(), self.track),
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ DecodeWorker 被 drop，但未调用 destroy()，正在尝试优雅停止", log_ctx());
            self.destroy();
        }
    }
}
