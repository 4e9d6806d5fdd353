use crate::core::{
    alloc_buffer, log_ctx, AudioContext, FastForwardSpeed, MediaClock, PlayAnchor, PlayStatus, PlayerConfig,
    PlayerError, Result, TrackKind, VideoContext, AudioType, VideoType,
};
use crate::player::command::{command_channel, CommandReceiver, CommandSender, Inbox, PendingCommand, WorkerCommand};
use crate::player::media_source::SharedMediaSource;
use crate::player::packet_list::{PacketHeader, PacketList};
use crate::player::seek::seek_chunk;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 解复用线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemuxState {
    Init,
    Idle,
    ToPlay,
    Playing,
    Pause,
    ToExit,
    Exit,
    Eom,
}

impl From<DemuxState> for PlayStatus {
    fn from(state: DemuxState) -> Self {
        match state {
            DemuxState::Init | DemuxState::Idle | DemuxState::Pause => PlayStatus::Paused,
            DemuxState::ToPlay | DemuxState::Playing => PlayStatus::Playing,
            DemuxState::Eom | DemuxState::ToExit | DemuxState::Exit => PlayStatus::EndOfMedia,
        }
    }
}

/// seek 参数，分片总数为 0 表示未知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    pub time_ms: u64,
    pub video_chunks: u32,
    pub audio_chunks: u32,
}

/// 解复用线程命令，回复执行后的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxCommand {
    GetState,
    SetState(DemuxState),
    SetSpeed(FastForwardSpeed),
    Seek(SeekRequest),
    Play,
    Pause,
}

impl WorkerCommand for DemuxCommand {
    type Reply = DemuxState;

    fn name(&self) -> &'static str {
        match self {
            DemuxCommand::GetState => "GET_STATE",
            DemuxCommand::SetState(_) => "SET_STATE",
            DemuxCommand::SetSpeed(_) => "SET_FF_SPEED",
            DemuxCommand::Seek(_) => "SET_SEEK",
            DemuxCommand::Play => "SET_PLAY",
            DemuxCommand::Pause => "SET_PAUSE",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            DemuxCommand::SetState(state @ (DemuxState::Init | DemuxState::Exit)) => Err(
                PlayerError::InvalidArgument(format!("状态 {:?} 只能由解复用线程自己设置", state)),
            ),
            _ => Ok(()),
        }
    }
}

/// 解复用线程资源
pub struct DemuxResources {
    pub source: SharedMediaSource,
    pub media_video: VideoContext,
    pub media_audio: AudioContext,
    /// 没有解码器的轨道为 None：照常读取节拍，但数据不入队
    pub video_list: Option<Arc<PacketList>>,
    pub audio_list: Option<Arc<PacketList>>,
    pub clock: MediaClock,
    pub config: PlayerConfig,
}

/// 暂存的分片
struct StagedChunk {
    buf: Vec<u8>,
    size: usize,
    data_time: u64,
    key_frame: bool,
}

impl StagedChunk {
    fn with_capacity(bytes: usize) -> Result<Self> {
        Ok(Self {
            buf: alloc_buffer(bytes)?,
            size: 0,
            data_time: 0,
            key_frame: false,
        })
    }
}

/// 单个轨道的读取游标
struct TrackCursor {
    kind: TrackKind,
    enabled: bool,
    list: Option<Arc<PacketList>>,
    /// 下一个要发送的分片
    chunk_id: u32,
    active: bool,
    /// None 表示上一次读取失败，下一轮跳到后一个分片
    deadline: Option<u64>,
    slots: Vec<StagedChunk>,
    slot_idx: usize,
    emitted: u64,
}

impl TrackCursor {
    fn new(kind: TrackKind, enabled: bool, list: Option<Arc<PacketList>>, slots: usize, initial_bytes: usize) -> Result<Self> {
        Ok(Self {
            kind,
            enabled,
            list,
            chunk_id: 0,
            active: false,
            deadline: None,
            slots: (0..slots)
                .map(|_| StagedChunk::with_capacity(initial_bytes))
                .collect::<Result<Vec<_>>>()?,
            slot_idx: 0,
            emitted: 0,
        })
    }

    fn staged(&self) -> &StagedChunk {
        &self.slots[self.slot_idx]
    }

    /// 读取 chunk_id 对应的分片到当前槽位，缓冲区不够时扩容（只增不减）
    fn stage(&mut self, source: &SharedMediaSource, headroom: usize) -> Result<()> {
        let mut source = source.lock();
        let info = source.chunk_info(self.kind, self.chunk_id)?;
        let slot = &mut self.slots[self.slot_idx];

        let needed = info.size as usize;
        if needed > slot.buf.len() {
            let target = needed + headroom;
            slot.buf
                .try_reserve_exact(target - slot.buf.len())
                .map_err(|e| PlayerError::AllocError(format!("{} 分片缓冲区扩容到 {} 字节失败: {}", self.kind, target, e)))?;
            slot.buf.resize(target, 0);
            debug!("{} 📐 {}分片缓冲区扩容到 {} 字节", log_ctx(), self.kind, target);
        }

        let read = source.read_chunk(self.kind, self.chunk_id, &mut slot.buf[..])?;
        slot.size = read.size;
        slot.data_time = read.pts;
        slot.key_frame = read.key_frame;
        Ok(())
    }

    /// 发送当前暂存分片并前进到下一个槽位
    fn emit(&mut self, deadline: u64) {
        let staged = self.staged();
        if staged.size > 0 {
            if let Some(list) = &self.list {
                list.put(
                    PacketHeader {
                        chunk_id: self.chunk_id,
                        pts: deadline,
                        data_time: staged.data_time,
                        key_frame: staged.key_frame,
                    },
                    &staged.buf[..staged.size],
                );
            }
            self.emitted += 1;
        }
        self.slot_idx = (self.slot_idx + 1) % self.slots.len();
    }

    /// 前进到下一个分片并计算发送时刻
    fn advance(&mut self, source: &SharedMediaSource, anchor: &PlayAnchor, headroom: usize) {
        self.chunk_id += 1;
        match self.stage(source, headroom) {
            Ok(()) => {
                self.deadline = Some(anchor.deadline(self.staged().data_time));
            }
            Err(PlayerError::EndOfMedia) => {
                info!("{} 📄 {}轨道到达末尾（共发送 {} 个分片）", log_ctx(), self.kind, self.emitted);
                self.active = false;
                self.deadline = None;
            }
            Err(e) => {
                warn!("{} ⚠ 读取{}分片 #{} 失败，跳过: {}", log_ctx(), self.kind, self.chunk_id, e);
                self.deadline = None;
            }
        }
    }
}

/// 解复用循环（在独立线程中运行）
struct DemuxLoop {
    source: SharedMediaSource,
    clock: MediaClock,
    config: PlayerConfig,
    commands: CommandReceiver<DemuxCommand>,
    state: DemuxState,
    speed: FastForwardSpeed,
    anchor: Option<PlayAnchor>,
    video: TrackCursor,
    audio: TrackCursor,
}

impl DemuxLoop {
    /// 分片缓冲区初始大小取自媒体参数（视频 宽×高，音频 每块采样数×2）
    fn new(res: DemuxResources, commands: CommandReceiver<DemuxCommand>) -> Result<Self> {
        let slots = res.config.chunk_slots;
        let has_video = res.media_video.video_type != VideoType::None;
        let has_audio = res.media_audio.audio_type != AudioType::None;
        let video_bytes = if has_video {
            res.config.check_frame_bytes(res.media_video.pixels(), "视频分片缓冲区")?
        } else {
            0
        };
        let audio_bytes = if has_audio {
            res.config.check_frame_bytes(res.media_audio.block_bytes(), "音频分片缓冲区")?
        } else {
            0
        };
        Ok(Self {
            video: TrackCursor::new(TrackKind::Video, has_video, res.video_list, slots, video_bytes)?,
            audio: TrackCursor::new(TrackKind::Audio, has_audio, res.audio_list, slots, audio_bytes)?,
            source: res.source,
            clock: res.clock,
            config: res.config,
            commands,
            state: DemuxState::Init,
            speed: FastForwardSpeed::Normal,
            anchor: None,
        })
    }

    fn run(mut self) {
        self.commands.bind_current_thread();
        let description = self.source.lock().description();
        info!("{} 🎬 解复用线程启动: {}", log_ctx(), description);
        self.state = DemuxState::Idle;

        while self.state != DemuxState::ToExit {
            let now = self.clock.now_ms();
            let wait = match self.state {
                DemuxState::ToPlay => {
                    self.start_play(now);
                    self.pump(now)
                }
                DemuxState::Playing => self.pump(now),
                _ => self.config.poll_interval(),
            };

            match self.commands.next_timeout(wait) {
                Inbox::Command(pending) => self.dispatch(pending),
                Inbox::Empty => {}
                Inbox::Closed => {
                    warn!("{} ⚠ 命令通道已关闭，解复用线程退出", log_ctx());
                    self.state = DemuxState::ToExit;
                }
            }
        }

        self.state = DemuxState::Exit;
        info!(
            "{} 🛑 解复用线程退出（视频 {} 个分片，音频 {} 个分片）",
            log_ctx(),
            self.video.emitted,
            self.audio.emitted
        );
    }

    fn dispatch(&mut self, pending: PendingCommand<DemuxCommand>) {
        let (command, reply) = pending.into_parts();
        let result = self.execute(command);
        reply.send(result);
    }

    fn execute(&mut self, command: DemuxCommand) -> Result<DemuxState> {
        let before = self.state;
        match command {
            DemuxCommand::GetState => {}
            DemuxCommand::SetState(state) => {
                self.state = state;
            }
            DemuxCommand::SetSpeed(speed) => {
                self.speed = speed;
                if self.state == DemuxState::Playing {
                    self.state = DemuxState::ToPlay;
                }
            }
            DemuxCommand::Seek(request) => {
                self.seek(request);
                if self.state == DemuxState::Playing {
                    self.state = DemuxState::ToPlay;
                }
            }
            DemuxCommand::Play => {
                if self.state != DemuxState::Playing {
                    self.state = DemuxState::ToPlay;
                }
            }
            DemuxCommand::Pause => {
                if self.state != DemuxState::Idle {
                    self.state = DemuxState::Pause;
                }
            }
        }
        if before != self.state {
            info!("{} 🔄 解复用状态 {:?} -> {:?}（{}）", log_ctx(), before, self.state, command.name());
        }
        Ok(self.state)
    }

    fn seek(&mut self, request: SeekRequest) {
        let window = self.config.seek_near_window_ms;
        for (track, total) in [
            (&mut self.video, request.video_chunks),
            (&mut self.audio, request.audio_chunks),
        ] {
            if !track.enabled {
                continue;
            }
            let kind = track.kind;
            let mut source = self.source.lock();
            match seek_chunk(request.time_ms, total, window, |id| source.chunk_info(kind, id)) {
                Ok(chunk_id) => {
                    info!("{} ⏩ {}轨道 seek {}ms -> 分片 #{}", log_ctx(), kind, request.time_ms, chunk_id);
                    track.chunk_id = chunk_id;
                }
                Err(e) => {
                    warn!("{} ⚠ {}轨道 seek {}ms 失败: {}", log_ctx(), kind, request.time_ms, e);
                }
            }
        }
    }

    /// TO_PLAY：重新读取当前分片并建立锚点
    fn start_play(&mut self, now: u64) {
        let headroom = self.config.chunk_headroom_bytes;
        let mut offset: Option<u64> = None;

        for track in [&mut self.video, &mut self.audio] {
            track.active = false;
            track.deadline = None;
            if !track.enabled {
                continue;
            }
            match track.stage(&self.source, headroom) {
                Ok(()) => {
                    track.active = true;
                    let data_time = track.staged().data_time;
                    offset = Some(offset.map_or(data_time, |o| o.min(data_time)));
                }
                Err(PlayerError::EndOfMedia) => {
                    debug!("{} 📄 {}轨道没有更多分片", log_ctx(), track.kind);
                }
                Err(e) => {
                    error!("{} ❌ 读取{}分片 #{} 失败: {}", log_ctx(), track.kind, track.chunk_id, e);
                }
            }
        }

        let anchor = PlayAnchor::new(now, offset.unwrap_or(0), self.speed);
        for track in [&mut self.video, &mut self.audio] {
            if track.active {
                track.deadline = Some(anchor.deadline(track.staged().data_time));
            }
        }
        info!(
            "{} ▶ 开始播放：起点 {}ms，偏移 {}ms，倍速 {}x",
            log_ctx(),
            now,
            anchor.offset_ms(),
            self.speed.factor()
        );
        self.anchor = Some(anchor);
        self.state = DemuxState::Playing;
    }

    /// PLAYING：发送到期的分片，返回距离下一个到期时刻的时长
    fn pump(&mut self, now: u64) -> Duration {
        let Some(anchor) = self.anchor else {
            self.state = DemuxState::ToPlay;
            return Duration::ZERO;
        };
        let headroom = self.config.chunk_headroom_bytes;

        for track in [&mut self.video, &mut self.audio] {
            if !track.active {
                continue;
            }
            match track.deadline {
                None => track.advance(&self.source, &anchor, headroom),
                Some(deadline) if now >= deadline => {
                    track.emit(deadline);
                    track.advance(&self.source, &anchor, headroom);
                }
                Some(_) => {}
            }
        }

        if !self.video.active && !self.audio.active {
            info!("{} 🏁 所有轨道播放结束", log_ctx());
            self.state = DemuxState::Eom;
            return self.config.poll_interval();
        }

        [&self.video, &self.audio]
            .iter()
            .filter(|track| track.active)
            .map(|track| match track.deadline {
                Some(deadline) => self.clock.until(deadline),
                None => Duration::ZERO,
            })
            .min()
            .unwrap_or_else(|| self.config.poll_interval())
    }
}

/// 解复用线程管理器
pub struct DemuxWorker {
    thread_handle: Option<JoinHandle<()>>,
    commands: CommandSender<DemuxCommand>,
    poll_interval: Duration,
}

impl DemuxWorker {
    /// 启动解复用线程，等待其离开 INIT 状态后返回
    pub fn start(resources: DemuxResources) -> Result<Self> {
        let config = resources.config.clone();
        let (commands, receiver) = command_channel(config.command_capacity, config.command_timeout());
        let demux = DemuxLoop::new(resources, receiver)?;

        let thread_handle = thread::Builder::new()
            .name("chunk-demux".to_string())
            .spawn(move || demux.run())
            .map_err(|e| PlayerError::OsError(format!("创建解复用线程失败: {}", e)))?;

        let worker = Self {
            thread_handle: Some(thread_handle),
            commands,
            poll_interval: config.poll_interval(),
        };
        worker.wait_started()?;
        Ok(worker)
    }

    fn wait_started(&self) -> Result<()> {
        while self.state()? == DemuxState::Init {
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    pub fn submit(&self, command: DemuxCommand, blocking: bool) -> Result<Option<DemuxState>> {
        self.commands.submit(command, blocking)
    }

    /// 查询线程状态（阻塞）
    pub fn state(&self) -> Result<DemuxState> {
        self.commands.request(DemuxCommand::GetState)
    }

    pub fn status(&self) -> PlayStatus {
        if self.thread_handle.is_none() {
            return PlayStatus::Error;
        }
        match self.state() {
            Ok(state) => state.into(),
            Err(e) => {
                warn!("{} ⚠ 查询解复用状态失败: {}", log_ctx(), e);
                PlayStatus::Error
            }
        }
    }

    pub fn play(&self, blocking: bool) -> Result<()> {
        self.submit(DemuxCommand::Play, blocking).map(|_| ())
    }

    /// 已处于 PAUSE 时直接返回
    pub fn pause(&self, blocking: bool) -> Result<()> {
        if self.state()? == DemuxState::Pause {
            return Ok(());
        }
        self.submit(DemuxCommand::Pause, blocking).map(|_| ())
    }

    pub fn fast_forward(&self, speed: FastForwardSpeed, blocking: bool) -> Result<()> {
        self.submit(DemuxCommand::SetSpeed(speed), blocking).map(|_| ())
    }

    pub fn seek(&self, request: SeekRequest, blocking: bool) -> Result<()> {
        self.submit(DemuxCommand::Seek(request), blocking).map(|_| ())
    }

    /// 停止线程
    /// - 非阻塞投递 TO_EXIT，通道满时改为阻塞投递
    /// - join 线程
    pub fn stop(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        info!("{} 🛑 DemuxWorker::stop() called", log_ctx());

        let exit = DemuxCommand::SetState(DemuxState::ToExit);
        let posted = match self.commands.submit(exit, false) {
            Err(PlayerError::ChannelFull) => self.commands.submit(exit, true).map(|_| ()),
            other => other.map(|_| ()),
        };
        if let Err(e) = posted {
            warn!("{} ⚠ 投递退出命令失败: {}", log_ctx(), e);
        }

        if handle.join().is_err() {
            error!("{} ❌ 解复用线程 panic", log_ctx());
        }
    }
}

impl Drop for DemuxWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ DemuxWorker 被 drop，但未调用 stop()，正在尝试优雅停止", log_ctx());
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChunkInfo, ChunkRead};
    use crate::player::media_source::{share_source, MockMediaSource};
    use crate::player::memory_source::{MemoryChunk, MemorySource, SyntheticTrack};
    use crate::player::packet_list::Packet;
    use std::time::Instant;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn resources(source: MemorySource, clock: MediaClock) -> (DemuxResources, Arc<PacketList>) {
        let list = Arc::new(PacketList::new(TrackKind::Video, 3000, 10_000));
        let res = DemuxResources {
            media_video: source.video_context().clone(),
            media_audio: source.audio_context().clone(),
            source: share_source(source),
            video_list: Some(list.clone()),
            audio_list: None,
            clock,
            config: PlayerConfig::default(),
        };
        (res, list)
    }

    fn drain(list: &PacketList, clock: &MediaClock, count: usize, timeout: Duration) -> Vec<Packet> {
        let started = Instant::now();
        let mut packets = Vec::new();
        while packets.len() < count && started.elapsed() < timeout {
            match list.acquire_closed_packet(clock.now_ms()) {
                Some(packet) => packets.push(packet),
                None => {
                    list.wait_ready(Duration::from_millis(5));
                }
            }
        }
        packets
    }

    fn wait_for_state(worker: &DemuxWorker, wanted: DemuxState, timeout: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < timeout {
            if worker.state().unwrap() == wanted {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn short_video(count: u32) -> MemorySource {
        MemorySource::synthetic(
            Some(SyntheticTrack {
                chunk_count: count,
                interval_ms: 20,
                seekable_every: 1,
                payload_bytes: 8,
            }),
            None,
        )
    }

    #[test]
    fn status_mapping() {
        assert_eq!(PlayStatus::from(DemuxState::Init), PlayStatus::Paused);
        assert_eq!(PlayStatus::from(DemuxState::Pause), PlayStatus::Paused);
        assert_eq!(PlayStatus::from(DemuxState::ToPlay), PlayStatus::Playing);
        assert_eq!(PlayStatus::from(DemuxState::Eom), PlayStatus::EndOfMedia);
        assert_eq!(PlayStatus::from(DemuxState::Exit), PlayStatus::EndOfMedia);
    }

    #[test]
    fn worker_starts_idle_and_plays_to_end() {
        init_logger();
        let clock = MediaClock::new();
        let (res, list) = resources(short_video(5), clock);
        let mut worker = DemuxWorker::start(res).unwrap();
        assert_eq!(worker.state().unwrap(), DemuxState::Idle);
        assert_eq!(worker.status(), PlayStatus::Paused);

        worker.play(true).unwrap();
        let packets = drain(&list, &clock, 5, Duration::from_secs(2));
        let ids: Vec<u32> = packets.iter().map(|p| p.header.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(packets.windows(2).all(|w| w[0].header.pts <= w[1].header.pts));

        assert!(wait_for_state(&worker, DemuxState::Eom, Duration::from_secs(2)));
        assert_eq!(worker.status(), PlayStatus::EndOfMedia);
        worker.stop();
        assert_eq!(worker.status(), PlayStatus::Error);
    }

    #[test]
    fn pause_is_idempotent() {
        init_logger();
        let (res, _list) = resources(short_video(100), MediaClock::new());
        let worker = DemuxWorker::start(res).unwrap();

        worker.play(true).unwrap();
        worker.pause(true).unwrap();
        assert_eq!(worker.state().unwrap(), DemuxState::Pause);
        worker.pause(true).unwrap();
        assert_eq!(worker.state().unwrap(), DemuxState::Pause);
        assert_eq!(worker.status(), PlayStatus::Paused);
    }

    #[test]
    fn pause_from_idle_stays_idle() {
        let (res, _list) = resources(short_video(3), MediaClock::new());
        let worker = DemuxWorker::start(res).unwrap();
        worker.pause(true).unwrap();
        assert_eq!(worker.state().unwrap(), DemuxState::Idle);
    }

    #[test]
    fn worker_only_states_are_rejected() {
        let (res, _list) = resources(short_video(3), MediaClock::new());
        let worker = DemuxWorker::start(res).unwrap();
        assert!(matches!(
            worker.submit(DemuxCommand::SetState(DemuxState::Exit), true),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert_eq!(
            worker.submit(DemuxCommand::SetState(DemuxState::Pause), true).unwrap(),
            Some(DemuxState::Pause)
        );
    }

    #[test]
    fn seek_while_paused_moves_cursor() {
        init_logger();
        let clock = MediaClock::new();
        let source = MemorySource::synthetic(
            Some(SyntheticTrack {
                chunk_count: 50,
                interval_ms: 100,
                seekable_every: 5,
                payload_bytes: 4,
            }),
            None,
        );
        let (res, list) = resources(source, clock);
        let worker = DemuxWorker::start(res).unwrap();

        worker
            .seek(
                SeekRequest {
                    time_ms: 2_700,
                    video_chunks: 50,
                    audio_chunks: 0,
                },
                true,
            )
            .unwrap();
        assert_eq!(worker.state().unwrap(), DemuxState::Idle);

        worker.play(true).unwrap();
        let packets = drain(&list, &clock, 1, Duration::from_secs(2));
        let first = &packets[0].header;
        assert_eq!(first.chunk_id % 5, 0);
        assert!(first.data_time <= 2_700 + 500);
        assert!(first.data_time >= 2_000);
    }

    #[test]
    fn oversized_chunk_grows_buffer() {
        let clock = MediaClock::new();
        let source = MemorySource::new("big").with_video(
            VideoContext {
                video_type: VideoType::Yuv422,
                width: 4,
                height: 2,
                ..Default::default()
            },
            vec![MemoryChunk::new(0, true, vec![7; 5_000])],
        );
        let (res, list) = resources(source, clock);
        let worker = DemuxWorker::start(res).unwrap();
        worker.play(true).unwrap();

        let packets = drain(&list, &clock, 1, Duration::from_secs(2));
        assert_eq!(packets[0].data.len(), 5_000);
        assert!(packets[0].data.iter().all(|b| *b == 7));
    }

    #[test]
    fn oversized_dimensions_fail_to_start() {
        let source = MemorySource::new("huge").with_video(
            VideoContext {
                video_type: VideoType::Yuv422,
                width: 70_000,
                height: 70_000,
                ..Default::default()
            },
            vec![MemoryChunk::new(0, true, vec![1; 4])],
        );
        let (res, _list) = resources(source, MediaClock::new());
        assert!(matches!(
            DemuxWorker::start(res),
            Err(PlayerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_chunks_are_paced_but_not_queued() {
        let clock = MediaClock::new();
        let source = MemorySource::new("gaps").with_video(
            VideoContext {
                video_type: VideoType::Yuv422,
                ..Default::default()
            },
            vec![
                MemoryChunk::new(0, true, vec![1]),
                MemoryChunk::new(10, false, vec![]),
                MemoryChunk::new(20, false, vec![3]),
            ],
        );
        let (res, list) = resources(source, clock);
        let worker = DemuxWorker::start(res).unwrap();
        worker.play(true).unwrap();

        assert!(wait_for_state(&worker, DemuxState::Eom, Duration::from_secs(2)));
        let packets = drain(&list, &clock, 3, Duration::from_millis(100));
        let ids: Vec<u32> = packets.iter().map(|p| p.header.chunk_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn failed_read_skips_to_next_chunk() {
        init_logger();
        let mut mock = MockMediaSource::new();
        mock.expect_description().returning(|| "mock".to_string());
        mock.expect_chunk_info().returning(|_, id| {
            if id < 4 {
                Ok(ChunkInfo {
                    size: 2,
                    pts: id as u64 * 10,
                    seekable: true,
                })
            } else {
                Err(PlayerError::EndOfMedia)
            }
        });
        mock.expect_read_chunk().returning(|_, id, dest: &mut [u8]| {
            if id == 1 {
                return Err(PlayerError::ChunkError("crc".into()));
            }
            dest[..2].copy_from_slice(&[id as u8, id as u8]);
            Ok(ChunkRead {
                size: 2,
                pts: id as u64 * 10,
                key_frame: true,
            })
        });

        let clock = MediaClock::new();
        let list = Arc::new(PacketList::new(TrackKind::Video, 3000, 10_000));
        let res = DemuxResources {
            source: share_source(mock),
            media_video: VideoContext {
                video_type: VideoType::H264,
                width: 2,
                height: 2,
                ..Default::default()
            },
            media_audio: AudioContext::default(),
            video_list: Some(list.clone()),
            audio_list: None,
            clock,
            config: PlayerConfig::default(),
        };
        let worker = DemuxWorker::start(res).unwrap();
        worker.play(true).unwrap();

        assert!(wait_for_state(&worker, DemuxState::Eom, Duration::from_secs(2)));
        let packets = drain(&list, &clock, 4, Duration::from_millis(100));
        let ids: Vec<u32> = packets.iter().map(|p| p.header.chunk_id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
    }
}
