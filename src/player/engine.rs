use crate::core::{
    log_ctx, AudioContext, AudioType, FastForwardSpeed, MediaClock, PlayContext, PlayStatus,
    PlayerConfig, Result, TrackKind, VideoContext, VideoType,
};
use crate::player::codec::{Codec, CodecInterface, CodecParams};
use crate::player::decode::{DecodeResources, DecodeWorker, FaultLatch, FlushCallback};
use crate::player::demux::{DemuxResources, DemuxWorker, SeekRequest};
use crate::player::media_source::SharedMediaSource;
use crate::player::packet_list::PacketList;
use log::{info, warn};
use std::sync::Arc;

// 解码输出槽位额外预留
const SLOT_HEADROOM_BYTES: usize = 100;

/// 引擎的外部接口表：媒体源 + 编解码器 + 输出回调
///
/// 缺少编解码器或回调的轨道仍按节拍读取，但不入队也不解码
pub struct PlayInterface {
    pub source: SharedMediaSource,
    pub video_codec: Option<Arc<dyn CodecInterface>>,
    pub audio_codec: Option<Arc<dyn CodecInterface>>,
    pub video_flush: Option<FlushCallback>,
    pub audio_flush: Option<FlushCallback>,
}

/// 已打开、尚未交给解码线程的编解码器，失败回滚时关闭
struct CodecGuard(Option<Box<dyn Codec>>);

impl CodecGuard {
    fn take(&mut self) -> Option<Box<dyn Codec>> {
        self.0.take()
    }
}

impl Drop for CodecGuard {
    fn drop(&mut self) {
        if let Some(mut codec) = self.0.take() {
            codec.close();
        }
    }
}

fn video_slot_bytes(ctx: &VideoContext, config: &PlayerConfig) -> Result<usize> {
    let bytes = ctx.frame_bytes().and_then(|b| b.checked_add(SLOT_HEADROOM_BYTES));
    config.check_frame_bytes(bytes, "视频解码输出槽位")
}

fn audio_slot_bytes(ctx: &AudioContext, config: &PlayerConfig) -> Result<usize> {
    let bytes = ctx.second_bytes().and_then(|b| b.checked_add(SLOT_HEADROOM_BYTES));
    config.check_frame_bytes(bytes, "音频解码输出槽位")
}

fn open_codec(
    codec: Option<&Arc<dyn CodecInterface>>,
    has_flush: bool,
    params: CodecParams,
) -> Result<CodecGuard> {
    let track = params.track();
    match codec {
        Some(codec) if has_flush => {
            let opened = codec.open(&params)?;
            info!("{} 🔧 打开{}解码器: {}", log_ctx(), track, codec.name());
            Ok(CodecGuard(Some(opened)))
        }
        Some(codec) => {
            warn!("{} ⚠ {}解码器 {} 没有输出回调，轨道数据将被丢弃", log_ctx(), track, codec.name());
            Ok(CodecGuard(None))
        }
        None => Ok(CodecGuard(None)),
    }
}

/// 播放引擎 - 组装解复用线程、包队列和解码线程
pub struct PlayEngine {
    demux: DemuxWorker,
    video_decode: Option<DecodeWorker>,
    audio_decode: Option<DecodeWorker>,
    fault: FaultLatch,
    destroyed: bool,
}

impl PlayEngine {
    /// 创建并开始播放
    ///
    /// 顺序：打开编解码器 → 建立包队列 → 解码线程 → 解复用线程 → 解码 RUN → 解复用 PLAY。
    /// 任一步失败时，已创建的部分按相反顺序释放
    pub fn create(iface: PlayInterface, ctx: &PlayContext, config: &PlayerConfig) -> Result<Self> {
        config.validate()?;
        info!("{} 🎮 创建播放引擎...", log_ctx());

        let clock = MediaClock::new();
        let fault = FaultLatch::default();
        let PlayInterface {
            source,
            video_codec,
            audio_codec,
            video_flush,
            audio_flush,
        } = iface;

        let has_video = ctx.media_video.video_type != VideoType::None;
        let has_audio = ctx.media_audio.audio_type != AudioType::None;

        // 输出槽位大小在打开任何资源之前校验
        let video_slot = if has_video && video_codec.is_some() && video_flush.is_some() {
            video_slot_bytes(&ctx.flush_video, config)?
        } else {
            0
        };
        let audio_slot = if has_audio && audio_codec.is_some() && audio_flush.is_some() {
            audio_slot_bytes(&ctx.flush_audio, config)?
        } else {
            0
        };

        let mut video_guard = if has_video {
            open_codec(
                video_codec.as_ref(),
                video_flush.is_some(),
                CodecParams::Video {
                    media: ctx.media_video.clone(),
                    flush: ctx.flush_video.clone(),
                },
            )?
        } else {
            CodecGuard(None)
        };
        let mut audio_guard = if has_audio {
            open_codec(
                audio_codec.as_ref(),
                audio_flush.is_some(),
                CodecParams::Audio {
                    media: ctx.media_audio.clone(),
                    flush: ctx.flush_audio.clone(),
                },
            )?
        } else {
            CodecGuard(None)
        };

        let video_list = video_guard.0.as_ref().map(|_| {
            Arc::new(PacketList::new(
                TrackKind::Video,
                config.video_list_duration_ms,
                config.late_packet_tolerance_ms,
            ))
        });
        let audio_list = audio_guard.0.as_ref().map(|_| {
            Arc::new(PacketList::new(
                TrackKind::Audio,
                config.audio_list_duration_ms,
                config.late_packet_tolerance_ms,
            ))
        });

        let video_decode = match (video_guard.take(), &video_list, video_flush) {
            (Some(codec), Some(list), Some(flush)) => Some(DecodeWorker::start(DecodeResources {
                track: TrackKind::Video,
                codec,
                list: list.clone(),
                flush,
                slot_bytes: video_slot,
                clock,
                config: config.clone(),
                fault: fault.clone(),
            })?),
            _ => None,
        };
        let audio_decode = match (audio_guard.take(), &audio_list, audio_flush) {
            (Some(codec), Some(list), Some(flush)) => Some(DecodeWorker::start(DecodeResources {
                track: TrackKind::Audio,
                codec,
                list: list.clone(),
                flush,
                slot_bytes: audio_slot,
                clock,
                config: config.clone(),
                fault: fault.clone(),
            })?),
            _ => None,
        };

        let demux = DemuxWorker::start(DemuxResources {
            source,
            media_video: ctx.media_video.clone(),
            media_audio: ctx.media_audio.clone(),
            video_list,
            audio_list,
            clock,
            config: config.clone(),
        })?;

        let mut engine = Self {
            demux,
            video_decode,
            audio_decode,
            fault,
            destroyed: false,
        };

        for worker in engine.decoders() {
            worker.run()?;
        }
        engine.demux.play(true)?;

        info!(
            "{} ✅ 播放引擎创建完成（视频解码: {}，音频解码: {}）",
            log_ctx(),
            engine.video_decode.is_some(),
            engine.audio_decode.is_some()
        );
        Ok(engine)
    }

    fn decoders(&mut self) -> impl Iterator<Item = &mut DecodeWorker> {
        self.video_decode.iter_mut().chain(self.audio_decode.iter_mut())
    }

    pub fn play(&self, blocking: bool) -> Result<()> {
        self.demux.play(blocking)
    }

    pub fn pause(&self, blocking: bool) -> Result<()> {
        self.demux.pause(blocking)
    }

    pub fn fast_forward(&self, speed: FastForwardSpeed, blocking: bool) -> Result<()> {
        info!("{} ⏩ 快进 {}x", log_ctx(), speed.factor());
        self.demux.fast_forward(speed, blocking)
    }

    /// 按时间 seek，分片总数为 0 表示未知
    pub fn seek(&self, time_ms: u64, video_chunks: u32, audio_chunks: u32, blocking: bool) -> Result<()> {
        self.demux.seek(
            SeekRequest {
                time_ms,
                video_chunks,
                audio_chunks,
            },
            blocking,
        )
    }

    /// 解码出现致命错误后一直报告 Error
    pub fn status(&self) -> PlayStatus {
        if self.destroyed || self.fault.is_raised() {
            return PlayStatus::Error;
        }
        self.demux.status()
    }

    pub fn last_error(&self) -> Option<String> {
        self.fault.message()
    }

    pub fn has_decoder(&self, track: TrackKind) -> bool {
        match track {
            TrackKind::Video => self.video_decode.is_some(),
            TrackKind::Audio => self.audio_decode.is_some(),
        }
    }

    /// 停止并释放所有线程
    pub fn destroy(mut self) {
        self.teardown();
    }

    /// 顺序：解复用暂停 → 解码停止 → 解码线程退出 → 解复用线程退出
    fn teardown(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        info!("{} 🛑 销毁播放引擎...", log_ctx());

        if let Err(e) = self.demux.pause(true) {
            warn!("{} ⚠ 暂停解复用线程失败: {}", log_ctx(), e);
        }
        for worker in self.decoders() {
            if let Err(e) = worker.stop() {
                warn!("{} ⚠ 停止{}解码线程失败: {}", log_ctx(), worker.track(), e);
            }
        }
        for worker in self.decoders() {
            worker.destroy();
        }
        self.demux.stop();

        info!("{} ✅ 播放引擎已销毁", log_ctx());
    }
}

impl Drop for PlayEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
