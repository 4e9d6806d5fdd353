use crate::core::{
    log_ctx, AudioContext, AudioType, DecodedFrame, FastForwardSpeed, MediaFormat, PlayContext,
    PlayInfo, PlayStatus, PlayerConfig, PlayerError, Result, VideoContext, VideoType,
};
use crate::player::codec::{CodecInterface, PassthroughCodecInterface};
use crate::player::decode::FlushCallback;
use crate::player::engine::{PlayEngine, PlayInterface};
use crate::player::media_source::{ContainerReader, OpenedMedia, SharedMediaSource};
use crate::player::memory_source::ManifestReader;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 播放器门面 - 按扩展名选择容器读取器，按编码类型选择解码器
pub struct Player {
    config: PlayerConfig,
    readers: Vec<Arc<dyn ContainerReader>>,
    video_codecs: HashMap<VideoType, Arc<dyn CodecInterface>>,
    audio_codecs: HashMap<AudioType, Arc<dyn CodecInterface>>,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        let passthrough: Arc<dyn CodecInterface> = Arc::new(PassthroughCodecInterface);

        let mut video_codecs = HashMap::new();
        video_codecs.insert(VideoType::Yuv422, passthrough.clone());
        video_codecs.insert(VideoType::Yuv422p, passthrough.clone());

        let mut audio_codecs = HashMap::new();
        audio_codecs.insert(AudioType::PcmL16, passthrough);

        Self {
            config,
            readers: vec![Arc::new(ManifestReader)],
            video_codecs,
            audio_codecs,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// 后注册的读取器优先
    pub fn register_reader(&mut self, reader: Arc<dyn ContainerReader>) {
        info!("{} 📎 注册容器读取器: {}", log_ctx(), reader.name());
        self.readers.insert(0, reader);
    }

    pub fn register_video_codec(&mut self, video_type: VideoType, codec: Arc<dyn CodecInterface>) {
        self.video_codecs.insert(video_type, codec);
    }

    pub fn register_audio_codec(&mut self, audio_type: AudioType, codec: Arc<dyn CodecInterface>) {
        self.audio_codecs.insert(audio_type, codec);
    }

    pub fn video_codec(&self, video_type: VideoType) -> Result<Arc<dyn CodecInterface>> {
        self.video_codecs
            .get(&video_type)
            .cloned()
            .ok_or_else(|| PlayerError::CodecType(format!("{:?}", video_type)))
    }

    pub fn audio_codec(&self, audio_type: AudioType) -> Result<Arc<dyn CodecInterface>> {
        self.audio_codecs
            .get(&audio_type)
            .cloned()
            .ok_or_else(|| PlayerError::CodecType(format!("{:?}", audio_type)))
    }

    /// 打开媒体文件
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<PlaySession> {
        let path = path.as_ref();
        std::fs::metadata(path)
            .map_err(|e| PlayerError::OpenError(format!("{}: {}", path.display(), e)))?;

        let reader = self
            .readers
            .iter()
            .find(|reader| reader.accepts(path))
            .ok_or_else(|| PlayerError::OpenError(format!("{}: 不支持的容器格式", path.display())))?;

        info!("{} 📂 打开媒体 {}（{}）", log_ctx(), path.display(), reader.name());
        let opened = reader.open(path)?;
        Ok(self.open_source(opened))
    }

    /// 用已经打开的媒体源建立会话（内存源、流式源等）
    pub fn open_source(&self, opened: OpenedMedia) -> PlaySession {
        let OpenedMedia {
            source,
            info,
            video,
            audio,
        } = opened;

        let video_codec = match self.video_codec(video.video_type) {
            Ok(codec) => Some(codec),
            Err(e) => {
                if video.video_type != VideoType::None {
                    warn!("{} ⚠ {}，视频轨道将被丢弃", log_ctx(), e);
                }
                None
            }
        };
        let audio_codec = match self.audio_codec(audio.audio_type) {
            Ok(codec) => Some(codec),
            Err(e) => {
                if audio.audio_type != AudioType::None {
                    warn!("{} ⚠ {}，音频轨道将被丢弃", log_ctx(), e);
                }
                None
            }
        };
        info!(
            "{} 🎬 媒体信息: 时长 {}ms，视频 {:?} × {}，音频 {:?} × {}",
            log_ctx(),
            info.duration_ms,
            info.video_type,
            info.video_chunks,
            info.audio_type,
            info.audio_chunks
        );

        PlaySession {
            context: PlayContext {
                media_video: video.clone(),
                media_audio: audio.clone(),
                flush_video: video,
                flush_audio: audio,
            },
            info,
            source: Arc::new(Mutex::new(source)),
            video_codec,
            audio_codec,
            video_flush: None,
            audio_flush: None,
            config: self.config.clone(),
            engine: None,
            closed: false,
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

/// 一次打开的媒体及其播放引擎
pub struct PlaySession {
    info: PlayInfo,
    context: PlayContext,
    source: SharedMediaSource,
    video_codec: Option<Arc<dyn CodecInterface>>,
    audio_codec: Option<Arc<dyn CodecInterface>>,
    video_flush: Option<FlushCallback>,
    audio_flush: Option<FlushCallback>,
    config: PlayerConfig,
    engine: Option<PlayEngine>,
    closed: bool,
}

impl PlaySession {
    pub fn info(&self) -> &PlayInfo {
        &self.info
    }

    pub fn context(&self) -> &PlayContext {
        &self.context
    }

    /// 设置解码输出格式（默认与媒体格式相同），需在首次 play 之前调用
    pub fn set_flush_context(&mut self, video: VideoContext, audio: AudioContext) {
        self.context.flush_video = video;
        self.context.flush_audio = audio;
    }

    pub fn on_video_frame<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&DecodedFrame<'_>) + Send + 'static,
    {
        self.video_flush = Some(Box::new(callback));
        self
    }

    pub fn on_audio_frame<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&DecodedFrame<'_>) + Send + 'static,
    {
        self.audio_flush = Some(Box::new(callback));
        self
    }

    /// 首次调用创建播放引擎，之后为继续播放
    pub fn play(&mut self, blocking: bool) -> Result<()> {
        if self.closed {
            return Err(PlayerError::NullResource("会话已关闭"));
        }
        if let Some(engine) = &self.engine {
            return engine.play(blocking);
        }

        let iface = PlayInterface {
            source: self.source.clone(),
            video_codec: self.video_codec.clone(),
            audio_codec: self.audio_codec.clone(),
            video_flush: self.video_flush.take(),
            audio_flush: self.audio_flush.take(),
        };
        self.engine = Some(PlayEngine::create(iface, &self.context, &self.config)?);
        Ok(())
    }

    /// 引擎未创建时为空操作
    pub fn pause(&self, blocking: bool) -> Result<()> {
        match &self.engine {
            Some(engine) => engine.pause(blocking),
            None => Ok(()),
        }
    }

    pub fn fast_forward(&self, speed: FastForwardSpeed, blocking: bool) -> Result<()> {
        match &self.engine {
            Some(engine) => engine.fast_forward(speed, blocking),
            None => Ok(()),
        }
    }

    /// 文件媒体使用已知的分片总数加速定位，流式媒体按未知处理
    pub fn seek(&self, time_ms: u64, blocking: bool) -> Result<()> {
        let Some(engine) = &self.engine else {
            return Ok(());
        };
        let (video_chunks, audio_chunks) = match self.info.format {
            MediaFormat::File => (self.info.video_chunks, self.info.audio_chunks),
            MediaFormat::Streaming => (0, 0),
        };
        info!("{} ⏩ seek 到 {}ms", log_ctx(), time_ms);
        engine.seek(time_ms, video_chunks, audio_chunks, blocking)
    }

    pub fn status(&self) -> PlayStatus {
        match &self.engine {
            Some(engine) => engine.status(),
            None => PlayStatus::Error,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.engine.as_ref().and_then(|engine| engine.last_error())
    }

    /// 销毁播放引擎并关闭媒体
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(engine) = self.engine.take() {
            engine.destroy();
        }
        self.source.lock().close();
        info!("{} 📁 媒体已关闭", log_ctx());
    }
}

impl Drop for PlaySession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
