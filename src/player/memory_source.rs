use crate::core::{
    AudioContext, AudioType, ChunkInfo, ChunkRead, MediaFormat, PlayInfo, PlayerError, Result,
    TrackKind, VideoContext, VideoType,
};
use crate::player::media_source::{ContainerReader, MediaSource, OpenedMedia};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 内存中的一个分片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub pts: u64,
    #[serde(default)]
    pub seekable: bool,
    /// 缺省时与 seekable 相同
    #[serde(default)]
    pub key_frame: Option<bool>,
    #[serde(default)]
    pub data: Vec<u8>,
    /// data 为空时按该长度填充（manifest 中省略大块数据）
    #[serde(default)]
    pub size: Option<usize>,
}

impl MemoryChunk {
    pub fn new(pts: u64, seekable: bool, data: Vec<u8>) -> Self {
        Self {
            pts,
            seekable,
            key_frame: None,
            data,
            size: None,
        }
    }

    fn is_key_frame(&self) -> bool {
        self.key_frame.unwrap_or(self.seekable)
    }

    fn normalize(mut self) -> Self {
        if self.data.is_empty() {
            if let Some(size) = self.size {
                self.data = vec![0; size];
            }
        }
        self
    }
}

/// 合成轨道参数
#[derive(Debug, Clone, Copy)]
pub struct SyntheticTrack {
    pub chunk_count: u32,
    pub interval_ms: u64,
    /// 每 N 个分片一个 seek 点（0 表示全部可 seek）
    pub seekable_every: u32,
    pub payload_bytes: usize,
}

impl SyntheticTrack {
    fn build(&self) -> Vec<MemoryChunk> {
        (0..self.chunk_count)
            .map(|id| {
                let seekable = self.seekable_every == 0 || id % self.seekable_every == 0;
                MemoryChunk::new(
                    id as u64 * self.interval_ms,
                    seekable,
                    vec![(id % 251) as u8; self.payload_bytes],
                )
            })
            .collect()
    }
}

/// 内存分片媒体源
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    format: MediaFormat,
    video_context: VideoContext,
    audio_context: AudioContext,
    video: Vec<MemoryChunk>,
    audio: Vec<MemoryChunk>,
    closed: bool,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_video(mut self, context: VideoContext, chunks: Vec<MemoryChunk>) -> Self {
        self.video_context = context;
        self.video = chunks.into_iter().map(MemoryChunk::normalize).collect();
        self
    }

    pub fn with_audio(mut self, context: AudioContext, chunks: Vec<MemoryChunk>) -> Self {
        self.audio_context = context;
        self.audio = chunks.into_iter().map(MemoryChunk::normalize).collect();
        self
    }

    pub fn with_format(mut self, format: MediaFormat) -> Self {
        self.format = format;
        self
    }

    /// 生成原始格式（YUV422 / PCM16）的合成媒体
    pub fn synthetic(video: Option<SyntheticTrack>, audio: Option<SyntheticTrack>) -> Self {
        let mut source = Self::new("synthetic");
        if let Some(track) = video {
            source = source.with_video(
                VideoContext {
                    video_type: VideoType::Yuv422,
                    width: 64,
                    height: 48,
                    frame_rate: (1000 / track.interval_ms.max(1)) as u32,
                    bit_rate: 0,
                },
                track.build(),
            );
        }
        if let Some(track) = audio {
            source = source.with_audio(
                AudioContext {
                    audio_type: AudioType::PcmL16,
                    sample_rate: 8000,
                    channels: 1,
                    samples_per_block: 320,
                    bit_rate: 128_000,
                },
                track.build(),
            );
        }
        source
    }

    pub fn video_context(&self) -> &VideoContext {
        &self.video_context
    }

    pub fn audio_context(&self) -> &AudioContext {
        &self.audio_context
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn play_info(&self) -> PlayInfo {
        let last_pts = |chunks: &[MemoryChunk]| chunks.last().map(|c| c.pts).unwrap_or(0);
        PlayInfo {
            format: self.format,
            video_type: self.video_context.video_type,
            audio_type: self.audio_context.audio_type,
            duration_ms: last_pts(&self.video).max(last_pts(&self.audio)),
            video_chunks: self.video.len() as u32,
            audio_chunks: self.audio.len() as u32,
        }
    }

    fn track(&self, track: TrackKind) -> &[MemoryChunk] {
        match track {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }

    fn chunk(&self, track: TrackKind, chunk_id: u32) -> Result<&MemoryChunk> {
        if self.closed {
            return Err(PlayerError::NullResource("媒体源已关闭"));
        }
        self.track(track)
            .get(chunk_id as usize)
            .ok_or(PlayerError::EndOfMedia)
    }

    pub fn into_opened(self) -> OpenedMedia {
        OpenedMedia {
            info: self.play_info(),
            video: self.video_context.clone(),
            audio: self.audio_context.clone(),
            source: Box::new(self),
        }
    }
}

impl MediaSource for MemorySource {
    fn chunk_info(&mut self, track: TrackKind, chunk_id: u32) -> Result<ChunkInfo> {
        let chunk = self.chunk(track, chunk_id)?;
        Ok(ChunkInfo {
            size: chunk.data.len() as u32,
            pts: chunk.pts,
            seekable: chunk.seekable,
        })
    }

    fn read_chunk(&mut self, track: TrackKind, chunk_id: u32, dest: &mut [u8]) -> Result<ChunkRead> {
        let chunk = self.chunk(track, chunk_id)?;
        let size = chunk.data.len();
        if dest.len() < size {
            return Err(PlayerError::ChunkError(format!(
                "{} 分片 #{} 需要 {} 字节，缓冲区只有 {} 字节",
                track,
                chunk_id,
                size,
                dest.len()
            )));
        }
        dest[..size].copy_from_slice(&chunk.data);
        Ok(ChunkRead {
            size,
            pts: chunk.pts,
            key_frame: chunk.is_key_frame(),
        })
    }

    fn close(&mut self) {
        if !self.closed {
            info!("📁 关闭内存媒体源: {}", self.name);
            self.closed = true;
        }
    }

    fn description(&self) -> String {
        format!(
            "memory:{} (video {} chunks, audio {} chunks)",
            self.name,
            self.video.len(),
            self.audio.len()
        )
    }
}

#[derive(Debug, Deserialize)]
struct ManifestTrack<C> {
    context: C,
    #[serde(default)]
    chunks: Vec<MemoryChunk>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    format: MediaFormat,
    #[serde(default)]
    video: Option<ManifestTrack<VideoContext>>,
    #[serde(default)]
    audio: Option<ManifestTrack<AudioContext>>,
}

/// 分片清单（JSON）容器读取器
///
/// 文件内直接列出每条轨道的参数和分片，主要用于测试和演示
pub struct ManifestReader;

impl ManifestReader {
    pub fn parse(name: &str, json: &str) -> Result<MemorySource> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let mut source = MemorySource::new(name).with_format(manifest.format);
        if let Some(track) = manifest.video {
            source = source.with_video(track.context, track.chunks);
        }
        if let Some(track) = manifest.audio {
            source = source.with_audio(track.context, track.chunks);
        }
        Ok(source)
    }
}

impl ContainerReader for ManifestReader {
    fn name(&self) -> &'static str {
        "chunk-manifest"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn open(&self, path: &Path) -> Result<OpenedMedia> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::OpenError(format!("{}: {}", path.display(), e)))?;
        let source = Self::parse(&path.display().to_string(), &text)
            .map_err(|e| PlayerError::OpenError(format!("{}: {}", path.display(), e)))?;
        Ok(source.into_opened())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_marks_every_nth_seekable() {
        let mut source = MemorySource::synthetic(
            Some(SyntheticTrack {
                chunk_count: 10,
                interval_ms: 100,
                seekable_every: 3,
                payload_bytes: 16,
            }),
            None,
        );

        let info = source.chunk_info(TrackKind::Video, 6).unwrap();
        assert_eq!(info.pts, 600);
        assert!(info.seekable);
        assert!(!source.chunk_info(TrackKind::Video, 7).unwrap().seekable);
        assert!(matches!(
            source.chunk_info(TrackKind::Video, 10),
            Err(PlayerError::EndOfMedia)
        ));
        assert!(matches!(
            source.chunk_info(TrackKind::Audio, 0),
            Err(PlayerError::EndOfMedia)
        ));
    }

    #[test]
    fn read_chunk_rejects_short_buffer() {
        let mut source = MemorySource::new("t").with_audio(
            AudioContext::default(),
            vec![MemoryChunk::new(0, true, vec![1, 2, 3, 4])],
        );
        let mut small = [0u8; 2];
        assert!(matches!(
            source.read_chunk(TrackKind::Audio, 0, &mut small),
            Err(PlayerError::ChunkError(_))
        ));

        let mut buf = [0u8; 8];
        let read = source.read_chunk(TrackKind::Audio, 0, &mut buf).unwrap();
        assert_eq!(read.size, 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert!(read.key_frame);
    }

    #[test]
    fn manifest_parses_tracks_and_fills_sized_chunks() {
        let json = r#"{
            "video": {
                "context": { "video_type": "yuv422", "width": 4, "height": 2 },
                "chunks": [
                    { "pts": 0, "seekable": true, "size": 16 },
                    { "pts": 40, "data": [9, 9] }
                ]
            }
        }"#;
        let mut source = ManifestReader::parse("inline", json).unwrap();
        let info = source.play_info();
        assert_eq!(info.video_type, VideoType::Yuv422);
        assert_eq!(info.audio_type, AudioType::None);
        assert_eq!(info.video_chunks, 2);
        assert_eq!(info.duration_ms, 40);
        assert_eq!(source.chunk_info(TrackKind::Video, 0).unwrap().size, 16);
        assert!(!source.chunk_info(TrackKind::Video, 1).unwrap().seekable);
    }

    #[test]
    fn closed_source_refuses_reads() {
        let mut source = MemorySource::new("t").with_video(
            VideoContext::default(),
            vec![MemoryChunk::new(0, true, vec![0; 4])],
        );
        source.close();
        assert!(source.is_closed());
        assert!(matches!(
            source.chunk_info(TrackKind::Video, 0),
            Err(PlayerError::NullResource(_))
        ));
    }
}
