use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{PlayerError, Result};

/// 轨道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Video => "视频",
            TrackKind::Audio => "音频",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 视频编码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    #[default]
    None,
    Mjpg,
    H264,
    // 原始数据格式
    Yuv422,
    Yuv422p,
    Yuv420pMb,
}

/// 音频编码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioType {
    #[default]
    None,
    Alaw,
    Ulaw,
    Aac,
    Mp3,
    // 原始数据格式
    PcmL16,
    Adpcm,
    G726,
}

/// 分片元信息（读取数据前先查询）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkInfo {
    pub size: u32,
    /// 轨道内时间戳（毫秒）
    pub pts: u64,
    /// 是否可以作为 seek 落点
    pub seekable: bool,
}

/// 一次分片读取的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRead {
    pub size: usize,
    pub pts: u64,
    pub key_frame: bool,
}

/// 视频参数（媒体侧描述输入，输出侧描述解码后的格式）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoContext {
    pub video_type: VideoType,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bit_rate: u32,
}

/// 音频参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioContext {
    pub audio_type: AudioType,
    pub sample_rate: u32,
    pub channels: u32,
    pub samples_per_block: u32,
    pub bit_rate: u32,
}

impl VideoContext {
    /// 像素数，溢出时为 None
    pub fn pixels(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// 一帧 16bit（YUV422）数据的字节数
    pub fn frame_bytes(&self) -> Option<usize> {
        self.pixels()?.checked_mul(2)
    }
}

impl AudioContext {
    /// 一个 PCM16 块的字节数
    pub fn block_bytes(&self) -> Option<usize> {
        (self.samples_per_block as usize).checked_mul(2)
    }

    /// 一秒 PCM16 数据的字节数
    pub fn second_bytes(&self) -> Option<usize> {
        (self.sample_rate as usize)
            .checked_mul(self.channels as usize)?
            .checked_mul(2)
    }
}

/// 播放上下文：媒体格式 + 输出格式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayContext {
    pub media_video: VideoContext,
    pub media_audio: AudioContext,
    pub flush_video: VideoContext,
    pub flush_audio: AudioContext,
}

/// 媒体来源形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    File,
    Streaming,
}

/// 打开媒体后得到的信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayInfo {
    pub format: MediaFormat,
    pub video_type: VideoType,
    pub audio_type: AudioType,
    /// 总时长（毫秒）
    pub duration_ms: u64,
    pub video_chunks: u32,
    pub audio_chunks: u32,
}

/// 对外播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayStatus {
    Error,
    Paused,
    Playing,
    EndOfMedia,
}

/// 快进倍速
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FastForwardSpeed {
    #[default]
    #[serde(rename = "1x")]
    Normal,
    #[serde(rename = "2x")]
    Double,
    #[serde(rename = "4x")]
    Quadruple,
}

impl FastForwardSpeed {
    pub fn factor(&self) -> u64 {
        match self {
            FastForwardSpeed::Normal => 1,
            FastForwardSpeed::Double => 2,
            FastForwardSpeed::Quadruple => 4,
        }
    }
}

impl TryFrom<u32> for FastForwardSpeed {
    type Error = PlayerError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(FastForwardSpeed::Normal),
            2 => Ok(FastForwardSpeed::Double),
            4 => Ok(FastForwardSpeed::Quadruple),
            other => Err(PlayerError::InvalidArgument(format!("不支持的快进倍速: {}x", other))),
        }
    }
}

/// 解码输出视图
///
/// 数据借用自解码环形缓冲区，只在回调期间有效
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub track: TrackKind,
    pub data: &'a [u8],
    /// 轨道内时间戳（毫秒）
    pub data_time: u64,
    /// 计划呈现时刻（MediaClock 毫秒）
    pub present_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_forward_accepts_only_supported_factors() {
        assert_eq!(FastForwardSpeed::try_from(2).unwrap().factor(), 2);
        assert_eq!(FastForwardSpeed::try_from(4).unwrap(), FastForwardSpeed::Quadruple);
        assert!(matches!(FastForwardSpeed::try_from(3), Err(PlayerError::InvalidArgument(_))));
    }

    #[test]
    fn buffer_sizes_do_not_wrap() {
        let video = VideoContext {
            width: 640,
            height: 480,
            ..Default::default()
        };
        assert_eq!(video.frame_bytes(), Some(640 * 480 * 2));

        let huge = VideoContext {
            width: u32::MAX,
            height: u32::MAX,
            ..Default::default()
        };
        assert_eq!(huge.frame_bytes(), None);

        let audio = AudioContext {
            sample_rate: 8000,
            channels: 2,
            samples_per_block: 320,
            ..Default::default()
        };
        assert_eq!(audio.second_bytes(), Some(32_000));
        assert_eq!(audio.block_bytes(), Some(640));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&PlayStatus::EndOfMedia).unwrap();
        assert_eq!(json, "\"endofmedia\"");
    }

    #[test]
    fn codec_types_use_snake_case_names() {
        let vt: VideoType = serde_json::from_str("\"yuv420p_mb\"").unwrap();
        assert_eq!(vt, VideoType::Yuv420pMb);
        let at: AudioType = serde_json::from_str("\"pcm_l16\"").unwrap();
        assert_eq!(at, AudioType::PcmL16);
    }
}
