use crate::core::{AudioContext, PlayerError, Result, TrackKind, VideoContext};
use std::fmt;

/// 打开编解码器所需的参数
#[derive(Debug, Clone)]
pub enum CodecParams {
    Video {
        media: VideoContext,
        flush: VideoContext,
    },
    Audio {
        media: AudioContext,
        flush: AudioContext,
    },
}

impl CodecParams {
    pub fn track(&self) -> TrackKind {
        match self {
            CodecParams::Video { .. } => TrackKind::Video,
            CodecParams::Audio { .. } => TrackKind::Audio,
        }
    }
}

/// 单次解码的结果
pub enum CodecOutcome {
    /// 输出了 size 字节；remaining 为输入中未消耗的字节数
    Emitted { size: usize, remaining: usize },
    /// 输入不足以产生输出
    NeedMoreInput,
    /// 不可恢复的错误
    Fatal(PlayerError),
}

impl fmt::Debug for CodecOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecOutcome::Emitted { size, remaining } => f
                .debug_struct("Emitted")
                .field("size", size)
                .field("remaining", remaining)
                .finish(),
            CodecOutcome::NeedMoreInput => f.write_str("NeedMoreInput"),
            CodecOutcome::Fatal(e) => write!(f, "Fatal({})", e),
        }
    }
}

/// 已打开的编解码器实例（由解码线程独占）
pub trait Codec: Send {
    fn decode(&mut self, input: &[u8], data_time: u64, output: &mut [u8]) -> CodecOutcome;

    fn close(&mut self) {}
}

/// 编解码器接口表项
pub trait CodecInterface: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, params: &CodecParams) -> Result<Box<dyn Codec>>;
}

/// 原始数据格式（YUV422 / PCM16 等）直通
pub struct PassthroughCodecInterface;

impl CodecInterface for PassthroughCodecInterface {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn open(&self, params: &CodecParams) -> Result<Box<dyn Codec>> {
        Ok(Box::new(PassthroughCodec {
            track: params.track(),
        }))
    }
}

struct PassthroughCodec {
    track: TrackKind,
}

impl Codec for PassthroughCodec {
    fn decode(&mut self, input: &[u8], _data_time: u64, output: &mut [u8]) -> CodecOutcome {
        if input.is_empty() {
            return CodecOutcome::NeedMoreInput;
        }
        if output.is_empty() {
            return CodecOutcome::Fatal(PlayerError::DecodeError(format!(
                "{} 输出缓冲区为空",
                self.track
            )));
        }
        let size = input.len().min(output.len());
        output[..size].copy_from_slice(&input[..size]);
        CodecOutcome::Emitted {
            size,
            remaining: input.len() - size,
        }
    }
}
