// 播放器核心模块

pub mod command;
pub mod media_source;  // 分片媒体源接口 + 容器读取器接口
pub mod memory_source; // 内存媒体源 / JSON 分片清单
pub mod codec;
pub mod packet_list;
pub mod seek;
pub mod demux;         // 解复用线程
pub mod decode;        // 解码线程
pub mod engine;        // 播放引擎（线程组装与销毁）
pub mod session;       // 播放器门面

pub use codec::{Codec, CodecInterface, CodecOutcome, CodecParams, PassthroughCodecInterface};
pub use decode::{DecodeState, FlushCallback};
pub use demux::{DemuxState, SeekRequest};
pub use engine::{PlayEngine, PlayInterface};
pub use media_source::{share_source, ContainerReader, MediaSource, OpenedMedia, SharedMediaSource};
pub use memory_source::{ManifestReader, MemoryChunk, MemorySource, SyntheticTrack};
pub use session::{PlaySession, Player};
