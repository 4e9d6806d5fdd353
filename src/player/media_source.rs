use crate::core::{AudioContext, ChunkInfo, ChunkRead, PlayInfo, Result, TrackKind, VideoContext};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// 分片媒体源抽象接口
///
/// 容器读取器（AVI/MP4/内存等）实现这个接口，由解复用线程按分片编号随机访问。
/// 编号越界时返回 `PlayerError::EndOfMedia`
#[cfg_attr(test, mockall::automock)]
pub trait MediaSource: Send {
    /// 查询分片元信息（不读取数据）
    fn chunk_info(&mut self, track: TrackKind, chunk_id: u32) -> Result<ChunkInfo>;

    /// 读取分片数据到 dest，dest 长度不小于 chunk_info 返回的 size
    fn read_chunk(&mut self, track: TrackKind, chunk_id: u32, dest: &mut [u8]) -> Result<ChunkRead>;

    /// 释放底层资源（文件句柄等）
    fn close(&mut self) {}

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}

/// 解复用线程与播放器门面共享的媒体源
pub type SharedMediaSource = Arc<Mutex<Box<dyn MediaSource>>>;

pub fn share_source<S: MediaSource + 'static>(source: S) -> SharedMediaSource {
    Arc::new(Mutex::new(Box::new(source)))
}

/// 打开后的媒体
pub struct OpenedMedia {
    pub source: Box<dyn MediaSource>,
    pub info: PlayInfo,
    pub video: VideoContext,
    pub audio: AudioContext,
}

/// 容器读取器：按扩展名路由
pub trait ContainerReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// 小写扩展名（不含点）
    fn extensions(&self) -> &'static [&'static str];

    fn open(&self, path: &Path) -> Result<OpenedMedia>;

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}
