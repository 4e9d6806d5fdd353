//! 基于分片的音视频播放管线
//!
//! 解复用线程按时间戳节拍从媒体源读取分片，放入按时间限长的包队列；
//! 每条轨道的解码线程取出到期的包，解码后通过回调输出。

pub mod core;
pub mod player;

pub use crate::core::{PlayStatus, PlayerConfig, PlayerError, Result};
pub use crate::player::{PlaySession, Player};
