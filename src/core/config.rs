use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{PlayerError, Result};

/// 播放管线配置
///
/// 所有字段都有默认值，JSON 中缺省的字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// 工作线程空闲轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 视频包队列时间窗口（毫秒）
    #[serde(default = "default_list_duration_ms")]
    pub video_list_duration_ms: u64,

    /// 音频包队列时间窗口（毫秒）
    #[serde(default = "default_list_duration_ms")]
    pub audio_list_duration_ms: u64,

    /// seek 二分查找时 "足够接近" 的窗口（毫秒）
    #[serde(default = "default_seek_near_window_ms")]
    pub seek_near_window_ms: u64,

    /// 解码输出环形缓冲区槽位数
    #[serde(default = "default_decoded_frame_slots")]
    pub decoded_frame_slots: usize,

    /// 每个轨道暂存分片缓冲区个数
    #[serde(default = "default_chunk_slots")]
    pub chunk_slots: usize,

    /// 分片缓冲区扩容时额外预留的字节数
    #[serde(default = "default_chunk_headroom_bytes")]
    pub chunk_headroom_bytes: usize,

    /// 命令通道深度
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,

    /// 阻塞命令等待上限（毫秒），None 表示无限等待
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,

    /// 已就绪的包落后当前时间超过该值才会被跳过（毫秒）
    #[serde(default)]
    pub late_packet_tolerance_ms: u64,

    /// 按媒体参数预分配的单帧缓冲区上限（字节）
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_list_duration_ms() -> u64 {
    3000
}

fn default_seek_near_window_ms() -> u64 {
    500
}

fn default_decoded_frame_slots() -> usize {
    3
}

fn default_chunk_slots() -> usize {
    1
}

fn default_chunk_headroom_bytes() -> usize {
    1024
}

fn default_command_capacity() -> usize {
    1
}

fn default_max_frame_bytes() -> usize {
    64 * 1024 * 1024
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            video_list_duration_ms: default_list_duration_ms(),
            audio_list_duration_ms: default_list_duration_ms(),
            seek_near_window_ms: default_seek_near_window_ms(),
            decoded_frame_slots: default_decoded_frame_slots(),
            chunk_slots: default_chunk_slots(),
            chunk_headroom_bytes: default_chunk_headroom_bytes(),
            command_capacity: default_command_capacity(),
            command_timeout_ms: None,
            late_packet_tolerance_ms: 0,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl PlayerConfig {
    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(PlayerError::ConfigError("poll_interval_ms 必须大于 0".to_string()));
        }
        if self.decoded_frame_slots == 0 {
            return Err(PlayerError::ConfigError("decoded_frame_slots 必须大于 0".to_string()));
        }
        if self.chunk_slots == 0 {
            return Err(PlayerError::ConfigError("chunk_slots 必须大于 0".to_string()));
        }
        if self.command_capacity == 0 {
            return Err(PlayerError::ConfigError("command_capacity 必须大于 0".to_string()));
        }
        if self.max_frame_bytes == 0 {
            return Err(PlayerError::ConfigError("max_frame_bytes 必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 校验按媒体参数算出的缓冲区大小，None 表示计算溢出
    pub fn check_frame_bytes(&self, bytes: Option<usize>, what: &str) -> Result<usize> {
        match bytes {
            Some(n) if n <= self.max_frame_bytes => Ok(n),
            Some(n) => Err(PlayerError::InvalidArgument(format!(
                "{} 需要 {} 字节，超过上限 {} 字节",
                what, n, self.max_frame_bytes
            ))),
            None => Err(PlayerError::InvalidArgument(format!("{} 大小溢出", what))),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = PlayerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.video_list_duration_ms, 3000);
        assert_eq!(config.decoded_frame_slots, 3);
        assert_eq!(config.command_timeout(), None);
    }

    #[test]
    fn partial_json_overrides_selected_fields() {
        let config = PlayerConfig::from_json_str(
            r#"{ "seek_near_window_ms": 250, "command_timeout_ms": 2000 }"#,
        )
        .unwrap();
        assert_eq!(config.seek_near_window_ms, 250);
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.poll_interval_ms, 1);
    }

    #[test]
    fn frame_bytes_limit() {
        let config = PlayerConfig {
            max_frame_bytes: 1_000,
            ..PlayerConfig::default()
        };
        assert_eq!(config.check_frame_bytes(Some(1_000), "视频").unwrap(), 1_000);
        assert!(matches!(
            config.check_frame_bytes(Some(1_001), "视频"),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert!(matches!(
            config.check_frame_bytes(None, "视频"),
            Err(PlayerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_slots_rejected() {
        let err = PlayerConfig::from_json_str(r#"{ "decoded_frame_slots": 0 }"#).unwrap_err();
        assert!(matches!(err, PlayerError::ConfigError(_)));
    }
}
