use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("内存分配失败: {0}")]
    AllocError(String),

    #[error("系统调用失败: {0}")]
    OsError(String),

    #[error("媒体已结束")]
    EndOfMedia,

    #[error("无法打开媒体: {0}")]
    OpenError(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("资源不存在: {0}")]
    NullResource(&'static str),

    #[error("命令通道已满")]
    ChannelFull,

    #[error("等待命令回复超时")]
    Timeout,

    #[error("工作线程内部发起阻塞命令，会导致死锁")]
    WouldDeadlock,

    #[error("工作线程已退出")]
    WorkerGone,

    #[error("不支持的编解码类型: {0}")]
    CodecType(String),

    #[error("编解码器打开失败: {0}")]
    CodecOpen(String),

    #[error("解码错误: {0}")]
    DecodeError(String),

    #[error("读取分片失败: {0}")]
    ChunkError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
