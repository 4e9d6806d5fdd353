// 核心数据结构和类型定义

pub mod types;
pub mod clock;
pub mod config;
pub mod error;

pub use types::*;
pub use clock::*;
pub use config::*;
pub use error::*;

use std::{process, thread};

/// 分配清零的缓冲区，内存不足时返回 AllocError
pub fn alloc_buffer(bytes: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|e| PlayerError::AllocError(format!("分配 {} 字节失败: {}", bytes, e)))?;
    buf.resize(bytes, 0);
    Ok(buf)
}

/// 日志上下文前缀
pub fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}
