use crate::core::{log_ctx, TrackKind};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

// 回收缓冲池上限
const MAX_FREE_BUFFERS: usize = 8;

/// 包头信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub chunk_id: u32,
    /// 计划呈现时刻（MediaClock 毫秒）
    pub pts: u64,
    /// 轨道内时间戳（毫秒）
    pub data_time: u64,
    pub key_frame: bool,
}

/// 队列中的一个包（持有数据拷贝）
#[derive(Debug)]
pub struct Packet {
    pub header: PacketHeader,
    pub data: Vec<u8>,
}

struct ListInner {
    packets: VecDeque<Packet>,
    free: Vec<Vec<u8>>,
}

impl ListInner {
    fn recycle(&mut self, mut data: Vec<u8>) {
        if self.free.len() < MAX_FREE_BUFFERS {
            data.clear();
            self.free.push(data);
        }
    }

    /// 丢弃 [0, cut) 区间的包
    fn drop_front(&mut self, cut: usize) -> usize {
        for _ in 0..cut {
            if let Some(packet) = self.packets.pop_front() {
                self.recycle(packet.data);
            }
        }
        cut
    }

    /// pts <= limit 的包中最新关键帧的位置
    fn newest_key_at_or_before(&self, limit: u64, strict: bool) -> usize {
        let mut cut = 0;
        for (i, packet) in self.packets.iter().enumerate() {
            let beyond = if strict {
                packet.header.pts >= limit
            } else {
                packet.header.pts > limit
            };
            if beyond {
                break;
            }
            if packet.header.key_frame {
                cut = i;
            }
        }
        cut
    }
}

/// 时间窗口包队列
///
/// 解复用线程 put，解码线程 acquire/release，容量按时间而不是按个数限制
pub struct PacketList {
    track: TrackKind,
    duration_ms: u64,
    late_tolerance_ms: u64,
    inner: Mutex<ListInner>,
    ready: Condvar,
}

impl PacketList {
    pub fn new(track: TrackKind, duration_ms: u64, late_tolerance_ms: u64) -> Self {
        Self {
            track,
            duration_ms,
            late_tolerance_ms,
            inner: Mutex::new(ListInner {
                packets: VecDeque::new(),
                free: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// 拷贝数据入队
    ///
    /// 先释放早于 `pts - duration` 的包（保留其中最新的关键帧），再追加新包
    pub fn put(&self, header: PacketHeader, payload: &[u8]) {
        let mut inner = self.inner.lock();

        let expire_before = header.pts.saturating_sub(self.duration_ms);
        let cut = inner.newest_key_at_or_before(expire_before, true);
        if inner.drop_front(cut) > 0 {
            debug!("{} 🧹 {}队列释放 {} 个过期包", log_ctx(), self.track, cut);
        }

        // 音频包一律视为关键包
        let header = PacketHeader {
            key_frame: header.key_frame || self.track == TrackKind::Audio,
            ..header
        };
        let mut data = inner.free.pop().unwrap_or_default();
        data.extend_from_slice(payload);
        inner.packets.push_back(Packet { header, data });

        drop(inner);
        self.ready.notify_all();
    }

    /// 取出一个已到呈现时刻的包
    ///
    /// 落后太多时跳到最新的已就绪关键包，之前的包直接丢弃
    pub fn acquire_closed_packet(&self, now: u64) -> Option<Packet> {
        let mut inner = self.inner.lock();

        let threshold = now.saturating_sub(self.late_tolerance_ms);
        let cut = inner.newest_key_at_or_before(threshold, false);
        if inner.drop_front(cut) > 0 {
            debug!("{} ⏭ {}队列落后，跳过 {} 个包", log_ctx(), self.track, cut);
        }

        match inner.packets.front() {
            Some(head) if head.header.pts <= now => inner.packets.pop_front(),
            _ => None,
        }
    }

    /// 归还包，数据缓冲区进入回收池
    pub fn release(&self, packet: Packet) {
        self.inner.lock().recycle(packet.data);
    }

    /// 等待队列非空，最多等待 timeout
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.packets.is_empty() {
            if self.ready.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        !inner.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().packets.is_empty()
    }
}
