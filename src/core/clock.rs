use std::time::{Duration, Instant};

use super::types::FastForwardSpeed;

/// 单调时钟 - 所有工作线程共享同一个基准，时间单位为毫秒
#[derive(Debug, Clone, Copy)]
pub struct MediaClock {
    base_instant: Instant,
}

impl MediaClock {
    pub fn new() -> Self {
        Self {
            base_instant: Instant::now(),
        }
    }

    /// 当前时间（毫秒）
    pub fn now_ms(&self) -> u64 {
        self.base_instant.elapsed().as_millis() as u64
    }

    /// 距离 deadline 还需等待多久（已过期返回 0）
    pub fn until(&self, deadline_ms: u64) -> Duration {
        Duration::from_millis(deadline_ms.saturating_sub(self.now_ms()))
    }
}

impl Default for MediaClock {
    fn default() -> Self {
        Self::new()
    }
}

/// 播放锚点 - 把轨道时间映射到墙钟
///
/// deadline = start + (data_time - offset) / speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayAnchor {
    start_ms: u64,
    offset_ms: u64,
    speed: FastForwardSpeed,
}

impl PlayAnchor {
    pub fn new(start_ms: u64, offset_ms: u64, speed: FastForwardSpeed) -> Self {
        Self {
            start_ms,
            offset_ms,
            speed,
        }
    }

    pub fn deadline(&self, data_time: u64) -> u64 {
        self.start_ms + data_time.saturating_sub(self.offset_ms) / self.speed.factor()
    }

    pub fn offset_ms(&self) -> u64 {
        self.offset_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_scales_with_speed() {
        let anchor = PlayAnchor::new(1_000, 200, FastForwardSpeed::Double);
        assert_eq!(anchor.deadline(200), 1_000);
        assert_eq!(anchor.deadline(400), 1_100);

        let anchor = PlayAnchor::new(1_000, 200, FastForwardSpeed::Quadruple);
        assert_eq!(anchor.deadline(600), 1_100);
    }

    #[test]
    fn data_time_before_offset_maps_to_start() {
        let anchor = PlayAnchor::new(50, 300, FastForwardSpeed::Normal);
        assert_eq!(anchor.deadline(100), 50);
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = MediaClock::new();
        let a = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now_ms() >= a + 5);
        assert_eq!(clock.until(0), Duration::ZERO);
    }
}
