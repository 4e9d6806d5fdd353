use crate::core::{ChunkInfo, PlayerError, Result};

/// 按时间定位分片编号
///
/// 1. 分片总数未知（0）时倍增探测上界，直到越界或时间超过目标
/// 2. 二分查找，时间落在目标之后 near_window_ms 以内即认为足够接近
/// 3. 向前回退到最近的可 seek 分片（编号 0 无条件接受）
///
/// probe 越界时返回 `PlayerError::EndOfMedia`
pub fn seek_chunk<F>(target_ms: u64, total_chunks: u32, near_window_ms: u64, mut probe: F) -> Result<u32>
where
    F: FnMut(u32) -> Result<ChunkInfo>,
{
    let mut min_id: u32 = 0;
    let mut mid_id: u32 = 1;
    let mut max_id: u32 = total_chunks;

    while max_id == 0 {
        match probe(mid_id) {
            Err(PlayerError::EndOfMedia) => {
                max_id = mid_id;
            }
            Err(e) => return Err(e),
            Ok(info) if info.pts > target_ms => {
                max_id = mid_id;
            }
            Ok(_) => {
                min_id = mid_id;
                mid_id = match mid_id.checked_mul(2) {
                    Some(next) => next,
                    None => {
                        max_id = u32::MAX;
                        break;
                    }
                };
            }
        }
    }

    let mut info;
    loop {
        mid_id = min_id + (max_id - min_id) / 2;
        info = match probe(mid_id) {
            Err(PlayerError::EndOfMedia) => {
                if mid_id == min_id {
                    // 区间已无法收缩：轨道为空
                    return Err(PlayerError::EndOfMedia);
                }
                max_id = mid_id;
                continue;
            }
            other => other?,
        };

        if min_id + 1 >= mid_id {
            // 稀疏轨道：相邻分片可能远超目标，退回下界
            if mid_id != min_id && info.pts > target_ms && info.pts - target_ms >= near_window_ms {
                mid_id = min_id;
                info = probe(mid_id)?;
            }
            break;
        }

        if info.pts > target_ms {
            if info.pts - target_ms < near_window_ms {
                break;
            }
            max_id = mid_id;
        } else {
            min_id = mid_id;
        }
    }

    while !info.seekable && mid_id > 0 {
        mid_id -= 1;
        info = probe(mid_id)?;
    }

    Ok(mid_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Track {
        pts: Vec<u64>,
        seekable_every: usize,
        probes: usize,
    }

    impl Track {
        fn uniform(count: usize, step: u64, seekable_every: usize) -> Self {
            Self {
                pts: (0..count as u64).map(|i| i * step).collect(),
                seekable_every,
                probes: 0,
            }
        }

        fn probe(&mut self, id: u32) -> Result<ChunkInfo> {
            self.probes += 1;
            let idx = id as usize;
            let pts = *self.pts.get(idx).ok_or(PlayerError::EndOfMedia)?;
            Ok(ChunkInfo {
                size: 1,
                pts,
                seekable: idx % self.seekable_every == 0,
            })
        }
    }

    #[test]
    fn lands_on_previous_seekable_chunk() {
        let mut track = Track::uniform(10, 100, 3);
        let id = seek_chunk(450, 10, 500, |id| track.probe(id)).unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn target_past_end_lands_near_last_chunk() {
        let mut track = Track::uniform(10, 100, 3);
        let id = seek_chunk(5_000, 0, 500, |id| track.probe(id)).unwrap();
        assert_eq!(id, 9);
    }

    #[test]
    fn target_zero_returns_first_chunk() {
        let mut track = Track::uniform(10, 100, 3);
        assert_eq!(seek_chunk(0, 10, 500, |id| track.probe(id)).unwrap(), 0);
    }

    #[test]
    fn empty_track_reports_end_of_media() {
        let mut track = Track::uniform(0, 100, 1);
        assert!(matches!(
            seek_chunk(100, 0, 500, |id| track.probe(id)),
            Err(PlayerError::EndOfMedia)
        ));
    }

    #[test]
    fn sparse_track_does_not_overshoot() {
        let mut track = Track {
            pts: vec![0, 10_000],
            seekable_every: 1,
            probes: 0,
        };
        assert_eq!(seek_chunk(100, 2, 500, |id| track.probe(id)).unwrap(), 0);
    }

    #[test]
    fn probe_errors_propagate() {
        let result = seek_chunk(100, 10, 500, |_| Err(PlayerError::ChunkError("bad".into())));
        assert!(matches!(result, Err(PlayerError::ChunkError(_))));
    }

    #[test]
    fn result_is_seekable_and_within_window() {
        for total_hint in [0u32, 100] {
            let mut target = 0;
            while target < 12_000 {
                let mut track = Track::uniform(100, 100, 7);
                let id = seek_chunk(target, total_hint, 500, |id| track.probe(id)).unwrap();
                let info = track.probe(id).unwrap();
                assert!(info.seekable || id == 0, "target {} -> id {}", target, id);
                assert!(info.pts <= target + 500, "target {} -> pts {}", target, info.pts);
                target += 37;
            }
        }
    }

    #[test]
    fn bisection_is_logarithmic() {
        let mut track = Track::uniform(100_000, 40, 1);
        seek_chunk(2_000_000, 0, 500, |id| track.probe(id)).unwrap();
        assert!(track.probes < 64, "probes = {}", track.probes);
    }
}
