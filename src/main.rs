use anyhow::{bail, Context, Result};
use chunk_player::core::{DecodedFrame, FastForwardSpeed, PlayStatus, PlayerConfig};
use chunk_player::player::{MemorySource, Player, SyntheticTrack};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Args {
    path: Option<String>,
    config: Option<String>,
    speed: Option<FastForwardSpeed>,
    seek_ms: Option<u64>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        path: None,
        config: None,
        speed: None,
        seek_ms: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--speed" => {
                let value: u32 = iter.next().context("--speed 缺少参数")?.parse()?;
                args.speed = Some(FastForwardSpeed::try_from(value)?);
            }
            "--seek" => {
                args.seek_ms = Some(iter.next().context("--seek 缺少参数")?.parse()?);
            }
            "--config" => {
                args.config = Some(iter.next().context("--config 缺少参数")?);
            }
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => args.path = Some(other.to_string()),
        }
    }
    Ok(args)
}

fn frame_counter(name: &'static str, counter: Arc<AtomicU64>) -> impl FnMut(&DecodedFrame<'_>) + Send {
    move |frame: &DecodedFrame<'_>| {
        counter.fetch_add(1, Ordering::Relaxed);
        debug!("🖼 {} 帧 t={}ms {} 字节 @{}ms", name, frame.data_time, frame.data.len(), frame.present_at);
    }
}

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("🎬 chunk_player 启动");
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path).with_context(|| format!("加载配置 {} 失败", path))?,
        None => PlayerConfig::default(),
    };
    let player = Player::new(config);

    let mut session = match &args.path {
        Some(path) => player.open(path)?,
        None => {
            info!("未指定媒体文件，播放 10 秒合成媒体");
            let source = MemorySource::synthetic(
                Some(SyntheticTrack {
                    chunk_count: 250,
                    interval_ms: 40,
                    seekable_every: 25,
                    payload_bytes: 64 * 48 * 2,
                }),
                Some(SyntheticTrack {
                    chunk_count: 500,
                    interval_ms: 20,
                    seekable_every: 0,
                    payload_bytes: 320,
                }),
            );
            player.open_source(source.into_opened())
        }
    };
    info!("📋 {}", serde_json::to_string(session.info())?);

    let video_frames = Arc::new(AtomicU64::new(0));
    let audio_frames = Arc::new(AtomicU64::new(0));
    session
        .on_video_frame(frame_counter("视频", video_frames.clone()))
        .on_audio_frame(frame_counter("音频", audio_frames.clone()));

    session.play(true)?;
    if let Some(ms) = args.seek_ms {
        session.seek(ms, true)?;
    }
    if let Some(speed) = args.speed {
        session.fast_forward(speed, true)?;
    }

    loop {
        match session.status() {
            PlayStatus::Playing => thread::sleep(Duration::from_millis(100)),
            PlayStatus::EndOfMedia => {
                info!("🏁 播放结束");
                break;
            }
            PlayStatus::Paused => {
                info!("⏸ 播放已暂停");
                break;
            }
            PlayStatus::Error => {
                let reason = session.last_error().unwrap_or_else(|| "未知错误".to_string());
                session.close();
                bail!("播放失败: {}", reason);
            }
        }
    }

    session.close();
    info!(
        "✅ 共输出视频 {} 帧，音频 {} 帧",
        video_frames.load(Ordering::Relaxed),
        audio_frames.load(Ordering::Relaxed)
    );
    Ok(())
}
