// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 解码器管理器 - 支持动态切换输入源
///
/// 每次启动采集都会递增全局代数ID, 旧管线的过滤器在下一帧发现代数过期后自行退出。
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use super::camera::CameraDecoder;
use super::decode_filter::CaptureEvent;
use super::decoder::FileDecoder;

/// 当前有效的解码器代数
static ACTIVE_DECODER_GENERATION: AtomicUsize = AtomicUsize::new(0);

pub fn is_current_generation(generation: usize) -> bool {
    ACTIVE_DECODER_GENERATION.load(Ordering::Relaxed) == generation
}

fn next_generation() -> usize {
    ACTIVE_DECODER_GENERATION.fetch_add(1, Ordering::Relaxed) + 1
}

/// 只有当前代数的解码器才能向界面发送状态事件
pub fn send_if_current(
    tx: &Sender<CaptureEvent>,
    generation: usize,
    event: CaptureEvent,
) -> bool {
    if !is_current_generation(generation) {
        tracing::debug!("🛑 过期解码器 (Gen: {}) 的事件已丢弃: {:?}", generation, event);
        return false;
    }
    tx.send(event).is_ok()
}

/// 视频设备信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub name: String,
    pub index: usize,
}

/// 输入源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Camera { index: usize, name: String },
    File(PathBuf),
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Camera { index, name } => write!(f, "摄像头 {} ({})", index, name),
            VideoSource::File(path) => write!(
                f,
                "{}",
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string())
            ),
        }
    }
}

/// 采集线程句柄
pub struct CaptureWorker {
    generation: usize,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// 启动新的采集线程, 之前的线程随之失效
    ///
    /// `rx` 是同一通道的接收端, 摄像头用它挤掉积压的旧帧。
    pub fn spawn(
        source: VideoSource,
        tx: Sender<CaptureEvent>,
        rx: Receiver<CaptureEvent>,
    ) -> std::io::Result<Self> {
        let generation = next_generation();
        tracing::info!("🔄 切换输入源 (Gen: {}): {}", generation, source);

        let handle = std::thread::Builder::new()
            .name(format!("capture-{}", generation))
            .spawn(move || match source {
                VideoSource::Camera { index, name } => {
                    CameraDecoder::new(index, name, generation, tx, rx).run()
                }
                VideoSource::File(path) => FileDecoder::new(path, generation, tx).run(),
            })?;

        Ok(Self {
            generation,
            handle: Some(handle),
        })
    }

    /// 使当前管线失效, 不等待线程结束
    pub fn stop(&mut self) {
        if is_current_generation(self.generation) {
            next_generation();
        }
        // FFmpeg 可能阻塞在打开设备上, 不 join
        self.handle.take();
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 获取可用的视频设备列表
pub fn get_video_devices() -> Vec<VideoDevice> {
    tracing::info!("🔍 正在扫描视频设备...");

    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => {
            tracing::info!("✅ 找到 {} 个视频设备", devices.len());
            devices
                .into_iter()
                .enumerate()
                .map(|(index, name)| {
                    tracing::info!("   [{}] {}", index, name);
                    VideoDevice { name, index }
                })
                .collect()
        }
        Err(e) => {
            tracing::warn!("⚠️  获取设备列表失败: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_invalidate_previous() {
        let a = next_generation();
        assert!(is_current_generation(a));
        let b = next_generation();
        assert!(b > a);
        assert!(!is_current_generation(a));
    }

    #[test]
    fn stale_generation_cannot_send_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stale = next_generation();
        next_generation();
        assert!(!send_if_current(&tx, stale, CaptureEvent::Opened("cam".into())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn source_display() {
        let src = VideoSource::File(PathBuf::from("/tmp/videos/birds.mp4"));
        assert_eq!(src.to_string(), "birds.mp4");
        let cam = VideoSource::Camera {
            index: 0,
            name: "USB Camera".into(),
        };
        assert_eq!(cam.to_string(), "摄像头 0 (USB Camera)");
    }
}
