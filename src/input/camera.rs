// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 摄像头输入模块 - 独立的摄像头解码器
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::decode_filter::{CaptureEvent, DecodeFilter, Delivery};
use super::decoder_manager::{is_current_generation, send_if_current};

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// 摄像头解码器结构
pub struct CameraDecoder {
    device_index: usize,
    device_name: String,
    generation: usize,
    tx: Sender<CaptureEvent>,
    evict_rx: Receiver<CaptureEvent>,
}

impl CameraDecoder {
    pub fn new(
        device_index: usize,
        device_name: String,
        generation: usize,
        tx: Sender<CaptureEvent>,
        evict_rx: Receiver<CaptureEvent>,
    ) -> Self {
        Self {
            device_index,
            device_name,
            generation,
            tx,
            evict_rx,
        }
    }

    /// 启动摄像头解码, 打开失败时重试
    pub fn run(&mut self) {
        let url = camera_url(self.device_index, &self.device_name);
        let format = camera_format();
        tracing::info!(
            "🎥 摄像头解码器 (Gen: {}) 格式: {}, 输入: {}",
            self.generation,
            format,
            url
        );

        let mut retry_count = 0;
        loop {
            if !is_current_generation(self.generation) {
                return;
            }

            let filter = DecodeFilter::new(self.generation, self.tx.clone(), Delivery::DropWhenFull)
                .with_evict(self.evict_rx.clone());
            let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
            let pipe = pipe.filter("decode", Box::new(filter));
            let out = create_null_output().add_frame_pipeline(pipe);

            let input = Input::new(url.as_str()).set_format(format);
            let started = FfmpegContext::builder()
                .input(input)
                .filter_desc("format=yuv420p")
                .output(out)
                .build()
                .map_err(|e| e.to_string())
                .and_then(|ctx| ctx.start().map_err(|e| e.to_string()));

            let sch = match started {
                Ok(sch) => sch,
                Err(e) => {
                    retry_count += 1;
                    tracing::warn!("❌ 摄像头打开失败: {}", e);
                    if retry_count >= MAX_RETRIES {
                        tracing::error!("❌ 摄像头打开失败 (重试{}次)", MAX_RETRIES);
                        send_if_current(
                            &self.tx,
                            self.generation,
                            CaptureEvent::Error("摄像头无法打开或不可用".to_string()),
                        );
                        return;
                    }
                    tracing::info!(
                        "⚠️ 摄像头忙或无法打开, 1秒后重试... ({}/{})",
                        retry_count,
                        MAX_RETRIES
                    );
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                }
            };

            tracing::info!("✅ 摄像头连接成功,开始解码!");
            send_if_current(
                &self.tx,
                self.generation,
                CaptureEvent::Opened(self.device_name.clone()),
            );

            let result = sch.wait();
            if let Err(e) = &result {
                tracing::warn!("📹 摄像头解码中断: {}", e);
            }
            send_if_current(
                &self.tx,
                self.generation,
                CaptureEvent::Error("摄像头画面中断".to_string()),
            );
            tracing::info!("📹 摄像头解码循环结束 (Gen: {})", self.generation);
            return;
        }
    }
}

/// 平台对应的 FFmpeg 输入格式
pub fn camera_format() -> &'static str {
    if cfg!(target_os = "windows") {
        "dshow" // DirectShow
    } else if cfg!(target_os = "macos") {
        "avfoundation" // AVFoundation
    } else {
        "v4l2" // Video4Linux2
    }
}

/// 格式化摄像头URL - 根据平台选择
pub fn camera_url(index: usize, name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("video={}", name)
    } else if cfg!(target_os = "macos") {
        index.to_string()
    } else {
        format!("/dev/video{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_matches_platform_format() {
        let url = camera_url(2, "USB Camera");
        match camera_format() {
            "dshow" => assert_eq!(url, "video=USB Camera"),
            "avfoundation" => assert_eq!(url, "2"),
            _ => assert_eq!(url, "/dev/video2"),
        }
    }
}
