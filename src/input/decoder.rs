// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频文件解码器
/// 播放到结尾后从头开始循环
use std::path::PathBuf;

use crossbeam_channel::Sender;
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext};

use super::decode_filter::{CaptureEvent, DecodeFilter, Delivery};
use super::decoder_manager::{is_current_generation, send_if_current};

pub struct FileDecoder {
    path: PathBuf,
    generation: usize,
    tx: Sender<CaptureEvent>,
}

impl FileDecoder {
    pub fn new(path: PathBuf, generation: usize, tx: Sender<CaptureEvent>) -> Self {
        Self {
            path,
            generation,
            tx,
        }
    }

    pub fn run(&mut self) {
        tracing::info!(
            "🎬 视频文件解码器启动 (Gen: {}): {}",
            self.generation,
            self.path.display()
        );

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string());
        let mut first_pass = true;

        while is_current_generation(self.generation) {
            let filter = DecodeFilter::new(self.generation, self.tx.clone(), Delivery::Blocking);
            let counter = filter.clone();
            let result = self.decode_once(filter, first_pass);

            if !is_current_generation(self.generation) {
                break;
            }
            if counter.frames_sent() == 0 {
                let msg = match result {
                    Err(e) => {
                        tracing::error!("❌ 无法打开视频文件 {}: {}", self.path.display(), e);
                        format!("无法打开视频文件: {}", name)
                    }
                    Ok(()) => "视频播放完毕或无法读取帧".to_string(),
                };
                let _ = self.tx.send(CaptureEvent::Error(msg));
                return;
            }
            if let Err(e) = result {
                tracing::debug!("视频解码结束: {}", e);
            }

            first_pass = false;
            tracing::info!("🔁 视频播放完毕, 从头开始");
        }
        tracing::info!("🎬 视频文件解码器退出 (Gen: {})", self.generation);
    }

    fn decode_once(&mut self, filter: DecodeFilter, announce: bool) -> Result<(), String> {
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let path = self.path.to_string_lossy().to_string();
        let ctx = FfmpegContext::builder()
            .input(path.as_str())
            .filter_desc("format=yuv420p")
            .output(out)
            .build()
            .map_err(|e| format!("构建失败: {}", e))?;
        let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;

        if announce {
            let opened = CaptureEvent::Opened(self.path.display().to_string());
            send_if_current(&self.tx, self.generation, opened);
        }
        sch.wait().map_err(|e| e.to_string())
    }
}
