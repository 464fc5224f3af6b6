// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg解码过滤器模块
/// YUV420P 帧 → RGB24, 发送到界面线程
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};

use super::decoder_manager::is_current_generation;

/// 已解码帧 (采集线程 → 界面线程)
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub rgb: Vec<u8>, // RGB24, 行紧密排列
    pub width: u32,
    pub height: u32,
}

/// 采集线程发往界面线程的事件
#[derive(Debug)]
pub enum CaptureEvent {
    Opened(String),
    Frame(DecodedFrame),
    Error(String),
}

/// 发送策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// 摄像头: 通道满时挤掉最旧的一帧, 保证界面拿到最新画面
    DropWhenFull,
    /// 视频文件: 等待界面取走, 按界面节奏播放
    Blocking,
}

/// FFmpeg解码过滤器
#[derive(Clone)]
pub struct DecodeFilter {
    generation: usize,
    tx: Sender<CaptureEvent>,
    // 同一通道的接收端, 用于挤掉最旧的帧
    evict_rx: Option<Receiver<CaptureEvent>>,
    delivery: Delivery,
    frames: Arc<AtomicU64>, // 本次管线已发送帧数
    count: usize,
    dropped_frames: usize,
    total_frames: usize,
    last: Instant,
}

impl DecodeFilter {
    pub fn new(generation: usize, tx: Sender<CaptureEvent>, delivery: Delivery) -> Self {
        Self {
            generation,
            tx,
            evict_rx: None,
            delivery,
            frames: Arc::new(AtomicU64::new(0)),
            count: 0,
            dropped_frames: 0,
            total_frames: 0,
            last: Instant::now(),
        }
    }

    pub fn with_evict(mut self, rx: Receiver<CaptureEvent>) -> Self {
        self.evict_rx = Some(rx);
        self
    }

    /// 已发送到界面的帧数 (所有克隆共享)
    pub fn frames_sent(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn drop_frame(&mut self, reason: &str) -> Result<Option<Frame>, String> {
        self.dropped_frames += 1;
        if self.total_frames <= 10 {
            tracing::warn!("⚠️ 丢弃帧 #{}: {}", self.total_frames, reason);
        }
        Ok(None)
    }

    fn deliver(&mut self, frame: DecodedFrame) -> Result<(), String> {
        let event = CaptureEvent::Frame(frame);
        match self.delivery {
            Delivery::DropWhenFull => {
                let evicted = push_latest(&self.tx, self.evict_rx.as_ref(), event)?;
                self.dropped_frames += evicted;
                Ok(())
            }
            Delivery::Blocking => {
                let mut event = event;
                loop {
                    match self.tx.send_timeout(event, Duration::from_millis(100)) {
                        Ok(()) => return Ok(()),
                        Err(SendTimeoutError::Timeout(e)) => {
                            if !is_current_generation(self.generation) {
                                return Err("Decoder expired".to_string());
                            }
                            event = e;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => {
                            return Err("receiver closed".to_string())
                        }
                    }
                }
            }
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::debug!("✅ 解码线程启动 (Gen: {})", self.generation);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        // 检查解码器代数ID,如果已过期则停止解码
        if !is_current_generation(self.generation) {
            tracing::info!("🛑 解码器已过期 (Gen: {}), 停止解码", self.generation);
            return Err("Decoder expired".to_string());
        }

        self.total_frames += 1;
        // SAFETY: 仅读取 FFmpeg 持有的帧元数据, 不解引用
        if unsafe { frame.as_ptr().is_null() || frame.is_empty() } || frame.is_corrupt() {
            return self.drop_frame("空帧/损坏帧");
        }

        // SAFETY: 指针非空, 由 FFmpeg 持有到本次调用结束
        let raw = unsafe { &*frame.as_ptr() };
        let (w, h) = (raw.width, raw.height);
        if w <= 0 || h <= 0 || w > 8192 || h > 8192 {
            return self.drop_frame(&format!("非法分辨率 {}x{}", w, h));
        }
        let (w, h) = (w as usize, h as usize);

        let y_stride = raw.linesize[0];
        let uv_stride = raw.linesize[1];
        if raw.data[0].is_null() || raw.data[1].is_null() || raw.data[2].is_null() {
            return self.drop_frame("YUV指针为空");
        }
        if y_stride < w as i32 || uv_stride < w.div_ceil(2) as i32 || raw.linesize[2] != uv_stride
        {
            return self.drop_frame(&format!("步长异常 y={} uv={}", y_stride, uv_stride));
        }
        let (y_stride, uv_stride) = (y_stride as usize, uv_stride as usize);
        let uv_rows = h.div_ceil(2);

        // SAFETY: format=yuv420p 滤镜保证三个平面的尺寸与步长一致
        let (y_plane, u_plane, v_plane) = unsafe {
            (
                std::slice::from_raw_parts(raw.data[0], y_stride * h),
                std::slice::from_raw_parts(raw.data[1], uv_stride * uv_rows),
                std::slice::from_raw_parts(raw.data[2], uv_stride * uv_rows),
            )
        };

        let rgb = yuv420p_to_rgb(y_plane, u_plane, v_plane, y_stride, uv_stride, w, h);
        self.deliver(DecodedFrame {
            rgb,
            width: w as u32,
            height: h as u32,
        })?;
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.count += 1;

        if self.last.elapsed().as_secs_f64() >= 5.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            tracing::debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        tracing::debug!("✅ 解码线程退出 (Gen: {})", self.generation);
    }
}

/// 非阻塞发送; 通道满时取出最旧的一帧再重试, 返回丢弃的帧数
///
/// 取出的若不是帧 (打开/错误事件) 则放回通道, 本帧让位。
/// 没有接收端可用时退化为丢弃新帧。
pub fn push_latest(
    tx: &Sender<CaptureEvent>,
    evict_rx: Option<&Receiver<CaptureEvent>>,
    event: CaptureEvent,
) -> Result<usize, String> {
    let mut event = event;
    let mut dropped = 0;
    for _ in 0..=FRAME_EVICT_ATTEMPTS {
        match tx.try_send(event) {
            Ok(()) => return Ok(dropped),
            Err(TrySendError::Disconnected(_)) => return Err("receiver closed".to_string()),
            Err(TrySendError::Full(e)) => event = e,
        }
        match evict_rx.map(|rx| rx.try_recv()) {
            Some(Ok(CaptureEvent::Frame(_))) => dropped += 1,
            Some(Ok(other)) => {
                let _ = tx.try_send(other);
                return Ok(dropped + 1);
            }
            // 界面刚好取空了通道, 直接重试
            Some(Err(_)) => {}
            None => return Ok(dropped + 1),
        }
    }
    Ok(dropped + 1)
}

const FRAME_EVICT_ATTEMPTS: usize = 2;

/// YUV420P → RGB24, BT.601 整数系数 (乘以128)
pub fn yuv420p_to_rgb(
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
    y_stride: usize,
    uv_stride: usize,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 3];
    for (row, out_row) in out.chunks_exact_mut(width * 3).enumerate() {
        let y_row = &y_plane[row * y_stride..row * y_stride + width];
        let uv_off = (row >> 1) * uv_stride;
        for (x, px) in out_row.chunks_exact_mut(3).enumerate() {
            let y_val = y_row[x] as i32;
            let u_val = u_plane[uv_off + (x >> 1)] as i32 - 128;
            let v_val = v_plane[uv_off + (x >> 1)] as i32 - 128;

            px[0] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            px[1] = (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            px[2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
        }
    }
    out
}
