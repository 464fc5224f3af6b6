// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输入系统 (Video Input System)
///
/// 独立采集线程, 负责解码并把最新帧交给界面线程
/// - CameraDecoder: 本地摄像头解码器 (DirectShow/AVFoundation/V4L2)
/// - FileDecoder:   视频文件解码器 (循环播放)
/// - DecodeFilter:  YUV420P → RGB 帧过滤器
/// - CaptureWorker: 采集线程管理 (代数ID 控制热切换)
pub mod camera;
pub mod decode_filter;
pub mod decoder;
pub mod decoder_manager;

pub use camera::CameraDecoder;
pub use decode_filter::{CaptureEvent, DecodeFilter, DecodedFrame, Delivery};
pub use decoder::FileDecoder;
pub use decoder_manager::{get_video_devices, CaptureWorker, VideoDevice, VideoSource};

/// 采集通道容量, 界面只处理最新的帧
pub const FRAME_CHANNEL_CAPACITY: usize = 2;
