use std::time::Duration;

use crate::format::ImageFormat;
use crate::traits::TriggerConfig;

/// 打开相机时写入驱动的基线默认值
///
/// Facade 在 open 流程中按此配置编程驱动，之后各参数仍可通过
/// Camera trait 的 setter 单独调整。
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// 默认曝光时间
    pub exposure: Duration,
    /// 默认输出像素格式
    pub output_format: ImageFormat,
    /// Worker 单次拉帧的阻塞超时
    pub fetch_timeout: Duration,
    /// 采集暂停时的空转轮询间隔
    pub idle_backoff: Duration,
    /// 初始触发模式
    pub trigger: TriggerConfig,
    /// 帧事件通道容量 (满时丢帧，不对 Worker 产生背压)
    pub frame_queue_depth: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraConfig {
    pub fn new() -> Self {
        Self {
            exposure: Duration::from_millis(10),
            output_format: ImageFormat::Mono8,
            fetch_timeout: Duration::from_millis(500),
            idle_backoff: Duration::from_millis(100),
            trigger: TriggerConfig::Software,
            frame_queue_depth: 4,
        }
    }

    /// 设置默认曝光
    pub fn exposure(mut self, exposure: Duration) -> Self {
        self.exposure = exposure;
        self
    }

    /// 设置默认输出格式
    pub fn output_format(mut self, format: ImageFormat) -> Self {
        self.output_format = format;
        self
    }

    /// 设置拉帧超时 (同时决定 close 的最坏等待时长)
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// 设置初始触发模式
    pub fn trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = trigger;
        self
    }

    /// 设置帧通道容量 (默认 4)
    pub fn frame_queue_depth(mut self, depth: usize) -> Self {
        self.frame_queue_depth = depth.max(1);
        self
    }
}
