use std::time::Duration;

use bitflags::bitflags;
use crossbeam_channel::Receiver;

use crate::error::{AcquisitionFault, Result};
use crate::format::ImageFormat;
use crate::image::ImageData;

/// 参数的可查询取值范围 (随查随取，不缓存)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> ParamRange<T> {
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// 触发配置 - 封闭的 Tagged Union
///
/// 每个变体对应一套驱动触发参数的编程方式，由 Backend 穷举匹配，
/// 构造后不可变，恰好消费一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerConfig {
    /// 关闭触发，连续采集模式 (Free Run)
    Off,
    /// 软件触发 (配合 fire_manual_trigger 单次出图)
    Software,
    /// 外部硬件边沿触发
    Hardware {
        /// 输入通道 (GPI 编号)
        input_channel: u32,
        /// true = 上升沿，false = 下降沿
        rising_edge: bool,
        /// 触发作用对象
        selector: TriggerSelector,
    },
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::Off
    }
}

/// 触发作用对象枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerSelector {
    /// 每个触发启动一帧采集
    FrameStart,
    /// 每个触发启动一组 Burst
    FrameBurstStart,
    /// 触发信号宽度决定曝光时长
    ExposureActive,
}

bitflags! {
    /// 后端能力位掩码
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const SOFTWARE_TRIGGER = 1 << 0;
        const HARDWARE_TRIGGER = 1 << 1;
        const MONO16           = 1 << 2;
        const COLOR            = 1 << 3;
        const ROI_OFFSET       = 1 << 4;
    }
}

/// 核心 Trait：后端中立的相机能力接口
///
/// 调用方只依赖这个 Trait，后端 (本仓库的 XiCamera，或其他厂商
/// 的实现) 可以互相替换。所有配置操作在控制线程同步执行并同步
/// 报错；帧数据通过 `frames()` 通道异步送达。
pub trait Camera: Send {
    // --- 几何参数 (随查随取 min/max) ---
    fn width(&self) -> Result<u32>;
    fn set_width(&mut self, value: u32) -> Result<()>;
    fn width_range(&self) -> Result<ParamRange<u32>>;

    fn height(&self) -> Result<u32>;
    fn set_height(&mut self, value: u32) -> Result<()>;
    fn height_range(&self) -> Result<ParamRange<u32>>;

    fn offset_x(&self) -> Result<u32>;
    fn set_offset_x(&mut self, value: u32) -> Result<()>;
    fn offset_x_range(&self) -> Result<ParamRange<u32>>;

    fn offset_y(&self) -> Result<u32>;
    fn set_offset_y(&mut self, value: u32) -> Result<()>;
    fn offset_y_range(&self) -> Result<ParamRange<u32>>;

    // --- 物理量参数 ---
    /// 曝光时间 (驱动侧为微秒整数)
    fn exposure(&self) -> Result<Duration>;
    fn set_exposure(&mut self, exposure: Duration) -> Result<()>;

    /// 增益 (dB)
    fn gain_db(&self) -> Result<f32>;
    fn set_gain_db(&mut self, gain: f32) -> Result<()>;

    // --- 输出格式与超时 ---
    /// 当前输出像素格式
    fn output_format(&self) -> ImageFormat;
    /// 设置输出格式：立即重编程驱动的 image-format 参数，
    /// 后续发布的帧按新格式计算 Stride
    fn set_output_format(&mut self, format: ImageFormat) -> Result<()>;

    /// 拉帧超时 (纯本地状态，Worker 每次迭代读取)
    fn fetch_timeout(&self) -> Duration;
    fn set_fetch_timeout(&mut self, timeout: Duration);

    // --- 事件通道 ---
    /// 帧事件接收端。事件携带帧所有权，每帧只投递一次。
    fn frames(&self) -> Receiver<ImageData>;
    /// 故障事件接收端 (与帧通道分离)
    fn faults(&self) -> Receiver<AcquisitionFault>;

    // --- 触发 ---
    /// 发出一次软件触发脉冲；仅软件触发模式下合法
    fn fire_manual_trigger(&mut self) -> Result<()>;
    /// 触发重配置：stop -> program -> start 协议
    fn setup_trigger(&mut self, config: TriggerConfig) -> Result<()>;

    // --- 生命周期 ---
    /// 关闭相机并回收 Worker；幂等，重复调用为 no-op
    fn close(&mut self) -> Result<()>;

    fn capabilities(&self) -> Capabilities;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_range_contains() {
        let range = ParamRange { min: 16u32, max: 4096 };
        assert!(range.contains(16));
        assert!(range.contains(4096));
        assert!(!range.contains(8));
        assert!(!range.contains(5000));
    }

    #[test]
    fn trigger_default_is_off() {
        assert_eq!(TriggerConfig::default(), TriggerConfig::Off);
    }
}
