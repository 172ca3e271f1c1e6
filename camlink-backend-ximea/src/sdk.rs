//! 厂商 SDK 的窄化能力接口
//!
//! 这是本 crate 与 xiAPI 之间唯一的边界：Facade / Worker 只通过
//! `Driver` 和 `DriverHandle` 两个 Trait 访问驱动，真实 FFI 实现
//! (feature = "xiapi") 与测试用的 Sim 实现都挂在这个边界后面。

use std::time::Duration;

use camlink_core::error::CameraError;
use thiserror::Error;

/// xiAPI 返回码包装
///
/// 只列出本层需要分类处理的码值，其余原样透传。
/// 来源: xiApi.h (XI_RET)，注意 ACQUISITION_STOPED 是厂商头文件
/// 原有的拼写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("xiAPI error code {0}")]
pub struct XiError(pub i32);

impl XiError {
    pub const TIMEOUT: i32 = 10;
    pub const INVALID_ARG: i32 = 11;
    pub const NOT_SUPPORTED: i32 = 12;
    pub const ACQUISITION_STOPED: i32 = 45;
    pub const UNKNOWN_PARAM: i32 = 100;
    pub const WRONG_PARAM_VALUE: i32 = 107;

    /// 升级为面向调用方的 CameraError，附带发生场景
    pub fn into_camera(self, context: &'static str) -> CameraError {
        CameraError::Driver {
            code: self.0,
            context,
        }
    }
}

/// 拉帧错误的三分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 超时 - 正常空闲状态，Worker 静默吸收
    #[error("frame fetch timed out")]
    Timeout,
    /// 驱动自发停止采集 - Worker 转入空转
    #[error("driver reports acquisition stopped")]
    AcquisitionStopped,
    /// 其余驱动错误码 - 交给 FaultPolicy 分类
    #[error("driver error code {0} during fetch")]
    Other(i32),
}

impl From<XiError> for FetchError {
    fn from(e: XiError) -> Self {
        match e.0 {
            XiError::TIMEOUT => Self::Timeout,
            XiError::ACQUISITION_STOPED => Self::AcquisitionStopped,
            code => Self::Other(code),
        }
    }
}

/// 驱动返回的一帧原始数据
///
/// `data` 为空表示"本次没有新帧" (非错误，Worker 静默跳过)。
/// `padding_x` 是驱动上报的行尾补齐字节数。
#[derive(Debug, Clone, Default)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub padding_x: u32,
}

/// 驱动入口：枚举与打开
pub trait Driver: Send + Sync {
    /// 当前连接的设备数量
    fn device_count(&self) -> Result<u32, XiError>;

    /// 按索引查询设备信息字段 (param_map::info 中的字段名)
    fn device_info(&self, index: u32, field: &str) -> Result<String, XiError>;

    /// 按索引打开设备，句柄独占
    fn open(&self, index: u32) -> Result<Box<dyn DriverHandle>, XiError>;
}

/// 已打开设备的句柄
///
/// 不要求 Sync：句柄始终被包在 `Mutex` 里，控制线程的参数操作
/// 与 Worker 的拉帧天然互斥，两个线程不会对同一句柄并发发起
/// 冲突的驱动调用。
pub trait DriverHandle: Send {
    fn get_int(&mut self, param: &str) -> Result<i32, XiError>;
    fn set_int(&mut self, param: &str, value: i32) -> Result<(), XiError>;
    fn get_float(&mut self, param: &str) -> Result<f32, XiError>;
    fn set_float(&mut self, param: &str, value: f32) -> Result<(), XiError>;

    fn start_acquisition(&mut self) -> Result<(), XiError>;
    fn stop_acquisition(&mut self) -> Result<(), XiError>;

    /// 阻塞拉帧，最多等待 `timeout`
    fn fetch_frame(&mut self, timeout: Duration) -> Result<RawFrame, FetchError>;

    /// 释放驱动句柄；之后任何调用都是未定义的，Facade 用
    /// closed 标志挡在前面
    fn close(&mut self) -> Result<(), XiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_classification() {
        assert_eq!(FetchError::from(XiError(XiError::TIMEOUT)), FetchError::Timeout);
        assert_eq!(
            FetchError::from(XiError(XiError::ACQUISITION_STOPED)),
            FetchError::AcquisitionStopped
        );
        assert_eq!(FetchError::from(XiError(9)), FetchError::Other(9));
    }
}
