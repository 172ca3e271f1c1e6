use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Device not found: index {0}")]
    DeviceNotFound(u32),

    #[error("Camera already open")]
    AlreadyOpen,

    #[error("Camera is closed")]
    Closed,

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String, // e.g., "value 100000 above maximum 4096"
    },

    #[error("Driver error {code} during {context}")]
    Driver { code: i32, context: &'static str },

    #[error("Manual trigger requires software trigger mode")]
    TriggerModeMismatch,

    // 触发重配置半途失败后采集保持停止 (fail-safe)，调用方需要显式重新 setup
    #[error("Trigger reconfiguration failed, acquisition left stopped: {0}")]
    TriggerSetupFailed(Box<CameraError>),
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// 采集 Worker 的带外故障事件
///
/// 与帧事件分离：帧通道永远只承载图像数据，故障走独立通道，
/// 订阅者可以选择忽略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionFault {
    /// 驱动自发停止了采集 (例如硬件故障或内部重配置)，
    /// Worker 已转入空转状态等待重新 arm
    Stalled,
    /// 拉帧时遇到未分类的驱动错误码
    Driver { code: i32 },
}
