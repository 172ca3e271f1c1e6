// 开启一些 Clippy 检查，保证代码质量
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// 模块定义
pub mod config;
pub mod error;
pub mod format;
pub mod image;
pub mod traits;

// 方便用户使用的 Prelude
pub mod prelude {
    pub use crate::config::CameraConfig;
    pub use crate::error::{AcquisitionFault, CameraError, Result};
    pub use crate::format::ImageFormat;
    pub use crate::image::ImageData;
    pub use crate::traits::{Camera, Capabilities, ParamRange, TriggerConfig, TriggerSelector};
}

// 重新导出依赖中的关键类型，避免用户版本冲突
pub use crossbeam_channel::Receiver;

// 版本与构建信息常量
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
