// XIMEA xiAPI Backend
//
// 通过窄化的能力接口 (sdk::Driver / sdk::DriverHandle) 访问厂商
// 驱动，本 crate 只负责把它包装成 camlink-core 的 Camera 语义：
// 设备枚举、触发策略、采集 Worker、Facade 聚合。

#![warn(rust_2018_idioms)]

pub mod acquisition;
pub mod camera;
pub mod device;
pub mod param_map;
pub mod sdk;
pub mod sim;
pub mod trigger;

#[cfg(feature = "xiapi")]
pub mod ffi;

pub use acquisition::{AcqStats, FaultPolicy, StallPolicy};
pub use camera::XiCamera;
pub use device::{list_cameras, DeviceDescriptor};
pub use sdk::{Driver, DriverHandle, FetchError, RawFrame, XiError};
