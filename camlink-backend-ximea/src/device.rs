//! 设备枚举
//!
//! 一次性查询，不缓存：每次调用都重新向驱动询问设备数量，
//! 再逐索引取静态信息字段。

use camlink_core::error::Result;

use crate::param_map::info;
use crate::sdk::Driver;

/// 枚举期产出的不可变设备描述记录
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDescriptor {
    /// 设备索引，用于 open
    pub index: u32,
    /// 硬件序列号
    pub serial_number: String,
    /// 型号名 (e.g. "MQ013MG-E2")
    pub model_name: String,
    /// 系统实例路径
    pub instance_path: String,
    /// 硬件拓扑路径 (USB 端口链)
    pub location_path: String,
    /// 接口类型 (USB3 / PCIe / GigE)
    pub device_type: String,
    /// 用户自定义 ID (可在相机内持久化)
    pub user_id: String,
}

/// 枚举当前连接的相机
///
/// 没有设备时返回空列表 (不是错误)；仅当驱动的枚举调用本身
/// 失败才报错，合法索引下的逐字段查询假定成功。
pub fn list_cameras(driver: &dyn Driver) -> Result<Vec<DeviceDescriptor>> {
    let count = driver
        .device_count()
        .map_err(|e| e.into_camera("device enumeration"))?;

    let mut devices = Vec::with_capacity(count as usize);
    for index in 0..count {
        let field = |name: &str| -> Result<String> {
            driver
                .device_info(index, name)
                .map_err(|e| e.into_camera("device info query"))
        };

        devices.push(DeviceDescriptor {
            index,
            serial_number: field(info::SERIAL)?,
            model_name: field(info::MODEL)?,
            instance_path: field(info::INSTANCE_PATH)?,
            location_path: field(info::LOCATION_PATH)?,
            device_type: field(info::DEVICE_TYPE)?,
            user_id: field(info::USER_ID)?,
        });
    }

    tracing::debug!("Enumerated {} camera(s)", devices.len());
    Ok(devices)
}

/// 按序列号查找设备的便捷函数
///
/// 序列号不在线不是错误，返回 None；Err 只来自枚举本身失败。
pub fn find_by_serial(driver: &dyn Driver, serial: &str) -> Result<Option<DeviceDescriptor>> {
    Ok(list_cameras(driver)?
        .into_iter()
        .find(|d| d.serial_number == serial))
}
