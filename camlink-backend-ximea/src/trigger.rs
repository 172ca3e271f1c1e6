//! 触发策略：把 TriggerConfig 的每个变体编程到驱动
//!
//! 穷举匹配封闭的 Tagged Union，避免开放式的类型检查链。
//! 注意：调用方 (Facade) 必须保证编程期间采集处于停止状态，
//! 运行中重编程触发参数在硬件上是未定义行为。

use camlink_core::traits::{TriggerConfig, TriggerSelector};

use crate::param_map as p;
use crate::sdk::{DriverHandle, XiError};

fn selector_code(selector: TriggerSelector) -> i32 {
    match selector {
        TriggerSelector::FrameStart => p::XI_TRG_SEL_FRAME_START,
        TriggerSelector::ExposureActive => p::XI_TRG_SEL_EXPOSURE_ACTIVE,
        TriggerSelector::FrameBurstStart => p::XI_TRG_SEL_FRAME_BURST_START,
    }
}

/// 写入某个触发配置对应的全部驱动参数
pub fn program(config: &TriggerConfig, handle: &mut dyn DriverHandle) -> Result<(), XiError> {
    match *config {
        TriggerConfig::Off => {
            // 关触发，回到 Free Run；顺带关掉 GPI 复用
            handle.set_int(p::TRG_SOURCE, p::XI_TRG_OFF)?;
            handle.set_int(p::GPI_MODE, p::XI_GPI_OFF)?;
        }
        TriggerConfig::Software => {
            handle.set_int(p::TRG_SOURCE, p::XI_TRG_SOFTWARE)?;
            handle.set_int(p::TRG_SELECTOR, p::XI_TRG_SEL_FRAME_START)?;
        }
        TriggerConfig::Hardware {
            input_channel,
            rising_edge,
            selector,
        } => {
            // 先选输入脚，再把它复用成触发输入，最后选边沿
            handle.set_int(p::GPI_SELECTOR, input_channel as i32)?;
            handle.set_int(p::GPI_MODE, p::XI_GPI_TRIGGER)?;
            let edge = if rising_edge {
                p::XI_TRG_EDGE_RISING
            } else {
                p::XI_TRG_EDGE_FALLING
            };
            handle.set_int(p::TRG_SOURCE, edge)?;
            handle.set_int(p::TRG_SELECTOR, selector_code(selector))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDriver;
    use crate::sdk::Driver;

    #[test]
    fn off_disables_source_and_gpi() {
        let driver = SimDriver::with_devices(1);
        let mut handle = driver.open(0).unwrap();
        program(&TriggerConfig::Off, handle.as_mut()).unwrap();

        assert_eq!(handle.get_int(p::TRG_SOURCE).unwrap(), p::XI_TRG_OFF);
        assert_eq!(handle.get_int(p::GPI_MODE).unwrap(), p::XI_GPI_OFF);
    }

    #[test]
    fn software_arms_software_source() {
        let driver = SimDriver::with_devices(1);
        let mut handle = driver.open(0).unwrap();
        program(&TriggerConfig::Software, handle.as_mut()).unwrap();

        assert_eq!(handle.get_int(p::TRG_SOURCE).unwrap(), p::XI_TRG_SOFTWARE);
        assert_eq!(
            handle.get_int(p::TRG_SELECTOR).unwrap(),
            p::XI_TRG_SEL_FRAME_START
        );
    }

    #[test]
    fn hardware_programs_channel_edge_selector() {
        let driver = SimDriver::with_devices(1);
        let mut handle = driver.open(0).unwrap();
        let config = TriggerConfig::Hardware {
            input_channel: 2,
            rising_edge: false,
            selector: TriggerSelector::ExposureActive,
        };
        program(&config, handle.as_mut()).unwrap();

        assert_eq!(handle.get_int(p::GPI_SELECTOR).unwrap(), 2);
        assert_eq!(handle.get_int(p::GPI_MODE).unwrap(), p::XI_GPI_TRIGGER);
        assert_eq!(
            handle.get_int(p::TRG_SOURCE).unwrap(),
            p::XI_TRG_EDGE_FALLING
        );
        assert_eq!(
            handle.get_int(p::TRG_SELECTOR).unwrap(),
            p::XI_TRG_SEL_EXPOSURE_ACTIVE
        );
    }
}
