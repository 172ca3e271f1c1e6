//! xiAPI (m3api) 的 FFI 声明与真实驱动实现
//!
//! 仅在 feature = "xiapi" 下编译，需要本机安装 XIMEA SDK。
//! 只声明本层用到的函数；XI_IMG 按 xiAPI 的版本协议只声明
//! 前缀字段，size 字段告知驱动实际结构长度，驱动不会越界写。

use std::ffi::{CStr, CString};
use std::time::Duration;

use libc::{c_char, c_float, c_int, c_void};

use crate::sdk::{Driver, DriverHandle, FetchError, RawFrame, XiError};

const XI_OK: c_int = 0;

/// XI_IMG 前缀 (xiApi.h)，字段顺序与对齐必须与头文件一致
#[repr(C)]
struct XiImg {
    size: u32,
    bp: *mut c_void,
    bp_size: u32,
    frm: c_int,
    width: u32,
    height: u32,
    nframe: u32,
    tsec: u32,
    tusec: u32,
    gpi_level: u32,
    black_level: u32,
    padding_x: u32,
}

#[link(name = "m3api")]
extern "C" {
    fn xiGetNumberDevices(count: *mut u32) -> c_int;
    fn xiGetDeviceInfoString(
        dev_id: u32,
        prm: *const c_char,
        value: *mut c_char,
        value_size: u32,
    ) -> c_int;
    fn xiOpenDevice(dev_id: u32, handle: *mut *mut c_void) -> c_int;
    fn xiCloseDevice(handle: *mut c_void) -> c_int;

    fn xiGetParamInt(handle: *mut c_void, prm: *const c_char, value: *mut c_int) -> c_int;
    fn xiSetParamInt(handle: *mut c_void, prm: *const c_char, value: c_int) -> c_int;
    fn xiGetParamFloat(handle: *mut c_void, prm: *const c_char, value: *mut c_float) -> c_int;
    fn xiSetParamFloat(handle: *mut c_void, prm: *const c_char, value: c_float) -> c_int;

    fn xiStartAcquisition(handle: *mut c_void) -> c_int;
    fn xiStopAcquisition(handle: *mut c_void) -> c_int;
    fn xiGetImage(handle: *mut c_void, timeout_ms: u32, img: *mut XiImg) -> c_int;
}

fn check(ret: c_int) -> Result<(), XiError> {
    if ret == XI_OK {
        Ok(())
    } else {
        Err(XiError(ret))
    }
}

fn c_param(param: &str) -> Result<CString, XiError> {
    // 参数名都是本 crate 内的常量，含内嵌 NUL 属于编程错误
    CString::new(param).map_err(|_| XiError(XiError::INVALID_ARG))
}

/// 真实 xiAPI 驱动入口
#[derive(Debug, Default, Clone, Copy)]
pub struct XiApiDriver;

impl Driver for XiApiDriver {
    fn device_count(&self) -> Result<u32, XiError> {
        let mut count = 0u32;
        check(unsafe { xiGetNumberDevices(&mut count) })?;
        Ok(count)
    }

    fn device_info(&self, index: u32, field: &str) -> Result<String, XiError> {
        let prm = c_param(field)?;
        let mut buf = [0 as c_char; 256];
        check(unsafe {
            xiGetDeviceInfoString(index, prm.as_ptr(), buf.as_mut_ptr(), buf.len() as u32)
        })?;
        // 驱动保证 NUL 结尾；非 UTF-8 字节按替换字符处理
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(value.to_string_lossy().into_owned())
    }

    fn open(&self, index: u32) -> Result<Box<dyn DriverHandle>, XiError> {
        let mut handle: *mut c_void = std::ptr::null_mut();
        check(unsafe { xiOpenDevice(index, &mut handle) })?;
        Ok(Box::new(XiApiHandle { handle }))
    }
}

/// 已打开设备的原生句柄包装
pub struct XiApiHandle {
    handle: *mut c_void,
}

// 句柄只在 Mutex 保护下跨线程移动，xiAPI 句柄本身无线程亲和性
unsafe impl Send for XiApiHandle {}

impl std::fmt::Debug for XiApiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XiApiHandle").finish_non_exhaustive()
    }
}

impl DriverHandle for XiApiHandle {
    fn get_int(&mut self, param: &str) -> Result<i32, XiError> {
        let prm = c_param(param)?;
        let mut value: c_int = 0;
        check(unsafe { xiGetParamInt(self.handle, prm.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn set_int(&mut self, param: &str, value: i32) -> Result<(), XiError> {
        let prm = c_param(param)?;
        check(unsafe { xiSetParamInt(self.handle, prm.as_ptr(), value) })
    }

    fn get_float(&mut self, param: &str) -> Result<f32, XiError> {
        let prm = c_param(param)?;
        let mut value: c_float = 0.0;
        check(unsafe { xiGetParamFloat(self.handle, prm.as_ptr(), &mut value) })?;
        Ok(value)
    }

    fn set_float(&mut self, param: &str, value: f32) -> Result<(), XiError> {
        let prm = c_param(param)?;
        check(unsafe { xiSetParamFloat(self.handle, prm.as_ptr(), value) })
    }

    fn start_acquisition(&mut self) -> Result<(), XiError> {
        check(unsafe { xiStartAcquisition(self.handle) })
    }

    fn stop_acquisition(&mut self) -> Result<(), XiError> {
        check(unsafe { xiStopAcquisition(self.handle) })
    }

    fn fetch_frame(&mut self, timeout: Duration) -> Result<RawFrame, FetchError> {
        let mut img = XiImg {
            size: std::mem::size_of::<XiImg>() as u32,
            bp: std::ptr::null_mut(),
            bp_size: 0,
            frm: 0,
            width: 0,
            height: 0,
            nframe: 0,
            tsec: 0,
            tusec: 0,
            gpi_level: 0,
            black_level: 0,
            padding_x: 0,
        };

        let ret = unsafe { xiGetImage(self.handle, timeout.as_millis() as u32, &mut img) };
        if ret != XI_OK {
            return Err(FetchError::from(XiError(ret)));
        }

        // unsafe 缓冲策略下 bp 只到下一次驱动调用前有效，
        // 立即拷贝为 Owned 数据
        if img.bp.is_null() || img.bp_size == 0 {
            return Ok(RawFrame::default());
        }
        let data =
            unsafe { std::slice::from_raw_parts(img.bp as *const u8, img.bp_size as usize) }
                .to_vec();

        Ok(RawFrame {
            data,
            width: img.width,
            height: img.height,
            padding_x: img.padding_x,
        })
    }

    fn close(&mut self) -> Result<(), XiError> {
        if self.handle.is_null() {
            return Ok(());
        }
        let ret = check(unsafe { xiCloseDevice(self.handle) });
        self.handle = std::ptr::null_mut();
        ret
    }
}

impl Drop for XiApiHandle {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let _ = unsafe { xiCloseDevice(self.handle) };
        }
    }
}
