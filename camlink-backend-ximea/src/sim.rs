//! 仿真驱动：测试与离线开发用
//!
//! 实现 sdk 的能力接口，不碰任何真实硬件。拉帧结果可以用
//! `FetchScript` 预先编排，所有驱动调用按顺序记录在 call log
//! 中，供时序断言使用 (例如触发重配置的 stop -> program ->
//! start 顺序)。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::param_map as p;
use crate::sdk::{Driver, DriverHandle, FetchError, RawFrame, XiError};

/// 编排好的单次拉帧结果
#[derive(Debug, Clone)]
enum FetchOutcome {
    /// 一帧有效数据
    Frame { width: u32, height: u32, padding_x: u32 },
    /// 零长度载荷 ("还没有帧")
    Empty,
    /// 驱动超时
    Timeout,
    /// 驱动报告采集已停止
    Stopped,
    /// 其他驱动错误码
    Error(i32),
}

/// 拉帧脚本 Builder
///
/// 脚本耗尽后，后续拉帧一律返回超时 (模拟安静的总线)。
#[derive(Debug, Clone, Default)]
pub struct FetchScript {
    outcomes: Vec<FetchOutcome>,
}

impl FetchScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连续 n 帧有效数据
    pub fn frames(mut self, n: usize, width: u32, height: u32, padding_x: u32) -> Self {
        for _ in 0..n {
            self.outcomes.push(FetchOutcome::Frame {
                width,
                height,
                padding_x,
            });
        }
        self
    }

    /// 连续 n 次零长度载荷
    pub fn empty(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.outcomes.push(FetchOutcome::Empty);
        }
        self
    }

    /// 连续 n 次超时
    pub fn timeouts(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.outcomes.push(FetchOutcome::Timeout);
        }
        self
    }

    /// 一次 "acquisition stopped"
    pub fn stopped(mut self) -> Self {
        self.outcomes.push(FetchOutcome::Stopped);
        self
    }

    /// 一次未分类错误码
    pub fn error(mut self, code: i32) -> Self {
        self.outcomes.push(FetchOutcome::Error(code));
        self
    }
}

#[derive(Debug)]
struct SimState {
    script: VecDeque<FetchOutcome>,
    fetch_calls: u64,
    call_log: Vec<String>,
    int_params: HashMap<String, i32>,
    float_params: HashMap<String, f32>,
    int_ranges: HashMap<&'static str, (i32, i32)>,
    float_ranges: HashMap<&'static str, (f32, f32)>,
    acquiring: bool,
    open: bool,
}

impl SimState {
    fn new() -> Self {
        let mut int_params = HashMap::new();
        int_params.insert(p::WIDTH.to_owned(), 640);
        int_params.insert(p::HEIGHT.to_owned(), 480);
        int_params.insert(p::OFFSET_X.to_owned(), 0);
        int_params.insert(p::OFFSET_Y.to_owned(), 0);
        int_params.insert(p::EXPOSURE.to_owned(), 10_000);
        int_params.insert(p::IMAGE_DATA_FORMAT.to_owned(), 0);
        int_params.insert(p::TRG_SOURCE.to_owned(), p::XI_TRG_OFF);
        int_params.insert(p::TRG_SELECTOR.to_owned(), p::XI_TRG_SEL_FRAME_START);
        int_params.insert(p::GPI_SELECTOR.to_owned(), 1);
        int_params.insert(p::GPI_MODE.to_owned(), p::XI_GPI_OFF);
        int_params.insert(p::BUFFER_POLICY.to_owned(), p::XI_BP_SAFE);

        let mut float_params = HashMap::new();
        float_params.insert(p::GAIN.to_owned(), 0.0);

        let mut int_ranges = HashMap::new();
        int_ranges.insert(p::WIDTH, (16, 1280));
        int_ranges.insert(p::HEIGHT, (16, 960));
        int_ranges.insert(p::OFFSET_X, (0, 1264));
        int_ranges.insert(p::OFFSET_Y, (0, 944));
        int_ranges.insert(p::EXPOSURE, (28, 1_000_000));
        int_ranges.insert(p::GPI_SELECTOR, (1, 4));

        let mut float_ranges = HashMap::new();
        float_ranges.insert(p::GAIN, (0.0, 24.0));

        Self {
            script: VecDeque::new(),
            fetch_calls: 0,
            call_log: Vec::new(),
            int_params,
            float_params,
            int_ranges,
            float_ranges,
            acquiring: false,
            open: false,
        }
    }

    /// 解析 "param:min" / "param:max" 形式的范围查询
    fn range_query(&self, param: &str) -> Option<i32> {
        let (base, info) = param.rsplit_once(':')?;
        let (min, max) = self.int_ranges.get(base).copied()?;
        match info {
            "min" => Some(min),
            "max" => Some(max),
            _ => None,
        }
    }
}

/// 仿真驱动入口
#[derive(Debug, Clone)]
pub struct SimDriver {
    states: Vec<Arc<Mutex<SimState>>>,
}

impl SimDriver {
    /// 挂 n 台虚拟相机
    pub fn with_devices(n: u32) -> Self {
        Self {
            states: (0..n).map(|_| Arc::new(Mutex::new(SimState::new()))).collect(),
        }
    }

    fn state(&self, index: u32) -> Option<&Arc<Mutex<SimState>>> {
        self.states.get(index as usize)
    }

    fn lock0(&self) -> MutexGuard<'_, SimState> {
        self.states
            .first()
            .expect("SimDriver was built with zero devices")
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// 给 0 号设备编排拉帧脚本 (替换未消费的旧脚本)
    pub fn script_fetches(&self, script: FetchScript) {
        let mut s = self.lock0();
        s.script = script.outcomes.into();
    }

    /// 0 号设备累计收到的拉帧调用数
    pub fn fetch_calls(&self) -> u64 {
        self.lock0().fetch_calls
    }

    /// 0 号设备的调用记录快照
    pub fn call_log(&self) -> Vec<String> {
        self.lock0().call_log.clone()
    }

    /// 清空调用记录 (便于只断言感兴趣的时序片段)
    pub fn clear_log(&self) {
        self.lock0().call_log.clear();
    }
}

impl Driver for SimDriver {
    fn device_count(&self) -> Result<u32, XiError> {
        Ok(self.states.len() as u32)
    }

    fn device_info(&self, index: u32, field: &str) -> Result<String, XiError> {
        if self.state(index).is_none() {
            return Err(XiError(XiError::INVALID_ARG));
        }
        use crate::param_map::info;
        Ok(match field {
            info::SERIAL => format!("SIM{:05}", index),
            info::MODEL => "SimCam".to_owned(),
            info::INSTANCE_PATH => format!("/sim/inst/{}", index),
            info::LOCATION_PATH => format!("usb:1.{}", index),
            info::DEVICE_TYPE => "USB3".to_owned(),
            info::USER_ID => format!("cam{}", index),
            _ => return Err(XiError(XiError::UNKNOWN_PARAM)),
        })
    }

    fn open(&self, index: u32) -> Result<Box<dyn DriverHandle>, XiError> {
        let state = self
            .state(index)
            .ok_or(XiError(XiError::INVALID_ARG))?
            .clone();
        {
            let mut s = state.lock().unwrap_or_else(|e| e.into_inner());
            if s.open {
                // 句柄独占，重复打开是调用方 bug
                return Err(XiError(XiError::INVALID_ARG));
            }
            s.open = true;
            s.call_log.push("open".to_owned());
        }
        Ok(Box::new(SimHandle { state }))
    }
}

/// 仿真设备句柄
#[derive(Debug)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DriverHandle for SimHandle {
    fn get_int(&mut self, param: &str) -> Result<i32, XiError> {
        let s = self.lock();
        if let Some(v) = s.range_query(param) {
            return Ok(v);
        }
        s.int_params
            .get(param)
            .copied()
            .ok_or(XiError(XiError::UNKNOWN_PARAM))
    }

    fn set_int(&mut self, param: &str, value: i32) -> Result<(), XiError> {
        let mut s = self.lock();
        if let Some((min, max)) = s.int_ranges.get(param).copied() {
            if value < min || value > max {
                return Err(XiError(XiError::WRONG_PARAM_VALUE));
            }
        }
        s.int_params.insert(param.to_owned(), value);
        s.call_log.push(format!("set_int:{}={}", param, value));
        Ok(())
    }

    fn get_float(&mut self, param: &str) -> Result<f32, XiError> {
        self.lock()
            .float_params
            .get(param)
            .copied()
            .ok_or(XiError(XiError::UNKNOWN_PARAM))
    }

    fn set_float(&mut self, param: &str, value: f32) -> Result<(), XiError> {
        let mut s = self.lock();
        if let Some((min, max)) = s.float_ranges.get(param).copied() {
            if value < min || value > max {
                return Err(XiError(XiError::WRONG_PARAM_VALUE));
            }
        }
        s.float_params.insert(param.to_owned(), value);
        s.call_log.push(format!("set_float:{}={}", param, value));
        Ok(())
    }

    fn start_acquisition(&mut self) -> Result<(), XiError> {
        let mut s = self.lock();
        s.acquiring = true;
        s.call_log.push("start_acquisition".to_owned());
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<(), XiError> {
        let mut s = self.lock();
        s.acquiring = false;
        s.call_log.push("stop_acquisition".to_owned());
        Ok(())
    }

    fn fetch_frame(&mut self, timeout: Duration) -> Result<RawFrame, FetchError> {
        let outcome = {
            let mut s = self.lock();
            s.fetch_calls += 1;
            s.call_log.push("fetch".to_owned());
            if !s.acquiring {
                return Err(FetchError::AcquisitionStopped);
            }
            s.script.pop_front()
        };

        match outcome {
            Some(FetchOutcome::Frame {
                width,
                height,
                padding_x,
            }) => {
                let bpp = {
                    let s = self.lock();
                    let code = s.int_params.get(p::IMAGE_DATA_FORMAT).copied().unwrap_or(0);
                    p::format_from_code(code)
                        .map(|f| f.bytes_per_pixel())
                        .unwrap_or(1)
                };
                let stride = width as usize * bpp + padding_x as usize;
                Ok(RawFrame {
                    data: vec![0x55; stride * height as usize],
                    width,
                    height,
                    padding_x,
                })
            }
            Some(FetchOutcome::Empty) => Ok(RawFrame::default()),
            Some(FetchOutcome::Stopped) => Err(FetchError::AcquisitionStopped),
            Some(FetchOutcome::Error(code)) => Err(FetchError::Other(code)),
            // 脚本耗尽或显式超时：按真实驱动语义阻塞满超时窗口
            Some(FetchOutcome::Timeout) | None => {
                thread::sleep(timeout);
                Err(FetchError::Timeout)
            }
        }
    }

    fn close(&mut self) -> Result<(), XiError> {
        let mut s = self.lock();
        s.acquiring = false;
        s.open = false;
        s.call_log.push("close".to_owned());
        Ok(())
    }
}
