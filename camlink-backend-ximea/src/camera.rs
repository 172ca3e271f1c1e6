//! XiCamera Facade：生命周期、参数访问与触发重配置
//!
//! 控制线程侧的唯一入口。open 负责把驱动句柄、共享状态、事件
//! 通道和 Worker 线程装配到一起；之后所有参数操作同步执行、
//! 同步报错，帧数据从 `frames()` 通道异步送达。
//!
//! 并发边界：驱动句柄包在 `Mutex` 里。Worker 只在一次有界拉帧
//! 期间持锁，所以这里的 stop -> program -> start 序列拿到锁后
//! 不会与任何拉帧调用交错。

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use camlink_core::config::CameraConfig;
use camlink_core::error::{AcquisitionFault, CameraError, Result};
use camlink_core::format::ImageFormat;
use camlink_core::image::ImageData;
use camlink_core::traits::{Camera, Capabilities, ParamRange, TriggerConfig};
use crossbeam_channel::{bounded, Receiver};

use crate::acquisition::{AcqShared, AcqStats, AcquisitionWorker, FaultPolicy, StallPolicy};
use crate::param_map as p;
use crate::sdk::{Driver, DriverHandle, XiError};
use crate::trigger;

/// 故障通道容量；故障事件低频，满了说明订阅者早已不看
const FAULT_QUEUE_DEPTH: usize = 16;

/// xiAPI 相机实例
///
/// 一个实例独占一个驱动句柄和一条 Worker 线程。Drop 时自动
/// 走 close 流程，不会泄漏线程或句柄。
pub struct XiCamera {
    handle: Arc<Mutex<Box<dyn DriverHandle>>>,
    shared: Arc<AcqShared>,
    worker: Option<JoinHandle<()>>,
    frames: Receiver<ImageData>,
    faults: Receiver<AcquisitionFault>,
    trigger: TriggerConfig,
    closed: bool,
}

impl std::fmt::Debug for XiCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XiCamera")
            .field("closed", &self.closed)
            .field("trigger", &self.trigger)
            .finish()
    }
}

impl XiCamera {
    /// 按索引打开相机并启动采集 (Worker 故障策略取默认值)
    ///
    /// 流程：open 句柄 -> 编程基线参数 (缓冲策略 / 曝光 / 格式 /
    /// 触发) -> start -> 装配通道 -> 拉起 Worker。任何一步失败
    /// 都会关闭句柄再返回错误，不留半开状态。
    pub fn open(driver: &dyn Driver, index: u32, config: CameraConfig) -> Result<Self> {
        Self::open_with_policies(
            driver,
            index,
            config,
            StallPolicy::default(),
            FaultPolicy::default(),
        )
    }

    /// open 变体：显式指定 Worker 的停止上报与未分类错误策略
    pub fn open_with_policies(
        driver: &dyn Driver,
        index: u32,
        config: CameraConfig,
        stall_policy: StallPolicy,
        fault_policy: FaultPolicy,
    ) -> Result<Self> {
        let count = driver
            .device_count()
            .map_err(|e| e.into_camera("device enumeration"))?;
        if index >= count {
            return Err(CameraError::DeviceNotFound(index));
        }

        // 索引已校验，此时 open 被拒基本只有一种原因：句柄被
        // 别的实例占着
        let mut handle = driver.open(index).map_err(|e| match e.0 {
            XiError::INVALID_ARG => CameraError::AlreadyOpen,
            _ => e.into_camera("device open"),
        })?;

        if let Err(e) = Self::program_baseline(handle.as_mut(), &config) {
            // 半开状态不可交付，句柄原路关掉
            let _ = handle.close();
            return Err(e);
        }

        let shared = Arc::new(AcqShared::new(
            config.output_format,
            config.fetch_timeout,
            config.idle_backoff,
            stall_policy,
            fault_policy,
        ));
        let handle: Arc<Mutex<Box<dyn DriverHandle>>> = Arc::new(Mutex::new(handle));

        let (frame_tx, frames) = bounded(config.frame_queue_depth);
        let (fault_tx, faults) = bounded(FAULT_QUEUE_DEPTH);

        shared.arm();
        let worker = AcquisitionWorker::spawn(shared.clone(), handle.clone(), frame_tx, fault_tx);

        tracing::info!(index, "Camera opened, acquisition running");
        Ok(Self {
            handle,
            shared,
            worker: Some(worker),
            frames,
            faults,
            trigger: config.trigger,
            closed: false,
        })
    }

    /// open 期的驱动基线编程
    fn program_baseline(handle: &mut dyn DriverHandle, config: &CameraConfig) -> Result<()> {
        // unsafe 缓冲策略：驱动零拷贝直出，FFI 层取帧后立即
        // 拷贝为 Owned 数据再返回
        handle
            .set_int(p::BUFFER_POLICY, p::XI_BP_UNSAFE)
            .map_err(|e| e.into_camera("buffer policy setup"))?;

        let exposure_us = i32::try_from(config.exposure.as_micros()).map_err(|_| {
            CameraError::InvalidParameter {
                name: p::EXPOSURE,
                reason: format!("exposure {:?} out of driver range", config.exposure),
            }
        })?;
        handle
            .set_int(p::EXPOSURE, exposure_us)
            .map_err(|e| e.into_camera("exposure setup"))?;

        handle
            .set_int(p::IMAGE_DATA_FORMAT, p::format_code(config.output_format))
            .map_err(|e| e.into_camera("image format setup"))?;

        trigger::program(&config.trigger, handle)
            .map_err(|e| e.into_camera("trigger programming"))?;

        handle
            .start_acquisition()
            .map_err(|e| e.into_camera("acquisition start"))?;
        Ok(())
    }

    /// 发布/丢帧计数快照
    pub fn stats(&self) -> AcqStats {
        self.shared.stats()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CameraError::Closed);
        }
        Ok(())
    }

    fn lock_handle(&self) -> MutexGuard<'_, Box<dyn DriverHandle>> {
        // Worker 内不会带锁 panic，毒化锁直接接管
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- 参数访问助手 ---

    fn get_u32(&self, param: &'static str, context: &'static str) -> Result<u32> {
        self.ensure_open()?;
        let v = self
            .lock_handle()
            .get_int(param)
            .map_err(|e| e.into_camera(context))?;
        Ok(v.max(0) as u32)
    }

    fn set_u32(&mut self, param: &'static str, value: u32, context: &'static str) -> Result<()> {
        self.ensure_open()?;
        let v = i32::try_from(value).map_err(|_| CameraError::InvalidParameter {
            name: param,
            reason: format!("value {} exceeds driver integer range", value),
        })?;
        self.lock_handle()
            .set_int(param, v)
            .map_err(|e| e.into_camera(context))
    }

    /// 随查随取的范围查询：ROI 参数的 min/max 互相联动，
    /// 缓存会失效，每次都问驱动
    fn range_u32(&self, param: &'static str, context: &'static str) -> Result<ParamRange<u32>> {
        self.ensure_open()?;
        let mut handle = self.lock_handle();
        let min = handle
            .get_int(&p::with_info(param, p::INFO_MIN))
            .map_err(|e| e.into_camera(context))?;
        let max = handle
            .get_int(&p::with_info(param, p::INFO_MAX))
            .map_err(|e| e.into_camera(context))?;
        Ok(ParamRange {
            min: min.max(0) as u32,
            max: max.max(0) as u32,
        })
    }

    /// 关闭流程本体；trait 的 close 与 Drop 共用
    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // 先停 Worker 再碰驱动：cancel 后 Worker 最多再做一次
        // 有界拉帧就会退出，join 的等待上界 = 一次拉帧超时
        self.shared.disarm();
        self.shared.request_cancel();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Acquisition worker panicked during shutdown");
            }
        }

        let mut handle = self.lock_handle();
        if let Err(e) = handle.stop_acquisition() {
            tracing::warn!(code = e.0, "Stop acquisition failed during close");
        }
        handle
            .close()
            .map_err(|e| e.into_camera("device close"))?;

        tracing::info!("Camera closed");
        Ok(())
    }
}

impl Camera for XiCamera {
    // --- 1. 几何参数 (Sensor / ROI) ---

    fn width(&self) -> Result<u32> {
        self.get_u32(p::WIDTH, "width query")
    }

    fn set_width(&mut self, value: u32) -> Result<()> {
        self.set_u32(p::WIDTH, value, "width setup")
    }

    fn width_range(&self) -> Result<ParamRange<u32>> {
        self.range_u32(p::WIDTH, "width range query")
    }

    fn height(&self) -> Result<u32> {
        self.get_u32(p::HEIGHT, "height query")
    }

    fn set_height(&mut self, value: u32) -> Result<()> {
        self.set_u32(p::HEIGHT, value, "height setup")
    }

    fn height_range(&self) -> Result<ParamRange<u32>> {
        self.range_u32(p::HEIGHT, "height range query")
    }

    fn offset_x(&self) -> Result<u32> {
        self.get_u32(p::OFFSET_X, "offsetX query")
    }

    fn set_offset_x(&mut self, value: u32) -> Result<()> {
        self.set_u32(p::OFFSET_X, value, "offsetX setup")
    }

    fn offset_x_range(&self) -> Result<ParamRange<u32>> {
        self.range_u32(p::OFFSET_X, "offsetX range query")
    }

    fn offset_y(&self) -> Result<u32> {
        self.get_u32(p::OFFSET_Y, "offsetY query")
    }

    fn set_offset_y(&mut self, value: u32) -> Result<()> {
        self.set_u32(p::OFFSET_Y, value, "offsetY setup")
    }

    fn offset_y_range(&self) -> Result<ParamRange<u32>> {
        self.range_u32(p::OFFSET_Y, "offsetY range query")
    }

    // --- 2. 物理量参数 ---

    fn exposure(&self) -> Result<Duration> {
        let us = self.get_u32(p::EXPOSURE, "exposure query")?;
        Ok(Duration::from_micros(us as u64))
    }

    fn set_exposure(&mut self, exposure: Duration) -> Result<()> {
        let us = i32::try_from(exposure.as_micros()).map_err(|_| {
            CameraError::InvalidParameter {
                name: p::EXPOSURE,
                reason: format!("exposure {:?} out of driver range", exposure),
            }
        })?;
        self.ensure_open()?;
        self.lock_handle()
            .set_int(p::EXPOSURE, us)
            .map_err(|e| e.into_camera("exposure setup"))
    }

    fn gain_db(&self) -> Result<f32> {
        self.ensure_open()?;
        self.lock_handle()
            .get_float(p::GAIN)
            .map_err(|e| e.into_camera("gain query"))
    }

    fn set_gain_db(&mut self, gain: f32) -> Result<()> {
        self.ensure_open()?;
        self.lock_handle()
            .set_float(p::GAIN, gain)
            .map_err(|e| e.into_camera("gain setup"))
    }

    // --- 3. 输出格式与超时 ---

    fn output_format(&self) -> ImageFormat {
        self.shared.format()
    }

    fn set_output_format(&mut self, format: ImageFormat) -> Result<()> {
        self.ensure_open()?;
        let mut handle = self.lock_handle();
        handle
            .set_int(p::IMAGE_DATA_FORMAT, p::format_code(format))
            .map_err(|e| e.into_camera("image format setup"))?;
        // 驱动参数与 Stride 计算依据在同一持锁区间内切换；
        // Worker 在锁内采样格式，在途帧不会被追改标签
        self.shared.set_format(format);
        Ok(())
    }

    fn fetch_timeout(&self) -> Duration {
        self.shared.fetch_timeout()
    }

    fn set_fetch_timeout(&mut self, timeout: Duration) {
        // 纯本地状态，Worker 下一次迭代生效
        self.shared.set_fetch_timeout(timeout);
    }

    // --- 4. 事件通道 ---

    fn frames(&self) -> Receiver<ImageData> {
        self.frames.clone()
    }

    fn faults(&self) -> Receiver<AcquisitionFault> {
        self.faults.clone()
    }

    // --- 5. 触发 ---

    fn fire_manual_trigger(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.trigger != TriggerConfig::Software {
            return Err(CameraError::TriggerModeMismatch);
        }
        self.lock_handle()
            .set_int(p::TRG_SOFTWARE, 1)
            .map_err(|e| e.into_camera("software trigger pulse"))
    }

    /// stop -> program -> start 协议
    ///
    /// 先 disarm 再拿锁：Worker 此刻要么在锁外空转，要么正在
    /// 完成最后一次有界拉帧；拿到锁即独占驱动。半途失败时采集
    /// 保持停止 (fail-safe)，错误包为 TriggerSetupFailed，调用方
    /// 需显式重新 setup 才能恢复出流。
    fn setup_trigger(&mut self, config: TriggerConfig) -> Result<()> {
        self.ensure_open()?;
        self.shared.disarm();
        let mut handle = self.lock_handle();

        handle
            .stop_acquisition()
            .map_err(|e| failed_setup(e, "acquisition stop"))?;
        trigger::program(&config, handle.as_mut())
            .map_err(|e| failed_setup(e, "trigger programming"))?;
        handle
            .start_acquisition()
            .map_err(|e| failed_setup(e, "acquisition restart"))?;
        drop(handle);

        self.trigger = config;
        self.shared.arm();
        tracing::debug!(?config, "Trigger reconfigured");
        Ok(())
    }

    // --- 6. 生命周期 ---

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SOFTWARE_TRIGGER
            | Capabilities::HARDWARE_TRIGGER
            | Capabilities::MONO16
            | Capabilities::COLOR
            | Capabilities::ROI_OFFSET
    }
}

impl Drop for XiCamera {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "Close during drop failed");
        }
    }
}

fn failed_setup(e: XiError, context: &'static str) -> CameraError {
    CameraError::TriggerSetupFailed(Box::new(e.into_camera(context)))
}
