//! 采集 Worker：后台拉帧循环
//!
//! 每个相机实例恰好两条控制流：控制线程 (Facade) 和这里的
//! 专属 Worker 线程。两者只共享 `AcqShared` 里的原子标志和
//! `Mutex` 里的驱动句柄。
//!
//! 循环不变式：
//! - 取消检查在每次迭代顶部，关停延迟上界 = 一次拉帧超时
//! - running=false 时绝不触碰驱动，只按固定间隔空转
//! - 帧按拉取顺序 FIFO 发布，每帧只投递一次；通道满则丢帧，
//!   绝不反压生产侧

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camlink_core::error::AcquisitionFault;
use camlink_core::format::ImageFormat;
use camlink_core::image::ImageData;
use crossbeam_channel::{Sender, TrySendError};

use crate::sdk::{DriverHandle, FetchError, RawFrame};

/// 驱动自发停止采集时是否向订阅者上报
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallPolicy {
    /// 静默吸收，转入空转
    #[default]
    Silent,
    /// 额外在故障通道上发一条 Stalled 事件
    Notify,
}

/// 未分类驱动错误的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// 记日志 + 发故障事件，循环继续
    #[default]
    Continue,
    /// 发故障事件并停止拉帧 (等待重新 arm)
    Stop,
}

/// 发布/丢帧计数器快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcqStats {
    pub published: u64,
    pub dropped: u64,
    pub faults: u64,
}

/// 控制线程与 Worker 之间的共享状态
///
/// 单标志位的 lock-free 语义就够了：running 由控制线程
/// (open/close/触发重配置) 和 Worker (发现 stopped) 两侧写，
/// 驱动句柄本身另由 Mutex 串行化。
#[derive(Debug)]
pub struct AcqShared {
    running: AtomicBool,
    cancel: AtomicBool,
    timeout_ms: AtomicU64,
    format: AtomicU8,
    idle_backoff: Duration,
    stall_policy: StallPolicy,
    fault_policy: FaultPolicy,

    published: AtomicU64,
    dropped: AtomicU64,
    faults: AtomicU64,
}

impl AcqShared {
    pub fn new(
        format: ImageFormat,
        fetch_timeout: Duration,
        idle_backoff: Duration,
        stall_policy: StallPolicy,
        fault_policy: FaultPolicy,
    ) -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            timeout_ms: AtomicU64::new(fetch_timeout.as_millis() as u64),
            format: AtomicU8::new(format as u8),
            idle_backoff,
            stall_policy,
            fault_policy,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    /// 允许 Worker 拉帧 (采集已在驱动侧启动)
    pub fn arm(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// 暂停拉帧 (触发重配置、关闭前)
    pub fn disarm(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 请求 Worker 退出；单向，不可复位
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn set_fetch_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_format(&self, format: ImageFormat) {
        self.format.store(format as u8, Ordering::Relaxed);
    }

    pub fn format(&self) -> ImageFormat {
        // 存进去的值只来自 set_format，from_repr 不会失败；
        // 兜底 Mono8 只是避免 unwrap
        ImageFormat::from_repr(self.format.load(Ordering::Relaxed)).unwrap_or(ImageFormat::Mono8)
    }

    pub fn stats(&self) -> AcqStats {
        AcqStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// 采集 Worker 本体
pub struct AcquisitionWorker {
    shared: Arc<AcqShared>,
    handle: Arc<Mutex<Box<dyn DriverHandle>>>,
    frame_tx: Sender<ImageData>,
    fault_tx: Sender<AcquisitionFault>,
}

impl AcquisitionWorker {
    pub fn spawn(
        shared: Arc<AcqShared>,
        handle: Arc<Mutex<Box<dyn DriverHandle>>>,
        frame_tx: Sender<ImageData>,
        fault_tx: Sender<AcquisitionFault>,
    ) -> JoinHandle<()> {
        let worker = Self {
            shared,
            handle,
            frame_tx,
            fault_tx,
        };
        thread::Builder::new()
            .name("camlink-acq".into())
            .spawn(move || worker.run())
            // spawn 只在系统线程资源耗尽时失败，此时整个进程已不可用
            .expect("failed to spawn acquisition worker thread")
    }

    fn run(self) {
        tracing::debug!("Acquisition worker started");

        loop {
            // 取消检查放在循环顶部，保证关停及时
            if self.shared.cancel.load(Ordering::Acquire) {
                break;
            }

            if !self.shared.is_running() {
                // 空转分支：不碰驱动
                thread::sleep(self.shared.idle_backoff);
                continue;
            }

            let timeout = self.shared.fetch_timeout();
            let (result, format) = {
                // 持锁范围 = 一次有界的拉帧调用。控制线程要做
                // stop -> program -> start 时拿同一把锁，天然不会
                // 与拉帧交错。输出格式在同一持锁区间内采样：
                // 格式重配置也在锁内改写，帧的标签与拉取时的驱动
                // 格式一定一致。
                let mut handle = match self.handle.lock() {
                    Ok(h) => h,
                    Err(poisoned) => poisoned.into_inner(),
                };
                (handle.fetch_frame(timeout), self.shared.format())
            };

            match result {
                // 零长度载荷 = "本次没有新帧"，静默跳过
                Ok(raw) if raw.data.is_empty() => {}
                Ok(raw) => self.publish(raw, format),
                // 超时是正常空闲状态，不算失败
                Err(FetchError::Timeout) => {}
                Err(FetchError::AcquisitionStopped) => {
                    // 驱动自发停止 (重配置或硬件故障)，转入空转，
                    // 等待控制线程重新 arm
                    self.shared.disarm();
                    tracing::debug!("Driver halted acquisition, worker idling");
                    if self.shared.stall_policy == StallPolicy::Notify {
                        let _ = self.fault_tx.try_send(AcquisitionFault::Stalled);
                    }
                }
                Err(FetchError::Other(code)) => {
                    self.shared.faults.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(code, "Unclassified driver error during fetch");
                    let _ = self.fault_tx.try_send(AcquisitionFault::Driver { code });
                    if self.shared.fault_policy == FaultPolicy::Stop {
                        self.shared.disarm();
                    }
                }
            }
        }

        tracing::debug!("Acquisition worker terminated");
    }

    /// 驱动缓冲 -> 中立图像记录 -> 事件发布
    ///
    /// format 由调用方在拉帧的持锁区间内采样
    fn publish(&self, raw: RawFrame, format: ImageFormat) {
        let stride = raw.width as usize * format.bytes_per_pixel() + raw.padding_x as usize;

        let image = ImageData {
            data: raw.data,
            width: raw.width,
            height: raw.height,
            stride,
            format,
        };

        // try_send：通道满时丢帧，不反压驱动侧
        match self.frame_tx.try_send(image) {
            Ok(()) => {
                self.shared.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Frame queue full, frame dropped");
            }
            // 所有订阅者已离开：帧无处可去，照常丢弃
            Err(TrySendError::Disconnected(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
