//! Facade 集成测试：用仿真驱动验证端到端行为
//!
//! 覆盖打开/关闭生命周期、触发重配置的驱动调用时序、帧事件
//! 的数量与 Stride，以及关停延迟上界。

use std::time::{Duration, Instant};

use camlink_backend_ximea::sim::{FetchScript, SimDriver};
use camlink_backend_ximea::{list_cameras, FaultPolicy, StallPolicy, XiCamera};
use camlink_core::config::CameraConfig;
use camlink_core::error::{AcquisitionFault, CameraError};
use camlink_core::format::ImageFormat;
use camlink_core::traits::{Camera, TriggerConfig, TriggerSelector};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fast_config() -> CameraConfig {
    let mut config = CameraConfig::new()
        .fetch_timeout(Duration::from_millis(20))
        .trigger(TriggerConfig::Off);
    config.idle_backoff = Duration::from_millis(2);
    config
}

#[test]
fn trigger_reconfiguration_follows_stop_program_start() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    let mut cam = XiCamera::open(&driver, 0, fast_config()).unwrap();

    driver.clear_log();
    cam.setup_trigger(TriggerConfig::Hardware {
        input_channel: 1,
        rising_edge: true,
        selector: TriggerSelector::FrameStart,
    })
    .unwrap();

    let log = driver.call_log();

    // 拉帧绝不夹在 stop 和 start 之间 (重编程期间驱动被独占)
    let stop = log.iter().position(|e| e == "stop_acquisition").unwrap();
    let start = log.iter().position(|e| e == "start_acquisition").unwrap();
    assert!(stop < start);
    assert!(!log[stop..start].iter().any(|e| e == "fetch"));

    // 去掉重配置前后的空闲拉帧，剩下的就是协议本身
    let protocol: Vec<_> = log.into_iter().filter(|e| e != "fetch").collect();
    assert_eq!(
        protocol,
        vec![
            "stop_acquisition".to_owned(),
            "set_int:gpi_selector=1".to_owned(),
            "set_int:gpi_mode=1".to_owned(),
            "set_int:trigger_source=1".to_owned(),
            "set_int:trigger_selector=0".to_owned(),
            "start_acquisition".to_owned(),
        ]
    );

    cam.close().unwrap();
}

#[test]
fn failed_trigger_setup_leaves_acquisition_stopped() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    let mut cam = XiCamera::open(&driver, 0, fast_config()).unwrap();

    driver.clear_log();
    // gpi_selector 超出驱动接受的范围 -> program 半途失败
    let bad = TriggerConfig::Hardware {
        input_channel: 99,
        rising_edge: true,
        selector: TriggerSelector::FrameStart,
    };
    assert!(matches!(
        cam.setup_trigger(bad),
        Err(CameraError::TriggerSetupFailed(_))
    ));

    // fail-safe：stop 已发出，start 没有发出，采集保持停止
    let log = driver.call_log();
    assert!(log.iter().any(|e| e == "stop_acquisition"));
    assert!(!log.iter().any(|e| e == "start_acquisition"));

    // 停止期间不再有拉帧
    let fetches = driver.fetch_calls();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(driver.fetch_calls(), fetches);

    // 显式重新 setup 后恢复
    cam.setup_trigger(TriggerConfig::Off).unwrap();
    cam.close().unwrap();

    // 关闭后的重配置同步报错，不碰驱动
    driver.clear_log();
    assert!(matches!(
        cam.setup_trigger(TriggerConfig::Off),
        Err(CameraError::Closed)
    ));
    assert!(driver.call_log().is_empty());
}

#[test]
fn streams_exact_frame_count_with_mono8_stride() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    // 5 帧后脚本耗尽，后续拉帧一律超时
    driver.script_fetches(FetchScript::new().frames(5, 640, 480, 0));

    let mut cam = XiCamera::open(&driver, 0, fast_config().frame_queue_depth(8)).unwrap();
    let frames = cam.frames();

    for _ in 0..5 {
        let img = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(img.width, 640);
        assert_eq!(img.height, 480);
        assert_eq!(img.format, ImageFormat::Mono8);
        assert_eq!(img.stride, 640);
        assert_eq!(img.data.len(), 640 * 480);
    }
    // 恰好 5 个事件，没有多余的
    assert!(frames.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(cam.stats().published, 5);
    assert_eq!(cam.stats().dropped, 0);

    cam.close().unwrap();
}

#[test]
fn mono16_frames_carry_padded_stride() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    driver.script_fetches(FetchScript::new().frames(2, 320, 240, 4));

    let mut cam = XiCamera::open(
        &driver,
        0,
        fast_config().output_format(ImageFormat::Mono16),
    )
    .unwrap();
    let frames = cam.frames();

    let img = frames.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(img.format, ImageFormat::Mono16);
    assert_eq!(img.stride, 320 * 2 + 4);

    cam.close().unwrap();
}

#[test]
fn close_completes_within_one_fetch_timeout() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    let mut config = fast_config();
    config = config.fetch_timeout(Duration::from_millis(50));

    let mut cam = XiCamera::open(&driver, 0, config).unwrap();
    // 让 Worker 进入拉帧节奏
    std::thread::sleep(Duration::from_millis(60));

    let start = Instant::now();
    cam.close().unwrap();
    // 上界 = 一次拉帧超时 + 调度余量
    assert!(start.elapsed() < Duration::from_millis(500));

    // 关闭后驱动不再收到任何调用
    let fetches = driver.fetch_calls();
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(driver.fetch_calls(), fetches);

    // 幂等
    cam.close().unwrap();
}

#[test]
fn enumerate_then_open_by_descriptor_index() {
    init_tracing();
    let driver = SimDriver::with_devices(2);
    let devices = list_cameras(&driver).unwrap();
    assert_eq!(devices.len(), 2);

    let target = devices
        .iter()
        .find(|d| d.serial_number == "SIM00001")
        .unwrap();
    let mut cam = XiCamera::open(&driver, target.index, fast_config()).unwrap();
    assert_eq!(cam.width().unwrap(), 640);
    cam.close().unwrap();
}

#[test]
fn notify_stall_policy_surfaces_fault_through_facade() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    driver.script_fetches(FetchScript::new().stopped());

    let mut cam = XiCamera::open_with_policies(
        &driver,
        0,
        fast_config(),
        StallPolicy::Notify,
        FaultPolicy::Continue,
    )
    .unwrap();

    let faults = cam.faults();
    assert_eq!(
        faults.recv_timeout(Duration::from_secs(2)).unwrap(),
        AcquisitionFault::Stalled
    );

    // 停住后不再拉帧
    let fetches = driver.fetch_calls();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(driver.fetch_calls(), fetches);

    cam.close().unwrap();
}

#[test]
fn stop_fault_policy_halts_polling_through_facade() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    driver.script_fetches(FetchScript::new().error(7));

    let mut cam = XiCamera::open_with_policies(
        &driver,
        0,
        fast_config(),
        StallPolicy::Silent,
        FaultPolicy::Stop,
    )
    .unwrap();

    let faults = cam.faults();
    assert_eq!(
        faults.recv_timeout(Duration::from_secs(2)).unwrap(),
        AcquisitionFault::Driver { code: 7 }
    );

    // 让当前迭代收尾 (事件先于停表发布)，之后轮询必须停住
    std::thread::sleep(Duration::from_millis(30));
    let fetches = driver.fetch_calls();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(driver.fetch_calls(), fetches);

    cam.close().unwrap();
}

#[test]
fn format_switch_keeps_frame_stamp_consistent() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    driver.script_fetches(FetchScript::new().frames(24, 64, 48, 0));

    let mut cam = XiCamera::open(&driver, 0, fast_config().frame_queue_depth(32)).unwrap();
    let frames = cam.frames();

    // 边收边切格式：帧的格式标签必须与拉取时的驱动格式一致，
    // 重配置不追改在途帧
    let mut next = ImageFormat::Mono16;
    for _ in 0..24 {
        let img = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(img.stride, img.width as usize * img.format.bytes_per_pixel());
        assert_eq!(img.data.len(), img.stride * img.height as usize);

        cam.set_output_format(next).unwrap();
        next = if next == ImageFormat::Mono16 {
            ImageFormat::Mono8
        } else {
            ImageFormat::Mono16
        };
    }

    cam.close().unwrap();
}

#[test]
fn drop_without_close_recovers_worker() {
    init_tracing();
    let driver = SimDriver::with_devices(1);
    {
        let cam = XiCamera::open(&driver, 0, fast_config()).unwrap();
        let _ = cam.frames();
        // 不显式 close，靠 Drop 回收
    }
    // Drop 之后驱动句柄已关闭，可以重新打开同一台设备
    let mut cam = XiCamera::open(&driver, 0, fast_config()).unwrap();
    cam.close().unwrap();
}
