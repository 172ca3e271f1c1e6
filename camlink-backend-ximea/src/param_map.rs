//! xiAPI 参数名与取值码的映射
//!
//! 手动声明需要的常量，避免依赖自动生成绑定。
//! 来源: xiApi.h

use camlink_core::format::ImageFormat;

// --- 参数名 (xiGetParam / xiSetParam) ---
pub const EXPOSURE: &str = "exposure"; // 微秒, int
pub const GAIN: &str = "gain"; // dB, float
pub const IMAGE_DATA_FORMAT: &str = "imgdataformat";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const OFFSET_X: &str = "offsetX";
pub const OFFSET_Y: &str = "offsetY";
pub const TRG_SOURCE: &str = "trigger_source";
pub const TRG_SELECTOR: &str = "trigger_selector";
pub const TRG_SOFTWARE: &str = "trigger_software";
pub const GPI_SELECTOR: &str = "gpi_selector";
pub const GPI_MODE: &str = "gpi_mode";
pub const BUFFER_POLICY: &str = "buffer_policy";

// --- 参数信息后缀 (范围查询: e.g. "width:min") ---
pub const INFO_MIN: &str = ":min";
pub const INFO_MAX: &str = ":max";

/// 拼出范围查询用的参数名
pub fn with_info(param: &str, info: &str) -> String {
    let mut s = String::with_capacity(param.len() + info.len());
    s.push_str(param);
    s.push_str(info);
    s
}

// --- 设备信息字段 (枚举期逐索引查询) ---
pub mod info {
    pub const SERIAL: &str = "device_sn";
    pub const MODEL: &str = "device_name";
    pub const INSTANCE_PATH: &str = "device_inst_path";
    pub const LOCATION_PATH: &str = "device_loc_path";
    pub const DEVICE_TYPE: &str = "device_type";
    pub const USER_ID: &str = "device_user_id";
}

// --- XI_TRG_SOURCE ---
pub const XI_TRG_OFF: i32 = 0;
pub const XI_TRG_EDGE_RISING: i32 = 1;
pub const XI_TRG_EDGE_FALLING: i32 = 2;
pub const XI_TRG_SOFTWARE: i32 = 3;

// --- XI_TRG_SELECTOR ---
pub const XI_TRG_SEL_FRAME_START: i32 = 0;
pub const XI_TRG_SEL_EXPOSURE_ACTIVE: i32 = 1;
pub const XI_TRG_SEL_FRAME_BURST_START: i32 = 2;

// --- XI_GPI_MODE ---
pub const XI_GPI_OFF: i32 = 0;
pub const XI_GPI_TRIGGER: i32 = 1;

// --- XI_BP (buffer policy) ---
// unsafe = 零拷贝直出驱动缓冲区；Worker 发布前自己做 Owned 拷贝
pub const XI_BP_UNSAFE: i32 = 0;
pub const XI_BP_SAFE: i32 = 1;

// --- XI_IMG_FORMAT ---
const XI_MONO8: i32 = 0;
const XI_MONO16: i32 = 1;
const XI_RGB24: i32 = 2;
const XI_RGB32: i32 = 3;

/// ImageFormat -> 驱动格式码
pub fn format_code(format: ImageFormat) -> i32 {
    match format {
        ImageFormat::Mono8 => XI_MONO8,
        ImageFormat::Mono16 => XI_MONO16,
        ImageFormat::Rgb24 => XI_RGB24,
        ImageFormat::Rgb32 => XI_RGB32,
    }
}

/// 驱动格式码 -> ImageFormat (驱动可能返回库不认识的私有码)
pub fn format_from_code(code: i32) -> Option<ImageFormat> {
    match code {
        XI_MONO8 => Some(ImageFormat::Mono8),
        XI_MONO16 => Some(ImageFormat::Mono16),
        XI_RGB24 => Some(ImageFormat::Rgb24),
        XI_RGB32 => Some(ImageFormat::Rgb32),
        _ => None,
    }
}
