use crate::format::ImageFormat;

/// 核心图像结构体
///
/// 与底层驱动 Buffer 解耦：数据在 Worker 发布前从驱动缓冲区
/// 拷贝到这里的 Owned Vec，所有权随事件一次性转移给订阅者，
/// 发布后 Worker 不再持有或复用它。
#[derive(Debug, Clone)]
pub struct ImageData {
    /// 原始图像数据 (Owned)
    pub data: Vec<u8>,

    /// 图像宽度 (Pixels)
    pub width: u32,

    /// 图像高度 (Pixels)
    pub height: u32,

    /// 【关键】跨距/步长 (Bytes per line)
    /// 驱动可能在行尾补 padding，Stride 可能大于 width * bpp
    pub stride: usize,

    /// 像素格式
    pub format: ImageFormat,
}

impl ImageData {
    /// 不含行尾 padding 的最小 Stride
    pub fn min_stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// 取第 y 行的有效像素字节 (剥掉 padding)
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data.get(start..start + self.min_stride())
    }

    /// Mono16 数据的类型化视图
    ///
    /// 仅当格式为 Mono16 且无行尾 padding (数据紧凑) 时可用，
    /// 否则调用方应逐行通过 `row()` 处理。
    pub fn as_mono16(&self) -> Option<&[u16]> {
        if self.format != ImageFormat::Mono16 || self.stride != self.min_stride() {
            return None;
        }
        bytemuck::try_cast_slice(&self.data).ok()
    }
}
