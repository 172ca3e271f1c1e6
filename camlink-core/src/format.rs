use std::fmt::{self, Display};

/// 后端中立的输出像素格式
///
/// 这里只覆盖工业相机传感器侧的常见无压缩格式；
/// 驱动私有格式码的映射放在各 Backend 的 param_map 中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ImageFormat {
    /// 8-bit 单色
    Mono8 = 0,
    /// 16-bit 单色 (高位深传感器)
    Mono16 = 1,
    /// 24-bit RGB (Packed)
    Rgb24 = 2,
    /// 32-bit RGB + padding byte
    Rgb32 = 3,
}

impl ImageFormat {
    /// 每像素字节数，用于计算 Stride 和带宽
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Mono16 => 2,
            Self::Rgb24 => 3,
            Self::Rgb32 => 4,
        }
    }

    /// 判断是否为单色格式
    pub const fn is_mono(self) -> bool {
        matches!(self, Self::Mono8 | Self::Mono16)
    }

    /// 从 repr(u8) 值还原 (用于跨线程的原子存储)
    pub const fn from_repr(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Mono8),
            1 => Some(Self::Mono16),
            2 => Some(Self::Rgb24),
            3 => Some(Self::Rgb32),
            _ => None,
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mono8 => "Mono8",
            Self::Mono16 => "Mono16",
            Self::Rgb24 => "Rgb24",
            Self::Rgb32 => "Rgb32",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_mapping() {
        assert_eq!(ImageFormat::Mono8.bytes_per_pixel(), 1);
        assert_eq!(ImageFormat::Mono16.bytes_per_pixel(), 2);
        assert_eq!(ImageFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(ImageFormat::Rgb32.bytes_per_pixel(), 4);
    }

    #[test]
    fn repr_round_trip() {
        for fmt in [
            ImageFormat::Mono8,
            ImageFormat::Mono16,
            ImageFormat::Rgb24,
            ImageFormat::Rgb32,
        ] {
            assert_eq!(ImageFormat::from_repr(fmt as u8), Some(fmt));
        }
        assert_eq!(ImageFormat::from_repr(42), None);
    }
}
