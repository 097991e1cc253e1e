//! 通用常量.

/// 二值掩膜体素值.
pub mod binary {
    /// 背景体素值.
    pub const BACKGROUND: u8 = 0;

    /// 前景体素值.
    pub const FOREGROUND: u8 = 1;

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p != BACKGROUND
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        p == BACKGROUND
    }
}

/// 全血管树掩膜的约定键名. 默认作为移除掩膜.
pub const FULL_KEY: &str = "full";

/// 从血管标签文件名 (去掉扩展名后) 截取的掩膜键长度.
pub const MASK_KEY_LEN: usize = 4;

/// 病人 ID 的默认定长前缀长度.
pub const DEFAULT_ID_LEN: usize = 24;

/// 默认角色表. 标签值升序依次对应.
pub const DEFAULT_ROLES: [&str; 2] = ["vein", "artery"];

/// 默认血管周围空间距离, 以毫米为单位.
pub const DEFAULT_DISTANCES: [f64; 3] = [2.0, 3.0, 5.0];

/// 默认输出扩展名.
pub const DEFAULT_EXTENSION: &str = "nii.gz";

/// 输出掩膜文件名前缀.
pub const MASK_PREFIX: &str = "mask";
