//! 缓存读写策略

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 缓存模式：决定 get / put / invalidate 是否生效，运行时可切换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// 只读：命中可用，不写入新条目
    ReadOnly,
    /// 只写：记录新计划，但从不命中
    WriteOnly,
    #[default]
    ReadWrite,
    /// 全部操作无效，也不加载文件
    Disabled,
}

impl CacheMode {
    pub fn can_read(self) -> bool {
        matches!(self, CacheMode::ReadOnly | CacheMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, CacheMode::WriteOnly | CacheMode::ReadWrite)
    }

    pub fn is_disabled(self) -> bool {
        self == CacheMode::Disabled
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheMode::ReadOnly => "read_only",
            CacheMode::WriteOnly => "write_only",
            CacheMode::ReadWrite => "read_write",
            CacheMode::Disabled => "disabled",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            CacheMode::ReadOnly => 0,
            CacheMode::WriteOnly => 1,
            CacheMode::ReadWrite => 2,
            CacheMode::Disabled => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => CacheMode::ReadOnly,
            1 => CacheMode::WriteOnly,
            2 => CacheMode::ReadWrite,
            _ => CacheMode::Disabled,
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(CacheMode::ReadOnly),
            "write_only" | "writeonly" => Ok(CacheMode::WriteOnly),
            "read_write" | "readwrite" => Ok(CacheMode::ReadWrite),
            "disabled" | "off" => Ok(CacheMode::Disabled),
            other => Err(format!("unknown cache mode: {other}")),
        }
    }
}
