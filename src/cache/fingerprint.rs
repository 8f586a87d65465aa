//! 指令指纹：缓存键
//!
//! 默认对指令原始 UTF-8 字节取 SHA-256，小写十六进制输出；不做任何规范化（大小写、空白均有意义）。
//! `Fnv1a` 为降级方案：64 位非密码学哈希，存在碰撞风险，仅用于无法使用 SHA-256 的场合。

use serde::Deserialize;
use sha2::{Digest, Sha256};

/// 缓存键生成方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    #[default]
    Sha256,
    /// 降级：FNV-1a 64，不同指令可能得到相同键
    Fnv1a,
}

impl KeyScheme {
    pub fn fingerprint(self, instruction: &str) -> String {
        match self {
            KeyScheme::Sha256 => fingerprint(instruction),
            KeyScheme::Fnv1a => fnv1a_fingerprint(instruction),
        }
    }
}

/// SHA-256 指纹（64 位十六进制字符）
pub fn fingerprint(instruction: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instruction.as_bytes());
    hex::encode(hasher.finalize())
}

fn fnv1a_fingerprint(instruction: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = instruction
        .as_bytes()
        .iter()
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME));
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_known_vector() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_deterministic_and_distinct() {
        assert_eq!(fingerprint("click login"), fingerprint("click login"));
        assert_ne!(fingerprint("click login"), fingerprint("click logout"));
    }

    #[test]
    fn test_fingerprint_no_normalization() {
        assert_ne!(fingerprint("Click login"), fingerprint("click login"));
        assert_ne!(fingerprint("click login "), fingerprint("click login"));
    }

    #[test]
    fn test_fnv_scheme_is_stable() {
        assert_eq!(KeyScheme::Fnv1a.fingerprint(""), "cbf29ce484222325");
        assert_eq!(KeyScheme::Fnv1a.fingerprint("a"), "af63dc4c8601ec8c");
        assert_eq!(KeyScheme::Fnv1a.fingerprint("x").len(), 16);
    }
}
