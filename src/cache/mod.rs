//! 缓存层：指令指纹、读写策略与持久化响应缓存

pub mod fingerprint;
pub mod mode;
pub mod response_cache;

pub use fingerprint::{fingerprint, KeyScheme};
pub use mode::CacheMode;
pub use response_cache::ResponseCache;
