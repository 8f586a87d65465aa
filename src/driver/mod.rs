//! 驱动层：页面驱动抽象、记录型测试驱动与 Chrome 实现（browser feature）

#[cfg(feature = "browser")]
pub mod chrome;
pub mod mock;
pub mod traits;

#[cfg(feature = "browser")]
pub use chrome::ChromeDriver;
pub use mock::{DriverCall, RecordingDriver, BLANK_PNG_BASE64};
pub use traits::{DriverError, PageDriver, Snapshot};
