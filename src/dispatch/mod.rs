//! 分发层：把计划中的动作逐个映射为驱动调用

pub mod dispatcher;

pub use dispatcher::{describe_locator, ActionDispatcher, DispatchOutcome, DEFAULT_HORIZONTAL_SCROLL};
