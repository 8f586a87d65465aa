//! 动作层：词汇表、强类型动作、计划与线上格式

pub mod item;
pub mod plan;
pub mod vocabulary;
pub mod wire;

pub use item::{
    ActionItem, ElementSelector, InputMode, Locator, Point, ScrollDirection, SelectorKind,
    DEFAULT_LONG_PRESS_MS, DEFAULT_SLEEP_MS, DEFAULT_SWIPE_MS, DEFAULT_WAIT_FOR_MS,
};
pub use plan::Plan;
pub use vocabulary::{describe_vocabulary, ActionCategory, ActionKind};
pub use wire::{WireAction, WirePlan, WirePoint};
