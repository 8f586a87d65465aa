//! 规划层：提示词模板与 Planner（缓存读穿 / 写穿、模型调用、回复解析）

pub mod builder;
pub mod prompt;

pub use builder::{parse_plan, Planned, Planner};
pub use prompt::{planning_prompt, query_prompt, retry_prompt};
