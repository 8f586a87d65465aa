//! 记忆层：单条指令执行期间与模型的多轮对话

pub mod conversation;

pub use conversation::{ContentPart, ConversationHistory, Message, Role};
