//! 提示词模板：规划、重试与查询
//!
//! 规划提示词的「可用动作」由词汇表动态生成，「输出格式」附带 schemars 生成的 JSON Schema，
//! 两者只拼装一次后缓存。

use std::sync::OnceLock;

use schemars::schema_for;

use crate::action::{describe_vocabulary, WirePlan};

const PLANNING_TEMPLATE: &str = r#"## Role
You are a UI automation planner. You look at a screenshot and the source of the current page and decide which UI actions fulfil the user's instruction.

## Objective
Translate the instruction into a short, ordered list of concrete actions that can be executed right now on the visible page.

## Skills
- Reading screenshots and locating elements by their visible position
- Reading HTML or view hierarchies and writing precise selectors
- Breaking an instruction into the minimal sequence of steps

## Available Actions
{{vocabulary}}
## Workflow
1. Find the elements the instruction refers to, in the screenshot and in the page source.
2. Prefer an `elementSelector` when the element can be identified reliably in the source; otherwise give `locate` with the element's center in screenshot pixels.
3. Emit only the actions that are possible on the current page. If more work remains after them (for example a new page must load), set `moreActionsNeededByInstruction` to true.
4. If the instruction cannot be carried out on this page, return an empty `actions` list and explain why in `error`.

## Selector Guidelines
- XPath selectors start with `/` or `(` and use `selectorType` = "BY_XPATH".
- CSS selectors use `selectorType` = "BY_CSS".
- Prefer ids, names, labels and visible text over positional paths.

## Output Format
Return one JSON object:
```json
{
  "actions": [
    { "type": "CLICK", "elementSelector": "//button[@id='submit']", "selectorType": "BY_XPATH" },
    { "type": "INPUT", "locate": { "x": 320, "y": 180 }, "value": "hello", "inputMode": "replace" }
  ],
  "log": "why these actions",
  "moreActionsNeededByInstruction": false,
  "sleep": 0,
  "error": null
}
```

JSON Schema:
```json
{{schema}}
```

## Field Descriptions
- `actions`: executed in order; every item needs `type`.
- `log`: a short explanation of the plan.
- `moreActionsNeededByInstruction`: true when the instruction is not finished after these actions.
- `sleep`: milliseconds to wait after the actions, or 0.
- `error`: set only when the instruction cannot be carried out.
"#;

fn planning_preamble() -> &'static str {
    static PREAMBLE: OnceLock<String> = OnceLock::new();
    PREAMBLE.get_or_init(|| {
        let schema = serde_json::to_string_pretty(&schema_for!(WirePlan)).unwrap_or_default();
        PLANNING_TEMPLATE
            .replace("{{vocabulary}}", &describe_vocabulary())
            .replace("{{schema}}", &schema)
    })
}

/// 首次尝试的规划提示词
pub fn planning_prompt(instruction: &str) -> String {
    format!(
        "{}\n## User Instruction\n{}\n\nOUTPUT JSON ONLY.",
        planning_preamble(),
        instruction
    )
}

/// 重试提示词：历史中已有完整规划提示与失败说明
pub fn retry_prompt(instruction: &str) -> String {
    format!(
        "Previous attempt failed. Analyze the new screenshot and page source carefully and produce a corrected plan.\n\
         User instruction: {instruction}\n\
         Use the same output format as before. OUTPUT JSON ONLY."
    )
}

/// 查询提示词：只依据截图回答
pub fn query_prompt(question: &str) -> String {
    format!(
        "You are looking at a screenshot of the current page. Answer the question using only what is visible.\n\
         Question: {question}\n\
         Answer concisely, without explanations."
    )
}
