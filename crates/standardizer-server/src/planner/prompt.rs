//! Planner prompt and model-output parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::instructions::truncate_chars;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

static BARE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\{.*\})").expect("bare JSON pattern is valid"));

const PLAN_SCHEMA: &str = r#"{
  "mappings": [
    {"op":"copy", "source":"<raw col>", "target":"<ideal col>"},
    {"op":"concat", "sources":["<raw col A>", "<raw col B>"], "separator":" ", "target":"<ideal col>"},
    {"op":"date_copy", "source":"<raw date col>", "target":"<ideal date col>"},
    {"op":"calendar_year", "source":"<raw date col>", "target":"Calendar Year"},
    {"op":"fiscal_year_july_june", "source":"<raw date col>", "target":"Fiscal Year"},
    {"op":"numeric_copy", "source":"<raw numeric col>", "target":"<ideal col>", "decimals":2},
    {"op":"fill_const", "value":"<constant string>", "target":"<ideal col>"}
  ],
  "notes": ["any short notes about assumptions or skipped rules"]
}"#;

const PLAN_RULES: &str = "\
- Only use columns that exist in RAW/IDEAL when possible. If uncertain, include but the executor will skip missing ones.
- If instructions mention ACS agreement string, include fill_const for \"Agreement\".
- If instructions mention concat for names, use op \"concat\".
- For date:
  - Use \"date_copy\" for Publication Date copies.
  - Use \"calendar_year\" for extracting year.
  - Use \"fiscal_year_july_june\" for VIVA FY rule (FY = year + (month>=7)).
- For APC or money fields, use \"numeric_copy\" with \"decimals\":2.
- Keep JSON compact.";

/// Build the planner prompt. Instructions beyond `char_budget` characters are cut.
pub fn build_plan_prompt(
    raw_columns: &[String],
    ideal_columns: &[String],
    instructions: &str,
    char_budget: usize,
) -> String {
    format!(
        "You are a data standardization planner. Read the instructions and produce a concise JSON PLAN\n\
         describing how to map RAW columns to IDEAL columns. Do NOT include any prose, ONLY JSON.\n\
         \n\
         JSON SCHEMA (strict):\n\
         {schema}\n\
         \n\
         Rules:\n\
         {rules}\n\
         \n\
         RAW_COLUMNS = {raw}\n\
         IDEAL_COLUMNS = {ideal}\n\
         \n\
         INSTRUCTIONS (verbatim):\n\
         {instructions}",
        schema = PLAN_SCHEMA,
        rules = PLAN_RULES,
        raw = column_list(raw_columns),
        ideal = column_list(ideal_columns),
        instructions = truncate_chars(instructions, char_budget),
    )
    .trim()
    .to_string()
}

fn column_list(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("{:?}", c)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Pull the JSON plan out of free-form model output.
///
/// A fenced ```` ```json ```` block wins; otherwise the span from the first `{`
/// to the last `}`. Returns an empty string when neither is present.
pub fn extract_json_block(text: &str) -> String {
    FENCED_JSON
        .captures(text)
        .or_else(|| BARE_JSON.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}
