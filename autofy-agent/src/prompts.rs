/// System prompt for viewport analysis.
pub const ANALYST_SYSTEM: &str = "You are a thorough researcher reading a web page one viewport at a time.";

/// System prompt for the final report.
pub const EDITOR_SYSTEM: &str =
    "You are a professional editor. Your goal is to produce a clean, organized text report.";

/// Instructions sent with each screenshot.
pub fn analysis_prompt(task: &str, page_text: &str, scroll_count: usize) -> String {
    format!(
        r#"USER TASK: "{task}"

INPUTS:
1. IMAGE: the current viewport.
2. TEXT: the visible page text, below.

Reply with a JSON object with exactly two keys:
- "summary": a concise summary of what this viewport adds for the task. Include specific facts, dates and technical details.
- "should_scroll": true if more unique content must be found further down, false otherwise.

RULES:
- Set "should_scroll" to true unless you can see the References section, External links, or a copyright footer.
- If you only see a table of contents or an introduction, you must scroll.
- If you are unsure, scroll.
- Only stop once you have found the complete answer and verified it in the text.

Current scroll count: {scroll_count}

PAGE TEXT:
{page_text}
"#
    )
}

/// Instructions for turning the collected notes into the final report.
pub fn report_prompt(task: &str, notes: &str) -> String {
    format!(
        r#"TASK: "{task}"

INSTRUCTIONS:
1. Read the notes below.
2. Write a final report in standard Markdown: headings, paragraphs, bullet points.
3. Do not output JSON, dictionaries, objects or code blocks.
4. Do not include metadata such as "Summary:" or braces.
5. Give only the clear, readable content.

NOTES:
{notes}
"#
    )
}
