/// Render the user prompt for one batch. Each source string becomes one
/// line of a 1-based numbered list so the reply can be aligned by position.
pub fn build_batch_prompt(texts: &[String], target_language: &str) -> String {
    let numbered = texts
        .iter()
        .enumerate()
        .map(|(idx, text)| format!("{}. {}", idx + 1, flatten_line(text)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Please translate the following English texts to {lang}.\n\
         Keep all HTML tags, placeholders and variables (like @count, !status, %s, {{name}}) exactly as they are.\n\
         Maintain a natural and professional tone suitable for a website UI.\n\
         Reply with exactly {count} numbered lines, one per text, in the same order and with the same numbers.\n\
         Do not add explanations, notes or the original text.\n\
         \n\
         {numbered}",
        lang = target_language,
        count = texts.len(),
        numbered = numbered,
    )
}

/// A source string must occupy a single numbered line.
fn flatten_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
