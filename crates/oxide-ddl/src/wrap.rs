//! Word wrapping for terminal output.

/// Width assumed when the terminal width is unknown.
pub const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Returns the terminal width from `COLUMNS`, or [`DEFAULT_TERMINAL_WIDTH`].
#[must_use]
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|&w| w > 0)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

/// Wraps `input` at word boundaries so that no line exceeds `max_len`
/// characters (unless a single word is longer), then prefixes every line
/// after the first with `padding`. Existing newlines are kept. A `max_len` of
/// zero disables wrapping.
#[must_use]
pub fn wrap_with_padding(input: &str, max_len: usize, padding: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for source_line in input.split('\n') {
        if max_len == 0 || source_line.chars().count() <= max_len {
            lines.push(source_line.to_string());
            continue;
        }
        let mut current = String::new();
        let mut current_len = 0;
        for word in source_line.split(' ') {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > max_len {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines.join(&format!("\n{padding}"))
}
