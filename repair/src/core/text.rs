//! Text helpers shared by prompt rendering and reply parsing.

/// Strip a surrounding markdown code fence (```lang ... ```), if present.
///
/// Text without a leading fence is returned trimmed and otherwise untouched.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`python`, `json`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_matches('\n')
}

/// Prefix each line with its 1-based number, zero padded to four digits.
pub fn number_lines(code: &str) -> String {
    code.lines()
        .enumerate()
        .map(|(idx, line)| format!("{:04}: {line}", idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
