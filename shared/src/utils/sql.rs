//! SQL text helpers

/// Comma separated positional placeholders, e.g. `?, ?, ?` for `count == 3`.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
