//! Headline synthesizer

use crate::bindings::CompiledBinding;
use crate::models::BlockKind;

/// Prefix that marks organizer headlines
pub const ORGANIZER_PREFIX: &str = "Organizer: ";

/// Derive a headline from a block-introducer line.
///
/// Callables yield their identifier, types their identifier plus the base
/// list verbatim. Anything else falls back to the stripped line.
pub fn synthesize(line: &str, binding: &CompiledBinding) -> String {
    match binding.introducer_captures(line) {
        Some((BlockKind::Type, caps)) => {
            let bases = caps
                .name("bases")
                .map(|m| balanced_group(&line[m.start()..]))
                .unwrap_or_default();
            format!("{}{}", &caps["name"], bases)
        }
        Some((_, caps)) => caps["name"].to_string(),
        None => line.trim().to_string(),
    }
}

/// The parenthesized group `text` opens with, nested groups included.
///
/// An unclosed group runs to the end of the line.
fn balanced_group(text: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..=i];
                }
            }
            _ => {}
        }
    }
    text.trim_end()
}

/// Headline of an organizer node opened by `line`
pub fn organizer(line: &str) -> String {
    format!("{}{}", ORGANIZER_PREFIX, line.trim())
}

/// Decorator names that immediately precede the introducer line in `body`
pub fn decorators(body: &[String], binding: &CompiledBinding) -> Vec<String> {
    let Some(introducer) = body
        .iter()
        .position(|line| binding.match_introducer(line).is_some())
    else {
        return Vec::new();
    };

    let mut names: Vec<String> = body[..introducer]
        .iter()
        .rev()
        .map_while(|line| binding.decorator_name(line))
        .collect();
    names.reverse();
    names
}

/// Prefix `headline` with the decorators found in `body`
pub fn with_decorators(headline: &str, body: &[String], binding: &CompiledBinding) -> String {
    let names = decorators(body, binding);
    if names.is_empty() {
        return headline.to_string();
    }
    format!("{} {}", names.join(" "), headline)
}
