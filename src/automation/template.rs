//! Link template expansion.
//!
//! A template refers to the match with `$N` or `${N}`: `$0` is the whole
//! match, `$1..` are capture groups. Digits after a bare `$` are read
//! greedily, so `$12` means group 12; write `${1}2` for group 1 followed by
//! a literal `2`. Groups that did not participate in the match and indexes
//! past the last group both expand to the empty string. A `$` that is not
//! followed by a placeholder is copied through unchanged.

use regex_lite::Captures;

/// Expand `template` against the captures of a single match.
pub fn expand_template(template: &str, caps: &Captures<'_>) -> String {
    expand_with(template, |index| {
        caps.get(index).map(|m| m.as_str()).unwrap_or_default()
    })
}

/// Expand placeholders using `lookup` to resolve a group index.
fn expand_with<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(usize) -> &'a str,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        match parse_placeholder(after) {
            Some((index, consumed)) => {
                if let Some(index) = index {
                    out.push_str(lookup(index));
                }
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse the placeholder that follows a `$`.
///
/// Returns the group index (`None` when the number overflows `usize`, which
/// can never name a real group) and the number of bytes consumed, or `None`
/// when the text is not a placeholder.
fn parse_placeholder(s: &str) -> Option<(Option<usize>, usize)> {
    if let Some(inner) = s.strip_prefix('{') {
        let digits = leading_digits(inner);
        if digits == 0 || !inner[digits..].starts_with('}') {
            return None;
        }
        return Some((inner[..digits].parse().ok(), digits + 2));
    }

    let digits = leading_digits(s);
    if digits == 0 {
        return None;
    }
    Some((s[..digits].parse().ok(), digits))
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(|b| b.is_ascii_digit()).count()
}
