//! OpenSSH `Host` pattern matching
//!
//! Patterns use `*` (any run of characters) and `?` (exactly one character).
//! A pattern list matches when at least one plain pattern matches and no
//! `!`-negated pattern does. Matching ignores ASCII case, as OpenSSH does
//! for host names.

/// Matches a single glob pattern against `text`
pub(super) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let text: Vec<char> = text.to_ascii_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently covering
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, covered)) = backtrack {
            p = star + 1;
            t = covered + 1;
            backtrack = Some((star, covered + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Matches a `Host` line's pattern list against `host`
pub(super) fn matches_pattern_list<S: AsRef<str>>(patterns: &[S], host: &str) -> bool {
    let mut matched = false;
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if let Some(negated) = pattern.strip_prefix('!') {
            if glob_match(negated, host) {
                return false;
            }
        } else if glob_match(pattern, host) {
            matched = true;
        }
    }
    matched
}
