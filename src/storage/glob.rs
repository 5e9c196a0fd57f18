//! Shell-style glob matching for `KEYS` and `CONFIG GET`.
//!
//! Supported syntax:
//!
//! - `*` matches any run of bytes (including none)
//! - `?` matches exactly one byte
//! - `[abc]`, `[a-z]` match one byte from a class; `[^...]` or `[!...]` negate it
//! - `\x` matches `x` literally
//!
//! A malformed pattern (an unterminated class or a trailing backslash) matches
//! nothing, so `KEYS` returns an empty array instead of an error.

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: impl AsRef<[u8]>) -> Self {
        Self {
            pattern: pattern.as_ref().to_vec(),
        }
    }

    /// Returns true if `text` matches the whole pattern.
    pub fn matches(&self, text: &[u8]) -> bool {
        match_from(&self.pattern, text)
    }
}

/// Iterative matcher that only ever backtracks to the most recent `*`.
///
/// Runs in O(pattern * text) time and constant stack, however many stars the
/// pattern holds.
fn match_from(pattern: &[u8], text: &[u8]) -> bool {
    let (mut pi, mut ti) = (0, 0);
    // Pattern index just past the last `*`, and the text index it resumes from
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pattern.get(pi) == Some(&b'*') {
            pi += 1;
            star = Some((pi, ti));
            continue;
        }

        if let Some(next) = match_one(pattern, pi, text[ti]) {
            pi = next;
            ti += 1;
            continue;
        }

        // Let the last star swallow one more byte and retry
        match star {
            Some((star_pi, star_ti)) => {
                pi = star_pi;
                ti = star_ti + 1;
                star = Some((star_pi, ti));
            }
            None => return false,
        }
    }

    pattern[pi..].iter().all(|&b| b == b'*')
}

/// Matches the single-byte token at `pattern[pi]` against `c`.
///
/// Returns the index of the next token, or `None` on a mismatch, at the end
/// of the pattern, or on a malformed token.
fn match_one(pattern: &[u8], pi: usize, c: u8) -> Option<usize> {
    match *pattern.get(pi)? {
        b'?' => Some(pi + 1),
        b'[' => match match_class(&pattern[pi + 1..], c)? {
            (true, consumed) => Some(pi + 1 + consumed),
            (false, _) => None,
        },
        b'\\' => (*pattern.get(pi + 1)? == c).then_some(pi + 2),
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluates a bracket expression that starts just after the opening `[`.
///
/// Returns whether `c` belongs to the class and how many pattern bytes were
/// consumed, including the closing `]`. Returns `None` for an unterminated class.
fn match_class(class: &[u8], c: u8) -> Option<(bool, usize)> {
    let mut i = 0;
    let negate = matches!(class.first(), Some(b'^') | Some(b'!'));
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;

    loop {
        let &b = class.get(i)?;
        // A `]` right after the opening bracket is a literal member
        if b == b']' && !first {
            break;
        }
        first = false;

        let lo = if b == b'\\' {
            i += 1;
            *class.get(i)?
        } else {
            b
        };
        i += 1;

        let is_range =
            class.get(i) == Some(&b'-') && class.get(i + 1).is_some_and(|&n| n != b']');
        if is_range {
            i += 1;
            let mut hi = class[i];
            if hi == b'\\' {
                i += 1;
                hi = *class.get(i)?;
            }
            i += 1;

            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            if (lo..=hi).contains(&c) {
                matched = true;
            }
        } else if lo == c {
            matched = true;
        }
    }

    Some((matched != negate, i + 1))
}
