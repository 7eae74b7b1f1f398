//! Path patterns
//!
//! A pattern is an exact path or a glob over paths:
//! - `?` matches exactly one character
//! - `[abc]` matches one character out of the listed set
//! - `*` matches any run of characters, including the empty one
//!
//! Every other character matches itself. Matching is anchored at both ends and
//! works on Unicode scalar values, not bytes.

use crate::MorphError;

/// Pattern classification, decided once at registration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// No metacharacters; eligible for hash lookup
    Exact,
    /// `?` and `[...]` only; a candidate must have the same length
    Fixed,
    /// Contains `*`
    Glob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Char(char),
    AnyOne,
    Class(Vec<char>),
    AnyRun,
}

impl Token {
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Char(expected) => *expected == c,
            Token::AnyOne => true,
            Token::Class(set) => set.contains(&c),
            Token::AnyRun => true,
        }
    }
}

/// Compiled path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    tokens: Vec<Token>,
}

impl Pattern {
    /// Compile a pattern, rejecting empty patterns and malformed classes
    pub fn parse(source: &str) -> Result<Self, MorphError> {
        if source.is_empty() {
            return Err(MorphError::invalid_pattern(source, "pattern must not be empty"));
        }

        let mut tokens = Vec::with_capacity(source.len());
        let mut kind = PatternKind::Exact;
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    tokens.push(Token::AnyOne);
                    kind = kind.max_with(PatternKind::Fixed);
                }
                '*' => {
                    // Consecutive stars collapse into one
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                    kind = PatternKind::Glob;
                }
                '[' => {
                    let mut set = Vec::new();
                    let mut closed = false;
                    for member in chars.by_ref() {
                        if member == ']' {
                            closed = true;
                            break;
                        }
                        set.push(member);
                    }
                    if !closed {
                        return Err(MorphError::invalid_pattern(
                            source,
                            "unterminated character class",
                        ));
                    }
                    if set.is_empty() {
                        return Err(MorphError::invalid_pattern(source, "empty character class"));
                    }
                    tokens.push(Token::Class(set));
                    kind = kind.max_with(PatternKind::Fixed);
                }
                other => tokens.push(Token::Char(other)),
            }
        }

        Ok(Self {
            source: source.to_string(),
            kind,
            tokens,
        })
    }

    /// Pattern text as registered
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn is_exact(&self) -> bool {
        self.kind == PatternKind::Exact
    }

    /// Whether the whole `path` is matched by the whole pattern
    pub fn matches(&self, path: &str) -> bool {
        match self.kind {
            PatternKind::Exact => self.source == path,
            PatternKind::Fixed => {
                let mut candidate = path.chars();
                for token in &self.tokens {
                    match candidate.next() {
                        Some(c) if token.accepts(c) => {}
                        _ => return false,
                    }
                }
                candidate.next().is_none()
            }
            PatternKind::Glob => {
                let candidate: Vec<char> = path.chars().collect();
                glob_match(&self.tokens, &candidate)
            }
        }
    }
}

impl PatternKind {
    fn max_with(self, other: PatternKind) -> PatternKind {
        match (self, other) {
            (PatternKind::Glob, _) | (_, PatternKind::Glob) => PatternKind::Glob,
            (PatternKind::Fixed, _) | (_, PatternKind::Fixed) => PatternKind::Fixed,
            _ => PatternKind::Exact,
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Iterative glob match with single-star backtracking
fn glob_match(tokens: &[Token], candidate: &[char]) -> bool {
    let (mut t, mut c) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match tokens.get(t) {
            Some(Token::AnyRun) => {
                backtrack = Some((t, c));
                t += 1;
            }
            Some(token) if token.accepts(candidate[c]) => {
                t += 1;
                c += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    t = star + 1;
                    c = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|token| *token == Token::AnyRun)
}
