//! Reserved keys and markers of the dispatch engine

/// Fallback for literals whose path matched nothing
pub const ELSE: &str = "_else";

/// Fallback that re-opens unmatched entities in the output
pub const ELSE_NESTED: &str = "_elseNested";

/// Fallback that forwards unmatched entity content as flat paths
pub const ELSE_FLATTENED: &str = "_elseFlattened";

/// All fallback keywords, in precedence order
pub const FALLBACK_KEYS: [&str; 3] = [ELSE, ELSE_NESTED, ELSE_FLATTENED];

/// Key under which the record id is dispatched at record start
pub const RECORD_ID: &str = "_id";

/// Flush trigger key bound to record end
pub const RECORD_FLUSH: &str = "record";

/// Prefix marking an emitted name for re-dispatch
pub const FEEDBACK_CHAR: char = '@';

/// Escape for names that begin with the feedback marker
pub const ESCAPE_CHAR: char = '\\';

/// Separator of key alternatives (`a|b`)
pub const ALTERNATION: char = '|';

/// Default entity separator of paths
pub const DEFAULT_SEPARATOR: &str = ".";

/// Lookup table key returned for absent keys
pub const DEFAULT_MAP_KEY: &str = "__default";

/// Whether `key` is one of the fallback keywords
pub fn is_fallback_key(key: &str) -> bool {
    FALLBACK_KEYS.contains(&key)
}

/// Split `a|b|c` into its trimmed alternatives
pub fn split_alternatives(key: &str) -> Vec<&str> {
    key.split(ALTERNATION).map(str::trim).collect()
}

/// Escape a name so it passes through feedback handling as a plain literal
pub fn escape_feedback(name: &str) -> String {
    if name.starts_with(FEEDBACK_CHAR) || name.starts_with(ESCAPE_CHAR) {
        let mut escaped = String::with_capacity(name.len() + 1);
        escaped.push(ESCAPE_CHAR);
        escaped.push_str(name);
        escaped
    } else {
        name.to_string()
    }
}

/// Remove one leading escape from `\@...` or `\\...`
pub fn unescape_feedback(name: &str) -> &str {
    let mut chars = name.chars();
    if chars.next() == Some(ESCAPE_CHAR) {
        if let Some(next) = chars.next() {
            if next == FEEDBACK_CHAR || next == ESCAPE_CHAR {
                return &name[ESCAPE_CHAR.len_utf8()..];
            }
        }
    }
    name
}
