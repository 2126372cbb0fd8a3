//! Identifier case mapping between dialect `snake_case` and Go `camelCase`.
//!
//! Disabled unless a [`CaseConfig`] says otherwise; the config is passed to
//! every call so units can use different settings side by side.
//!
//! The inverse mapping is lossy: it always yields lowercase words joined by
//! `_`, so the export distinction of the host name is discarded.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Initialisms written all-caps in host names.
pub const ACRONYMS: &[&str] = &[
    "ACL", "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID", "IP",
    "JSON", "LHS", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL",
    "UDP", "UI", "UID", "UUID", "URI", "URL", "UTF8", "VM", "XML", "XMPP", "XSRF", "XSS",
];

/// Go keywords and predeclared identifiers. Never renamed.
const RESERVED: &[&str] = &[
    // keywords
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
    // constants and zero value
    "true", "false", "iota", "nil",
    // types
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32",
    "float64", "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr",
    // builtin functions
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max",
    "min", "new", "panic", "print", "println", "real", "recover",
    // intrinsics
    "clone", "free", "grow",
];

/// Case mapping settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaseConfig {
    /// Rename identifiers to host case when transpiling.
    pub enabled: bool,
    /// Names left untouched in both directions.
    pub exceptions: BTreeSet<String>,
}

impl CaseConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            exceptions: BTreeSet::new(),
        }
    }

    pub fn with_exception(mut self, name: impl Into<String>) -> Self {
        self.exceptions.insert(name.into());
        self
    }

    fn leaves_alone(&self, name: &str) -> bool {
        !self.enabled
            || name == "_"
            || name.chars().count() < 2
            || is_reserved(name)
            || self.exceptions.contains(name)
    }
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

fn acronym(word: &str) -> Option<&'static str> {
    ACRONYMS
        .iter()
        .copied()
        .find(|a| a.eq_ignore_ascii_case(word))
}

/// Dialect name to host name: `user_id` -> `userID`, `Http_server` -> `HTTPServer`.
pub fn to_host_case(name: &str, config: &CaseConfig) -> String {
    if config.leaves_alone(name) || !name.contains('_') {
        return name.to_string();
    }

    let core = name.trim_matches('_');
    if core.is_empty() {
        return name.to_string();
    }
    let leading = &name[..name.len() - name.trim_start_matches('_').len()];
    let trailing = &name[name.trim_end_matches('_').len()..];

    let mut out = String::with_capacity(name.len());
    out.push_str(leading);
    for (i, segment) in core.split('_').filter(|s| !s.is_empty()).enumerate() {
        let head = i == 0;
        match acronym(segment) {
            // An acronym heading a lowercase name stays lowercase.
            Some(_) if head && starts_lower(segment) => out.push_str(&segment.to_ascii_lowercase()),
            Some(a) => out.push_str(a),
            None if head => out.push_str(segment),
            None => out.push_str(&capitalize(segment)),
        }
    }
    out.push_str(trailing);
    out
}

/// Host name to dialect name: `userID` -> `user_id`, `HTTPServer` -> `http_server`.
///
/// Lossy: the result is always lowercase.
pub fn to_dialect_case(name: &str, config: &CaseConfig) -> String {
    if config.leaves_alone(name) {
        return name.to_string();
    }

    let core = name.trim_matches('_');
    if core.is_empty() {
        return name.to_string();
    }
    let leading = &name[..name.len() - name.trim_start_matches('_').len()];
    let trailing = &name[name.trim_end_matches('_').len()..];

    let words: Vec<String> = core
        .split('_')
        .filter(|s| !s.is_empty())
        .flat_map(split_words)
        .map(|w| w.to_lowercase())
        .collect();
    format!("{leading}{}{trailing}", words.join("_"))
}

fn starts_lower(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_lowercase())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split one underscore-free run on case boundaries, then break uppercase
/// runs into known acronyms.
fn split_words(run: &str) -> Vec<String> {
    let chars: Vec<char> = run.chars().collect();
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            None => false,
            Some(p) => {
                (c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()))
                    // `HTTPServer`: the `S` starts a new word.
                    || (c.is_uppercase() && p.is_uppercase() && next.is_some_and(char::is_lowercase))
            }
        };
        if boundary && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
        .into_iter()
        .flat_map(|piece| {
            let upper_run = piece.chars().all(|c| c.is_uppercase() || c.is_ascii_digit())
                && piece.chars().count() > 1;
            match upper_run.then(|| split_acronyms(&piece)).flatten() {
                Some(parts) => parts,
                None => vec![piece],
            }
        })
        .collect()
}

/// Decompose an all-caps run into acronyms, longest first, backtracking.
fn split_acronyms(run: &str) -> Option<Vec<String>> {
    if run.is_empty() {
        return Some(Vec::new());
    }
    let mut candidates: Vec<&str> = ACRONYMS
        .iter()
        .copied()
        .filter(|a| run.starts_with(a))
        .collect();
    candidates.sort_by_key(|a| std::cmp::Reverse(a.len()));
    candidates.into_iter().find_map(|a| {
        let mut rest = split_acronyms(&run[a.len()..])?;
        rest.insert(0, a.to_string());
        Some(rest)
    })
}

/// Rename identifier tokens inside Go type text, skipping package qualifiers
/// and selected names.
pub fn map_type_text(text: &str, config: &CaseConfig) -> String {
    if !config.enabled {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let c = bytes[i];
        if c == b'_' || c.is_ascii_alphabetic() {
            let start = i;
            while i < text.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let word = &text[start..i];
            let qualified = bytes.get(i) == Some(&b'.') || (start > 0 && bytes[start - 1] == b'.');
            if qualified {
                out.push_str(word);
            } else {
                out.push_str(&to_host_case(word, config));
            }
        } else {
            let len = text[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&text[i..i + len]);
            i += len;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn on() -> CaseConfig {
        CaseConfig::enabled()
    }

    #[test]
    fn test_disabled_by_default() {
        let config = CaseConfig::default();
        assert_eq!(to_host_case("user_id", &config), "user_id");
        assert_eq!(to_dialect_case("userID", &config), "userID");
    }

    #[test]
    fn test_to_host_case() {
        let c = on();
        assert_eq!(to_host_case("myVar", &c), "myVar");
        assert_eq!(to_host_case("my_var", &c), "myVar");
        assert_eq!(to_host_case("user_id", &c), "userID");
        assert_eq!(to_host_case("Http_server", &c), "HTTPServer");
        assert_eq!(to_host_case("http_server", &c), "httpServer");
        assert_eq!(to_host_case("parse_json_url", &c), "parseJSONURL");
        assert_eq!(to_host_case("_private_name", &c), "_privateName");
        assert_eq!(to_host_case("New_reader", &c), "NewReader");
    }

    #[test]
    fn test_untouched_names() {
        let c = on().with_exception("keep_me");
        for name in ["_", "x", "nil", "iota", "true", "uint64", "append", "keep_me", "__"] {
            assert_eq!(to_host_case(name, &c), name);
        }
    }

    #[test]
    fn test_to_dialect_case() {
        let c = on();
        assert_eq!(to_dialect_case("userID", &c), "user_id");
        assert_eq!(to_dialect_case("HTTPServer", &c), "http_server");
        assert_eq!(to_dialect_case("parseJSONURL", &c), "parse_json_url");
        assert_eq!(to_dialect_case("NewReader", &c), "new_reader");
        assert_eq!(to_dialect_case("utf8Decode", &c), "utf8_decode");
    }

    #[test]
    fn test_map_type_text() {
        let c = on();
        assert_eq!(
            map_type_text("map[string]*my_type", &c),
            "map[string]*myType"
        );
        assert_eq!(map_type_text("[]pkg.some_type", &c), "[]pkg.some_type");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{1,6}".prop_filter("acronym", |s| acronym(s).is_none())
    }

    proptest! {
        #[test]
        fn dialect_host_round_trip(segments in prop::collection::vec(segment(), 1..5)) {
            let c = on();
            let name = segments.join("_");
            prop_assert_eq!(to_dialect_case(&to_host_case(&name, &c), &c), name);
        }

        #[test]
        fn host_case_idempotent(segments in prop::collection::vec(segment(), 1..5)) {
            let c = on();
            let host = to_host_case(&segments.join("_"), &c);
            prop_assert_eq!(to_host_case(&host, &c), host.clone());
        }
    }
}
