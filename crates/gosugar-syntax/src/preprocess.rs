//! Text-level rewriting of dialect forms the Go grammar rejects.
//!
//! ```text
//!   &chan T{n}          ->  __sugar_chan[T]{n}
//!   &chan<- T{n}        ->  __sugar_chan_send[T]{n}
//!   &<-chan T{n}        ->  __sugar_chan_recv[T]{n}
//!   (*[]T)(b)           ->  __sugar_cast[T](b)
//!   (*[]T, Order)(b)    ->  __sugar_cast[T, Order](b)
//! ```
//!
//! The placeholders parse as generic composite literals and generic calls.
//! Every substitution is recorded with its raw and rewritten byte ranges so
//! positions in the parsed tree map back into the user's text.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

/// Common prefix of every placeholder identifier.
pub const PLACEHOLDER_PREFIX: &str = "__sugar_";

const CHAN_BOTH: &str = "__sugar_chan";
const CHAN_SEND: &str = "__sugar_chan_send";
const CHAN_RECV: &str = "__sugar_chan_recv";
const CAST: &str = "__sugar_cast";

static CHAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?P<dir><-\s*chan\b|chan\s*<-|chan\b)\s*(?P<elem>[^{}\s][^{}\n]*?)\s*\{")
        .unwrap_or_else(|e| panic!("channel literal pattern: {e}"))
});

static CAST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\(\s*\*\s*\[\]\s*(?P<elem>[^(){},\n]+?)\s*(?:,\s*(?P<order>[A-Za-z_][\w.]*)\s*)?\)\s*\(",
    )
    .unwrap_or_else(|e| panic!("coercion pattern: {e}"))
});

/// Channel direction of a channel literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

impl ChanDir {
    /// Go type text for a channel of `elem` in this direction.
    pub fn type_text(&self, elem: &str) -> String {
        match self {
            ChanDir::Both => format!("chan {elem}"),
            ChanDir::Send => format!("chan<- {elem}"),
            ChanDir::Recv => format!("<-chan {elem}"),
        }
    }

    fn placeholder_name(&self) -> &'static str {
        match self {
            ChanDir::Both => CHAN_BOTH,
            ChanDir::Send => CHAN_SEND,
            ChanDir::Recv => CHAN_RECV,
        }
    }
}

/// A dialect construct captured by the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum Sugar {
    Chan { dir: ChanDir, elem: String },
    Cast { elem: String, order: Option<String> },
}

impl Sugar {
    /// Text written in place of the construct.
    pub fn placeholder(&self) -> String {
        match self {
            Sugar::Chan { dir, elem } => format!("{}[{elem}]", dir.placeholder_name()),
            Sugar::Cast { elem, order: None } => format!("{CAST}[{elem}]"),
            Sugar::Cast {
                elem,
                order: Some(order),
            } => format!("{CAST}[{elem}, {order}]"),
        }
    }

    /// Text as the user would write it.
    pub fn surface(&self) -> String {
        match self {
            Sugar::Chan { dir, elem } => format!("&{}", dir.type_text(elem)),
            Sugar::Cast { elem, order: None } => format!("(*[]{elem})"),
            Sugar::Cast {
                elem,
                order: Some(order),
            } => format!("(*[]{elem}, {order})"),
        }
    }
}

/// One placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub sugar: Sugar,
    /// Byte range replaced in the raw text.
    pub original: Range<usize>,
    /// Byte range of the placeholder in the rewritten text.
    pub rewritten: Range<usize>,
}

/// Result of [`rewrite`]: parseable text plus the map back to raw offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub text: String,
    pub substitutions: Vec<Substitution>,
}

impl Preprocessed {
    /// The substitution whose placeholder covers `offset` in rewritten text.
    pub fn substitution_at(&self, offset: usize) -> Option<(usize, &Substitution)> {
        let idx = self
            .substitutions
            .partition_point(|s| s.rewritten.end <= offset);
        let sub = self.substitutions.get(idx)?;
        sub.rewritten.contains(&offset).then_some((idx, sub))
    }

    /// Map a rewritten-text offset to the raw text.
    ///
    /// Offsets inside a placeholder map to the start of the construct.
    pub fn to_original(&self, offset: usize) -> usize {
        let idx = self
            .substitutions
            .partition_point(|s| s.rewritten.start <= offset);
        if idx == 0 {
            return offset;
        }
        let sub = &self.substitutions[idx - 1];
        if offset < sub.rewritten.end {
            sub.original.start
        } else {
            sub.original.end + (offset - sub.rewritten.end)
        }
    }

    pub fn to_original_range(&self, range: Range<usize>) -> Range<usize> {
        let start = self.to_original(range.start);
        let end = if range.end > range.start {
            // Map the last byte so a node ending at a placeholder keeps its width.
            match self.substitution_at(range.end - 1) {
                Some((_, sub)) => sub.original.end,
                None => self.to_original(range.end),
            }
        } else {
            start
        };
        start..end.max(start)
    }
}

/// Rewrite every dialect construct outside literals and comments.
pub fn rewrite(text: &str) -> Preprocessed {
    let skipped = literal_ranges(text);
    let inside_literal = |offset: usize| {
        let idx = skipped.partition_point(|r| r.end <= offset);
        skipped.get(idx).is_some_and(|r| r.contains(&offset))
    };

    let mut found: Vec<(Range<usize>, Sugar)> = Vec::new();

    for caps in CHAN_RE.captures_iter(text) {
        let (Some(whole), Some(dir), Some(elem)) = (caps.get(0), caps.name("dir"), caps.name("elem"))
        else {
            continue;
        };
        if inside_literal(whole.start()) {
            continue;
        }
        let dir_text = dir.as_str();
        let dir = if dir_text.starts_with("<-") {
            ChanDir::Recv
        } else if dir_text.ends_with("<-") {
            ChanDir::Send
        } else {
            ChanDir::Both
        };
        // Leave the opening brace in place.
        found.push((
            whole.start()..whole.end() - 1,
            Sugar::Chan {
                dir,
                elem: elem.as_str().trim().to_string(),
            },
        ));
    }

    for caps in CAST_RE.captures_iter(text) {
        let (Some(whole), Some(elem)) = (caps.get(0), caps.name("elem")) else {
            continue;
        };
        if inside_literal(whole.start()) {
            continue;
        }
        let order = caps.name("order").map(|m| m.as_str().to_string());
        // Leave the argument's opening paren in place.
        found.push((
            whole.start()..whole.end() - 1,
            Sugar::Cast {
                elem: elem.as_str().trim().to_string(),
                order,
            },
        ));
    }

    found.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(text.len() + found.len() * 16);
    let mut substitutions = Vec::with_capacity(found.len());
    let mut cursor = 0;
    for (range, sugar) in found {
        if range.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..range.start]);
        let placeholder = sugar.placeholder();
        let start = out.len();
        out.push_str(&placeholder);
        substitutions.push(Substitution {
            sugar,
            original: range.clone(),
            rewritten: start..out.len(),
        });
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);

    tracing::debug!(substitutions = substitutions.len(), "preprocessed");

    Preprocessed {
        text: out,
        substitutions,
    }
}

/// Replace placeholder tokens in `text` with the surface syntax they stand for.
pub fn restore(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(PLACEHOLDER_PREFIX) {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        match restore_one(tail) {
            Some((surface, consumed)) => {
                out.push_str(&surface);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(PLACEHOLDER_PREFIX);
                rest = &tail[PLACEHOLDER_PREFIX.len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Restore one placeholder at the start of `text`; returns the surface text
/// and the number of bytes consumed.
fn restore_one(text: &str) -> Option<(String, usize)> {
    // Longest names first so `__sugar_chan` does not shadow its variants.
    let (name, kind) = [
        (CHAN_SEND, Some(ChanDir::Send)),
        (CHAN_RECV, Some(ChanDir::Recv)),
        (CHAN_BOTH, Some(ChanDir::Both)),
        (CAST, None),
    ]
    .into_iter()
    .find(|(name, _)| {
        text.strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('['))
    })?;

    let open = name.len();
    let close = matching_bracket(text, open)?;
    let inner = text[open + 1..close].trim();
    let sugar = match kind {
        Some(dir) => Sugar::Chan {
            dir,
            elem: inner.to_string(),
        },
        None => match split_top_level_comma(inner) {
            Some((elem, order)) => Sugar::Cast {
                elem: elem.trim().to_string(),
                order: Some(order.trim().to_string()),
            },
            None => Sugar::Cast {
                elem: inner.to_string(),
                order: None,
            },
        },
    };
    Some((sugar.surface(), close + 1))
}

fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (c == ']').then_some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level_comma(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut split = None;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            ',' if depth == 0 => split = Some(i),
            _ => {}
        }
    }
    split.map(|i| (&text[..i], &text[i + 1..]))
}

/// Byte ranges of string literals, rune literals and comments, in order.
pub fn literal_ranges(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                ranges.push(start..i);
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                ranges.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                ranges.push(start..i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                ranges.push(start..i);
            }
            _ => i += 1,
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_literals() {
        let pre = rewrite("a := &chan int{}\nb := &chan<- string{4}\nc := &<-chan []byte{n}\n");
        assert_eq!(
            pre.text,
            "a := __sugar_chan[int]{}\nb := __sugar_chan_send[string]{4}\nc := __sugar_chan_recv[[]byte]{n}\n"
        );
        assert_eq!(pre.substitutions.len(), 3);
        assert_eq!(
            pre.substitutions[1].sugar,
            Sugar::Chan {
                dir: ChanDir::Send,
                elem: "string".into()
            }
        );
    }

    #[test]
    fn test_coercions() {
        let pre = rewrite("v := (*[]uint32)(buf)\nw := (*[]int16, binary.BigEndian)(raw)");
        assert_eq!(
            pre.text,
            "v := __sugar_cast[uint32](buf)\nw := __sugar_cast[int16, binary.BigEndian](raw)"
        );
        assert_eq!(
            pre.substitutions[1].sugar,
            Sugar::Cast {
                elem: "int16".into(),
                order: Some("binary.BigEndian".into())
            }
        );
    }

    #[test]
    fn test_literals_and_comments_untouched() {
        let src = "s := \"&chan int{}\" // (*[]byte)(x)\n/* &chan T{} */ r := '&'";
        let pre = rewrite(src);
        assert_eq!(pre.text, src);
        assert!(pre.substitutions.is_empty());
    }

    #[test]
    fn test_offsets_map_back() {
        let src = "x := &chan int{2}; y := 1";
        let pre = rewrite(src);
        let y_rewritten = pre.text.find('y').unwrap();
        assert_eq!(pre.to_original(y_rewritten), src.find('y').unwrap());
        // Inside the placeholder maps to the `&`.
        assert_eq!(pre.to_original(pre.substitutions[0].rewritten.start + 3), 5);
        assert_eq!(pre.to_original(2), 2);
        assert!(pre.substitution_at(pre.substitutions[0].rewritten.start).is_some());
        assert!(pre.substitution_at(0).is_none());
    }

    #[test]
    fn test_restore() {
        assert_eq!(
            restore("unexpected `__sugar_chan_recv[map[string]int]`"),
            "unexpected `&<-chan map[string]int`"
        );
        assert_eq!(
            restore("__sugar_cast[[4]byte, LittleEndian](b)"),
            "(*[][4]byte, LittleEndian)(b)"
        );
        assert_eq!(restore("__sugar_other"), "__sugar_other");
    }

    #[test]
    fn test_restore_inverts_rewrite() {
        let src = "a := &chan int{1}; b := (*[]float64)(data)";
        assert_eq!(restore(&rewrite(src).text), src);
    }
}
