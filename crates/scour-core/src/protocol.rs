//! The textual tool-call protocol between the model and the agent.
//!
//! An assistant turn may embed at most one honored call:
//!
//! ````text
//! ```tool_code
//! search(query="rust async book", k=5)
//! ```
//! ````
//!
//! Observations travel back inside a `` ```tool_output `` fence so the model can
//! tell returned data apart from its own historical calls.

use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result, SearchHit};

pub const TOOL_CODE_MARKER: &str = "```tool_code";
pub const TOOL_OUTPUT_MARKER: &str = "```tool_output";
const FENCE: &str = "```";

/// Returns the raw payload of the first well-formed tool_code block, or
/// `None` when the turn is a plain natural-language reply. A second block in
/// the same turn is ignored; an opening marker with no closing fence counts
/// as no call.
pub fn extract_tool_call(text: &str) -> Option<&str> {
    let start = text.find(TOOL_CODE_MARKER)? + TOOL_CODE_MARKER.len();
    let rest = &text[start..];
    let end = rest.find(FENCE)?;
    let payload = rest[..end].trim();
    (!payload.is_empty()).then_some(payload)
}

/// Wraps an observation (or a tool error description) for the transcript.
pub fn fence_observation(text: &str) -> String {
    format!("{}\n{}\n{}", TOOL_OUTPUT_MARKER, text.trim_end(), FENCE)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ArgValue::Int(n) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Int(n) => Some(*n as f64),
            ArgValue::Float(f) => Some(*f),
            ArgValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(n) => write!(f, "{n}"),
            ArgValue::Float(x) => write!(f, "{x}"),
            ArgValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: BTreeMap<String, ArgValue>,
}

impl ToolCall {
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(ArgValue::as_str)
    }

    pub fn usize_arg(&self, key: &str) -> Option<usize> {
        self.args.get(key).and_then(ArgValue::as_usize)
    }
}

/// Parses `name(key=value, ...)` into a typed call.
///
/// The grammar is a small hand-written scanner, not a comma-split heuristic:
/// quoted strings (single or double) may contain commas and backslash-escaped
/// quotes, integers may be negative, and a float carries exactly one dot.
/// Anything else is a `Parse` error that the loop treats as "no call".
pub fn parse_tool_call(payload: &str) -> Result<ToolCall> {
    let s = payload.trim();
    let open = s
        .find('(')
        .ok_or_else(|| Error::Parse("missing '(' in call".to_string()))?;
    let name = s[..open].trim();
    if !is_identifier(name) {
        return Err(Error::Parse(format!("bad function name: {name:?}")));
    }
    let close = s
        .rfind(')')
        .ok_or_else(|| Error::Parse("missing ')' in call".to_string()))?;
    if close < open {
        return Err(Error::Parse("')' before '(' in call".to_string()));
    }
    if !s[close + ')'.len_utf8()..].trim().is_empty() {
        return Err(Error::Parse("trailing text after ')'".to_string()));
    }

    let mut scanner = Scanner::new(&s[open + 1..close]);
    let mut args = BTreeMap::new();
    scanner.skip_ws();
    while !scanner.at_end() {
        let key = scanner.identifier()?;
        scanner.skip_ws();
        scanner.expect('=')?;
        scanner.skip_ws();
        let value = scanner.value()?;
        args.insert(key, value);
        scanner.skip_ws();
        if scanner.at_end() {
            break;
        }
        scanner.expect(',')?;
        scanner.skip_ws();
        if scanner.at_end() {
            return Err(Error::Parse("trailing ',' in argument list".to_string()));
        }
    }

    Ok(ToolCall {
        name: name.to_string(),
        args,
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(b) if b == want as u8 => Ok(()),
            Some(b) => Err(Error::Parse(format!(
                "expected {want:?}, found {:?}",
                b as char
            ))),
            None => Err(Error::Parse(format!("expected {want:?}, found end of call"))),
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::Parse("expected an argument name".to_string()));
        }
        // Scanner only advances over ASCII here, so the slice is valid UTF-8.
        let ident = String::from_utf8_lossy(&self.src[start..self.pos]).to_string();
        if !is_identifier(&ident) {
            return Err(Error::Parse(format!("bad argument name: {ident:?}")));
        }
        Ok(ident)
    }

    fn value(&mut self) -> Result<ArgValue> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.quoted(q),
            Some(_) => self.bare(),
            None => Err(Error::Parse("expected a value, found end of call".to_string())),
        }
    }

    fn quoted(&mut self, quote: u8) -> Result<ArgValue> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();
        loop {
            match self.bump() {
                Some(b'\\') => match self.bump() {
                    // Only quotes and backslashes unescape; any other pair
                    // is kept verbatim, backslash included.
                    Some(esc @ (b'"' | b'\'' | b'\\')) => out.push(esc),
                    Some(other) => {
                        out.push(b'\\');
                        out.push(other);
                    }
                    None => return Err(Error::Parse("dangling escape in string".to_string())),
                },
                Some(b) if b == quote => {
                    let s = String::from_utf8(out)
                        .map_err(|_| Error::Parse("string literal is not UTF-8".to_string()))?;
                    return Ok(ArgValue::Str(s));
                }
                Some(b) => out.push(b),
                None => return Err(Error::Parse("unterminated string literal".to_string())),
            }
        }
    }

    /// Unquoted token up to the next top-level ',' (or end). Numeric tokens
    /// become `Int`/`Float`; anything else is kept as a raw string, matching
    /// the best-effort coercion contract.
    fn bare(&mut self) -> Result<ArgValue> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b != b',') {
            self.pos += 1;
        }
        let raw = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| Error::Parse("value is not UTF-8".to_string()))?
            .trim();
        if raw.is_empty() {
            return Err(Error::Parse("empty argument value".to_string()));
        }
        if let Some(v) = classify_number(raw) {
            return Ok(v);
        }
        Ok(ArgValue::Str(raw.to_string()))
    }
}

fn classify_number(raw: &str) -> Option<ArgValue> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() {
        return None;
    }
    let dots = digits.matches('.').count();
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') || dots > 1 {
        return None;
    }
    if dots == 0 {
        return raw.parse::<i64>().ok().map(ArgValue::Int);
    }
    // Exactly one dot; reject degenerate "." / "-." forms.
    if digits.chars().all(|c| c == '.') {
        return None;
    }
    raw.parse::<f64>().ok().map(ArgValue::Float)
}

/// Renders a result set the way the model is taught to read it:
/// `【rank†title†url\nsnippet】` blocks separated by blank lines, with
/// `authors:` / `published:` lines when the academic variant supplies them.
pub fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| {
            let mut block = format!("【{}†{}†{}\n{}", h.rank, h.title, h.url, h.snippet);
            if !h.authors.is_empty() {
                block.push_str("\nauthors: ");
                block.push_str(&h.authors.join(", "));
            }
            if let Some(p) = &h.published {
                block.push_str("\npublished: ");
                block.push_str(p);
            }
            block.push('】');
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_block_only() {
        let text = "thinking...\n```tool_code\nsearch(query=\"x\")\n```\nand\n```tool_code\nopen(url=\"y\")\n```";
        assert_eq!(extract_tool_call(text), Some("search(query=\"x\")"));
    }

    #[test]
    fn no_fence_means_no_call() {
        assert_eq!(extract_tool_call("just prose, no tools"), None);
        assert_eq!(extract_tool_call(""), None);
    }

    #[test]
    fn unterminated_fence_means_no_call() {
        assert_eq!(extract_tool_call("```tool_code\nfinish()"), None);
    }

    #[test]
    fn empty_block_means_no_call() {
        assert_eq!(extract_tool_call("```tool_code\n\n```"), None);
    }

    #[test]
    fn round_trips_simple_literals() {
        let call = parse_tool_call(r#"search(query="robotics", k=5)"#).unwrap();
        assert_eq!(call.name, "search");
        assert_eq!(call.str_arg("query"), Some("robotics"));
        assert_eq!(call.args["k"], ArgValue::Int(5));
    }

    #[test]
    fn parses_no_arg_calls() {
        let call = parse_tool_call("finish()").unwrap();
        assert_eq!(call.name, "finish");
        assert!(call.args.is_empty());

        let spaced = parse_tool_call("  finish( )  ").unwrap();
        assert_eq!(spaced.name, "finish");
    }

    #[test]
    fn quoted_strings_may_contain_commas_and_escapes() {
        let call = parse_tool_call(r#"search(query="tokio, async, and you", k=3)"#).unwrap();
        assert_eq!(call.str_arg("query"), Some("tokio, async, and you"));

        let esc = parse_tool_call(r#"search(query="he said \"go\"")"#).unwrap();
        assert_eq!(esc.str_arg("query"), Some(r#"he said "go""#));

        let single = parse_tool_call("open(url='https://example.com/a,b')").unwrap();
        assert_eq!(single.str_arg("url"), Some("https://example.com/a,b"));
    }

    #[test]
    fn unrecognized_escapes_keep_their_backslash() {
        let call = parse_tool_call(r#"search(query="a\nb")"#).unwrap();
        assert_eq!(call.str_arg("query"), Some(r"a\nb"));

        let call = parse_tool_call(r#"open(url="C:\\temp\\x")"#).unwrap();
        assert_eq!(call.str_arg("url"), Some(r"C:\temp\x"));
    }

    #[test]
    fn numbers_are_typed() {
        let call = parse_tool_call("f(a=7, b=-2, c=0.5, d=-1.25)").unwrap();
        assert_eq!(call.args["a"], ArgValue::Int(7));
        assert_eq!(call.args["b"], ArgValue::Int(-2));
        assert_eq!(call.args["c"], ArgValue::Float(0.5));
        assert_eq!(call.args["d"], ArgValue::Float(-1.25));
    }

    #[test]
    fn bare_words_stay_raw_strings() {
        let call = parse_tool_call("f(a=hello, b=1.2.3)").unwrap();
        assert_eq!(call.args["a"], ArgValue::Str("hello".into()));
        // Multi-dot values are not floats; keep the raw text.
        assert_eq!(call.args["b"], ArgValue::Str("1.2.3".into()));
    }

    #[test]
    fn rejects_malformed_calls() {
        for bad in [
            "",
            "search",
            "search(",
            "search)q(",
            "search(query=)",
            "search(query=\"x\", )",
            "search(=5)",
            "search(k=5) trailing",
            "search(query=\"unterminated)",
            "123(a=1)",
        ] {
            assert!(parse_tool_call(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn usize_arg_rejects_negative_and_non_int() {
        let call = parse_tool_call("click(rank=-1)").unwrap();
        assert_eq!(call.usize_arg("rank"), None);
        let call = parse_tool_call("click(rank=1.5)").unwrap();
        assert_eq!(call.usize_arg("rank"), None);
    }

    #[test]
    fn fenced_observation_shape() {
        let got = fence_observation("hello\n");
        assert_eq!(got, "```tool_output\nhello\n```");
    }

    #[test]
    fn renders_hits_with_separators() {
        let hits = vec![
            crate::SearchHit::web(0, "A", "https://a.example", "first"),
            crate::SearchHit::web(1, "B", "https://b.example", "second"),
        ];
        let out = render_hits(&hits);
        assert_eq!(
            out,
            "【0†A†https://a.example\nfirst】\n\n【1†B†https://b.example\nsecond】"
        );
    }

    #[test]
    fn renders_academic_extras() {
        let mut h = crate::SearchHit::web(0, "Paper", "https://arxiv.org/abs/1", "abstract");
        h.authors = vec!["Ada".into(), "Grace".into()];
        h.published = Some("2024-01-02".into());
        let out = render_hits(std::slice::from_ref(&h));
        assert!(out.contains("\nauthors: Ada, Grace"));
        assert!(out.contains("\npublished: 2024-01-02"));
        assert!(out.ends_with('】'));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parser_never_panics(payload in ".{0,200}") {
                let _ = parse_tool_call(&payload);
            }

            #[test]
            fn well_formed_int_calls_round_trip(k in 0i64..10_000) {
                let call = parse_tool_call(&format!("search(k={k})")).unwrap();
                prop_assert_eq!(call.args["k"].clone(), ArgValue::Int(k));
            }

            #[test]
            fn quoted_values_round_trip(s in "[a-zA-Z0-9 ,._:/-]{0,60}") {
                let call = parse_tool_call(&format!("open(url=\"{s}\")")).unwrap();
                prop_assert_eq!(call.str_arg("url"), Some(s.as_str()));
            }
        }
    }
}
