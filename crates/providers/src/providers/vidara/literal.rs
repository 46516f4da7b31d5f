//! Restricted parser for the inline `makePlayer({ ... })` data literal.
//!
//! The page response is semi-trusted, so the literal must never go through
//! a general-purpose evaluator. This is a small recursive-descent parser
//! over object/array/string/number/boolean/null literals, permissive about
//! the quirks the upstream emits: unquoted keys, single-quoted strings,
//! trailing commas.

use std::collections::BTreeMap;

use crate::extractor::error::ProviderError;

/// Tagged-variant value tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Captures the argument literal of `{call_name}({ ... })` from a page,
/// tracking string state so braces inside string literals do not terminate
/// the capture early.
pub fn extract_call_literal<'a>(page: &'a str, call_name: &str) -> Option<&'a str> {
    let call_pos = page.find(&format!("{call_name}("))?;
    let after_call = &page[call_pos..];
    let open = after_call.find('{')?;
    let body = &after_call[open..];

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse(input: &str) -> Result<Value, ProviderError> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
    };
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos != parser.input.len() {
        return Err(ProviderError::ParseFailure(format!(
            "trailing characters at offset {}",
            parser.pos
        )));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn fail(&self, what: &str) -> ProviderError {
        ProviderError::ParseFailure(format!("{what} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'/' if self.input.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                b'/' if self.input.get(self.pos + 1) == Some(&b'*') => {
                    self.pos += 2;
                    while self.pos < self.input.len() {
                        if self.input[self.pos] == b'*'
                            && self.input.get(self.pos + 1) == Some(&b'/')
                        {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, ProviderError> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') | Some(b'\'') => Ok(Value::String(self.parse_string()?)),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => self.parse_keyword(),
            None => Err(self.fail("unexpected end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<Value, ProviderError> {
        self.bump(); // '{'
        let mut map = BTreeMap::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                Some(b',') => {
                    // Tolerates leading and doubled commas.
                    self.bump();
                }
                Some(_) => {
                    let key = self.parse_key()?;
                    self.skip_ws();
                    if self.bump() != Some(b':') {
                        return Err(self.fail("expected ':' after object key"));
                    }
                    let value = self.parse_value()?;
                    map.insert(key, value);
                }
                None => return Err(self.fail("unterminated object")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, ProviderError> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                Some(b',') => {
                    self.bump();
                }
                Some(_) => items.push(self.parse_value()?),
                None => return Err(self.fail("unterminated array")),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, ProviderError> {
        match self.peek() {
            Some(b'"') | Some(b'\'') => self.parse_string(),
            Some(c) if c == b'_' || c == b'$' || c.is_ascii_alphanumeric() => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == b'_' || c == b'$' || c.is_ascii_alphanumeric() {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
            }
            _ => Err(self.fail("expected object key")),
        }
    }

    fn parse_string(&mut self) -> Result<String, ProviderError> {
        let quote = self.bump().ok_or_else(|| self.fail("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    Some(b'u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = self
                                .bump()
                                .and_then(|c| (c as char).to_digit(16))
                                .ok_or_else(|| self.fail("bad unicode escape"))?;
                            code = code * 16 + digit;
                        }
                        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    }
                    Some(c) => out.push(c as char),
                    None => return Err(self.fail("unterminated escape")),
                },
                Some(c) if c < 0x80 => out.push(c as char),
                Some(c) => {
                    // Reassemble a UTF-8 sequence that started at this byte.
                    let start = self.pos - 1;
                    let len = utf8_len(c);
                    let end = (start + len).min(self.input.len());
                    out.push_str(&String::from_utf8_lossy(&self.input[start..end]));
                    self.pos = end;
                }
                None => return Err(self.fail("unterminated string")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, ProviderError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'.' || c == b'e' || c == b'E' || c == b'+' || c == b'-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.fail("invalid number"))?;
        text.parse::<f64>()
            .map(Value::Number)
            .map_err(|_| self.fail("invalid number"))
    }

    fn parse_keyword(&mut self) -> Result<Value, ProviderError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.input[start..self.pos] {
            b"true" => Ok(Value::Bool(true)),
            b"false" => Ok(Value::Bool(false)),
            b"null" | b"undefined" => Ok(Value::Null),
            _ => Err(self.fail("unknown literal keyword")),
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_player_literal() {
        let value = parse(
            r#"{
                id: 17,
                autoplay: true,
                source: { hls: "https://cdn.example/hls/master.m3u8" },
                audio: { names: ["Original", 'Dub'], order: [1, 0] },
            }"#,
        )
        .unwrap();

        assert_eq!(value.get("id").and_then(Value::as_f64), Some(17.0));
        assert_eq!(value.get("autoplay"), Some(&Value::Bool(true)));
        let hls = value
            .get("source")
            .and_then(|s| s.get("hls"))
            .and_then(Value::as_str);
        assert_eq!(hls, Some("https://cdn.example/hls/master.m3u8"));
        let names = value
            .get("audio")
            .and_then(|a| a.get("names"))
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn braces_inside_strings_do_not_break_capture() {
        let page = r#"<script>makePlayer({title: "a {weird} title", n: 1});</script>"#;
        let literal = extract_call_literal(page, "makePlayer").unwrap();
        assert_eq!(literal, r#"{title: "a {weird} title", n: 1}"#);
        let value = parse(literal).unwrap();
        assert_eq!(
            value.get("title").and_then(Value::as_str),
            Some("a {weird} title")
        );
    }

    #[test]
    fn escaped_quotes_inside_strings_are_handled() {
        let page = r#"makePlayer({s: "quote \" and brace }"})"#;
        let literal = extract_call_literal(page, "makePlayer").unwrap();
        let value = parse(literal).unwrap();
        assert_eq!(
            value.get("s").and_then(Value::as_str),
            Some("quote \" and brace }")
        );
    }

    #[test]
    fn unicode_escapes_decode() {
        let value = parse(r#"{url: "a\u0026b\u003dc"}"#).unwrap();
        assert_eq!(value.get("url").and_then(Value::as_str), Some("a&b=c"));
    }

    #[test]
    fn keywords_and_numbers() {
        let value = parse(r#"{a: null, b: false, c: -12.5, d: undefined}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Null));
        assert_eq!(value.get("b"), Some(&Value::Bool(false)));
        assert_eq!(value.get("c").and_then(Value::as_f64), Some(-12.5));
        assert_eq!(value.get("d"), Some(&Value::Null));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("{key: }").is_err());
        assert!(parse("{key").is_err());
        assert!(parse("").is_err());
        assert!(parse("{a: 1} trailing").is_err());
    }

    #[test]
    fn no_code_execution_surface() {
        // Function calls and identifiers are rejected, not evaluated.
        assert!(parse(r#"{cb: alert(1)}"#).is_err());
        assert!(parse(r#"{cb: function() {}}"#).is_err());
    }
}
