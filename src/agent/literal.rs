//! Tokenizer and parser for dict-style literals written by the model.
//!
//! Accepts Python literal syntax (`{'a': 'b', 'n': 3, 'xs': ['x'], 'ok': True}`)
//! as well as JSON, and produces a `serde_json::Value`. Anything else is
//! rejected with `None`; the caller falls back to positional extraction.

use serde_json::{Map, Number, Value};

/// Deepest bracket nesting accepted before the input is rejected.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(char),
    Close(char),
    Colon,
    Comma,
    Str(String),
    Num(Number),
    Ident(String),
}

/// Parse `input` as a single literal value. Returns `None` on any syntax error
/// or trailing garbage.
pub fn parse_literal(input: &str) -> Option<Value> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if parser.pos == parser.tokens.len() {
        Some(value)
    } else {
        None
    }
}

/// Parse `input` as a literal and keep it only when it is a mapping.
pub fn parse_mapping(input: &str) -> Option<Map<String, Value>> {
    match parse_literal(input)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' | '[' | '(' => {
                chars.next();
                tokens.push(Token::Open(c));
            }
            '}' | ']' | ')' => {
                chars.next();
                tokens.push(Token::Close(c));
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                chars.next();
                tokens.push(Token::Str(read_string(&mut chars, c)?));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut raw = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || matches!(d, '.' | '-' | '+' | '_') {
                        raw.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(parse_number(&raw)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return None,
        }
    }

    Some(tokens)
}

fn read_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        let c = chars.next()?;
        if c == quote {
            return Some(out);
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '\n' => {}
            'u' => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            // Unknown escapes are kept verbatim.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let cleaned = raw.replace('_', "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = cleaned.parse::<f64>().ok()?;
    Number::from_f64(f)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn value(&mut self) -> Option<Value> {
        match self.advance()? {
            Token::Str(first) => {
                // Adjacent string literals concatenate: 'a' 'b' == 'ab'.
                let mut s = first;
                while let Some(Token::Str(more)) = self.peek() {
                    s.push_str(more);
                    self.pos += 1;
                }
                Some(Value::String(s))
            }
            Token::Num(n) => Some(Value::Number(n)),
            Token::Ident(ident) => match ident.as_str() {
                "True" | "true" => Some(Value::Bool(true)),
                "False" | "false" => Some(Value::Bool(false)),
                "None" | "null" => Some(Value::Null),
                _ => None,
            },
            Token::Open(open) => {
                if self.depth >= MAX_DEPTH {
                    return None;
                }
                self.depth += 1;
                let nested = match open {
                    '{' => self.mapping(),
                    '[' => self.sequence(']'),
                    _ => self.sequence(')'),
                };
                self.depth -= 1;
                nested
            }
            _ => None,
        }
    }

    fn sequence(&mut self, close: char) -> Option<Value> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&Token::Close(close)) {
                self.pos += 1;
                return Some(Value::Array(items));
            }
            items.push(self.value()?);
            match self.advance()? {
                Token::Comma => continue,
                Token::Close(c) if c == close => return Some(Value::Array(items)),
                _ => return None,
            }
        }
    }

    fn mapping(&mut self) -> Option<Value> {
        let mut map = Map::new();
        loop {
            if self.peek() == Some(&Token::Close('}')) {
                self.pos += 1;
                return Some(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => (if b { "True" } else { "False" }).to_string(),
                Value::Null => "None".to_string(),
                _ => return None,
            };
            if self.advance()? != Token::Colon {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            match self.advance()? {
                Token::Comma => continue,
                Token::Close('}') => return Some(Value::Object(map)),
                _ => return None,
            }
        }
    }
}
