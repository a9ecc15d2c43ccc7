//! Text reader producing forms
//!
//! The reader turns source text into [`Value`] forms one at a time, so the
//! compiler can read a form, expand and evaluate it, and only then read the
//! next one. Lists remember where they started for error reporting.
//!
//! Supported syntax: numbers, strings, characters (`\a`, `\newline`),
//! `nil`/`true`/`false`, symbols, keywords, `()`, `[]`, `{}`, `#{}`,
//! `'x`, `` `x ``, `~x`, `^meta form` (metadata is discarded) and `;`
//! comments. Commas are whitespace.

use std::fmt;
use std::sync::Arc;

use crate::value::{List, Map, Value};

// ═══════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════

/// Error that occurred during reading.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message
    pub message: String,

    /// Optional source location
    pub location: Option<SourceLocation>,
}

impl ParseError {
    /// Create a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Add location information to the error.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Source code location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File name or identifier
    pub file: Arc<str>,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(file: impl AsRef<str>, line: usize, column: usize) -> Self {
        Self {
            file: Arc::from(file.as_ref()),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// READER
// ═══════════════════════════════════════════════════════════════════════

type ReadResult<T> = std::result::Result<T, ParseError>;

const DEFAULT_FILE: &str = "<input>";

/// Incremental reader over a source string.
pub struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: Arc<str>,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',')
}

impl Reader {
    /// Create a reader for `source`.
    pub fn new(source: &str) -> Self {
        Self::with_file(source, DEFAULT_FILE)
    }

    /// Create a reader that reports locations in `file`.
    pub fn with_file(source: &str, file: impl AsRef<str>) -> Self {
        Reader {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: Arc::from(file.as_ref()),
        }
    }

    /// Read the next top-level form, or `None` at end of input.
    pub fn read_next(&mut self) -> ReadResult<Option<Value>> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Ok(None);
        }
        self.read_form().map(Some)
    }

    /// Read every remaining form.
    pub fn read_all(&mut self) -> ReadResult<Vec<Value>> {
        let mut forms = Vec::new();
        while let Some(form) = self.read_next()? {
            forms.push(form);
        }
        Ok(forms)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            file: self.file.clone(),
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message).with_location(self.location())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.advance();
            } else if c == ';' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_form(&mut self) -> ReadResult<Value> {
        self.skip_whitespace();
        let start = self.location();
        let c = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of input"))?;

        match c {
            '(' => {
                self.advance();
                let items = self.read_until(')')?;
                Ok(Value::List(List::new(items.into_iter().collect()).with_source(start)))
            }
            '[' => {
                self.advance();
                Ok(Value::vector(self.read_until(']')?))
            }
            '{' => {
                self.advance();
                let items = self.read_until('}')?;
                if items.len() % 2 != 0 {
                    return Err(ParseError::new("map literal must contain an even number of forms")
                        .with_location(start));
                }
                let mut map = Map::new();
                let mut items = items.into_iter();
                while let (Some(k), Some(v)) = (items.next(), items.next()) {
                    map.insert(k, v);
                }
                Ok(Value::Map(map))
            }
            '#' => {
                self.advance();
                match self.advance() {
                    Some('{') => Ok(Value::set(self.read_until('}')?)),
                    Some('_') => {
                        self.read_form()?;
                        self.read_form()
                    }
                    other => Err(ParseError::new(format!(
                        "unsupported dispatch #{}",
                        other.map(String::from).unwrap_or_default()
                    ))
                    .with_location(start)),
                }
            }
            ')' | ']' | '}' => Err(self.error(format!("unexpected '{}'", c))),
            '\'' => self.read_wrapped("quote", start),
            '`' => self.read_wrapped("syntax-quote", start),
            '~' => {
                if self.peek_at(1) == Some('@') {
                    return Err(self.error("unquote-splicing is not supported"));
                }
                self.read_wrapped("unquote", start)
            }
            '^' => {
                self.advance();
                self.read_form()?;
                self.read_form()
            }
            '"' => self.read_string(),
            '\\' => self.read_char(),
            ':' => {
                self.advance();
                let token = self.read_token();
                if token.is_empty() {
                    return Err(ParseError::new("empty keyword").with_location(start));
                }
                Ok(Value::keyword(&token))
            }
            _ => {
                let token = self.read_token();
                parse_atom(&token).map_err(|message| ParseError::new(message).with_location(start))
            }
        }
    }

    fn read_wrapped(&mut self, head: &str, start: SourceLocation) -> ReadResult<Value> {
        self.advance();
        let inner = self.read_form()?;
        Ok(Value::list_at(vec![Value::symbol(head), inner], start))
    }

    fn read_until(&mut self, close: char) -> ReadResult<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(format!("expected '{}' before end of input", close))),
                Some(c) if c == close => {
                    self.advance();
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.advance();
        }
        token
    }

    fn read_string(&mut self) -> ReadResult<Value> {
        let start = self.location();
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ParseError::new("unterminated string").with_location(start));
                }
                Some('"') => return Ok(Value::string(out)),
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(self.error(format!("unknown escape \\{}", other)));
                        }
                        None => {
                            return Err(ParseError::new("unterminated string").with_location(start));
                        }
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn read_char(&mut self) -> ReadResult<Value> {
        let start = self.location();
        self.advance();
        // the first character is taken even if it is a delimiter: `\(`
        let first = self
            .advance()
            .ok_or_else(|| ParseError::new("expected character").with_location(start.clone()))?;
        let rest = self.read_token();
        if rest.is_empty() {
            return Ok(Value::Char(first));
        }
        let name = format!("{}{}", first, rest);
        let c = match name.as_str() {
            "newline" => '\n',
            "space" => ' ',
            "tab" => '\t',
            "return" => '\r',
            _ => {
                return Err(
                    ParseError::new(format!("unknown character \\{}", name)).with_location(start)
                );
            }
        };
        Ok(Value::Char(c))
    }
}

fn parse_atom(token: &str) -> std::result::Result<Value, String> {
    match token {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    let mut chars = token.chars();
    let starts_numeric = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false),
        _ => false,
    };
    if starts_numeric {
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Value::Int(n));
        }
        return token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid number: {}", token));
    }

    Ok(Value::symbol(token))
}

/// Read every form in `source`.
pub fn read_str(source: &str) -> std::result::Result<Vec<Value>, ParseError> {
    Reader::new(source).read_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    fn read_one(source: &str) -> Value {
        let mut forms = read_str(source).unwrap();
        assert_eq!(forms.len(), 1, "expected one form in {:?}", source);
        forms.remove(0)
    }

    #[test]
    fn test_atoms() {
        assert_eq!(read_one("42"), Value::Int(42));
        assert_eq!(read_one("-7"), Value::Int(-7));
        assert_eq!(read_one("1.5"), Value::Float(1.5));
        assert_eq!(read_one("nil"), Value::Nil);
        assert_eq!(read_one("false"), Value::Bool(false));
        assert_eq!(read_one("\"a\\nb\""), Value::string("a\nb"));
        assert_eq!(read_one("\\x"), Value::Char('x'));
        assert_eq!(read_one("\\space"), Value::Char(' '));
        assert_eq!(read_one(":kw"), Value::keyword("kw"));
        assert_eq!(read_one("-"), Value::symbol("-"));
    }

    #[test]
    fn test_qualified_symbol() {
        match read_one("entmoot.core/a") {
            Value::Symbol(sym) => assert_eq!(sym, Symbol::qualified("entmoot.core", "a")),
            other => panic!("expected symbol, got {:?}", other),
        }
    }

    #[test]
    fn test_collections() {
        assert_eq!(
            read_one("(1 [2 3] #{4})"),
            Value::list(vec![
                Value::Int(1),
                Value::vector(vec![Value::Int(2), Value::Int(3)]),
                Value::set(vec![Value::Int(4)]),
            ])
        );
        assert_eq!(
            read_one("{:a 1, :b 2}"),
            Value::map(vec![
                (Value::keyword("a"), Value::Int(1)),
                (Value::keyword("b"), Value::Int(2)),
            ])
        );
    }

    #[test]
    fn test_reader_macros() {
        assert_eq!(
            read_one("'a"),
            Value::list(vec![Value::symbol("quote"), Value::symbol("a")])
        );
        assert_eq!(
            read_one("~'a"),
            Value::list(vec![
                Value::symbol("unquote"),
                Value::list(vec![Value::symbol("quote"), Value::symbol("a")]),
            ])
        );
    }

    #[test]
    fn test_metadata_is_discarded() {
        assert_eq!(read_one("^{:inline true} foo"), Value::symbol("foo"));
    }

    #[test]
    fn test_comments_and_commas() {
        let forms = read_str("; leading\n1, 2 ; trailing\n3").unwrap();
        assert_eq!(forms, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_list_location() {
        let mut reader = Reader::with_file("1\n  (a b)", "test.ent");
        reader.read_next().unwrap();
        let form = reader.read_next().unwrap().unwrap();
        let loc = form.source_location().unwrap();
        assert_eq!((loc.line, loc.column), (2, 3));
        assert_eq!(&*loc.file, "test.ent");
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_errors() {
        assert!(read_str("(1 2").is_err());
        assert!(read_str(")").is_err());
        assert!(read_str("{:a}").is_err());
        assert!(read_str("\"open").is_err());
        let err = read_str("(1 2").unwrap_err();
        assert!(err.location.is_some());
    }
}
