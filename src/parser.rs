use std::path::Path;

use thiserror::Error;

use crate::document::DocumentNode;

/// A source document that could not be read as a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}:{line}:{column}: {message}\n    | {excerpt}")]
pub struct ParseError {
    /// File the text came from, or `<input>`.
    pub location: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// The offending line, trimmed.
    pub excerpt: String,
}

impl ParseError {
    pub fn with_path(mut self, path: &Path) -> Self {
        self.location = path.display().to_string();
        self
    }
}

/// A reader for the relaxed JSON dialect used by mod configuration files.
///
/// Accepts `//` line comments, `/* */` block comments and a trailing comma
/// before a closing brace or bracket. Comments are blanked out rather than
/// removed so that line and column numbers in errors still point into the
/// original text.
pub struct Parser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Parser { input, position: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    /// Consumes the current character and advances the position.
    fn consume(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// Copies a string literal, escapes included, to `out`.
    fn copy_string(&mut self, out: &mut String) {
        // opening quote
        if let Some(c) = self.consume() {
            out.push(c);
        }
        while let Some(c) = self.consume() {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = self.consume() {
                        out.push(escaped);
                    }
                }
                '"' => return,
                _ => {}
            }
        }
    }

    fn blank_line_comment(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.consume();
            push_blank(out, c);
        }
    }

    fn blank_block_comment(&mut self, out: &mut String) {
        // "/*"
        self.consume();
        self.consume();
        out.push_str("  ");
        while let Some(c) = self.consume() {
            if c == '*' && self.peek() == Some('/') {
                self.consume();
                out.push_str("  ");
                return;
            }
            push_blank(out, c);
        }
    }

    /// Returns the input with comments blanked out. String literals are copied
    /// verbatim, so `"http://example.com"` survives.
    pub fn strip_comments(&mut self) -> String {
        let mut out = String::with_capacity(self.input.len());
        while let Some(c) = self.peek() {
            match c {
                '"' => self.copy_string(&mut out),
                '/' if self.peek_second() == Some('/') => self.blank_line_comment(&mut out),
                '/' if self.peek_second() == Some('*') => self.blank_block_comment(&mut out),
                _ => {
                    self.consume();
                    out.push(c);
                }
            }
        }
        out
    }

    /// Strips comments and trailing commas, then parses the result.
    pub fn parse(&mut self) -> Result<DocumentNode, ParseError> {
        let without_comments = self.strip_comments();
        let clean = strip_trailing_commas(&without_comments);
        serde_json::from_str::<DocumentNode>(&clean).map_err(|e| {
            let line = e.line();
            let column = e.column();
            let excerpt = self
                .input
                .lines()
                .nth(line.saturating_sub(1))
                .unwrap_or_default()
                .trim()
                .to_string();
            ParseError {
                location: "<input>".to_string(),
                line,
                column,
                message: e.to_string(),
                excerpt,
            }
        })
    }
}

fn push_blank(out: &mut String, c: char) {
    if c == '\n' || c == '\r' {
        out.push(c);
    } else {
        out.push(' ');
    }
}

/// Blanks every comma that is followed, after optional whitespace, by `}` or `]`.
/// Expects comment-free input.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    out.push(' ');
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parses relaxed JSON text into a tree.
pub fn parse_document(input: &str) -> Result<DocumentNode, ParseError> {
    Parser::new(input).parse()
}

/// Reads and parses a file, tagging errors with its path.
pub async fn read_document(path: &Path) -> Result<DocumentNode, ParseError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| ParseError {
        location: path.display().to_string(),
        line: 0,
        column: 0,
        message: format!("cannot read file: {}", e),
        excerpt: String::new(),
    })?;
    parse_document(&text).map_err(|e| e.with_path(path))
}
