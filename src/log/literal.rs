//! Document literals as printed in server log lines.
//!
//! The server logs commands in a shell-like notation: bare keys
//! (`{ find: "t" }`), constructor literals (`UUID("...")`,
//! `ISODate("...")`, `NumberLong(5)`, ...) and regex literals. This module
//! rewrites that notation into Extended JSON and hands it to the JSON
//! reader, so the document model only has one decoder.

use crate::document::extjson;
use crate::document::Document;
use crate::error::{Error, Result};

/// Parse a logged document literal.
pub fn parse_literal(text: &str) -> Result<Document> {
    let json = to_extended_json(text)?;
    extjson::parse_document(&json).map_err(|e| match e {
        Error::Json(inner) => Error::DocumentLiteral(format!("{} in {:?}", inner, text)),
        other => other,
    })
}

/// Rewrite a logged literal into Extended JSON text.
pub fn to_extended_json(text: &str) -> Result<String> {
    let mut rewriter = Rewriter {
        chars: text.chars().collect(),
        pos: 0,
        out: String::with_capacity(text.len() + text.len() / 4),
    };
    rewriter.run()?;
    Ok(rewriter.out)
}

struct Rewriter {
    chars: Vec<char>,
    pos: usize,
    out: String,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '-' | '+')
}

fn json_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn literal_error(msg: impl Into<String>) -> Error {
    Error::DocumentLiteral(msg.into())
}

impl Rewriter {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next_significant(&self) -> Option<char> {
        self.chars[self.pos..].iter().copied().find(|c| !c.is_whitespace())
    }

    fn last_significant_out(&self) -> Option<char> {
        self.out.chars().rev().find(|c| !c.is_whitespace())
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' => {
                    let s = self.read_string()?;
                    self.emit_string_or_key(&s);
                }
                '/' if matches!(self.last_significant_out(), Some(':' | ',' | '[')) => {
                    self.read_regex()?;
                }
                c if is_word_char(c) => self.read_word()?,
                _ => {
                    self.out.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(())
    }

    fn emit_string_or_key(&mut self, s: &str) {
        self.out.push_str(&json_str(s));
    }

    /// Read a quoted string starting at the current quote; returns its
    /// unescaped content.
    fn read_string(&mut self) -> Result<String> {
        let quote = self.chars[self.pos];
        self.pos += 1;
        let mut s = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| literal_error("dangling escape in string"))?;
                    self.pos += 1;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Ok(s),
                c => s.push(c),
            }
        }
        Err(literal_error("unterminated string"))
    }

    fn read_regex(&mut self) -> Result<()> {
        self.pos += 1;
        let mut pattern = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| literal_error("unterminated regex"))?;
            self.pos += 1;
            match c {
                '\\' => {
                    pattern.push(c);
                    if let Some(next) = self.peek() {
                        pattern.push(next);
                        self.pos += 1;
                    }
                }
                '/' => break,
                c => pattern.push(c),
            }
        }
        let mut options = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_alphabetic) {
            options.push(c);
            self.pos += 1;
        }
        self.out.push_str(&format!(
            "{{\"$regex\": {}, \"$options\": {}}}",
            json_str(&pattern),
            json_str(&options)
        ));
        Ok(())
    }

    fn read_word(&mut self) -> Result<()> {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        match self.next_significant() {
            Some(':') => {
                self.out.push_str(&json_str(&word));
                return Ok(());
            }
            Some('(') => return self.read_constructor(&word),
            _ => {}
        }

        if word == "new" {
            // `new Date(...)`
            self.skip_whitespace();
            return self.read_word();
        }

        match word.as_str() {
            "true" | "false" | "null" => self.out.push_str(&word),
            "inf" | "Infinity" => self.out.push_str("{\"$numberDouble\": \"Infinity\"}"),
            "-inf" | "-Infinity" => self.out.push_str("{\"$numberDouble\": \"-Infinity\"}"),
            "nan" | "NaN" => self.out.push_str("{\"$numberDouble\": \"NaN\"}"),
            "undefined" => self.out.push_str("null"),
            "MinKey" | "MaxKey" => {
                self.out.push_str(&format!("{{\"${}\": 1}}", to_lower_first(&word)))
            }
            w if w.parse::<f64>().is_ok() => self.out.push_str(w),
            w => return Err(literal_error(format!("unexpected bare word {:?}", w))),
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Read `( args )` after a constructor name and emit its JSON form.
    fn read_constructor(&mut self, name: &str) -> Result<()> {
        self.skip_whitespace();
        self.pos += 1; // '('
        let mut args = Vec::new();
        let mut current = String::new();
        loop {
            self.skip_whitespace();
            let c = self
                .peek()
                .ok_or_else(|| literal_error(format!("unterminated {}(", name)))?;
            match c {
                ')' => {
                    self.pos += 1;
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                    break;
                }
                ',' => {
                    self.pos += 1;
                    args.push(std::mem::take(&mut current));
                }
                '"' | '\'' => current = self.read_string()?,
                _ => {
                    while self.peek().is_some_and(|c| !matches!(c, ',' | ')') && !c.is_whitespace()) {
                        current.push(self.chars[self.pos]);
                        self.pos += 1;
                    }
                }
            }
        }

        let arg = |i: usize| -> Result<&str> {
            args.get(i)
                .map(String::as_str)
                .ok_or_else(|| literal_error(format!("{} expects argument {}", name, i + 1)))
        };

        let json = match name {
            "UUID" => format!("{{\"$uuid\": {}}}", json_str(arg(0)?)),
            "ISODate" => format!("{{\"$date\": {}}}", json_str(arg(0)?)),
            "Date" => {
                let a = arg(0)?;
                if a.parse::<i64>().is_ok() {
                    format!("{{\"$date\": {{\"$numberLong\": {}}}}}", json_str(a))
                } else {
                    format!("{{\"$date\": {}}}", json_str(a))
                }
            }
            "ObjectId" => format!("{{\"$oid\": {}}}", json_str(arg(0)?)),
            "NumberLong" => format!("{{\"$numberLong\": {}}}", json_str(arg(0)?)),
            "NumberInt" => format!("{{\"$numberInt\": {}}}", json_str(arg(0)?)),
            "NumberDecimal" => format!("{{\"$numberDecimal\": {}}}", json_str(arg(0)?)),
            "Timestamp" => format!(
                "{{\"$timestamp\": {{\"t\": {}, \"i\": {}}}}}",
                parse_u32(arg(0)?)?,
                parse_u32(arg(1)?)?
            ),
            "BinData" => format!(
                "{{\"$binary\": {{\"base64\": {}, \"subType\": {}}}}}",
                json_str(arg(1)?),
                json_str(arg(0)?)
            ),
            other => return Err(literal_error(format!("unknown constructor {}()", other))),
        };
        self.out.push_str(&json);
        Ok(())
    }
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| literal_error(format!("expected an unsigned integer, found {:?}", s)))
}

fn to_lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
