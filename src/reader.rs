use logos::{Logos, Span};
use std::fmt;

use crate::error::{ReadError, SyntaxError};
use crate::interner;
use crate::value::{Pair, Value};

//===----------------------------------------------------------------------===//
// Utils
//===----------------------------------------------------------------------===//

/// Unescapes a string literal by converting escape sequences to their actual
/// characters.
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some('0') => result.push('\0'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

//===----------------------------------------------------------------------===//
// Token
//
// Uses the logos crate for tokenization. The surface is deliberately small:
// the core's data language is symbols, pairs and a handful of literals; the
// cyclic-datum notation stays with the collaborators that need it.
//===----------------------------------------------------------------------===//

#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    // Whitespace and line comments are skipped.
    #[regex(r"[ \t\r\n]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // Improper-list dot.
    #[token(".")]
    Dot,

    #[token("#t", |_| true)]
    #[token("#f", |_| false)]
    Bool(bool),

    #[token("#inert")]
    Inert,
    #[token("#ignore")]
    Ignore,

    #[regex(r"#\\.", |lex| lex.slice().chars().nth(2))]
    Char(char),

    #[regex(r#""([^"\\]|\\.)*""#,
      callback = |lex| {
        let slice = lex.slice();
        let content = &slice[1..slice.len()-1];
        unescape_string(content)
      })]
    Str(String),

    #[regex(r"-?\d+", priority = 3, callback = |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    // Everything else that is not whitespace or a delimiter. Symbols may
    // contain $, ?, !, /, etc. (`$vau`, `call/cc`, `=?`).
    #[regex(r#"[^ \t\r\n()";]+"#, priority = 1, callback = |lex| lex.slice().to_owned())]
    Symbol(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Dot => write!(f, "."),
            Token::Bool(true) => write!(f, "#t"),
            Token::Bool(false) => write!(f, "#f"),
            Token::Inert => write!(f, "#inert"),
            Token::Ignore => write!(f, "#ignore"),
            Token::Char(c) => write!(f, "#\\{}", c),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// A token and its span, kept for error reporting.
#[derive(Debug, PartialEq, Clone)]
pub struct TokenAST {
    token: Token,
    span: Span,
}

#[derive(Debug)]
pub struct Reader {
    tokens: Vec<TokenAST>,
    source: String,
    position: usize,
}

impl Reader {
    /// Reads the next token and increments the position.
    fn next(&mut self) -> Result<TokenAST, ReadError> {
        let token = match self.tokens.get(self.position) {
            Some(t) => t.clone(),
            None => {
                return Err(ReadError {
                    error: SyntaxError::UnexpectedEOF { expected: None },
                    span: self.last_span(),
                    source: self.source.clone(),
                });
            }
        };

        self.position += 1;
        Ok(token)
    }

    /// Peeks the next token without incrementing the position.
    fn peek(&self) -> Result<&TokenAST, ReadError> {
        match self.tokens.get(self.position) {
            Some(t) => Ok(t),
            None => Err(ReadError {
                error: SyntaxError::UnexpectedEOF { expected: None },
                span: self.last_span(),
                source: self.source.clone(),
            }),
        }
    }

    fn at_eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn last_span(&self) -> Span {
        self.tokens.last().map(|t| t.span.clone()).unwrap_or(0..0)
    }
}

//===----------------------------------------------------------------------===//
// Tokenizer
//===----------------------------------------------------------------------===//

pub fn tokenize(source: &str) -> Reader {
    let mut lexer = Token::lexer(source);
    let mut tokens: Vec<TokenAST> = vec![];

    while let Some(token) = lexer.next() {
        if let Ok(token) = token {
            tokens.push(TokenAST { token, span: lexer.span() });
        }
    }

    Reader { tokens, source: source.to_string(), position: 0 }
}

//===----------------------------------------------------------------------===//
// Reader
//===----------------------------------------------------------------------===//

fn read_atom(reader: &mut Reader) -> Result<Value, ReadError> {
    let token_ast = reader.next()?;
    match &token_ast.token {
        Token::Bool(b) => Ok(Value::Bool(*b)),
        Token::Inert => Ok(Value::Inert),
        Token::Ignore => Ok(Value::Ignore),
        Token::Char(c) => Ok(Value::Char(*c)),
        Token::Str(s) => Ok(Value::string(s)),
        Token::Int(n) => Ok(Value::Int(*n)),
        Token::Symbol(name) => {
            if name.starts_with('#') {
                return Err(ReadError {
                    error: SyntaxError::InvalidHashForm { value: name.clone() },
                    span: token_ast.span.clone(),
                    source: reader.source.clone(),
                });
            }
            Ok(Value::Symbol(interner::intern_sym(name)))
        }
        other => Err(ReadError {
            error: SyntaxError::UnexpectedToken {
                found: format!("{}", other),
                expected: "atom".to_string(),
            },
            span: token_ast.span.clone(),
            source: reader.source.clone(),
        }),
    }
}

/// Reads a parenthesized list, handling `()`, proper lists and dotted tails.
/// Literal structure is built from immutable pairs.
fn read_list(reader: &mut Reader) -> Result<Value, ReadError> {
    reader.next()?; // consume the open paren
    let mut items: Vec<Value> = vec![];
    let mut tail = Value::Nil;

    loop {
        let peeked = reader.peek()?;
        match &peeked.token {
            Token::RParen => {
                reader.next()?;
                break;
            }
            Token::Dot => {
                let dot_span = peeked.span.clone();
                reader.next()?;
                if items.is_empty() {
                    return Err(ReadError {
                        error: SyntaxError::MisplacedDot,
                        span: dot_span,
                        source: reader.source.clone(),
                    });
                }
                tail = read_form(reader)?;
                let close = reader.next()?;
                if close.token != Token::RParen {
                    return Err(ReadError {
                        error: SyntaxError::UnexpectedToken {
                            found: format!("{}", close.token),
                            expected: ")".to_string(),
                        },
                        span: close.span.clone(),
                        source: reader.source.clone(),
                    });
                }
                break;
            }
            _ => items.push(read_form(reader)?),
        }
    }

    let mut result = tail;
    for item in items.into_iter().rev() {
        result = Value::Pair(Pair::new_immutable(item, result));
    }
    Ok(result)
}

fn read_form(reader: &mut Reader) -> Result<Value, ReadError> {
    let peeked = reader.peek()?;
    match &peeked.token {
        Token::LParen => read_list(reader),
        Token::RParen => Err(ReadError {
            error: SyntaxError::UnexpectedToken {
                found: ")".to_string(),
                expected: "form".to_string(),
            },
            span: peeked.span.clone(),
            source: reader.source.clone(),
        }),
        Token::Dot => Err(ReadError {
            error: SyntaxError::MisplacedDot,
            span: peeked.span.clone(),
            source: reader.source.clone(),
        }),
        _ => read_atom(reader),
    }
}

/// Reads a single form from the input.
pub fn read(input: &str) -> Result<Value, ReadError> {
    let mut reader = tokenize(input);
    read_form(&mut reader)
}

/// Reads every top-level form from the input.
pub fn read_all(input: &str) -> Result<Vec<Value>, ReadError> {
    let mut reader = tokenize(input);
    let mut forms = vec![];
    while !reader.at_eof() {
        forms.push(read_form(&mut reader)?);
    }
    Ok(forms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_atoms() {
        assert_eq!(read("42").unwrap().to_string(), "42");
        assert_eq!(read("-7").unwrap().to_string(), "-7");
        assert_eq!(read("#t").unwrap().to_string(), "#t");
        assert_eq!(read("#inert").unwrap().to_string(), "#inert");
        assert_eq!(read("#ignore").unwrap().to_string(), "#ignore");
        assert_eq!(read("$vau").unwrap().to_string(), "$vau");
        assert_eq!(read("call/cc").unwrap().to_string(), "call/cc");
    }

    #[test]
    fn reads_lists_and_dotted_pairs() {
        assert_eq!(read("(1 2 3)").unwrap().to_string(), "(1 2 3)");
        assert_eq!(read("(1 . 2)").unwrap().to_string(), "(1 . 2)");
        assert_eq!(read("(x . (y . ()))").unwrap().to_string(), "(x y)");
        assert_eq!(read("()").unwrap().to_string(), "()");
    }

    #[test]
    fn literal_pairs_are_immutable() {
        let form = read("(1 2)").unwrap();
        assert!(!form.as_pair().unwrap().is_mutable());
    }

    #[test]
    fn rejects_unknown_hash_forms() {
        let err = read("#whatever").unwrap_err();
        assert!(matches!(err.error, SyntaxError::InvalidHashForm { .. }));
    }

    #[test]
    fn rejects_leading_dot() {
        let err = read("(. 1)").unwrap_err();
        assert!(matches!(err.error, SyntaxError::MisplacedDot));
    }
}
