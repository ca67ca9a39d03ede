use std::str::Chars;

use crate::error::{CompileError, CompileResult};

use super::token::{Token, TokenKind, KEYWORDS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Start,
    Word,
    VariableStart,
    Variable,
    Question,
    Equality,
    Arithmetic,
    Logical,
    Relational,
    Integer,
    Float,
    String,
    StringEscape,
    LineComment,
    BlockComment,
}

/// Finite-state tokenizer with a single character of pushback.
#[derive(Debug)]
pub struct Lexer<'a> {
    chars: Chars<'a>,
    pushback: Option<char>,
    line: usize,
    closed: bool,
}

fn single_char_token(c: char) -> Option<TokenKind> {
    match c {
        '(' => Some(TokenKind::OpenParen),
        ')' => Some(TokenKind::CloseParen),
        '{' => Some(TokenKind::OpenCurlyBrace),
        '}' => Some(TokenKind::CloseCurlyBrace),
        ',' => Some(TokenKind::Comma),
        ';' => Some(TokenKind::SemiColon),
        ':' => Some(TokenKind::Colon),
        _ => None,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars(),
            pushback: None,
            line: 1,
            closed: false,
        }
    }

    pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn getc(&mut self) -> Option<char> {
        let c = match self.pushback.take() {
            Some(c) => Some(c),
            None => self.chars.next(),
        };
        match c {
            Some('\0') => {
                self.chars = "".chars();
                None
            }
            None => None,
            Some(c) => {
                if c == '\n' {
                    self.line += 1;
                }
                Some(c)
            }
        }
    }

    fn ungetc(&mut self, c: Option<char>) {
        if let Some(c) = c {
            if c == '\n' {
                self.line -= 1;
            }
            self.pushback = Some(c);
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Lexical {
            line: self.line,
            message: message.into(),
        }
    }

    fn after_close_tag(&mut self) -> CompileResult<Token> {
        let trailing = match self.getc() {
            None => None,
            Some('\n') => self.getc(),
            Some(c) => Some(c),
        };
        match trailing {
            None => Ok(Token::new(TokenKind::Eof, "", self.line)),
            Some(_) => Err(self.error("unexpected text after closing tag")),
        }
    }

    fn expect_php(&mut self) -> CompileResult<()> {
        for expected in ['p', 'h', 'p'] {
            if self.getc() != Some(expected) {
                return Err(self.error("malformed opening tag"));
            }
        }
        match self.getc() {
            Some(c) if c.is_whitespace() => {
                self.ungetc(Some(c));
                Ok(())
            }
            _ => Err(self.error("opening tag must be followed by whitespace")),
        }
    }

    pub fn next_token(&mut self) -> CompileResult<Token> {
        if self.closed {
            return self.after_close_tag();
        }

        let mut state = State::Start;
        let mut lexeme = String::new();
        let mut line = self.line;

        loop {
            let c = self.getc();
            match state {
                State::Start => {
                    let Some(ch) = c else {
                        return Ok(Token::new(TokenKind::Eof, "", self.line));
                    };
                    if ch.is_whitespace() {
                        continue;
                    }
                    line = self.line;
                    if let Some(kind) = single_char_token(ch) {
                        return Ok(Token::new(kind, ch.to_string(), line));
                    }
                    lexeme.push(ch);
                    state = match ch {
                        c if c.is_ascii_alphabetic() || c == '_' => State::Word,
                        c if c.is_ascii_digit() => State::Integer,
                        '$' => State::VariableStart,
                        '"' => {
                            lexeme.clear();
                            State::String
                        }
                        '#' => State::LineComment,
                        '=' | '!' => State::Equality,
                        '+' | '-' | '*' | '/' | '.' => State::Arithmetic,
                        '&' | '|' => State::Logical,
                        '<' | '>' => State::Relational,
                        '?' => State::Question,
                        c => return Err(self.error(format!("unexpected character {:?}", c))),
                    };
                }
                State::Word => match c {
                    Some(ch) if is_word_char(ch) => lexeme.push(ch),
                    _ => {
                        self.ungetc(c);
                        let kind = KEYWORDS
                            .get(lexeme.as_str())
                            .copied()
                            .unwrap_or(TokenKind::Identifier);
                        return Ok(Token::new(kind, lexeme, line));
                    }
                },
                State::VariableStart => match c {
                    Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                        lexeme.push(ch);
                        state = State::Variable;
                    }
                    _ => return Err(self.error("`$` must be followed by a letter or underscore")),
                },
                State::Variable => match c {
                    Some(ch) if is_word_char(ch) => lexeme.push(ch),
                    _ => {
                        self.ungetc(c);
                        return Ok(Token::new(TokenKind::Variable, lexeme, line));
                    }
                },
                State::Question => {
                    if c == Some('>') {
                        self.closed = true;
                        return Ok(Token::new(TokenKind::CloseTag, "?>", line));
                    }
                    self.ungetc(c);
                    return Ok(Token::new(TokenKind::Question, lexeme, line));
                }
                State::Equality => {
                    if c == Some('=') && lexeme.len() < 3 {
                        lexeme.push('=');
                        continue;
                    }
                    self.ungetc(c);
                    let kind = match lexeme.as_str() {
                        "=" => TokenKind::Assign,
                        "==" => TokenKind::Equal,
                        "===" => TokenKind::Identical,
                        "!" => TokenKind::Not,
                        "!=" => TokenKind::NotEqual,
                        _ => TokenKind::NotIdentical,
                    };
                    return Ok(Token::new(kind, lexeme, line));
                }
                State::Arithmetic => {
                    let first = lexeme.as_str();
                    if first == "/" && c == Some('/') {
                        lexeme.clear();
                        state = State::LineComment;
                        continue;
                    }
                    if first == "/" && c == Some('*') {
                        lexeme.clear();
                        state = State::BlockComment;
                        continue;
                    }
                    let kind = match (first, c) {
                        ("+", Some('=')) => Some(TokenKind::PlusAssign),
                        ("-", Some('=')) => Some(TokenKind::MinusAssign),
                        ("*", Some('=')) => Some(TokenKind::StarAssign),
                        ("/", Some('=')) => Some(TokenKind::SlashAssign),
                        (".", Some('=')) => Some(TokenKind::DotAssign),
                        ("+", Some('+')) => Some(TokenKind::Increment),
                        ("-", Some('-')) => Some(TokenKind::Decrement),
                        _ => None,
                    };
                    if let (Some(kind), Some(ch)) = (kind, c) {
                        lexeme.push(ch);
                        return Ok(Token::new(kind, lexeme, line));
                    }
                    self.ungetc(c);
                    let kind = match first {
                        "+" => TokenKind::Plus,
                        "-" => TokenKind::Minus,
                        "*" => TokenKind::Star,
                        "/" => TokenKind::Slash,
                        _ => TokenKind::Dot,
                    };
                    return Ok(Token::new(kind, lexeme, line));
                }
                State::Logical => {
                    let first = lexeme.chars().next();
                    if c != first {
                        return Err(self.error(format!("expected `{0}{0}`", lexeme)));
                    }
                    let kind = if lexeme == "&" {
                        TokenKind::And
                    } else {
                        TokenKind::Or
                    };
                    lexeme.push_str(&lexeme.clone());
                    return Ok(Token::new(kind, lexeme, line));
                }
                State::Relational => {
                    if lexeme == "<" && c == Some('?') {
                        self.expect_php()?;
                        return Ok(Token::new(TokenKind::OpenTag, "<?php", line));
                    }
                    if c == Some('=') {
                        lexeme.push('=');
                        let kind = if lexeme == "<=" {
                            TokenKind::LessEqual
                        } else {
                            TokenKind::GreaterEqual
                        };
                        return Ok(Token::new(kind, lexeme, line));
                    }
                    self.ungetc(c);
                    let kind = if lexeme == "<" {
                        TokenKind::LessThan
                    } else {
                        TokenKind::GreaterThan
                    };
                    return Ok(Token::new(kind, lexeme, line));
                }
                State::Integer => match c {
                    Some(ch) if ch.is_ascii_digit() => lexeme.push(ch),
                    Some('.') => {
                        lexeme.push('.');
                        state = State::Float;
                    }
                    _ => {
                        self.ungetc(c);
                        return Ok(Token::new(TokenKind::IntLiteral, lexeme, line));
                    }
                },
                State::Float => match c {
                    Some(ch) if ch.is_ascii_digit() => lexeme.push(ch),
                    _ => {
                        self.ungetc(c);
                        return Ok(Token::new(TokenKind::FloatLiteral, lexeme, line));
                    }
                },
                State::String => match c {
                    None => return Err(self.error("unterminated string literal")),
                    Some('"') => return Ok(Token::new(TokenKind::StringLiteral, lexeme, line)),
                    Some('\\') => {
                        lexeme.push('\\');
                        state = State::StringEscape;
                    }
                    Some(ch) => lexeme.push(ch),
                },
                State::StringEscape => match c {
                    None => return Err(self.error("unterminated string literal")),
                    Some(ch) => {
                        lexeme.push(ch);
                        state = State::String;
                    }
                },
                State::LineComment => match c {
                    None => return Ok(Token::new(TokenKind::Eof, "", self.line)),
                    Some('\n') => {
                        lexeme.clear();
                        state = State::Start;
                    }
                    Some(_) => {}
                },
                State::BlockComment => match c {
                    None => return Err(self.error("unterminated block comment")),
                    Some('*') => {
                        let next = self.getc();
                        if next == Some('/') {
                            lexeme.clear();
                            state = State::Start;
                        } else {
                            self.ungetc(next);
                        }
                    }
                    Some(_) => {}
                },
            }
        }
    }
}
