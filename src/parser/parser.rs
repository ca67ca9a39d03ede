use crate::analyzer::{SymbolTable, Ty};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Token, TokenKind};

use super::{Ast, BinOp, Node, NodeId, Param, Program, UnaryOp};

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    ast: Ast,
    symbol_table: SymbolTable,
}

/// Binding power of each binary operator; larger binds tighter.
fn binary_op(kind: TokenKind) -> Option<(BinOp, u8)> {
    let op = match kind {
        TokenKind::Or => (BinOp::Or, 1),
        TokenKind::And => (BinOp::And, 2),
        TokenKind::Equal => (BinOp::Equal, 3),
        TokenKind::NotEqual => (BinOp::NotEqual, 3),
        TokenKind::Identical => (BinOp::Identical, 3),
        TokenKind::NotIdentical => (BinOp::NotIdentical, 3),
        TokenKind::LessThan => (BinOp::Less, 4),
        TokenKind::LessEqual => (BinOp::LessEqual, 4),
        TokenKind::GreaterThan => (BinOp::Greater, 4),
        TokenKind::GreaterEqual => (BinOp::GreaterEqual, 4),
        TokenKind::Plus => (BinOp::Add, 5),
        TokenKind::Minus => (BinOp::Sub, 5),
        TokenKind::Dot => (BinOp::Concat, 5),
        TokenKind::Star => (BinOp::Mul, 6),
        TokenKind::Slash => (BinOp::Div, 6),
        _ => return None,
    };
    Some(op)
}

fn compound_assign_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::PlusAssign | TokenKind::Increment => Some(BinOp::Add),
        TokenKind::MinusAssign | TokenKind::Decrement => Some(BinOp::Sub),
        TokenKind::StarAssign => Some(BinOp::Mul),
        TokenKind::SlashAssign => Some(BinOp::Div),
        TokenKind::DotAssign => Some(BinOp::Concat),
        _ => None,
    }
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut utf8 = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
}

/// Decodes the escape sequences of a double-quoted string body.
///
/// `\xNN` and octal escapes produce raw bytes, so `"\xC3\xA9"` is `é` as in
/// PHP. Bytes that do not form valid UTF-8 decode to U+FFFD.
pub fn decode_string(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' || i >= chars.len() {
            push_char(&mut out, c);
            continue;
        }
        let escaped = chars[i];
        i += 1;
        match escaped {
            'n' => out.push(b'\n'),
            't' => out.push(b'\t'),
            'r' => out.push(b'\r'),
            'v' => out.push(0x0b),
            'e' => out.push(0x1b),
            'f' => out.push(0x0c),
            '\\' | '$' | '"' => push_char(&mut out, escaped),
            'x' => {
                let digits: String = chars[i..]
                    .iter()
                    .take(2)
                    .take_while(|c| c.is_ascii_hexdigit())
                    .collect();
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) => {
                        i += digits.len();
                        out.push(byte);
                    }
                    Err(_) => out.extend_from_slice(b"\\x"),
                }
            }
            '0'..='7' => {
                let digits: String = chars[i - 1..]
                    .iter()
                    .take(3)
                    .take_while(|c| ('0'..='7').contains(*c))
                    .collect();
                i += digits.len() - 1;
                let code = u32::from_str_radix(&digits, 8).unwrap_or(0) & 0xff;
                out.push(code as u8);
            }
            other => {
                out.push(b'\\');
                push_char(&mut out, other);
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            ast: Ast::new(),
            symbol_table: SymbolTable::with_builtins(),
        }
    }

    pub fn parse(&mut self) -> CompileResult<Program> {
        self.parse_program()
    }

    /// The global table, pre-seeded with the built-in functions.
    pub fn take_symbol_table(&mut self) -> SymbolTable {
        std::mem::take(&mut self.symbol_table)
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    fn peek_kind(&self) -> TokenKind {
        if self.tokens.is_empty() {
            return TokenKind::Eof;
        }
        self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.index + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = if self.tokens.is_empty() {
            Token::new(TokenKind::Eof, "", 0)
        } else {
            self.peek().clone()
        };
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let line = if self.tokens.is_empty() {
            0
        } else {
            self.peek().line
        };
        CompileError::Syntax {
            line,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        if self.tokens.is_empty() {
            return self.error(format!("expected {}, got end of input", expected));
        }
        let t = self.peek();
        self.error(format!(
            "unexpected {:?} `{}` (was expecting {})",
            t.kind, t.lexeme, expected
        ))
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() != kind {
            return false;
        }
        self.advance();
        true
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.peek_kind() != kind {
            return Err(self.unexpected(&format!("{:?}", kind)));
        }
        Ok(self.advance())
    }

    fn expect_identifier(&mut self, name: &str) -> CompileResult<()> {
        let t = self.expect(TokenKind::Identifier)?;
        if t.lexeme != name {
            return Err(self.error(format!("expected `{}`, got `{}`", name, t.lexeme)));
        }
        Ok(())
    }

    /// program = "<?php" prologue? stmt* ("?>")? EOF
    fn parse_program(&mut self) -> CompileResult<Program> {
        self.expect(TokenKind::OpenTag)?;
        self.parse_prologue()?;
        let root = self.parse_statements(true)?;
        self.consume(TokenKind::CloseTag);
        self.expect(TokenKind::Eof)?;

        Ok(Program {
            ast: std::mem::take(&mut self.ast),
            root,
        })
    }

    /// prologue = "declare" "(" "strict_types" "=" "1" ")" ";"
    fn parse_prologue(&mut self) -> CompileResult<()> {
        let t = self.peek();
        if t.kind != TokenKind::Identifier || t.lexeme != "declare" {
            return Ok(());
        }
        self.advance();
        self.expect(TokenKind::OpenParen)?;
        self.expect_identifier("strict_types")?;
        self.expect(TokenKind::Assign)?;
        let value = self.expect(TokenKind::IntLiteral)?;
        if value.lexeme != "1" {
            return Err(self.error("strict_types must be 1"));
        }
        self.expect(TokenKind::CloseParen)?;
        self.expect(TokenKind::SemiColon)?;
        Ok(())
    }

    fn is_list_end(&self, top_level: bool) -> bool {
        match self.peek_kind() {
            TokenKind::Eof => true,
            TokenKind::CloseTag => top_level,
            TokenKind::CloseCurlyBrace => !top_level,
            _ => false,
        }
    }

    /// Builds the left-growing `Sequence` chain of a statement list.
    fn parse_statements(&mut self, top_level: bool) -> CompileResult<NodeId> {
        let mut seq = None;
        while !self.is_list_end(top_level) {
            let stmt = self.parse_stmt(top_level)?;
            seq = Some(self.ast.push(Node::Sequence {
                prev: seq,
                stmt: Some(stmt),
            }));
        }
        Ok(seq.unwrap_or_else(|| self.ast.push(Node::empty_statement())))
    }

    /// block = "{" stmt* "}"
    fn parse_block(&mut self) -> CompileResult<NodeId> {
        self.expect(TokenKind::OpenCurlyBrace)?;
        let seq = self.parse_statements(false)?;
        self.expect(TokenKind::CloseCurlyBrace)?;
        Ok(seq)
    }

    /// A branch or loop body, always wrapped in a `Sequence`.
    fn parse_body(&mut self) -> CompileResult<NodeId> {
        if self.peek_kind() == TokenKind::OpenCurlyBrace {
            return self.parse_block();
        }
        match self.peek_kind() {
            TokenKind::Eof | TokenKind::CloseTag | TokenKind::CloseCurlyBrace => {
                return Err(self.unexpected("a statement"));
            }
            _ => {}
        }
        let stmt = self.parse_stmt(false)?;
        Ok(self.ast.push(Node::Sequence {
            prev: None,
            stmt: Some(stmt),
        }))
    }

    /// stmt = block
    ///      | "if" "(" expr ")" body ("else" body)?
    ///      | "while" "(" expr ")" body
    ///      | "function" ident "(" params ")" (":" type)? block
    ///      | "return" expr? ";"
    ///      | var ("=" | "+=" | "-=" | "*=" | "/=" | ".=") expr ";"
    ///      | var ("++" | "--") ";"
    ///      | expr? ";"
    fn parse_stmt(&mut self, top_level: bool) -> CompileResult<NodeId> {
        match self.peek_kind() {
            TokenKind::OpenCurlyBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::OpenParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::CloseParen)?;
                let body = self.parse_body()?;
                Ok(self.ast.push(Node::While { cond, body }))
            }
            TokenKind::Function if top_level => self.parse_function(),
            TokenKind::Function => {
                Err(self.error("functions can only be declared at the top level"))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.peek_kind() == TokenKind::SemiColon {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::SemiColon)?;
                Ok(self.ast.push(Node::Return { value }))
            }
            TokenKind::SemiColon => {
                self.advance();
                Ok(self.ast.push(Node::empty_statement()))
            }
            TokenKind::Variable if self.is_assignment_ahead() => self.parse_assign(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::SemiColon)?;
                Ok(expr)
            }
        }
    }

    fn is_assignment_ahead(&self) -> bool {
        let next = self.peek_nth_kind(1);
        next == TokenKind::Assign || compound_assign_op(next).is_some()
    }

    fn parse_if(&mut self) -> CompileResult<NodeId> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::OpenParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::CloseParen)?;
        let then = self.parse_body()?;
        let otherwise = if self.consume(TokenKind::Else) {
            Some(self.parse_body()?)
        } else {
            None
        };
        Ok(self.ast.push(Node::If {
            cond,
            then,
            otherwise,
        }))
    }

    fn parse_assign(&mut self) -> CompileResult<NodeId> {
        let target = self.expect(TokenKind::Variable)?.lexeme;
        let op = self.advance();
        let value = match op.kind {
            TokenKind::Assign => self.parse_expr()?,
            TokenKind::Increment | TokenKind::Decrement => {
                let left = self.ast.push(Node::Var(target.clone()));
                let right = self.ast.push(Node::Int(1));
                let op = compound_assign_op(op.kind).unwrap_or(BinOp::Add);
                self.ast.push(Node::Binary { op, left, right })
            }
            kind => {
                let op = compound_assign_op(kind).ok_or_else(|| self.unexpected("`=`"))?;
                let left = self.ast.push(Node::Var(target.clone()));
                let right = self.parse_expr()?;
                self.ast.push(Node::Binary { op, left, right })
            }
        };
        self.expect(TokenKind::SemiColon)?;
        Ok(self.ast.push(Node::Assign { target, value }))
    }

    fn parse_function(&mut self) -> CompileResult<NodeId> {
        self.expect(TokenKind::Function)?;
        let name = self.expect(TokenKind::Identifier)?.lexeme;
        self.expect(TokenKind::OpenParen)?;
        let mut params = vec![];
        if !self.consume(TokenKind::CloseParen) {
            params.push(self.parse_param()?);
            while self.consume(TokenKind::Comma) {
                params.push(self.parse_param()?);
            }
            self.expect(TokenKind::CloseParen)?;
        }
        let ret = if self.consume(TokenKind::Colon) {
            Some(self.parse_type(true)?.ok_or_else(|| self.unexpected("a return type"))?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(self.ast.push(Node::Function {
            name,
            params,
            ret,
            body,
        }))
    }

    /// param = type? var
    fn parse_param(&mut self) -> CompileResult<Param> {
        let ty = self.parse_type(false)?.unwrap_or(Ty::ANY);
        let name = self.expect(TokenKind::Variable)?.lexeme;
        Ok(Param { name, ty })
    }

    /// type = "?"? ("int" | "float" | "string") | "void"
    fn parse_type(&mut self, allow_void: bool) -> CompileResult<Option<Ty>> {
        let nullable = self.consume(TokenKind::Question);
        let ty = match self.peek_kind() {
            TokenKind::Int => Ty::INT,
            TokenKind::Float => Ty::FLOAT,
            TokenKind::String => Ty::STRING,
            TokenKind::Void if allow_void && !nullable => Ty::VOID,
            _ if nullable => return Err(self.unexpected("a type after `?`")),
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(if nullable { ty.nullable() } else { ty }))
    }

    pub fn parse_expr(&mut self) -> CompileResult<NodeId> {
        self.parse_binary(1)
    }

    /// Precedence climbing over the binary operator table.
    fn parse_binary(&mut self, min_power: u8) -> CompileResult<NodeId> {
        let mut left = self.parse_unary()?;
        while let Some((op, power)) = binary_op(self.peek_kind()) {
            if power < min_power {
                break;
            }
            self.advance();
            let right = self.parse_binary(power + 1)?;
            left = self.ast.push(Node::Binary { op, left, right });
        }
        Ok(left)
    }

    /// unary = ("-" | "!") unary | primary
    fn parse_unary(&mut self) -> CompileResult<NodeId> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.ast.push(Node::Unary { op, operand }))
    }

    /// primary = int | float | string | "null" | var
    ///         | ident "(" (expr ("," expr)*)? ")"
    ///         | "(" expr ")"
    fn parse_primary(&mut self) -> CompileResult<NodeId> {
        let t = self.peek().clone();
        let node = match t.kind {
            TokenKind::OpenParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::CloseParen)?;
                return Ok(expr);
            }
            TokenKind::IntLiteral => {
                let value = t.lexeme.parse().map_err(|_| CompileError::Lexical {
                    line: t.line,
                    message: format!("integer literal {} is out of range", t.lexeme),
                })?;
                Node::Int(value)
            }
            TokenKind::FloatLiteral => {
                let value = t.lexeme.parse().map_err(|_| CompileError::Lexical {
                    line: t.line,
                    message: format!("malformed float literal {}", t.lexeme),
                })?;
                Node::Float(value)
            }
            TokenKind::StringLiteral => Node::Str(decode_string(&t.lexeme)),
            TokenKind::Null => Node::Null,
            TokenKind::Variable => Node::Var(t.lexeme.clone()),
            TokenKind::Identifier => {
                self.advance();
                return self.parse_call(t.lexeme);
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(self.ast.push(node))
    }

    fn parse_call(&mut self, name: String) -> CompileResult<NodeId> {
        self.expect(TokenKind::OpenParen)?;
        let mut values = vec![];
        if !self.consume(TokenKind::CloseParen) {
            values.push(self.parse_expr()?);
            while self.consume(TokenKind::Comma) {
                values.push(self.parse_expr()?);
            }
            self.expect(TokenKind::CloseParen)?;
        }

        let mut args = None;
        for value in values.into_iter().rev() {
            args = Some(self.ast.push(Node::Argument { value, next: args }));
        }
        Ok(self.ast.push(Node::Call { name, args }))
    }
}
