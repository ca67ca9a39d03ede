use phf::phf_map;

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "function" => TokenKind::Function,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "return" => TokenKind::Return,
    "null" => TokenKind::Null,
    "int" => TokenKind::Int,
    "float" => TokenKind::Float,
    "string" => TokenKind::String,
    "void" => TokenKind::Void,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    OpenTag,
    CloseTag,

    Identifier,
    Variable,
    IntLiteral,
    FloatLiteral,
    StringLiteral,

    Function,
    If,
    Else,
    While,
    Return,
    Null,
    Int,
    Float,
    String,
    Void,

    Assign,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Not,

    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DotAssign,
    Increment,
    Decrement,

    And,
    Or,

    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    OpenParen,
    CloseParen,
    OpenCurlyBrace,
    CloseCurlyBrace,
    Comma,
    SemiColon,
    Colon,
    Question,

    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}
