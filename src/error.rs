use thiserror::Error;

/// Fatal error categories, each with a fixed process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Undefined,
    Argument,
    Return,
    Type,
    Other,
    Internal,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Lexical => 1,
            ErrorKind::Syntax => 2,
            ErrorKind::Undefined => 3,
            ErrorKind::Argument => 4,
            ErrorKind::Return => 6,
            ErrorKind::Type => 7,
            ErrorKind::Other => 8,
            ErrorKind::Internal => 99,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("lexical error on line {line}: {message}")]
    Lexical { line: usize, message: String },
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("undefined symbol: {message}")]
    Undefined { message: String },
    #[error("bad call argument: {message}")]
    Argument { message: String },
    #[error("bad return: {message}")]
    Return { message: String },
    #[error("type mismatch: {message}")]
    Type { message: String },
    #[error("semantic error: {message}")]
    Other { message: String },
    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lexical { .. } => ErrorKind::Lexical,
            CompileError::Syntax { .. } => ErrorKind::Syntax,
            CompileError::Undefined { .. } => ErrorKind::Undefined,
            CompileError::Argument { .. } => ErrorKind::Argument,
            CompileError::Return { .. } => ErrorKind::Return,
            CompileError::Type { .. } => ErrorKind::Type,
            CompileError::Other { .. } => ErrorKind::Other,
            CompileError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        CompileError::Undefined {
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        CompileError::Argument {
            message: message.into(),
        }
    }

    pub fn ret(message: impl Into<String>) -> Self {
        CompileError::Return {
            message: message.into(),
        }
    }

    pub fn ty(message: impl Into<String>) -> Self {
        CompileError::Type {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        CompileError::Other {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
