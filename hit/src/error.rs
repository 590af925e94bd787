use std::fmt;

/// Coarse classification of an [`Error`], mirroring the error kinds
/// enumerated for the HIT core: lexing, parsing, include resolution,
/// override conflicts, brace expressions, type conversion and semantic
/// (validator-only) errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    Lex,
    Parse,
    Include,
    Override,
    Brace,
    TypeConversion,
    Semantic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Include => "include error",
            ErrorKind::Override => "override conflict",
            ErrorKind::Brace => "brace-expr error",
            ErrorKind::TypeConversion => "type conversion error",
            ErrorKind::Semantic => "semantic error",
        };
        f.write_str(s)
    }
}

/// A single HIT diagnostic, carrying the originating location so it can be
/// rendered as `<file>:<line>.<col>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    file: String,
    line: u32,
    column: u32,
}

impl Error {
    pub fn new(kind: ErrorKind, file: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            file: file.into(),
            line,
            column,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}: {}", self.file, self.line, self.column, self.message)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Several HIT operations (the brace expander in particular) collect more
/// than one diagnostic from a single walk instead of aborting at the first
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn new() -> Self {
        ErrorList(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}
