// ABOUTME: Lexer module converting Cirno source text into lexemes using nom combinators

use nom::{
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    IResult, Parser,
};

use crate::error::{CirnoError, SyntaxError};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A source position: the file the lexeme came from and its line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcLoc {
    pub path: Rc<str>,
    pub line: u32,
}

impl SrcLoc {
    pub fn new(path: Rc<str>, line: u32) -> Self {
        SrcLoc { path, line }
    }
}

impl fmt::Display for SrcLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Payload-carrying tokens
    Int(i32),
    Float(f32),
    Ident(Rc<str>),
    Str(Rc<str>),

    // Keywords
    KwI32,
    KwF32,
    KwString,
    KwClass,
    KwClassDef,
    KwPrint,
    KwWhile,
    KwIf,
    KwElse,
    KwFor,
    KwBreak,
    KwContinue,
    KwReturn,
    KwFn,
    KwNew,
    KwArrayInit,

    // Two-character operators
    Arrow,
    Incr,
    Decr,
    Ge,
    Le,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,

    // Single-character operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Semi,
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Bang,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Int(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Str(_) => "string-literal",
            TokenKind::KwI32 => "i32",
            TokenKind::KwF32 => "f32",
            TokenKind::KwString => "string",
            TokenKind::KwClass => "class",
            TokenKind::KwClassDef => "class_def",
            TokenKind::KwPrint => "print",
            TokenKind::KwWhile => "while",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwFor => "for",
            TokenKind::KwBreak => "break",
            TokenKind::KwContinue => "continue",
            TokenKind::KwReturn => "return",
            TokenKind::KwFn => "fn",
            TokenKind::KwNew => "new",
            TokenKind::KwArrayInit => "array_init",
            TokenKind::Arrow => "->",
            TokenKind::Incr => "++",
            TokenKind::Decr => "--",
            TokenKind::Ge => ">=",
            TokenKind::Le => "<=",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::AddAssign => "+=",
            TokenKind::SubAssign => "-=",
            TokenKind::MulAssign => "*=",
            TokenKind::DivAssign => "/=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Assign => "=",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Bang => "!",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", s)
    }
}

/// A token with its source location.
#[derive(Debug, Clone)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub loc: SrcLoc,
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payload tokens print their spelling, everything else its symbol.
        match &self.kind {
            TokenKind::Int(v) => write!(f, "{}", v),
            TokenKind::Float(v) => write!(f, "{:.6}", v),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            k => write!(f, "{}", k),
        }
    }
}

// ============================================================================
// Keyword and Operator Tables
// ============================================================================

const KEYWORD_TABLE: &[(&str, TokenKind)] = &[
    ("class_def", TokenKind::KwClassDef),
    ("class", TokenKind::KwClass),
    ("print", TokenKind::KwPrint),
    ("while", TokenKind::KwWhile),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("for", TokenKind::KwFor),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("return", TokenKind::KwReturn),
    ("fn", TokenKind::KwFn),
    ("new", TokenKind::KwNew),
    ("i32", TokenKind::KwI32),
    ("f32", TokenKind::KwF32),
    ("string", TokenKind::KwString),
    ("array_init", TokenKind::KwArrayInit),
];

// Two-character operators are matched before single-character ones.
const OP2_TABLE: &[(&str, TokenKind)] = &[
    ("->", TokenKind::Arrow),
    ("++", TokenKind::Incr),
    ("--", TokenKind::Decr),
    (">=", TokenKind::Ge),
    ("<=", TokenKind::Le),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::Ne),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("+=", TokenKind::AddAssign),
    ("-=", TokenKind::SubAssign),
    ("*=", TokenKind::MulAssign),
    ("/=", TokenKind::DivAssign),
];

const OP1_TABLE: &[(char, TokenKind)] = &[
    ('+', TokenKind::Plus),
    ('-', TokenKind::Minus),
    ('*', TokenKind::Star),
    ('/', TokenKind::Slash),
    ('=', TokenKind::Assign),
    (';', TokenKind::Semi),
    (':', TokenKind::Colon),
    (',', TokenKind::Comma),
    ('.', TokenKind::Dot),
    ('(', TokenKind::LParen),
    (')', TokenKind::RParen),
    ('{', TokenKind::LBrace),
    ('}', TokenKind::RBrace),
    ('[', TokenKind::LBracket),
    (']', TokenKind::RBracket),
    ('<', TokenKind::Lt),
    ('>', TokenKind::Gt),
    ('!', TokenKind::Bang),
];

// ============================================================================
// Token Matchers
// ============================================================================

/// Parse an integer or float constant. A digit run is an integer; a digit
/// run followed by `.` and more digits is a float. Sign is handled by the
/// parser as unary minus.
fn match_number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize((digit1, opt((char('.'), digit1)))).parse(input)?;
    if text.contains('.') {
        let value: f32 = text.parse().unwrap_or(0.0);
        Ok((rest, TokenKind::Float(value)))
    } else {
        // Overflowing literals wrap like the 32-bit representation would.
        let value = text.parse::<i64>().unwrap_or(0) as i32;
        Ok((rest, TokenKind::Int(value)))
    }
}

/// Parse a keyword or identifier: letters and underscores start a word,
/// followed by alphanumerics and underscores.
fn match_word(input: &str) -> IResult<&str, TokenKind> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Alpha,
            )))
        }
    }
    let end = chars
        .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_')
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let word = &input[..end];
    let rest = &input[end..];

    for (spelling, kind) in KEYWORD_TABLE {
        if *spelling == word {
            return Ok((rest, kind.clone()));
        }
    }
    Ok((rest, TokenKind::Ident(Rc::from(word))))
}

/// Parse a string literal with `\" \\ \n \t` escape sequences. Returns the
/// unescaped contents, or an error kind the caller maps to an unterminated
/// string diagnostic.
fn match_string(input: &str) -> IResult<&str, TokenKind> {
    let (after_quote, _) = char('"')(input)?;

    let mut result = String::new();
    let mut chars = after_quote.char_indices();
    loop {
        match chars.next() {
            Some((i, '"')) => {
                return Ok((&after_quote[i + 1..], TokenKind::Str(Rc::from(result.as_str()))));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                Some((_, other)) => {
                    result.push('\\');
                    result.push(other);
                }
                None => break,
            },
            Some((_, c)) => result.push(c),
            None => break,
        }
    }

    // Ran off the end of input: unterminated literal.
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Greedy operator match: two-character operators first, then single
/// characters.
fn match_op(input: &str) -> Option<(&str, TokenKind)> {
    for (spelling, kind) in OP2_TABLE {
        if let Some(rest) = input.strip_prefix(spelling) {
            return Some((rest, kind.clone()));
        }
    }
    let first = input.chars().next()?;
    for (c, kind) in OP1_TABLE {
        if *c == first {
            return Some((&input[first.len_utf8()..], kind.clone()));
        }
    }
    None
}

// ============================================================================
// Scanner
// ============================================================================

/// Lexes files into token streams, resolving `#include` directives and
/// deduplicating them so each file is spliced at most once per compilation.
pub struct Lexer {
    included: HashSet<PathBuf>,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            included: HashSet::new(),
        }
    }

    /// Lex a file into a token stream terminated by an explicit Eof lexeme.
    pub fn lex_file(&mut self, path: &Path) -> Result<Vec<Lexeme>, CirnoError> {
        self.register(path);
        let mut out = Vec::new();
        let line = self.lex_into(path, &mut out)?;
        out.push(Lexeme {
            kind: TokenKind::Eof,
            loc: SrcLoc::new(Rc::from(path.to_string_lossy().as_ref()), line),
        });
        Ok(out)
    }

    fn register(&mut self, path: &Path) -> bool {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.included.insert(key)
    }

    /// Lex one file, appending its tokens (without Eof) to `out`. Returns the
    /// final line number for Eof placement.
    fn lex_into(&mut self, path: &Path, out: &mut Vec<Lexeme>) -> Result<u32, CirnoError> {
        let src = std::fs::read_to_string(path).map_err(|source| CirnoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.scan(&src, name, dir, out)
    }

    fn scan(
        &mut self,
        src: &str,
        name: Rc<str>,
        dir: &Path,
        out: &mut Vec<Lexeme>,
    ) -> Result<u32, CirnoError> {
        let mut rest = src;
        let mut line: u32 = 1;

        loop {
            rest = skip_noise(rest, &mut line);
            if rest.is_empty() {
                return Ok(line);
            }

            let loc = SrcLoc::new(name.clone(), line);

            if let Some(after) = rest.strip_prefix('#') {
                rest = self.directive(after, &loc, dir, out)?;
                continue;
            }

            if let Ok((next, kind)) = match_number(rest) {
                out.push(Lexeme { kind, loc });
                rest = next;
                continue;
            }
            if let Ok((next, kind)) = match_word(rest) {
                out.push(Lexeme { kind, loc });
                rest = next;
                continue;
            }
            match match_string(rest) {
                Ok((next, kind)) => {
                    line += newlines(&rest[..rest.len() - next.len()]);
                    out.push(Lexeme { kind, loc });
                    rest = next;
                    continue;
                }
                Err(nom::Err::Failure(_)) => {
                    return Err(CirnoError::Parse(vec![SyntaxError::UnterminatedString {
                        loc,
                    }]));
                }
                Err(_) => {}
            }
            if let Some((next, kind)) = match_op(rest) {
                out.push(Lexeme { kind, loc });
                rest = next;
                continue;
            }

            // Unknown byte: warn and move on.
            let c = rest.chars().next().unwrap_or('\0');
            eprintln!("{}: warning: skipping unknown character '{}'", loc, c);
            rest = &rest[c.len_utf8()..];
        }
    }

    /// Handle a `#...` directive. Only `#include "path"` is recognized; the
    /// included file's token stream is spliced in place, once per file.
    fn directive<'a>(
        &mut self,
        input: &'a str,
        loc: &SrcLoc,
        dir: &Path,
        out: &mut Vec<Lexeme>,
    ) -> Result<&'a str, CirnoError> {
        if let Ok((rest, TokenKind::Ident(word))) = match_word(input) {
            if word.as_ref() == "include" {
                let rest = rest.trim_start_matches([' ', '\t']);
                return match match_string(rest) {
                    Ok((next, TokenKind::Str(rel))) => {
                        let target = dir.join(rel.as_ref());
                        if self.register(&target) {
                            self.lex_into(&target, out)?;
                        }
                        Ok(next)
                    }
                    _ => Err(CirnoError::Parse(vec![SyntaxError::BadInclude {
                        loc: loc.clone(),
                    }])),
                };
            }
            eprintln!("{}: warning: unknown directive '#{}'", loc, word);
            return Ok(rest);
        }
        eprintln!("{}: warning: stray '#'", loc);
        Ok(input)
    }
}

/// Skip whitespace and `//` line comments, counting newlines.
fn skip_noise<'a>(mut rest: &'a str, line: &mut u32) -> &'a str {
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t', '\r']);
        if let Some(after) = trimmed.strip_prefix('\n') {
            *line += 1;
            rest = after;
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix("//") {
            rest = match comment.find('\n') {
                Some(i) => {
                    *line += 1;
                    &comment[i + 1..]
                }
                None => "",
            };
            continue;
        }
        return trimmed;
    }
}

fn newlines(text: &str) -> u32 {
    text.bytes().filter(|b| *b == b'\n').count() as u32
}

/// Lex an in-memory source string (for embedding and tests). Includes are
/// resolved relative to the process working directory.
pub fn lex_source(src: &str, name: &str) -> Result<Vec<Lexeme>, CirnoError> {
    let mut lexer = Lexer::new();
    let name: Rc<str> = Rc::from(name);
    let mut out = Vec::new();
    let line = lexer.scan(src, name.clone(), Path::new("."), &mut out)?;
    out.push(Lexeme {
        kind: TokenKind::Eof,
        loc: SrcLoc::new(name, line),
    });
    Ok(out)
}
