//! # Lexer
//!
//! Turns TakoMusic source text into a flat stream of located tokens. This
//! is the one stage allowed to stop outright (`tokenize` returns a single
//! [`LexError`] rather than collecting many, per `SPEC_FULL.md` §4.1);
//! every other stage recovers or collects.
//!
//! ## Literal set
//! Beyond the usual identifiers/numbers/strings, TakoMusic tokens include
//! pitch literals (`C4`, `D#5`, `Eb-1`), duration letters with augmentation
//! dots (`q`, `q.`, `e..`), and bar:beat literals (`3:2`). The lexer
//! disambiguates these with bounded lookahead over the raw source slice,
//! the same trick the teacher's `check_metadata_marker` uses for `---`.
//!
//! Single-character identifiers that collide with a duration letter
//! (`w h q e s t x`) are always lexed as [`Token::Duration`] — see
//! `DESIGN.md` for why that ambiguity is resolved this way rather than by
//! tracking parser context in the lexer.

use crate::error::LexError;
use crate::rational::Rat;
use std::iter::Peekable;
use std::str::Chars;

/// One piece of a string literal that contains `${...}` interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Static(String),
    /// Raw, un-lexed source text of an embedded expression; the parser
    /// re-tokenizes and re-parses this when it builds the AST.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    Int(i64),
    Float(f64),
    Str(String),
    TemplateString(Vec<TemplatePart>),
    Pitch { letter: char, accidental: Option<char>, octave: i32 },
    Duration(Rat),
    BarBeat(u32, u32),

    // Punctuators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    QuestionQuestion,
    DotDot,
    DotDotEq,
    Dot,
    Comma,
    Semicolon,
    Colon,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Eq,

    // Keywords
    Fn,
    Const,
    Let,
    If,
    Else,
    For,
    In,
    Return,
    Match,
    Import,
    Export,
    From,
    Score,
    Clip,
    Track,
    Sound,
    Tempo,
    Meter,
    Meta,
    Place,
    Kind,
    Role,
    Instrument,
    DrumKit,
    Vocal,
    Fx,
    As,
    Up,
    Down,

    Eof,
}

impl Token {
    /// Human-readable name used in `unexpected-token` diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "fn" => Token::Fn,
        "const" => Token::Const,
        "let" => Token::Let,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "in" => Token::In,
        "return" => Token::Return,
        "match" => Token::Match,
        "import" => Token::Import,
        "export" => Token::Export,
        "from" => Token::From,
        "score" => Token::Score,
        "clip" => Token::Clip,
        "track" => Token::Track,
        "sound" => Token::Sound,
        "tempo" => Token::Tempo,
        "meter" => Token::Meter,
        "meta" => Token::Meta,
        "place" => Token::Place,
        "kind" => Token::Kind,
        "role" => Token::Role,
        "instrument" => Token::Instrument,
        "drumKit" => Token::DrumKit,
        "vocal" => Token::Vocal,
        "fx" => Token::Fx,
        "as" => Token::As,
        "up" => Token::Up,
        "down" => Token::Down,
        _ => return None,
    })
}

const DURATION_LETTERS: &str = "whqestx";

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input,
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            position: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<LocatedToken>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(LocatedToken { token: Token::Eof, line, column });
                break;
            };

            let token = if c.is_ascii_digit() {
                self.lex_number()?
            } else if c == '"' {
                self.lex_string()?
            } else if c.is_alphabetic() || c == '_' {
                self.lex_word()?
            } else {
                self.lex_punctuator()?
            };

            tokens.push(LocatedToken { token, line, column });
        }
        Ok(tokens)
    }

    fn lex_punctuator(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        let c = self.advance().unwrap();
        Ok(match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::EqEq
                } else {
                    Token::Eq
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '&' if self.peek() == Some('&') => {
                self.advance();
                Token::AndAnd
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                Token::OrOr
            }
            '?' if self.peek() == Some('?') => {
                self.advance();
                Token::QuestionQuestion
            }
            ':' => Token::Colon,
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::DotDotEq
                    } else {
                        Token::DotDot
                    }
                } else {
                    Token::Dot
                }
            }
            _ => return Err(LexError::UnexpectedChar { ch: c, line, column }),
        })
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.position;

        // Integer part.
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // Bar:beat literal — two adjacent integers separated by `:` with
        // no surrounding whitespace, distinguished from a lone Colon token.
        if self.peek() == Some(':') {
            if let Some(next) = self.peek_at(1) {
                if next.is_ascii_digit() {
                    let bar_text = &self.input[start..self.position];
                    self.advance(); // ':'
                    let beat_start = self.position;
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                        self.advance();
                    }
                    let beat_text = &self.input[beat_start..self.position];
                    let bar: u32 = bar_text.parse().map_err(|_| LexError::InvalidNumber {
                        text: bar_text.to_string(),
                        line,
                        column,
                    })?;
                    let beat: u32 = beat_text.parse().map_err(|_| LexError::InvalidNumber {
                        text: beat_text.to_string(),
                        line,
                        column,
                    })?;
                    return Ok(Token::BarBeat(bar, beat));
                }
            }
        }

        let mut is_float = false;

        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.input[start..self.position];
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber { text: text.to_string(), line, column })
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| LexError::InvalidNumber { text: text.to_string(), line, column })
        }
    }

    fn lex_word(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = &self.input[start..self.position];

        if word.len() == 1 {
            let letter = word.chars().next().unwrap();

            if DURATION_LETTERS.contains(letter) {
                let mut dots = 0;
                while self.peek() == Some('.') {
                    self.advance();
                    dots += 1;
                }
                let base = Rat::from_duration_letter(letter).unwrap();
                return Ok(Token::Duration(base.with_dots(dots)));
            }

            if ('A'..='G').contains(&letter) {
                return self.lex_pitch_or_identifier(letter, line, column, word.to_string());
            }
        }

        if let Some(kw) = keyword(word) {
            return Ok(kw);
        }

        Ok(Token::Identifier(word.to_string()))
    }

    /// `word` is a single uppercase letter A-G. Look ahead for an optional
    /// accidental and a required octave; if the shape doesn't match, the
    /// token is a plain (length-1) identifier instead.
    fn lex_pitch_or_identifier(
        &mut self,
        letter: char,
        line: usize,
        column: usize,
        word: String,
    ) -> Result<Token, LexError> {
        let mut offset = 0;
        let accidental = if matches!(self.peek_at(offset), Some('#') | Some('b')) {
            let a = self.peek_at(offset);
            offset += 1;
            a
        } else {
            None
        };

        let mut digit_offset = offset;
        if self.peek_at(digit_offset) == Some('-') {
            digit_offset += 1;
        }
        let digits_start = digit_offset;
        while matches!(self.peek_at(digit_offset), Some(c) if c.is_ascii_digit()) {
            digit_offset += 1;
        }

        if digit_offset == digits_start {
            // No octave digits followed: not a pitch literal after all.
            return Ok(Token::Identifier(word));
        }

        let octave_text: String = self.rest().chars().take(digit_offset).collect();
        for _ in 0..digit_offset {
            self.advance();
        }
        let octave: i32 = octave_text[offset..].parse().map_err(|_| LexError::InvalidNumber {
            text: octave_text.clone(),
            line,
            column,
        })?;

        Ok(Token::Pitch { letter, accidental, octave })
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote

        let mut parts: Vec<TemplatePart> = Vec::new();
        let mut current = String::new();
        let mut has_interpolation = false;

        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { line, column }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let (eline, ecol) = (self.line, self.column);
                    match self.advance() {
                        Some('n') => current.push('\n'),
                        Some('t') => current.push('\t'),
                        Some('\\') => current.push('\\'),
                        Some('"') => current.push('"'),
                        Some('$') => current.push('$'),
                        Some(other) => {
                            return Err(LexError::InvalidEscape { ch: other, line: eline, column: ecol })
                        }
                        None => return Err(LexError::UnterminatedString { line, column }),
                    }
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    has_interpolation = true;
                    parts.push(TemplatePart::Static(std::mem::take(&mut current)));
                    self.advance(); // '$'
                    self.advance(); // '{'
                    let expr = self.lex_template_expr(line, column)?;
                    parts.push(TemplatePart::Expr(expr));
                }
                Some(c) => {
                    current.push(c);
                    self.advance();
                }
            }
        }

        if has_interpolation {
            parts.push(TemplatePart::Static(current));
            Ok(Token::TemplateString(parts))
        } else {
            Ok(Token::Str(current))
        }
    }

    /// Scans raw source text between `${` and its matching `}`, tracking
    /// brace depth and skipping over nested string literals so a `}`
    /// inside a nested string doesn't close the interpolation early.
    fn lex_template_expr(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        let start = self.position;
        let mut depth = 1;
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedTemplateExpr { line, column }),
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        let text = self.input[start..self.position].to_string();
                        self.advance();
                        return Ok(text);
                    }
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(LexError::UnterminatedTemplateExpr { line, column }),
                            Some('\\') => {
                                self.advance();
                                self.advance();
                            }
                            Some('"') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<LocatedToken>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(kinds("1 // comment\n2"), vec![Token::Int(1), Token::Int(2), Token::Eof]);
        assert_eq!(kinds("1 /* block */ 2"), vec![Token::Int(1), Token::Int(2), Token::Eof]);
        assert_eq!(kinds("/* a /* not nested */ 1"), vec![Token::Int(1), Token::Eof]);
    }

    #[test]
    fn pitch_literals() {
        assert_eq!(kinds("C4")[0], Token::Pitch { letter: 'C', accidental: None, octave: 4 });
        assert_eq!(kinds("D#5")[0], Token::Pitch { letter: 'D', accidental: Some('#'), octave: 5 });
        assert_eq!(kinds("Eb-1")[0], Token::Pitch { letter: 'E', accidental: Some('b'), octave: -1 });
    }

    #[test]
    fn duration_literals_with_dots() {
        assert_eq!(kinds("q")[0], Token::Duration(Rat::new(1, 4)));
        assert_eq!(kinds("q.")[0], Token::Duration(Rat::new(3, 8)));
        assert_eq!(kinds("q..")[0], Token::Duration(Rat::new(7, 16)));
    }

    #[test]
    fn bar_beat_literal_vs_ratio() {
        assert_eq!(kinds("3:2"), vec![Token::BarBeat(3, 2), Token::Eof]);
        assert_eq!(kinds("3 / 2"), vec![Token::Int(3), Token::Slash, Token::Int(2), Token::Eof]);
    }

    #[test]
    fn template_literal_with_interpolation() {
        let toks = kinds(r#""Price: \$${5 + 5}""#);
        match &toks[0] {
            Token::TemplateString(parts) => {
                assert_eq!(
                    parts,
                    &vec![
                        TemplatePart::Static("Price: $".to_string()),
                        TemplatePart::Expr("5 + 5".to_string()),
                        TemplatePart::Static("".to_string()),
                    ]
                );
            }
            other => panic!("expected template string, got {:?}", other),
        }
    }

    #[test]
    fn plain_string_has_no_interpolation() {
        assert_eq!(kinds(r#""hello""#)[0], Token::Str("hello".to_string()));
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(matches!(tokenize("\"abc"), Err(LexError::UnterminatedString { .. })));
    }
}
