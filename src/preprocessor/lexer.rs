//! SPARQL tokenizer.
//!
//! Splits query text into the tokens the preprocessor's state machine
//! needs. The lexer is deliberately shallow: it recognizes keywords,
//! punctuation, terms and operators, but does not validate the grammar.
//! Offsets are character positions in the input.

use crate::error::{Result, SparqlateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Query forms
    Ask,
    Select,
    Describe,
    Construct,
    // Clause keywords
    Where,
    From,
    Named,
    Prefix,
    Base,
    OrderBy,
    GroupBy,
    Having,
    Limit,
    Offset,
    Distinct,
    Reduced,
    Filter,
    Optional,
    Union,
    Minus,
    Graph,
    Bind,
    Values,
    As,
    /// `*` in a projection.
    All,
    // Punctuation
    LeftCurly,
    RightCurly,
    LeftParen,
    RightParen,
    Dot,
    Semicolon,
    Comma,
    // Terms
    Variable,
    Iri,
    PrefixedName,
    BlankNode,
    /// String, numeric and boolean literals.
    Literal,
    /// Operators, including `*` outside a projection.
    Operator,
    /// Function names, `a`, `ASC`/`DESC` and other bare words.
    Identifier,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, offset: usize) -> Self {
        Token {
            kind,
            text: text.to_string(),
            offset,
        }
    }

    /// Variable name without its sigil.
    pub fn variable_name(&self) -> &str {
        self.text.trim_start_matches(['?', '$'])
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_uppercase().as_str() {
        "ASK" => TokenKind::Ask,
        "SELECT" => TokenKind::Select,
        "DESCRIBE" => TokenKind::Describe,
        "CONSTRUCT" => TokenKind::Construct,
        "WHERE" => TokenKind::Where,
        "FROM" => TokenKind::From,
        "NAMED" => TokenKind::Named,
        "PREFIX" => TokenKind::Prefix,
        "BASE" => TokenKind::Base,
        "HAVING" => TokenKind::Having,
        "LIMIT" => TokenKind::Limit,
        "OFFSET" => TokenKind::Offset,
        "DISTINCT" => TokenKind::Distinct,
        "REDUCED" => TokenKind::Reduced,
        "FILTER" => TokenKind::Filter,
        "OPTIONAL" => TokenKind::Optional,
        "UNION" => TokenKind::Union,
        "MINUS" => TokenKind::Minus,
        "GRAPH" => TokenKind::Graph,
        "BIND" => TokenKind::Bind,
        "VALUES" => TokenKind::Values,
        "AS" => TokenKind::As,
        _ => return None,
    };
    Some(kind)
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole input. The result always ends with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        loop {
            self.skip_whitespace_and_comments();
            let start = self.position;
            let Some(c) = self.current_char() else {
                self.tokens.push(Token::new(TokenKind::Eof, "", start));
                return Ok(self.tokens);
            };

            let token = match c {
                '{' => self.single(TokenKind::LeftCurly),
                '}' => self.single(TokenKind::RightCurly),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                '.' => self.single(TokenKind::Dot),
                ';' => self.single(TokenKind::Semicolon),
                ',' => self.single(TokenKind::Comma),
                '*' => {
                    let kind = if self.in_projection() {
                        TokenKind::All
                    } else {
                        TokenKind::Operator
                    };
                    self.single(kind)
                }
                '?' | '$' => self.read_variable()?,
                '<' => self.read_iri_or_operator(),
                '"' | '\'' => self.read_string()?,
                '_' if self.peek_char() == Some(':') => self.read_blank_node(),
                ':' => self.read_prefixed_name(start),
                c if c.is_ascii_digit() => self.read_number(),
                c if c.is_alphabetic() => self.read_word(),
                '>' | '=' | '!' | '&' | '|' | '+' | '-' | '/' | '^' => self.read_operator(),
                other => {
                    return Err(SparqlateError::MalformedTokenStream {
                        offset: start,
                        message: format!("unexpected character '{other}'"),
                    });
                }
            };
            self.tokens.push(token);
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn text(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.position;
        self.advance();
        Token::new(kind, &self.text(start), start)
    }

    /// `*` is a wildcard right after `SELECT [DISTINCT|REDUCED]` or `DESCRIBE`.
    fn in_projection(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| t.kind),
            Some(TokenKind::Select | TokenKind::Distinct | TokenKind::Reduced | TokenKind::Describe)
        )
    }

    fn is_name_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '-'
    }

    fn read_name(&mut self) {
        while let Some(c) = self.current_char() {
            if Self::is_name_char(c) {
                self.advance();
            } else if c == '.'
                && self.peek_char().is_some_and(Self::is_name_char)
            {
                // Dots are allowed inside, never at the end of, a local name.
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_variable(&mut self) -> Result<Token> {
        let start = self.position;
        self.advance();
        let name_start = self.position;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        if self.position == name_start {
            // A bare `?` is a property-path modifier.
            return Ok(Token::new(TokenKind::Operator, &self.text(start), start));
        }
        Ok(Token::new(TokenKind::Variable, &self.text(start), start))
    }

    /// `<` opens an IRI only if a `>` follows before any whitespace.
    fn read_iri_or_operator(&mut self) -> Token {
        let start = self.position;
        let mut end = start + 1;
        while let Some(&c) = self.input.get(end) {
            if c == '>' {
                self.position = end + 1;
                return Token::new(TokenKind::Iri, &self.text(start), start);
            }
            if c.is_whitespace() || matches!(c, '<' | '"' | '{' | '}' | '|' | '^' | '`') {
                break;
            }
            end += 1;
        }

        self.advance();
        if self.current_char() == Some('=') {
            self.advance();
        }
        Token::new(TokenKind::Operator, &self.text(start), start)
    }

    fn read_operator(&mut self) -> Token {
        let start = self.position;
        let first = self.current_char();
        self.advance();
        let second = self.current_char();
        let doubled = matches!(
            (first, second),
            (Some('>' | '!'), Some('='))
                | (Some('&'), Some('&'))
                | (Some('|'), Some('|'))
                | (Some('^'), Some('^'))
        );
        if doubled {
            self.advance();
        }
        Token::new(TokenKind::Operator, &self.text(start), start)
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.position;
        let Some(quote) = self.current_char() else {
            return Err(SparqlateError::InternalError("read_string at end of input".into()));
        };
        let long = self.peek_char() == Some(quote)
            && self.input.get(self.position + 2).copied() == Some(quote);

        let delimiter_len = if long { 3 } else { 1 };
        self.position += delimiter_len;

        loop {
            let Some(c) = self.current_char() else {
                return Err(SparqlateError::MalformedTokenStream {
                    offset: start,
                    message: "unterminated string literal".into(),
                });
            };
            if c == '\\' {
                self.position += 2;
                continue;
            }
            if !long && c == '\n' {
                return Err(SparqlateError::MalformedTokenStream {
                    offset: start,
                    message: "line break in short string literal".into(),
                });
            }
            if c == quote {
                if !long {
                    self.advance();
                    break;
                }
                if self.peek_char() == Some(quote)
                    && self.input.get(self.position + 2).copied() == Some(quote)
                {
                    self.position += 3;
                    // A long string may end in up to two extra quotes.
                    while self.current_char() == Some(quote) {
                        self.advance();
                    }
                    break;
                }
            }
            self.advance();
        }

        // Suffix: language tag or datatype.
        match self.current_char() {
            Some('@') => {
                self.advance();
                while let Some(c) = self.current_char() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            Some('^') if self.peek_char() == Some('^') => {
                self.position += 2;
                match self.current_char() {
                    Some('<') => {
                        let iri = self.read_iri_or_operator();
                        if iri.kind != TokenKind::Iri {
                            return Err(SparqlateError::MalformedTokenStream {
                                offset: iri.offset,
                                message: "unterminated datatype IRI".into(),
                            });
                        }
                    }
                    Some(c) if c.is_alphabetic() || c == ':' => {
                        self.read_name();
                        if self.current_char() == Some(':') {
                            self.advance();
                            self.read_name();
                        }
                    }
                    _ => {
                        return Err(SparqlateError::MalformedTokenStream {
                            offset: self.position,
                            message: "expected datatype after '^^'".into(),
                        });
                    }
                }
            }
            _ => {}
        }

        Ok(Token::new(TokenKind::Literal, &self.text(start), start))
    }

    fn read_blank_node(&mut self) -> Token {
        let start = self.position;
        self.position += 2;
        self.read_name();
        Token::new(TokenKind::BlankNode, &self.text(start), start)
    }

    fn read_prefixed_name(&mut self, start: usize) -> Token {
        // Positioned on the ':'.
        self.advance();
        self.read_name();
        Token::new(TokenKind::PrefixedName, &self.text(start), start)
    }

    fn read_number(&mut self) -> Token {
        let start = self.position;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let save = self.position;
            self.advance();
            if matches!(self.current_char(), Some('+' | '-')) {
                self.advance();
            }
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.position = save;
            }
        }
        Token::new(TokenKind::Literal, &self.text(start), start)
    }

    fn read_word(&mut self) -> Token {
        let start = self.position;
        self.read_name();

        if self.current_char() == Some(':') {
            return self.read_prefixed_name(start);
        }

        let word = self.text(start);
        let upper = word.to_ascii_uppercase();

        if upper == "ORDER" || upper == "GROUP" {
            let save = self.position;
            self.skip_whitespace_and_comments();
            let by_start = self.position;
            self.read_name();
            if self.text(by_start).eq_ignore_ascii_case("BY") {
                let (kind, text) = if upper == "ORDER" {
                    (TokenKind::OrderBy, "ORDER BY")
                } else {
                    (TokenKind::GroupBy, "GROUP BY")
                };
                return Token::new(kind, text, start);
            }
            self.position = save;
        }

        if upper == "TRUE" || upper == "FALSE" {
            return Token::new(TokenKind::Literal, &word.to_ascii_lowercase(), start);
        }

        match keyword(&word) {
            Some(kind) => Token::new(kind, &upper, start),
            None => Token::new(TokenKind::Identifier, &word, start),
        }
    }
}

/// Tokenize `input`.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}
