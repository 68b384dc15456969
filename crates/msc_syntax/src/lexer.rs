//! Lexical analyzer for MS source text.
//!
//! Converts source text into a sequence of [`Token`]s, handling lower/upper
//! case-distinguished identifiers, `$`-prefixed system identifiers, sized and
//! unsized integer literals (`42`, `'b101`, `8'hFF`), string literals, and
//! line and block comments. The lexer bails on the first error, mirroring
//! the parser's bail-on-first-error recovery policy.

use crate::token::{lookup_keyword, Token, TokenKind};
use msc_source::{FileId, Span};

/// A lexer error: a message plus the byte range of the offending input.
#[derive(Debug)]
pub struct LexError {
    /// Description of the error ("invalid input", "unterminated string", ...).
    pub message: String,
    /// The byte range of the offending input.
    pub span: Span,
}

/// Lexes the given MS source text into a vector of tokens.
///
/// Whitespace and comments are skipped; the text between two consecutive
/// token spans can be recovered from the source to preserve layout. The
/// returned vector always ends with a [`TokenKind::Eof`] token.
pub fn lex(source: &str, file: FileId) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }

    fn peek(&self) -> u8 {
        if self.pos < self.source.len() {
            self.source[self.pos]
        } else {
            0
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let idx = self.pos + offset;
        if idx < self.source.len() {
            self.source[idx]
        } else {
            0
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> LexError {
        LexError {
            message: message.into(),
            span,
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.source.len() {
                return Ok(());
            }
            // Line comment: //
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                self.pos += 2;
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            // Block comment: /* ... */ (non-nesting)
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        return Err(
                            self.error("unterminated block comment", self.span_from(start))
                        );
                    }
                    if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let b = self.peek();

        if is_ident_start(b) {
            return Ok(self.lex_identifier(start));
        }
        if b == b'$' && is_ident_start(self.peek_at(1)) {
            self.pos += 1;
            let tok = self.lex_identifier(start);
            return Ok(Token {
                kind: TokenKind::DollarIdent,
                span: tok.span,
            });
        }
        if b.is_ascii_digit() {
            return self.lex_int_literal(start);
        }
        if b == b'\'' {
            return self.lex_based_literal(start);
        }
        if b == b'"' {
            return self.lex_string(start);
        }

        self.lex_operator(start)
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while is_ident_continue(self.peek()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        let kind = match lookup_keyword(text) {
            Some(kw) => kw,
            None => {
                if text.starts_with(|c: char| c.is_ascii_uppercase()) {
                    TokenKind::UpperIdent
                } else {
                    TokenKind::LowerIdent
                }
            }
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_int_literal(&mut self, start: usize) -> Result<Token, LexError> {
        while self.peek().is_ascii_digit() || self.peek() == b'_' {
            self.pos += 1;
        }
        // Sized literal: size'base digits
        if self.peek() == b'\'' {
            self.pos += 1;
            self.lex_literal_base_and_digits(start)?;
        }
        Ok(Token {
            kind: TokenKind::IntLiteral,
            span: self.span_from(start),
        })
    }

    fn lex_based_literal(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1; // the quote
        self.lex_literal_base_and_digits(start)?;
        Ok(Token {
            kind: TokenKind::IntLiteral,
            span: self.span_from(start),
        })
    }

    fn lex_literal_base_and_digits(&mut self, start: usize) -> Result<(), LexError> {
        match self.peek().to_ascii_lowercase() {
            b'd' | b'b' | b'h' | b'o' => self.pos += 1,
            _ => {
                while is_ident_continue(self.peek()) {
                    self.pos += 1;
                }
                return Err(self.error(
                    format!(
                        "invalid integer literal '{}'",
                        String::from_utf8_lossy(&self.source[start..self.pos])
                    ),
                    self.span_from(start),
                ));
            }
        }
        if !self.peek().is_ascii_alphanumeric() {
            return Err(self.error(
                format!(
                    "invalid integer literal '{}'",
                    String::from_utf8_lossy(&self.source[start..self.pos])
                ),
                self.span_from(start),
            ));
        }
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.pos += 1;
        }
        Ok(())
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        self.pos += 1;
        loop {
            match self.peek() {
                0 | b'\n' => {
                    return Err(self.error("unterminated string", self.span_from(start)));
                }
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        Ok(Token {
            kind: TokenKind::StringLiteral,
            span: self.span_from(start),
        })
    }

    fn lex_operator(&mut self, start: usize) -> Result<Token, LexError> {
        use TokenKind::*;
        let b = self.peek();
        let b1 = self.peek_at(1);
        let (kind, len) = match (b, b1) {
            (b'*', b'*') => (StarStar, 2),
            (b'<', b'<') => (Shl, 2),
            (b'>', b'>') => (Shr, 2),
            (b'<', b'=') => (LtEq, 2),
            (b'>', b'=') => (GtEq, 2),
            (b'=', b'=') => (EqEq, 2),
            (b'!', b'=') => (NotEq, 2),
            (b'&', b'&') => (AmpAmp, 2),
            (b'|', b'|') => (PipePipe, 2),
            (b'^', b'~') => (CaretTilde, 2),
            (b'~', b'^') => (TildeCaret, 2),
            (b'~', b'&') => (TildeAmp, 2),
            (b'~', b'|') => (TildePipe, 2),
            (b'(', _) => (LParen, 1),
            (b')', _) => (RParen, 1),
            (b'{', _) => (LBrace, 1),
            (b'}', _) => (RBrace, 1),
            (b'[', _) => (LBracket, 1),
            (b']', _) => (RBracket, 1),
            (b';', _) => (Semi, 1),
            (b':', _) => (Colon, 1),
            (b',', _) => (Comma, 1),
            (b'.', _) => (Dot, 1),
            (b'#', _) => (Hash, 1),
            (b'?', _) => (Question, 1),
            (b'=', _) => (Eq, 1),
            (b'+', _) => (Plus, 1),
            (b'-', _) => (Minus, 1),
            (b'*', _) => (Star, 1),
            (b'/', _) => (Slash, 1),
            (b'%', _) => (Percent, 1),
            (b'<', _) => (Lt, 1),
            (b'>', _) => (Gt, 1),
            (b'&', _) => (Amp, 1),
            (b'|', _) => (Pipe, 1),
            (b'^', _) => (Caret, 1),
            (b'~', _) => (Tilde, 1),
            (b'!', _) => (Bang, 1),
            _ => {
                self.pos += 1;
                return Err(self.error(
                    format!("invalid input '{}'", b as char),
                    self.span_from(start),
                ));
            }
        };
        self.pos += len;
        Ok(Token {
            kind,
            span: self.span_from(start),
        })
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, FileId::from_raw(0))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn identifiers_and_keywords() {
        use TokenKind::*;
        assert_eq!(
            kinds("module Counter; endmodule"),
            vec![KwModule, UpperIdent, Semi, KwEndModule, Eof]
        );
        assert_eq!(kinds("counter"), vec![LowerIdent, Eof]);
        assert_eq!(kinds("$display"), vec![DollarIdent, Eof]);
    }

    #[test]
    fn int_literals() {
        use TokenKind::*;
        assert_eq!(kinds("42"), vec![IntLiteral, Eof]);
        assert_eq!(kinds("1_000"), vec![IntLiteral, Eof]);
        assert_eq!(kinds("8'hFF"), vec![IntLiteral, Eof]);
        assert_eq!(kinds("'b101"), vec![IntLiteral, Eof]);
        assert_eq!(kinds("4'd12"), vec![IntLiteral, Eof]);
    }

    #[test]
    fn invalid_literal_is_error() {
        assert!(lex("3'q12", FileId::from_raw(0)).is_err());
    }

    #[test]
    fn operators_longest_match() {
        use TokenKind::*;
        assert_eq!(kinds("a ** b"), vec![LowerIdent, StarStar, LowerIdent, Eof]);
        assert_eq!(kinds("a <= b"), vec![LowerIdent, LtEq, LowerIdent, Eof]);
        assert_eq!(kinds("a ^~ b"), vec![LowerIdent, CaretTilde, LowerIdent, Eof]);
        assert_eq!(kinds("~^x"), vec![TildeCaret, LowerIdent, Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("a // line\n b /* block */ c"),
            vec![LowerIdent, LowerIdent, LowerIdent, Eof]
        );
    }

    #[test]
    fn unterminated_string_is_error() {
        let err = lex("\"abc", FileId::from_raw(0)).unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn token_spans_cover_text() {
        let toks = lex("ab cd", FileId::from_raw(0)).unwrap();
        assert_eq!(toks[0].span.start, 0);
        assert_eq!(toks[0].span.end, 2);
        assert_eq!(toks[1].span.start, 3);
        assert_eq!(toks[1].span.end, 5);
    }

    #[test]
    fn parametric_use_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("f#(4)"),
            vec![LowerIdent, Hash, LParen, IntLiteral, RParen, Eof]
        );
    }
}
