//! Token kinds produced by the MS lexer.

use msc_source::Span;

/// A lexed token: a kind plus the byte range it covers.
///
/// Tokens do not own their text; it is sliced from the source file on
/// demand. Whitespace and comments are not tokens, but the text between two
/// consecutive tokens can be recovered from the gap between their spans,
/// which is how emitted code preserves original layout.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    /// The kind of this token.
    pub kind: TokenKind,
    /// The byte range of this token in its source file.
    pub span: Span,
}

/// The kind of a lexed MS token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TokenKind {
    /// An identifier starting with an upper-case letter (types, modules).
    UpperIdent,
    /// An identifier starting with a lower-case letter (variables, functions).
    LowerIdent,
    /// An identifier starting with `$` (system functions).
    DollarIdent,
    /// An integer literal, sized or unsized.
    IntLiteral,
    /// A double-quoted string literal.
    StringLiteral,

    /// `begin`
    KwBegin,
    /// `bsvimport`
    KwBsvImport,
    /// `case`
    KwCase,
    /// `default`
    KwDefault,
    /// `else`
    KwElse,
    /// `end`
    KwEnd,
    /// `endcase`
    KwEndCase,
    /// `endfunction`
    KwEndFunction,
    /// `endmethod`
    KwEndMethod,
    /// `endmodule`
    KwEndModule,
    /// `endrule`
    KwEndRule,
    /// `enum`
    KwEnum,
    /// `for`
    KwFor,
    /// `function`
    KwFunction,
    /// `if`
    KwIf,
    /// `import`
    KwImport,
    /// `input`
    KwInput,
    /// `let`
    KwLet,
    /// `method`
    KwMethod,
    /// `module`
    KwModule,
    /// `return`
    KwReturn,
    /// `rule`
    KwRule,
    /// `struct`
    KwStruct,
    /// `type`
    KwType,
    /// `typedef`
    KwTypedef,

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `;`
    Semi,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `#`
    Hash,
    /// `?`
    Question,
    /// `=`
    Eq,

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    StarStar,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `<`
    Lt,
    /// `<=` (comparison or register write, depending on context)
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `&`
    Amp,
    /// `&&`
    AmpAmp,
    /// `|`
    Pipe,
    /// `||`
    PipePipe,
    /// `^`
    Caret,
    /// `^~`
    CaretTilde,
    /// `~`
    Tilde,
    /// `~&`
    TildeAmp,
    /// `~|`
    TildePipe,
    /// `~^`
    TildeCaret,
    /// `!`
    Bang,

    /// End of file.
    Eof,
}

impl TokenKind {
    /// Returns a human-readable description of this token kind for error
    /// messages.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            UpperIdent => "type or module name (uppercase identifier)",
            LowerIdent => "variable or function name (lowercase identifier)",
            DollarIdent => "system function name (identifier beginning with $)",
            IntLiteral => "integer literal",
            StringLiteral => "string literal",
            KwBegin => "'begin'",
            KwBsvImport => "'bsvimport'",
            KwCase => "'case'",
            KwDefault => "'default'",
            KwElse => "'else'",
            KwEnd => "'end'",
            KwEndCase => "'endcase'",
            KwEndFunction => "'endfunction'",
            KwEndMethod => "'endmethod'",
            KwEndModule => "'endmodule'",
            KwEndRule => "'endrule'",
            KwEnum => "'enum'",
            KwFor => "'for'",
            KwFunction => "'function'",
            KwIf => "'if'",
            KwImport => "'import'",
            KwInput => "'input'",
            KwLet => "'let'",
            KwMethod => "'method'",
            KwModule => "'module'",
            KwReturn => "'return'",
            KwRule => "'rule'",
            KwStruct => "'struct'",
            KwType => "'type'",
            KwTypedef => "'typedef'",
            LParen => "'('",
            RParen => "')'",
            LBrace => "'{'",
            RBrace => "'}'",
            LBracket => "'['",
            RBracket => "']'",
            Semi => "';'",
            Colon => "':'",
            Comma => "','",
            Dot => "'.'",
            Hash => "'#'",
            Question => "'?'",
            Eq => "'='",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            StarStar => "'**'",
            Slash => "'/'",
            Percent => "'%'",
            Shl => "'<<'",
            Shr => "'>>'",
            Lt => "'<'",
            LtEq => "'<='",
            Gt => "'>'",
            GtEq => "'>='",
            EqEq => "'=='",
            NotEq => "'!='",
            Amp => "'&'",
            AmpAmp => "'&&'",
            Pipe => "'|'",
            PipePipe => "'||'",
            Caret => "'^'",
            CaretTilde => "'^~'",
            Tilde => "'~'",
            TildeAmp => "'~&'",
            TildePipe => "'~|'",
            TildeCaret => "'~^'",
            Bang => "'!'",
            Eof => "<EOF>",
        }
    }
}

/// Maps an identifier's text to its keyword token kind, if it is a keyword.
pub fn lookup_keyword(text: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match text {
        "begin" => KwBegin,
        "bsvimport" => KwBsvImport,
        "case" => KwCase,
        "default" => KwDefault,
        "else" => KwElse,
        "end" => KwEnd,
        "endcase" => KwEndCase,
        "endfunction" => KwEndFunction,
        "endmethod" => KwEndMethod,
        "endmodule" => KwEndModule,
        "endrule" => KwEndRule,
        "enum" => KwEnum,
        "for" => KwFor,
        "function" => KwFunction,
        "if" => KwIf,
        "import" => KwImport,
        "input" => KwInput,
        "let" => KwLet,
        "method" => KwMethod,
        "module" => KwModule,
        "return" => KwReturn,
        "rule" => KwRule,
        "struct" => KwStruct,
        "type" => KwType,
        "typedef" => KwTypedef,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve() {
        assert_eq!(lookup_keyword("module"), Some(TokenKind::KwModule));
        assert_eq!(lookup_keyword("endcase"), Some(TokenKind::KwEndCase));
        assert_eq!(lookup_keyword("bsvimport"), Some(TokenKind::KwBsvImport));
        assert_eq!(lookup_keyword("counter"), None);
        assert_eq!(lookup_keyword("Module"), None);
    }

    #[test]
    fn describe_is_nonempty() {
        assert!(!TokenKind::LowerIdent.describe().is_empty());
        assert!(!TokenKind::Eof.describe().is_empty());
    }
}
