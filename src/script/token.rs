//! Tokens and a tokenizer for the script format.

use logos::{Lexer, Logos};

use std::fmt;

/// Enumeration of all tokens of the script format.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Errorneous token that could not be interpreted as any of the other variants.
    #[error]
    #[regex(r"[ \t\f\r]+", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)]
    #[regex(r"\\\r?\n", logos::skip)]
    Error,

    /// A line break followed by the indentation width of the next line.
    #[regex(r"\n[ \t]*", newline_callback)]
    Newline(usize),

    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("pass")]
    Pass,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("True")]
    True,
    #[token("False")]
    False,

    /// A name which begins with a letter or an underscore.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Identifier(&'a str),

    /// A decimal or hexadecimal number literal. Decimals may carry an exponent.
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", decimal_callback)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", decimal_callback)]
    #[regex(r"0[xX][0-9a-fA-F]+", hex_callback)]
    Number(f64),

    /// A quoted string literal with its escapes resolved.
    #[regex(r#""([^"\\\n]|\\.)*""#, string_callback)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, string_callback)]
    Str(String),

    /// The body of an `f"..."` string, escapes resolved but holes left intact.
    #[regex(r#"[fF]"([^"\\\n]|\\.)*""#, format_string_callback)]
    #[regex(r#"[fF]'([^'\\\n]|\\.)*'"#, format_string_callback)]
    FormatStr(String),

    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    #[token("=")]
    Assign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,

    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
}

fn newline_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> usize {
    indentation_width(&lex.slice()[1..])
}

/// Width of leading whitespace, with tabs advancing to the next multiple of four.
pub(crate) fn indentation_width(ws: &str) -> usize {
    ws.chars().fold(0, |width, c| match c {
        '\t' => (width / 4 + 1) * 4,
        _ => width + 1,
    })
}

fn decimal_callback<'a>(
    lex: &mut Lexer<'a, Token<'a>>,
) -> std::result::Result<f64, std::num::ParseFloatError> {
    lex.slice().parse()
}

fn hex_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<f64> {
    u64::from_str_radix(&lex.slice()[2..], 16)
        .ok()
        .map(|n| n as f64)
}

fn string_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> String {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

fn format_string_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> String {
    let slice = lex.slice();
    unescape(&slice[2..slice.len() - 1])
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other @ '\\') | Some(other @ '"') | Some(other @ '\'') => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }

    out
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Newline(_) => write!(f, "end of line"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Pass => write!(f, "pass"),
            Token::Import => write!(f, "import"),
            Token::From => write!(f, "from"),
            Token::As => write!(f, "as"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Number(num) => write!(f, "{}", num),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::FormatStr(s) => write!(f, "f{:?}", s),
            Token::ParenOpen => write!(f, "("),
            Token::ParenClose => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Assign => write!(f, "="),
            Token::AddAssign => write!(f, "+="),
            Token::SubAssign => write!(f, "-="),
            Token::MulAssign => write!(f, "*="),
            Token::DivAssign => write!(f, "/="),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Token;
    use logos::Logos;

    #[test]
    fn test_tokenize_call() {
        let tokens: Vec<_> = Token::lexer(r#"drawString("Hi\n", 10, 0x1F) # note"#).collect();

        assert_eq!(tokens, vec![
            Token::Identifier("drawString"),
            Token::ParenOpen,
            Token::Str("Hi\n".to_string()),
            Token::Comma,
            Token::Number(10.0),
            Token::Comma,
            Token::Number(31.0),
            Token::ParenClose,
        ]);
    }

    #[test]
    fn test_tokenize_keywords_and_indentation() {
        let tokens: Vec<_> = Token::lexer("while True:\n    x += 1.5\n\tif").collect();

        assert_eq!(tokens, vec![
            Token::While,
            Token::True,
            Token::Colon,
            Token::Newline(4),
            Token::Identifier("x"),
            Token::AddAssign,
            Token::Number(1.5),
            Token::Newline(4),
            Token::If,
        ]);
    }

    #[test]
    fn test_tokenize_exponents() {
        let tokens: Vec<_> = Token::lexer("1e3 2.5E-2 .5e+1 0x1e3 7 else").collect();

        assert_eq!(tokens, vec![
            Token::Number(1000.0),
            Token::Number(0.025),
            Token::Number(5.0),
            Token::Number(483.0),
            Token::Number(7.0),
            Token::Else,
        ]);
    }

    #[test]
    fn test_tokenize_format_string() {
        let tokens: Vec<_> = Token::lexer("f'Score: {s}' format").collect();

        assert_eq!(tokens, vec![
            Token::FormatStr("Score: {s}".to_string()),
            Token::Identifier("format"),
        ]);
    }
}
