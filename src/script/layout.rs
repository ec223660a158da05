//! Turns the flat token stream into logical lines with explicit block structure.
//!
//! The tokenizer reports every line break together with the indentation width of the
//! following line. This pass collapses blank and comment-only lines, ignores line
//! breaks inside parentheses and replaces changes of indentation with [Lexeme::Indent]
//! and [Lexeme::Dedent] markers so that the parser never has to look at whitespace.

use logos::Logos;

use crate::parsing::Span;
use super::parser::{ErrorKind, ParseError};
use super::token::{indentation_width, Token};

/// A token or a layout marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme<'a> {
    Token(Token<'a>),
    /// End of a logical line.
    Newline,
    /// Start of a more deeply indented block.
    Indent,
    /// End of an indented block.
    Dedent,
}

/// Indentation of the first line containing code. The whole source is treated as if
/// this much leading whitespace had been stripped from every line.
fn base_indentation(source: &str) -> usize {
    source.lines()
        .find(|line| {
            let code = line.trim_start();
            !code.is_empty() && !code.starts_with('#')
        })
        .map(|line| {
            let code = line.trim_start();
            indentation_width(&line[..line.len() - code.len()])
        })
        .unwrap_or(0)
}

pub fn tokenize(source: &str) -> Result<Vec<(Lexeme, Span)>, ParseError> {
    let base = base_indentation(source);

    let mut lexemes: Vec<(Lexeme, Span)> = Vec::new();
    let mut indents = vec![0usize];
    let mut pending: Option<(usize, Span)> = None;
    let mut depth = 0usize;

    for (token, span) in Token::lexer(source).spanned() {
        let token = match token {
            Token::Error => return Err(ParseError::other(span, ErrorKind::InvalidCharacter)),
            Token::Newline(_) if depth > 0 => continue,
            Token::Newline(width) => {
                pending = Some((width, span));
                continue;
            },
            Token::ParenOpen => {
                depth += 1;
                Token::ParenOpen
            },
            Token::ParenClose => {
                depth = depth.saturating_sub(1);
                Token::ParenClose
            },
            token => token,
        };

        if let Some((width, newline)) = pending.take() {
            if !lexemes.is_empty() {
                lexemes.push((Lexeme::Newline, newline.start..newline.start + 1));
            }

            let marker = span.start..span.start;

            let width = match width.checked_sub(base) {
                Some(width) => width,
                None => return Err(ParseError::other(marker, ErrorKind::InconsistentIndentation)),
            };

            let current = indents.last().copied().unwrap_or(0);

            if width > current {
                indents.push(width);
                lexemes.push((Lexeme::Indent, marker));
            } else if width < current {
                while indents.last().map(|&top| top > width).unwrap_or(false) {
                    indents.pop();
                    lexemes.push((Lexeme::Dedent, marker.clone()));
                }

                if indents.last().copied() != Some(width) {
                    return Err(ParseError::other(marker, ErrorKind::InconsistentIndentation));
                }
            }
        }

        lexemes.push((Lexeme::Token(token), span));
    }

    let end = source.len()..source.len();

    if !lexemes.is_empty() {
        lexemes.push((Lexeme::Newline, end.clone()));
    }

    while indents.len() > 1 {
        indents.pop();
        lexemes.push((Lexeme::Dedent, end.clone()));
    }

    Ok(lexemes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(source: &str) -> Vec<Lexeme> {
        tokenize(source)
            .expect("could not tokenize")
            .into_iter()
            .map(|(lexeme, _)| lexeme)
            .collect()
    }

    #[test]
    fn test_blocks() {
        let source = r#"
            if x:
                # comment only

                y = 1
            z
        "#;

        assert_eq!(lexemes(source), vec![
            Lexeme::Token(Token::If),
            Lexeme::Token(Token::Identifier("x")),
            Lexeme::Token(Token::Colon),
            Lexeme::Newline,
            Lexeme::Indent,
            Lexeme::Token(Token::Identifier("y")),
            Lexeme::Token(Token::Assign),
            Lexeme::Token(Token::Number(1.0)),
            Lexeme::Newline,
            Lexeme::Dedent,
            Lexeme::Token(Token::Identifier("z")),
            Lexeme::Newline,
        ]);
    }

    #[test]
    fn test_dedent_at_end_and_parentheses() {
        let source = "while True:\n    f(1,\n 2)";

        assert_eq!(lexemes(source), vec![
            Lexeme::Token(Token::While),
            Lexeme::Token(Token::True),
            Lexeme::Token(Token::Colon),
            Lexeme::Newline,
            Lexeme::Indent,
            Lexeme::Token(Token::Identifier("f")),
            Lexeme::Token(Token::ParenOpen),
            Lexeme::Token(Token::Number(1.0)),
            Lexeme::Token(Token::Comma),
            Lexeme::Token(Token::Number(2.0)),
            Lexeme::Token(Token::ParenClose),
            Lexeme::Newline,
            Lexeme::Dedent,
        ]);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let result = tokenize("if a:\n    b\n  c\n");
        assert!(result.is_err());
    }
}
