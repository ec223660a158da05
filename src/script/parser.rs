//! Recursive-descent parser from layout lexemes into a [Program].

use std::fmt;

use crate::parsing::{BufferedStream, Error, ErrorExt, SeekStream, Span};
use crate::value::Value;

use super::ast::{
    lookup_callable, suggest_callable, Arity, BinaryOp, Block, BlockId, Callable, Expr,
    FormatPart, Program, RepeatKind, SleepUnit, Statement, StatementEntry, UnaryOp,
};
use super::format::{self, Segment};
use super::layout::{tokenize, Lexeme};
use super::token::Token;

/// Errors specific to the script grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    InvalidCharacter,
    InconsistentIndentation,
    UnexpectedIndent,
    ExpectedBlock,
    UnknownFunction {
        name: String,
        suggestion: Option<&'static str>,
    },
    ArgumentCount {
        name: &'static str,
        expected: Arity,
        got: usize,
    },
    DeviceCallInExpression {
        name: &'static str,
    },
    UnsupportedLoop,
    InvalidFormatString,
    TooDeeplyNested,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::InvalidCharacter => write!(f, "there is a character I don't understand"),
            ErrorKind::InconsistentIndentation => write!(f, "the indentation doesn't line up with the lines above"),
            ErrorKind::UnexpectedIndent => write!(f, "this line is indented but nothing above it starts a block"),
            ErrorKind::ExpectedBlock => write!(f, "the lines after ':' need to be indented"),
            ErrorKind::UnknownFunction { name, suggestion: Some(suggestion) } =>
                write!(f, "I don't know `{}`. Did you mean `{}`?", name, suggestion),
            ErrorKind::UnknownFunction { name, suggestion: None } =>
                write!(f, "I don't know `{}`", name),
            ErrorKind::ArgumentCount { name, expected, got } =>
                write!(f, "`{}` needs {} value(s) but got {}", name, expected, got),
            ErrorKind::DeviceCallInExpression { name } =>
                write!(f, "`{}` has to be on its own line", name),
            ErrorKind::UnsupportedLoop => write!(f, "only `for ... in range(...)` loops are supported"),
            ErrorKind::InvalidFormatString => write!(f, "the {{ and }} in this f-string don't match up"),
            ErrorKind::TooDeeplyNested => write!(f, "there are too many things inside each other here"),
        }
    }
}

pub type ParseError = Error<ErrorKind>;

/// Deepest nesting of blocks, brackets and operators a script may use.
pub const MAX_NESTING: usize = 100;

type Lexemes<'a> = BufferedStream<std::vec::IntoIter<(Lexeme<'a>, Span)>>;

/// Parser state for one source text.
pub struct Parser<'a> {
    stream: Lexemes<'a>,
    blocks: Vec<Block>,
    end: usize,

    /// Current nesting level, bounded by [MAX_NESTING].
    depth: usize,
}

impl Program {
    /// Parses a script.
    pub fn parse(source: &str) -> Result<Program, ParseError> {
        Parser::from_str(source)?.parse()
    }
}

impl<'a> Parser<'a> {
    pub fn from_str(source: &'a str) -> Result<Parser<'a>, ParseError> {
        Parser::with_offset(source, 0)
    }

    /// Creates a parser for a fragment located at byte `offset` of a larger source,
    /// so that spans in errors point into the larger source.
    fn with_offset(source: &'a str, offset: usize) -> Result<Parser<'a>, ParseError> {
        let lexemes = tokenize(source)
            .map_err(|mut err| {
                shift_error(&mut err, offset);
                err
            })?
            .into_iter()
            .map(|(lexeme, span)| (lexeme, span.start + offset..span.end + offset))
            .collect::<Vec<_>>();

        Ok(Parser {
            stream: BufferedStream::from(lexemes.into_iter()),
            blocks: Vec::new(),
            end: source.len() + offset,
            depth: 0,
        })
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        let statements = self.statements(false)?;
        let root = self.alloc(statements);

        Ok(Program {
            blocks: self.blocks,
            root,
        })
    }

    fn alloc(&mut self, statements: Vec<StatementEntry>) -> BlockId {
        self.blocks.push(Block { statements });
        BlockId(self.blocks.len() - 1)
    }

    /// Goes one level deeper. The caller restores `depth` once the nested part
    /// has been parsed.
    fn nest(&mut self, span: Span) -> Result<(), ParseError> {
        self.depth += 1;

        if self.depth > MAX_NESTING {
            return Err(ParseError::other(span, ErrorKind::TooDeeplyNested));
        }

        Ok(())
    }

    fn peek_lexeme(&mut self) -> Option<Lexeme<'a>> {
        self.stream.peek().map(|(lexeme, _)| lexeme.clone())
    }

    fn peek_token_nth(&mut self, n: usize) -> Option<&Token<'a>> {
        match self.stream.peek_nth(n) {
            Some((Lexeme::Token(token), _)) => Some(token),
            _ => None,
        }
    }

    fn peek_token(&mut self) -> Option<&Token<'a>> {
        self.peek_token_nth(0)
    }

    fn next_span(&mut self) -> Span {
        let end = self.end;

        self.stream.peek()
            .map(|(_, span)| span.clone())
            .unwrap_or(end..end)
    }

    fn previous_end(&self) -> usize {
        self.stream.previous()
            .map(|(_, span)| span.end)
            .unwrap_or(0)
    }

    fn unexpected(&mut self, ctx: &'static str) -> ParseError {
        match self.stream.peek() {
            Some((_, span)) => ParseError::unexpected(span.clone(), ctx),
            None => ParseError::eos(ctx),
        }
    }

    /// Consumes the next token if it is `token`.
    fn eat(&mut self, token: &Token<'a>) -> Option<Span> {
        if self.peek_token() == Some(token) {
            self.stream.next().map(|(_, span)| span)
        } else {
            None
        }
    }

    fn expect(&mut self, token: &Token<'a>, ctx: &'static str) -> Result<Span, ParseError> {
        match self.eat(token) {
            Some(span) => Ok(span),
            None => Err(self.unexpected(ctx)),
        }
    }

    fn identifier(&mut self, ctx: &'static str) -> Result<(&'a str, Span), ParseError> {
        match self.peek_token() {
            Some(Token::Identifier(name)) => {
                let name = *name;
                let span = self.next_span();
                self.stream.next();
                Ok((name, span))
            },
            _ => Err(self.unexpected(ctx)),
        }
    }

    fn end_of_line(&mut self) -> Result<(), ParseError> {
        match self.peek_lexeme() {
            Some(Lexeme::Newline) => {
                self.stream.next();
                Ok(())
            },
            None => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn skip_line(&mut self) {
        while let Some((lexeme, _)) = self.stream.next() {
            if lexeme == Lexeme::Newline {
                break;
            }
        }
    }

    /// Parses statements up to the end of the program, or up to and including the
    /// [Lexeme::Dedent] closing the current block when `nested` is set.
    fn statements(&mut self, nested: bool) -> Result<Vec<StatementEntry>, ParseError> {
        let mut statements = Vec::new();

        loop {
            match self.peek_lexeme() {
                None if nested => return Err(ParseError::eos("block")),
                None => break,
                Some(Lexeme::Dedent) if nested => {
                    self.stream.next();
                    break;
                },
                Some(Lexeme::Newline) => {
                    self.stream.next();
                    continue;
                },
                Some(Lexeme::Indent) => {
                    let span = self.next_span();
                    return Err(ParseError::other(span, ErrorKind::UnexpectedIndent));
                },
                Some(Lexeme::Dedent) => return Err(self.unexpected("statement")),
                Some(Lexeme::Token(_)) => (),
            }

            if let Some(entry) = self.statement()? {
                statements.push(entry);
            }
        }

        Ok(statements)
    }

    /// Parses the block following a `:`. Either an indented block on the following
    /// lines or a single statement on the same line.
    fn block(&mut self) -> Result<BlockId, ParseError> {
        let depth = self.depth;
        let span = self.next_span();
        self.nest(span)?;

        let statements = if self.peek_lexeme() == Some(Lexeme::Newline) {
            self.stream.next();

            if self.peek_lexeme() != Some(Lexeme::Indent) {
                let span = self.next_span();
                return Err(ParseError::other(span, ErrorKind::ExpectedBlock));
            }

            self.stream.next();
            self.statements(true)?
        } else {
            self.statement()?.into_iter().collect()
        };

        self.depth = depth;

        Ok(self.alloc(statements))
    }

    fn statement(&mut self) -> Result<Option<StatementEntry>, ParseError> {
        let start = self.next_span().start;

        let token = match self.peek_token() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("statement")),
        };

        let (statement, compound) = match token {
            Token::Import | Token::From => {
                self.skip_line();
                return Ok(None);
            },
            Token::If => {
                self.stream.next();
                (self.if_statement()?, true)
            },
            Token::While => {
                self.stream.next();
                let condition = self.expression().context("while loop condition")?;
                self.expect(&Token::Colon, "while loop")?;
                let body = self.block()?;

                (Statement::Repeat { kind: RepeatKind::While(condition), body }, true)
            },
            Token::For => {
                self.stream.next();
                (self.for_statement()?, true)
            },
            Token::Break => {
                self.stream.next();
                (Statement::Break, false)
            },
            Token::Continue => {
                self.stream.next();
                (Statement::Continue, false)
            },
            Token::Pass => {
                self.stream.next();
                (Statement::Pass, false)
            },
            Token::Identifier(name) => match self.peek_token_nth(1) {
                Some(Token::Assign)
                    | Some(Token::AddAssign)
                    | Some(Token::SubAssign)
                    | Some(Token::MulAssign)
                    | Some(Token::DivAssign) => (self.assignment(name)?, false),
                Some(Token::ParenOpen) | Some(Token::Dot) => (self.call_statement()?, false),
                _ => (Statement::Expression(self.expression().context("statement")?), false),
            },
            _ => (Statement::Expression(self.expression().context("statement")?), false),
        };

        let end = self.previous_end();

        if !compound {
            self.end_of_line()?;
        }

        Ok(Some(StatementEntry {
            statement,
            span: start..end,
        }))
    }

    /// Parses the rest of an `if` or `elif` after the keyword.
    fn if_statement(&mut self) -> Result<Statement, ParseError> {
        let condition = self.expression().context("if condition")?;
        self.expect(&Token::Colon, "if statement")?;
        let then_block = self.block()?;

        let else_block = if let Some(span) = self.eat(&Token::Elif) {
            let depth = self.depth;
            self.nest(span.clone())?;

            let nested = self.if_statement()?;
            let end = self.previous_end();
            self.depth = depth;

            Some(self.alloc(vec![StatementEntry {
                statement: nested,
                span: span.start..end,
            }]))
        } else if self.eat(&Token::Else).is_some() {
            self.expect(&Token::Colon, "else")?;
            Some(self.block()?)
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_block,
            else_block,
        })
    }

    /// Parses the rest of a `for` loop after the keyword.
    fn for_statement(&mut self) -> Result<Statement, ParseError> {
        let (variable, _) = self.identifier("for loop variable")?;
        self.expect(&Token::In, "for loop")?;

        let (iterable, span) = self.identifier("for loop")?;

        if iterable != "range" || self.peek_token() != Some(&Token::ParenOpen) {
            return Err(ParseError::other(span, ErrorKind::UnsupportedLoop));
        }

        self.stream.next();
        let mut args = self.arguments()?;

        let (start, stop) = match args.len() {
            1 => (Expr::Literal(Value::Number(0.0)), args.remove(0)),
            2 => {
                let stop = args.remove(1);
                (args.remove(0), stop)
            },
            got => {
                let kind = ErrorKind::ArgumentCount {
                    name: "range",
                    expected: Arity::between(1, 2),
                    got,
                };

                return Err(ParseError::other(span.start..self.previous_end(), kind));
            },
        };

        self.expect(&Token::Colon, "for loop")?;
        let body = self.block()?;

        let variable = match variable {
            "_" => None,
            name => Some(name.to_string()),
        };

        Ok(Statement::Repeat {
            kind: RepeatKind::Count { variable, start, stop },
            body,
        })
    }

    fn assignment(&mut self, name: &str) -> Result<Statement, ParseError> {
        self.stream.next();

        let op = match self.stream.next() {
            Some((Lexeme::Token(Token::Assign), _)) => None,
            Some((Lexeme::Token(Token::AddAssign), _)) => Some(BinaryOp::Add),
            Some((Lexeme::Token(Token::SubAssign), _)) => Some(BinaryOp::Subtract),
            Some((Lexeme::Token(Token::MulAssign), _)) => Some(BinaryOp::Multiply),
            Some((Lexeme::Token(Token::DivAssign), _)) => Some(BinaryOp::Divide),
            _ => {
                self.stream.seek(-1);
                return Err(self.unexpected("assignment"));
            },
        };

        let value = self.expression().context("assignment")?;

        Ok(Statement::Assign {
            name: name.to_string(),
            op,
            value,
        })
    }

    /// Parses a possibly dotted call `receiver.name(args)` and returns the final name,
    /// its span and the arguments.
    fn call(&mut self) -> Result<(&'a str, Span, Vec<Expr>), ParseError> {
        let (mut name, mut span) = self.identifier("call")?;

        while self.eat(&Token::Dot).is_some() {
            let (n, s) = self.identifier("call")?;
            name = n;
            span = s;
        }

        self.expect(&Token::ParenOpen, "call")?;

        let depth = self.depth;
        self.nest(span.clone())?;
        let args = self.arguments().context("call")?;
        self.depth = depth;

        Ok((name, span, args))
    }

    /// Parses call arguments up to and including the closing parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if self.eat(&Token::ParenClose).is_some() {
            return Ok(args);
        }

        loop {
            args.push(self.expression().context("argument")?);

            if self.eat(&Token::Comma).is_some() {
                if self.eat(&Token::ParenClose).is_some() {
                    break;
                }

                continue;
            }

            self.expect(&Token::ParenClose, "arguments")?;
            break;
        }

        Ok(args)
    }

    fn resolve(&mut self, name: &str, span: Span) -> Result<Callable, ParseError> {
        lookup_callable(name).ok_or_else(|| {
            ParseError::other(span, ErrorKind::UnknownFunction {
                name: name.to_string(),
                suggestion: suggest_callable(name),
            })
        })
    }

    fn check_arity(&self, callable: Callable, name: &'static str, span: Span, got: usize) -> Result<(), ParseError> {
        let expected = callable.arity();

        if expected.accepts(got) {
            return Ok(());
        }

        let span = span.start..self.previous_end();
        Err(ParseError::other(span, ErrorKind::ArgumentCount { name, expected, got }))
    }

    fn call_statement(&mut self) -> Result<Statement, ParseError> {
        let (name, span, mut args) = self.call()?;
        let callable = self.resolve(name, span.clone())?;

        match callable {
            Callable::Device(method) => {
                self.check_arity(callable, method.name(), span, args.len())?;
                Ok(Statement::DeviceCall { method, args })
            },
            Callable::Sleep(unit) => {
                let name = match unit {
                    SleepUnit::Seconds => "sleep",
                    SleepUnit::Milliseconds => "sleep_ms",
                };
                self.check_arity(callable, name, span, args.len())?;
                Ok(Statement::Sleep { duration: args.remove(0), unit })
            },
            Callable::Builtin(function) => {
                self.check_arity(callable, function.name(), span, args.len())?;
                Ok(Statement::Expression(Expr::Call { function, args }))
            },
        }
    }

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expression()
    }

    // Every operator of a chain adds a level, since `a + b + c` nests to the left.

    fn or_expression(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.and_expression()?;

        while let Some(span) = self.eat(&Token::Or) {
            self.nest(span)?;
            let right = self.and_expression()?;
            left = binary(BinaryOp::Or, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.not_expression()?;

        while let Some(span) = self.eat(&Token::And) {
            self.nest(span)?;
            let right = self.not_expression()?;
            left = binary(BinaryOp::And, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn not_expression(&mut self) -> Result<Expr, ParseError> {
        if let Some(span) = self.eat(&Token::Not) {
            let depth = self.depth;
            self.nest(span)?;
            let operand = self.not_expression()?;
            self.depth = depth;

            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }

        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.additive()?;

        let op = match self.peek_token() {
            Some(Token::Equal) => BinaryOp::Equal,
            Some(Token::NotEqual) => BinaryOp::NotEqual,
            Some(Token::Less) => BinaryOp::Less,
            Some(Token::LessEqual) => BinaryOp::LessEqual,
            Some(Token::Greater) => BinaryOp::Greater,
            Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
            _ => return Ok(left),
        };

        let depth = self.depth;
        let span = self.next_span();
        self.stream.next();
        self.nest(span)?;

        let right = self.additive()?;
        self.depth = depth;

        Ok(binary(op, left, right))
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.multiplicative()?;

        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                },
            };

            let span = self.next_span();
            self.stream.next();
            self.nest(span)?;

            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.unary()?;

        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::DoubleSlash) => BinaryOp::FloorDivide,
                Some(Token::Percent) => BinaryOp::Modulo,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                },
            };

            let span = self.next_span();
            self.stream.next();
            self.nest(span)?;

            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;

        if let Some(span) = self.eat(&Token::Minus) {
            self.nest(span)?;
            let operand = self.unary()?;
            self.depth = depth;

            // fold negative literals so `-5` stays a literal
            if let Expr::Literal(Value::Number(n)) = operand {
                return Ok(Expr::Literal(Value::Number(-n)));
            }

            return Ok(Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }

        if let Some(span) = self.eat(&Token::Plus) {
            self.nest(span)?;
            let operand = self.unary()?;
            self.depth = depth;

            return Ok(operand);
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.next_span();

        let token = match self.peek_token() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("expression")),
        };

        match token {
            Token::Number(n) => {
                self.stream.next();
                Ok(Expr::Literal(Value::Number(n)))
            },
            Token::Str(s) => {
                self.stream.next();
                Ok(Expr::Literal(Value::Text(s)))
            },
            Token::True => {
                self.stream.next();
                Ok(Expr::Literal(Value::Boolean(true)))
            },
            Token::False => {
                self.stream.next();
                Ok(Expr::Literal(Value::Boolean(false)))
            },
            Token::FormatStr(body) => {
                self.stream.next();
                format_string(&body, span, self.depth)
            },
            Token::ParenOpen => {
                let depth = self.depth;
                self.stream.next();
                self.nest(span)?;

                let inner = self.expression()?;
                self.expect(&Token::ParenClose, "parenthesis")?;
                self.depth = depth;

                Ok(inner)
            },
            Token::Identifier(name) => match self.peek_token_nth(1) {
                Some(Token::ParenOpen) | Some(Token::Dot) => self.call_expression(),
                _ => {
                    self.stream.next();
                    Ok(Expr::Variable(name.to_string()))
                },
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn call_expression(&mut self) -> Result<Expr, ParseError> {
        let (name, span, args) = self.call()?;
        let callable = self.resolve(name, span.clone())?;

        match callable {
            Callable::Builtin(function) => {
                self.check_arity(callable, function.name(), span, args.len())?;
                Ok(Expr::Call { function, args })
            },
            Callable::Device(method) => Err(ParseError::other(
                span,
                ErrorKind::DeviceCallInExpression { name: method.name() },
            )),
            Callable::Sleep(_) => Err(ParseError::other(
                span,
                ErrorKind::DeviceCallInExpression { name: "sleep" },
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn shift_error(err: &mut ParseError, offset: usize) {
    use crate::parsing::ErrorKind as Structural;

    match err.kind {
        Structural::EndOfStream => (),
        Structural::UnexpectedToken { ref mut span } | Structural::Other { ref mut span, .. } => {
            span.start += offset;
            span.end += offset;
        },
    }
}

/// Parses the holes of an `f"..."` string whose token occupies `span`, found at
/// nesting level `depth`.
fn format_string(body: &str, span: Span, depth: usize) -> Result<Expr, ParseError> {
    let segments = format::split(body)
        .ok_or_else(|| ParseError::other(span.clone(), ErrorKind::InvalidFormatString))?;

    // skip the `f` and the opening quote
    let base = span.start + 2;

    let mut parts = Vec::with_capacity(segments.len());

    for segment in segments {
        match segment {
            Segment::Text(text) => parts.push(FormatPart::Text(text)),
            Segment::Hole(source, offset) => {
                let mut parser = Parser::with_offset(source, base + offset)?;
                parser.depth = depth;

                let expr = parser.expression().context("f-string")?;
                parser.end_of_line()?;

                if parser.peek_lexeme().is_some() {
                    return Err(parser.unexpected("f-string"));
                }

                parts.push(FormatPart::Hole(expr));
            },
        }
    }

    Ok(Expr::Format(parts))
}
