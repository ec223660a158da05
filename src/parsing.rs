//! Spans, parse errors and the buffered token stream shared by the script parser.

use std::fmt;
use std::ops::Range;
use itertools::Itertools;

/// Byte range in the source text.
pub type Span = Range<usize>;

/// One-based line and column of a position in the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineLocation {
    pub line: usize,
    pub column: usize,
}

impl LineLocation {
    /// Calculates the line and column of the byte `offset` in `source`.
    pub fn of(offset: usize, source: &str) -> LineLocation {
        let mut line = 1;
        let mut column = 1;

        for (i, ch) in source.char_indices() {
            if i >= offset {
                break;
            }

            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        LineLocation { line, column }
    }
}

impl fmt::Display for LineLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {} col {}", self.line, self.column)
    }
}

/// Parse error with the reason of the error and a stack of contexts, innermost first.
///
/// The kind parameter `K` carries the errors a particular grammar can produce on
/// top of the structural ones.
#[derive(Clone, Debug, PartialEq)]
pub struct Error<K> {
    pub kind: ErrorKind<K>,
    pub context: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind<K> {
    EndOfStream,
    UnexpectedToken {
        span: Span,
    },
    Other {
        span: Span,
        kind: K,
    },
}

impl<K> Error<K> {
    pub fn unexpected(span: Span, ctx: &'static str) -> Error<K> {
        Error {
            kind: ErrorKind::UnexpectedToken { span },
            context: vec![ctx],
        }
    }

    pub fn eos(ctx: &'static str) -> Error<K> {
        Error {
            kind: ErrorKind::EndOfStream,
            context: vec![ctx],
        }
    }

    pub fn other(span: Span, kind: K) -> Error<K> {
        Error {
            kind: ErrorKind::Other { span, kind },
            context: Vec::new(),
        }
    }

    pub fn span(&self) -> Option<&Span> {
        match self.kind {
            ErrorKind::EndOfStream => None,
            ErrorKind::UnexpectedToken { ref span } => Some(span),
            ErrorKind::Other { ref span, .. } => Some(span),
        }
    }

    /// Location of the error in `source`. Errors at the end of the stream point
    /// past the last character.
    pub fn location(&self, source: &str) -> LineLocation {
        let offset = self.span().map(|s| s.start).unwrap_or_else(|| source.len());
        LineLocation::of(offset, source)
    }

    /// The outermost context, which names the construct being parsed.
    pub fn outer_context(&self) -> Option<&'static str> {
        self.context.last().copied()
    }
}

pub trait ErrorExt {
    fn context(self, ctx: &'static str) -> Self;
}

impl<R, K> ErrorExt for Result<R, Error<K>> {
    fn context(mut self, ctx: &'static str) -> Self {
        if let Err(ref mut err) = self {
            err.context.push(ctx);
        }

        self
    }
}

impl<K> fmt::Display for Error<K>
where
    K: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ctx = self.context.iter()
            .rev()
            .join(": ");

        match self.kind {
            ErrorKind::EndOfStream =>
                write!(f, "{}: unexpected end of program", ctx),
            ErrorKind::UnexpectedToken { ref span } =>
                write!(f, "error at position {}-{}: {}: unexpected token", span.start, span.end, ctx),
            ErrorKind::Other { ref span, ref kind } if ctx.is_empty() =>
                write!(f, "error at position {}-{}: {}", span.start, span.end, kind),
            ErrorKind::Other { ref span, ref kind } =>
                write!(f, "error at position {}-{}: {}: {}", span.start, span.end, ctx, kind),
        }
    }
}

pub trait SeekStream: Iterator {
    fn offset(&self) -> usize;
    fn seek(&mut self, amount: isize);
    fn seek_boundary(&self) -> Range<isize>;
    fn at_offset(&self, offset: isize) -> Option<&Self::Item>;
}

/// Iterator adapter that remembers every item it has produced so that the
/// consumer can look ahead and rewind.
pub struct BufferedStream<S: Iterator> {
    stream: S,
    position: usize,
    buffer: Vec<S::Item>,
}

impl<S> BufferedStream<S> where S: Iterator, S::Item: Clone {
    /// Returns the item `n` positions ahead without consuming anything.
    pub fn peek_nth(&mut self, n: usize) -> Option<&S::Item> {
        while self.buffer.len() <= self.position + n {
            match self.stream.next() {
                Some(item) => self.buffer.push(item),
                None => return None,
            }
        }

        self.buffer.get(self.position + n)
    }

    pub fn peek(&mut self) -> Option<&S::Item> {
        self.peek_nth(0)
    }

    /// The most recently consumed item.
    pub fn previous(&self) -> Option<&S::Item> {
        self.at_offset(-1)
    }
}

impl<S> From<S> for BufferedStream<S>
where
    S: Iterator,
{
    fn from(stream: S) -> BufferedStream<S> {
        BufferedStream {
            stream,
            position: 0,
            buffer: Vec::new(),
        }
    }
}

impl<S> Iterator for BufferedStream<S>
where
    S: Iterator,
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        if let Some(item) = self.buffer.get(self.position) {
            self.position += 1;
            return Some(item.clone());
        }

        match self.stream.next() {
            Some(item) => {
                self.position += 1;
                self.buffer.push(item.clone());
                Some(item)
            },
            None => None,
        }
    }
}

impl<S> SeekStream for BufferedStream<S>
where
    S: Iterator,
    S::Item: Clone,
{
    fn offset(&self) -> usize {
        self.position
    }

    fn seek(&mut self, amount: isize) {
        assert!(self.seek_boundary().contains(&amount));
        self.position = ((self.position as isize) + amount) as usize;
    }

    fn seek_boundary(&self) -> Range<isize> {
        let backwards = - (self.position as isize);
        let forwards = (self.buffer.len() as isize) - (self.position as isize);

        backwards .. forwards + 1
    }

    fn at_offset(&self, offset: isize) -> Option<&Self::Item> {
        if !self.seek_boundary().contains(&offset) {
            return None;
        }

        let index = (self.position as isize) + offset;

        self.buffer.get(index as usize)
    }
}

#[test]
fn test_line_location() {
    let source = "a = 1\nfillScreen(a)\n";

    assert_eq!(LineLocation::of(0, source), LineLocation { line: 1, column: 1 });
    assert_eq!(LineLocation::of(6, source), LineLocation { line: 2, column: 1 });
    assert_eq!(LineLocation::of(10, source), LineLocation { line: 2, column: 5 });
}

#[test]
fn test_buffered_stream_rewind() {
    let mut stream = BufferedStream::from(vec![1, 2, 3].into_iter());

    assert_eq!(stream.peek_nth(1), Some(&2));
    assert_eq!(stream.next(), Some(1));
    assert_eq!(stream.next(), Some(2));
    assert_eq!(stream.previous(), Some(&2));

    stream.seek(-2);

    assert_eq!(stream.offset(), 0);
    assert_eq!(stream.next(), Some(1));
    assert_eq!(stream.peek(), Some(&2));
    assert_eq!(stream.seek_boundary(), -1..2);
}
