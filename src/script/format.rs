//! Splitting `f"..."` string bodies into literal text and `{expression}` holes.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag},
    combinator::{all_consuming, map, value},
    multi::many0,
    sequence::delimited,
};

/// A piece of a formatted string body.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Text(String),
    /// Source of an expression hole and its byte offset in the body.
    Hole(&'a str, usize),
}

type Result<'a, T> = IResult<&'a str, T>;

fn escaped_brace(input: &str) -> Result<Segment> {
    alt((
        value(Segment::Text("{".to_string()), tag("{{")),
        value(Segment::Text("}".to_string()), tag("}}")),
    ))(input)
}

fn text(input: &str) -> Result<Segment> {
    map(is_not("{}"), |s: &str| Segment::Text(s.to_string()))(input)
}

fn hole(input: &str) -> Result<Segment> {
    map(
        delimited(tag("{"), is_not("{}"), tag("}")),
        |s| Segment::Hole(s, 0),
    )(input)
}

/// Splits a formatted string body. Adjacent text pieces are merged.
///
/// Returns `None` if the braces in the body are unbalanced.
pub fn split(body: &str) -> Option<Vec<Segment>> {
    let (_, pieces) = all_consuming(many0(alt((escaped_brace, text, hole))))(body).ok()?;

    let mut segments: Vec<Segment> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match piece {
            Segment::Text(t) => match segments.last_mut() {
                Some(Segment::Text(previous)) => previous.push_str(&t),
                _ => segments.push(Segment::Text(t)),
            },
            Segment::Hole(source, _) => {
                let offset = source.as_ptr() as usize - body.as_ptr() as usize;
                segments.push(Segment::Hole(source, offset));
            },
        }
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_holes() {
        let segments = split("Score: {score} / {max + 1}!").unwrap();

        assert_eq!(segments, vec![
            Segment::Text("Score: ".to_string()),
            Segment::Hole("score", 8),
            Segment::Text(" / ".to_string()),
            Segment::Hole("max + 1", 18),
            Segment::Text("!".to_string()),
        ]);
    }

    #[test]
    fn test_split_escapes() {
        assert_eq!(split("{{x}}").unwrap(), vec![Segment::Text("{x}".to_string())]);
        assert_eq!(split("").unwrap(), vec![]);
    }

    #[test]
    fn test_split_unbalanced() {
        assert_eq!(split("oops {"), None);
        assert_eq!(split("oops }"), None);
    }
}
