//! Lexer functions recognizing math delimiters and environments.

use crate::config::DelimiterPair;
use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{char, one_of},
    error::{Error, ErrorKind},
    sequence::{delimited, preceded},
    IResult,
};

/// Parse an escaped backslash or dollar sign (`\\` or `\$`), returning the
/// escaped character.
pub fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(char('\\'), one_of("\\$"))(input)
}

/// Parse `open body close` for an arbitrary delimiter pair, returning the body.
///
/// The closing token only counts at brace depth zero and never when it is part
/// of an escaped character, so `$\{a$` does not close and `$a\$b$` is one span.
pub fn delimited_math<'a>(input: &'a str, pair: &DelimiterPair) -> IResult<&'a str, &'a str> {
    let (input, _) = tag(pair.open.as_str())(input)?;
    let (input, body) = math_body(input, &pair.close)?;
    let (input, _) = tag(pair.close.as_str())(input)?;
    Ok((input, body))
}

/// Take everything up to (not including) the closing token.
fn math_body<'a>(input: &'a str, close: &str) -> IResult<&'a str, &'a str> {
    let mut depth = 0usize;
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        if depth == 0 && input[i..].starts_with(close) {
            return Ok((&input[i..], &input[..i]));
        }
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    Err(nom::Err::Error(Error::new(input, ErrorKind::TakeUntil)))
}

/// Parse `\begin{name}`, returning the environment name.
pub fn begin_environment(input: &str) -> IResult<&str, &str> {
    preceded(
        tag("\\begin"),
        delimited(char('{'), take_while1(|c: char| c.is_alphanumeric() || c == '*'), char('}')),
    )(input)
}

/// Parse a whole environment, returning its name and full source including
/// `\begin{..}` and `\end{..}`. Nested environments of the same name are
/// matched by depth.
pub fn environment(input: &str) -> IResult<&str, (&str, &str)> {
    let (mut rest, name) = begin_environment(input)?;
    let begin = format!("\\begin{{{name}}}");
    let end = format!("\\end{{{name}}}");
    let mut depth = 1usize;

    loop {
        let next_end = rest
            .find(&end)
            .ok_or_else(|| nom::Err::Error(Error::new(rest, ErrorKind::TakeUntil)))?;

        match rest.find(&begin) {
            Some(next_begin) if next_begin < next_end => {
                depth += 1;
                rest = &rest[next_begin + begin.len()..];
            }
            _ => {
                depth -= 1;
                rest = &rest[next_end + end.len()..];
                if depth == 0 {
                    let consumed = input.len() - rest.len();
                    return Ok((rest, (name, &input[..consumed])));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_math() {
        let pair = DelimiterPair::new("$", "$");
        assert_eq!(delimited_math("$E = mc^2$ rest", &pair), Ok((" rest", "E = mc^2")));
    }

    #[test]
    fn test_display_math() {
        let pair = DelimiterPair::new("\\[", "\\]");
        assert_eq!(delimited_math("\\[\\int_0^1 x dx\\]", &pair), Ok(("", "\\int_0^1 x dx")));
    }

    #[test]
    fn test_close_skips_escapes_and_groups() {
        let pair = DelimiterPair::new("$", "$");
        assert_eq!(delimited_math("$a\\$b$c", &pair), Ok(("c", "a\\$b")));
        assert_eq!(delimited_math("$\\text{a$b}$", &pair), Ok(("", "\\text{a$b}")));
        assert!(delimited_math("$never closed", &pair).is_err());
    }

    #[test]
    fn test_environment() {
        assert_eq!(
            environment("\\begin{align}a\\end{align} tail"),
            Ok((" tail", ("align", "\\begin{align}a\\end{align}")))
        );
        let nested = "\\begin{array}\\begin{array}x\\end{array}\\end{array}";
        assert_eq!(environment(nested), Ok(("", ("array", nested))));
        assert!(environment("\\begin{align}open").is_err());
    }

    #[test]
    fn test_escaped_char() {
        assert_eq!(escaped_char("\\$5"), Ok(("5", '$')));
        assert_eq!(escaped_char("\\\\$x$"), Ok(("$x$", '\\')));
        assert!(escaped_char("$5").is_err());
        assert!(escaped_char("\\(x").is_err());
    }
}
