//! Tokenization of command lines.
//!
//! The engine consumes words, pipes and redirections; a trailing `&` is
//! the driver's cue to launch the whole line in the background.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0, none_of},
    combinator::{map, value},
    multi::{many0, many1},
    sequence::{delimited, preceded},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A command name, argument, or redirection target.
    Word(String),
    /// `|` between pipeline stages.
    Pipe,
    /// `<`: the following word names the stdin source.
    RedirectIn,
    /// `>`: the following word names the stdout sink.
    RedirectOut,
    /// `&`: run the line in the background (only valid at the end).
    Background,
}

impl Token {
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w.as_str()),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("parse error: {0}")]
    Parse(String),
}

/// Parse a double-quoted word piece
fn double_quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(many0(none_of("\"")), |cs| cs.into_iter().collect()),
        char('"'),
    )(input)
}

/// Parse a single-quoted word piece
fn single_quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(many0(none_of("'")), |cs| cs.into_iter().collect()),
        char('\''),
    )(input)
}

/// Parse an unquoted word piece
fn bare(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !"|<>&\"'".contains(c)),
        str::to_string,
    )(input)
}

/// A word is one or more bare/quoted pieces with no space between them,
/// so `a"b c"d` lexes as the single word `ab cd`.
fn word(input: &str) -> IResult<&str, Token> {
    map(many1(alt((bare, double_quoted, single_quoted))), |parts| {
        Token::Word(parts.concat())
    })(input)
}

/// Parse any single-character operator
fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Pipe, char('|')),
        value(Token::RedirectIn, char('<')),
        value(Token::RedirectOut, char('>')),
        value(Token::Background, char('&')),
    ))(input)
}

/// Parse any single token
fn token(input: &str) -> IResult<&str, Token> {
    preceded(multispace0, alt((operator, word)))(input)
}

/// Tokenize a complete command line
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let (remaining, tokens) =
        many0(token)(input).map_err(|e| LexError::Parse(format!("{:?}", e)))?;

    // Anything the token grammar could not consume is either an open
    // quote or a character we do not know.
    let remaining = remaining.trim_start();
    if !remaining.is_empty() {
        let c = remaining.chars().next().unwrap_or('?');
        if c == '"' || c == '\'' {
            return Err(LexError::UnterminatedQuote);
        }
        return Err(LexError::UnexpectedChar(c));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn tokenize_simple_command() {
        let tokens = lex("echo hi").unwrap();
        assert_eq!(tokens, vec![w("echo"), w("hi")]);
    }

    #[test]
    fn tokenize_empty_line() {
        assert_eq!(lex("").unwrap(), vec![]);
        assert_eq!(lex("   \t ").unwrap(), vec![]);
    }

    #[test]
    fn tokenize_pipeline() {
        let tokens = lex("yes | head -3").unwrap();
        assert_eq!(
            tokens,
            vec![w("yes"), Token::Pipe, w("head"), w("-3")]
        );
    }

    #[test]
    fn tokenize_redirects() {
        let tokens = lex("sort < in.txt > out.txt").unwrap();
        assert_eq!(
            tokens,
            vec![
                w("sort"),
                Token::RedirectIn,
                w("in.txt"),
                Token::RedirectOut,
                w("out.txt"),
            ]
        );
    }

    #[test]
    fn tokenize_background() {
        let tokens = lex("sleep 5 &").unwrap();
        assert_eq!(tokens, vec![w("sleep"), w("5"), Token::Background]);
    }

    #[test]
    fn operators_need_no_surrounding_space() {
        let tokens = lex("a|b>c").unwrap();
        assert_eq!(
            tokens,
            vec![w("a"), Token::Pipe, w("b"), Token::RedirectOut, w("c")]
        );
    }

    #[test]
    fn quotes_group_one_word() {
        let tokens = lex("echo \"hello world\"").unwrap();
        assert_eq!(tokens, vec![w("echo"), w("hello world")]);

        let tokens = lex("printf 'a\\nb\\n'").unwrap();
        assert_eq!(tokens, vec![w("printf"), w("a\\nb\\n")]);
    }

    #[test]
    fn adjacent_pieces_concatenate() {
        let tokens = lex("a\"b c\"d").unwrap();
        assert_eq!(tokens, vec![w("ab cd")]);
    }

    #[test]
    fn quotes_protect_operators() {
        let tokens = lex("echo \"a | b\"").unwrap();
        assert_eq!(tokens, vec![w("echo"), w("a | b")]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(lex("echo \"open"), Err(LexError::UnterminatedQuote));
        assert_eq!(lex("echo 'open"), Err(LexError::UnterminatedQuote));
    }
}
