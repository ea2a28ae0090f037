//! Quote- and comment-aware splitter.
//!
//! Scans the script as a stream of tokens (code, literal, comment, `;`)
//! using nom, so a `;` inside `'…'`, `"…"`, `` `…` ``, `$tag$…$tag$` or a
//! comment never ends a statement.
//!
//! Comment policy: comments that appear before a statement's first token are
//! dropped; comments after it are kept verbatim as part of the statement.
//! `#` only starts a line comment before a statement's first token. Inside a
//! statement it is code, so Postgres operators like `#>` and `#-` survive; a
//! `;` in a trailing MySQL `#` comment therefore ends the statement.
//! MySQL executable comments (`/*!40101 … */`) are code, never dropped.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{anychar, char, satisfy},
    combinator::{cut, fail, map, not, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, terminated},
};

use super::{SplitError, Splitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Code(&'a str),
    Comment(&'a str),
    Terminator,
}

/// Splits on `;` outside of literals, quoted identifiers and comments.
#[derive(Debug, Clone, Copy)]
pub struct DelimiterSplitter {
    /// Treat `\x` inside `'…'` and `"…"` as an escape (MySQL default).
    pub backslash_escapes: bool,
}

impl Default for DelimiterSplitter {
    fn default() -> Self {
        Self {
            backslash_escapes: true,
        }
    }
}

impl DelimiterSplitter {
    /// Splitter for dialects where `\` is an ordinary character in literals.
    pub fn standard_strings() -> Self {
        Self {
            backslash_escapes: false,
        }
    }

    fn token<'a>(&self, input: &'a str, at: Position) -> IResult<&'a str, Token<'a>> {
        let escapes = self.backslash_escapes;
        alt((
            value(Token::Terminator, char(';')),
            map(executable_comment, Token::Code),
            map(|i: &'a str| comment(i, at.statement_start), Token::Comment),
            map(
                alt((
                    quoted('\'', escapes),
                    quoted('"', escapes),
                    quoted('`', false),
                    |i: &'a str| dollar_quoted(i, at.after_word),
                    code_text,
                    tag("-"),
                    tag("#"),
                    tag("$"),
                    lone_slash,
                )),
                Token::Code,
            ),
        ))(input)
    }
}

impl Splitter for DelimiterSplitter {
    fn name(&self) -> &'static str {
        "delimiter"
    }

    fn split(&self, script: &str) -> Result<Vec<String>, SplitError> {
        let mut statements = Vec::new();
        let mut current = String::new();
        let mut rest = script;

        while !rest.is_empty() {
            let at = Position {
                statement_start: current.is_empty(),
                after_word: script[..script.len() - rest.len()]
                    .chars()
                    .next_back()
                    .is_some_and(is_word_char),
            };
            let (next, token) = self
                .token(rest, at)
                .map_err(|_| unterminated(script, rest))?;

            match token {
                Token::Terminator => flush(&mut current, &mut statements),
                Token::Comment(text) => {
                    if !current.is_empty() {
                        current.push_str(text);
                    }
                }
                Token::Code(text) => {
                    if !current.is_empty() || !text.trim().is_empty() {
                        current.push_str(text);
                    }
                }
            }
            rest = next;
        }
        flush(&mut current, &mut statements);

        Ok(statements)
    }
}

/// Where the next token starts.
#[derive(Debug, Clone, Copy)]
struct Position {
    /// Nothing but whitespace and comments since the last `;`.
    statement_start: bool,
    /// Directly after an identifier character, where `$` cannot open a quote.
    after_word: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

/// A literal or quoted identifier, closing quote doubled to escape it.
fn quoted<'a>(quote: char, escapes: bool) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    let plain: &'static str = match (quote, escapes) {
        ('\'', true) => "'\\",
        ('\'', false) => "'",
        ('"', true) => "\"\\",
        ('"', false) => "\"",
        _ => "`",
    };
    move |input| {
        recognize(delimited(
            char(quote),
            many0(alt((
                is_not(plain),
                recognize(pair(char(quote), char(quote))),
                recognize(pair(char('\\'), anychar)),
            ))),
            char(quote),
        ))(input)
    }
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/")))(input)
}

/// `/*! … */` runs on MySQL, so it is statement text rather than a comment.
fn executable_comment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(tag("/*!"), take_until("*/"), tag("*/")))(input)
}

fn comment(input: &str, statement_start: bool) -> IResult<&str, &str> {
    if statement_start {
        alt((block_comment, line_comment("--"), line_comment("#")))(input)
    } else {
        alt((block_comment, line_comment("--")))(input)
    }
}

fn line_comment<'a>(open: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    recognize(pair(tag(open), opt(is_not("\r\n"))))
}

/// Postgres `$$…$$` or `$tag$…$tag$`. Once the opening tag is read, a
/// missing closing tag is a hard failure.
fn dollar_quoted(input: &str, after_word: bool) -> IResult<&str, &str> {
    if after_word {
        return fail(input);
    }
    let (body, open) = recognize(delimited(char('$'), opt(dollar_tag), char('$')))(input)?;
    let (rest, _) = cut(pair(take_until(open), tag(open)))(body)?;
    Ok((rest, &input[..input.len() - rest.len()]))
}

fn dollar_tag(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn code_text(input: &str) -> IResult<&str, &str> {
    is_not("'\"`;-#/$")(input)
}

/// A `/` that does not open a block comment.
fn lone_slash(input: &str) -> IResult<&str, &str> {
    terminated(tag("/"), not(char('*')))(input)
}

fn unterminated(script: &str, rest: &str) -> SplitError {
    let offset = script.len() - rest.len();
    let before = &script[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |l| l.chars().count())
        + 1;

    let construct = if rest.starts_with("/*") {
        "block comment"
    } else if rest.starts_with('`') {
        "quoted identifier"
    } else if rest.starts_with('"') {
        "double-quoted literal"
    } else if rest.starts_with('$') {
        "dollar-quoted string"
    } else {
        "string literal"
    };

    let excerpt: String = rest.lines().next().unwrap_or("").chars().take(40).collect();

    SplitError::Unterminated {
        construct,
        line,
        column,
        excerpt,
    }
}
