// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive-descent parser for state expressions.

use alloc::vec::Vec;
use core::fmt;

use crate::expr::{LogicOp, StateExpression};
use crate::key::StateKeyRegistry;

/// What went wrong while parsing a state expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A character that cannot start or continue the expression here.
    UnexpectedChar(char),
    /// The text ended where a term was required.
    UnexpectedEnd,
    /// A specific character was required.
    ///
    /// This covers unclosed parentheses and connectives that differ from the
    /// first one used at the same nesting level.
    Expected {
        /// The required character.
        expected: char,
        /// What was found instead (`None` at end of text).
        found: Option<char>,
    },
}

/// Error returned by [`StateExpression::parse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the expression text.
    pub position: usize,
    /// The kind of failure.
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParseErrorKind::UnexpectedChar(ch) => {
                write!(f, "unexpected {ch:?} at position {}", self.position)
            }
            ParseErrorKind::UnexpectedEnd => {
                write!(f, "unexpected end of expression at position {}", self.position)
            }
            ParseErrorKind::Expected {
                expected,
                found: Some(found),
            } => write!(
                f,
                "expected {expected:?} but found {found:?} at position {}",
                self.position
            ),
            ParseErrorKind::Expected {
                expected,
                found: None,
            } => write!(
                f,
                "expected {expected:?} at end of expression (position {})",
                self.position
            ),
        }
    }
}

impl core::error::Error for ParseError {}

/// A position in the input. Parsing functions take a cursor by value and
/// return the cursor after what they consumed.
#[derive(Copy, Clone, Debug)]
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(self, ch: char) -> Self {
        Self {
            pos: self.pos + ch.len_utf8(),
            ..self
        }
    }

    fn skip_space(mut self) -> Self {
        while self.peek() == Some(' ') {
            self = self.bump(' ');
        }
        self
    }

    fn ident(self) -> (&'a str, Self) {
        let rest = &self.text[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(_, ch)| !is_ident_continue(ch))
            .map_or(rest.len(), |(i, _)| i);
        (
            &rest[..len],
            Self {
                pos: self.pos + len,
                ..self
            },
        )
    }

    fn expect(self, expected: char) -> Result<Self, ParseError> {
        match self.peek() {
            Some(ch) if ch == expected => Ok(self.bump(ch)),
            found => Err(self.error(ParseErrorKind::Expected { expected, found })),
        }
    }

    fn unexpected(self) -> ParseError {
        self.error(match self.peek() {
            Some(ch) => ParseErrorKind::UnexpectedChar(ch),
            None => ParseErrorKind::UnexpectedEnd,
        })
    }

    fn error(self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            position: self.pos,
            kind,
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Parses a complete expression; trailing input is an error.
pub(crate) fn parse_expression(
    text: &str,
    keys: &mut StateKeyRegistry,
) -> Result<StateExpression, ParseError> {
    let (expr, rest) = parse_sequence(Cursor { text, pos: 0 }, keys)?;
    if rest.peek().is_some() {
        return Err(rest.unexpected());
    }
    Ok(expr)
}

/// `sequence := term (op term)*` where every `op` at this level is the same.
fn parse_sequence<'a>(
    mut cur: Cursor<'a>,
    keys: &mut StateKeyRegistry,
) -> Result<(StateExpression, Cursor<'a>), ParseError> {
    let mut children = Vec::new();
    let mut op: Option<LogicOp> = None;

    loop {
        let (child, after) = parse_term(cur, keys)?;
        children.push(child);

        let after = after.skip_space();
        let Some(next) = after.peek().and_then(LogicOp::from_symbol) else {
            cur = after;
            break;
        };
        match op {
            None => op = Some(next),
            Some(op) if op != next => {
                return Err(after.error(ParseErrorKind::Expected {
                    expected: op.symbol(),
                    found: Some(next.symbol()),
                }));
            }
            Some(_) => {}
        }
        cur = after.bump(next.symbol());
    }

    let expr = match op {
        Some(op) => StateExpression::logic(op, children),
        None => children.pop().expect("at least one term was parsed"),
    };
    Ok((expr, cur))
}

/// `term := '!'? (identifier | '(' sequence ')')`
fn parse_term<'a>(
    cur: Cursor<'a>,
    keys: &mut StateKeyRegistry,
) -> Result<(StateExpression, Cursor<'a>), ParseError> {
    let mut cur = cur.skip_space();
    let negate = cur.peek() == Some('!');
    if negate {
        cur = cur.bump('!').skip_space();
    }

    let (mut expr, cur) = match cur.peek() {
        Some(ch) if is_ident_start(ch) => {
            let (name, after) = cur.ident();
            (StateExpression::check(keys.intern(name)), after)
        }
        Some('(') => {
            let (inner, after) = parse_sequence(cur.bump('('), keys)?;
            (inner, after.expect(')')?)
        }
        _ => return Err(cur.unexpected()),
    };

    if negate {
        expr.toggle_negate();
    }
    Ok((expr, cur))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn parse(text: &str) -> Result<StateExpression, ParseError> {
        StateExpression::parse(text, false, &mut StateKeyRegistry::new())
    }

    fn err(position: usize, kind: ParseErrorKind) -> Result<StateExpression, ParseError> {
        Err(ParseError { position, kind })
    }

    #[test]
    fn parses_single_check() {
        let mut keys = StateKeyRegistry::new();
        let expr = StateExpression::parse("  hover ", false, &mut keys).unwrap();
        assert_eq!(expr, StateExpression::check(keys.intern("hover")));
    }

    #[test]
    fn parses_nested_groups() {
        let mut keys = StateKeyRegistry::new();
        let expr = StateExpression::parse("a | !(b + c)", false, &mut keys).unwrap();
        let [a, b, c] = ["a", "b", "c"].map(|n| StateExpression::check(keys.intern(n)));
        assert_eq!(expr, StateExpression::any_of([a, b.and(c).negate()]));
    }

    #[test]
    fn redundant_parentheses_collapse() {
        let mut keys = StateKeyRegistry::new();
        let expr = StateExpression::parse("((a))", false, &mut keys).unwrap();
        assert_eq!(expr, StateExpression::check(keys.intern("a")));
        let expr = StateExpression::parse("!(!a)", false, &mut keys).unwrap();
        assert_eq!(expr, StateExpression::check(keys.intern("a")));
    }

    #[test]
    fn parse_negate_flag_is_xored() {
        let mut keys = StateKeyRegistry::new();
        let expr = StateExpression::parse("!a", true, &mut keys).unwrap();
        assert_eq!(expr, StateExpression::check(keys.intern("a")));
    }

    #[test]
    fn rejects_mixed_connectives() {
        assert_eq!(
            parse("a+b|c"),
            err(
                3,
                ParseErrorKind::Expected {
                    expected: '+',
                    found: Some('|')
                }
            )
        );
        assert!(parse("a+(b|c)").is_ok());
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert_eq!(
            parse("(a+b"),
            err(
                4,
                ParseErrorKind::Expected {
                    expected: ')',
                    found: None
                }
            )
        );
        assert_eq!(parse("a)"), err(1, ParseErrorKind::UnexpectedChar(')')));
        assert_eq!(parse("()"), err(1, ParseErrorKind::UnexpectedChar(')')));
    }

    #[test]
    fn rejects_missing_terms() {
        assert_eq!(parse(""), err(0, ParseErrorKind::UnexpectedEnd));
        assert_eq!(parse("   "), err(3, ParseErrorKind::UnexpectedEnd));
        assert_eq!(parse("a+"), err(2, ParseErrorKind::UnexpectedEnd));
        assert_eq!(parse("!"), err(1, ParseErrorKind::UnexpectedEnd));
        assert_eq!(parse("a+!)"), err(3, ParseErrorKind::UnexpectedChar(')')));
        assert_eq!(parse("1a"), err(0, ParseErrorKind::UnexpectedChar('1')));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert_eq!(parse("a b"), err(2, ParseErrorKind::UnexpectedChar('b')));
        assert_eq!(parse("a*"), err(1, ParseErrorKind::UnexpectedChar('*')));
    }

    #[test]
    fn error_messages_mention_position() {
        let e = parse("a+b|c").unwrap_err();
        assert_eq!(e.to_string(), "expected '+' but found '|' at position 3");
        let e = parse("(a").unwrap_err();
        assert_eq!(
            e.to_string(),
            "expected ')' at end of expression (position 2)"
        );
    }
}
