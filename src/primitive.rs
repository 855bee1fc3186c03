//! Primitive parsers over the input text.
//!
//! Every primitive matches only within the state's `[pos, end_pos)` window
//! and either succeeds advancing `pos` by the matched length or fails at
//! the input state.

use std::rc::Rc;

use regex::Regex;

use crate::outcome::Outcome;
use crate::parser::{Message, Parser};
use crate::state::State;
use crate::value::Value;

/// Matches the fixed prefix `text`, producing it as the value.
pub fn literal(text: &str) -> Parser {
    let text: Rc<str> = Rc::from(text);
    let message = Message::fixed(format!("{:?}", text));
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        if state.remaining().starts_with(&*text) {
            let next = state.advance(text.len());
            k(drv, Outcome::matched(next, Value::Str(Rc::clone(&text))));
        } else {
            k(drv, Outcome::failed(state, fail.clone()));
        }
    })
}

/// Matches `re` at the current offset, producing the matched text.
///
/// The pattern does not need to be anchored; a match anywhere later in the
/// remainder is a failure.
pub fn pattern(re: Regex) -> Parser {
    let message = Message::fixed(format!("/{}/", re.as_str()));
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        let matched = re
            .find(state.remaining())
            .filter(|m| m.start() == 0)
            .map(|m| m.end());
        match matched {
            Some(len) => {
                let value = Value::str(&state.remaining()[..len]);
                k(drv, Outcome::matched(state.advance(len), value));
            }
            None => k(drv, Outcome::failed(state, fail.clone())),
        }
    })
}

/// Wraps user code as a parser: `f` inspects the state and returns the
/// parsed value together with the number of bytes consumed, or `None` to
/// fail with `message`.
pub fn from_fn<M, F>(message: M, f: F) -> Parser
where
    M: Into<Message>,
    F: Fn(&State) -> Option<(Value, usize)> + 'static,
{
    let message = message.into();
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| match f(&state) {
        Some((value, len)) => k(drv, Outcome::matched(state.advance(len), value)),
        None => k(drv, Outcome::failed(state, fail.clone())),
    })
}

/// Matches the matching bound, producing a discarded value.
pub fn end_of_input() -> Parser {
    let message = Message::fixed("end of input");
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        if state.at_end() {
            k(drv, Outcome::matched(state, Value::Null));
        } else {
            k(drv, Outcome::failed(state, fail.clone()));
        }
    })
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::testutil::{probe, probe_state};

    #[test]
    fn literal_matches_a_prefix() {
        let outcomes = probe(&literal("foo"), "foobar");
        assert_eq!(outcomes.len(), 1);
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 3);
        assert_eq!(value, Value::str("foo"));
    }

    #[test]
    fn literal_fails_at_the_input_state() {
        let outcomes = probe(&literal("foo"), "fob");
        let (state, fail) = outcomes[0].clone().unwrap_err();
        assert_eq!(state.pos(), 0);
        assert_eq!(fail.message.render(), "\"foo\"");
        assert!(!fail.abort);
    }

    #[test]
    fn pattern_is_anchored_at_the_offset() {
        let digits = || pattern(Regex::new("[0-9]+").unwrap());

        let outcomes = probe(&digits(), "123x");
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 3);
        assert_eq!(value, Value::str("123"));

        // a later match does not count
        let outcomes = probe(&digits(), "x123");
        assert!(outcomes[0].is_err());
    }

    #[test]
    fn primitives_respect_the_matching_bound() {
        let state = State::new("foobar").with_end_pos(2);
        let outcomes = probe_state(&literal("foo"), state.clone());
        assert!(outcomes[0].is_err());

        let outcomes = probe_state(&literal("fo"), state);
        assert!(outcomes[0].is_ok());
    }

    #[test]
    fn from_fn_consumes_what_it_reports() {
        let lower = from_fn("a lowercase word", |state| {
            let len = state
                .remaining()
                .find(|c: char| !c.is_ascii_lowercase())
                .unwrap_or_else(|| state.remaining().len());
            if len == 0 {
                None
            } else {
                Some((Value::str(&state.remaining()[..len]), len))
            }
        });
        let outcomes = probe(&lower, "abc1");
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 3);
        assert_eq!(value, Value::str("abc"));

        let outcomes = probe(&lower, "1abc");
        let (_, fail) = outcomes[0].clone().unwrap_err();
        assert_eq!(fail.message.render(), "a lowercase word");
    }

    #[test]
    fn end_of_input_only_matches_the_bound() {
        assert!(probe(&end_of_input(), "")[0].is_ok());
        assert!(probe(&end_of_input(), "x")[0].is_err());
    }
}
