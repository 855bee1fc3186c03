use std::rc::Rc;

use crate::outcome::Outcome;
use crate::parser::{Message, Parser, Rule};
use crate::value::Value;

/// Makes `rule` optional.
///
/// Successes are forwarded. A failure succeeds with the empty string at the
/// input state, keeping the failure's commit flag; an aborting failure is
/// forwarded instead, so a cut inside `rule` still cancels enclosing
/// alternations.
#[inline]
pub fn optional<R>(rule: R) -> Parser
where
    R: Into<Rule>,
{
    optional_with(rule, Value::empty_str())
}

/// Like [`optional`], succeeding with `default` when `rule` fails.
pub fn optional_with<R>(rule: R, default: Value) -> Parser
where
    R: Into<Rule>,
{
    let rule = rule.into();
    let message = {
        let inner = rule.describe();
        Message::lazy(move || format!("optional {}", inner))
    };
    Parser::new(message, move |drv, state, k| {
        let default = default.clone();
        let start = state.clone();
        rule.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Err(fail) if !fail.abort => k(
                    drv,
                    Outcome::matched_with(start.clone(), default.clone(), fail.commit),
                ),
                status => k(
                    drv,
                    Outcome {
                        state: out.state,
                        status,
                    },
                ),
            }),
        );
    })
}

/// Zero-width lookahead: succeeds with `rule`'s value without consuming
/// input. Failures are forwarded unchanged.
pub fn check<R>(rule: R) -> Parser
where
    R: Into<Rule>,
{
    let rule = rule.into();
    let message = {
        let inner = rule.describe();
        Message::lazy(move || format!("check {}", inner))
    };
    Parser::new(message, move |drv, state, k| {
        let start = state.clone();
        rule.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Ok(m) => k(
                    drv,
                    Outcome {
                        state: start.clone(),
                        status: Ok(m),
                    },
                ),
                status => k(
                    drv,
                    Outcome {
                        state: out.state,
                        status,
                    },
                ),
            }),
        );
    })
}

/// Negative lookahead: fails at the input state when `rule` matches, and
/// succeeds with the empty string (keeping the failure's commit flag) when
/// it does not. Never consumes input.
pub fn not<R>(rule: R) -> Parser
where
    R: Into<Rule>,
{
    let rule = rule.into();
    let message = {
        let inner = rule.describe();
        Message::lazy(move || format!("not {}", inner))
    };
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        let start = state.clone();
        let fail = fail.clone();
        rule.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Ok(m) => k(
                    drv,
                    Outcome::failed_with(start.clone(), fail.clone(), m.commit, false),
                ),
                Err(f) => k(
                    drv,
                    Outcome::matched_with(start.clone(), Value::empty_str(), f.commit),
                ),
            }),
        );
    })
}
