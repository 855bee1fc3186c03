use std::rc::Rc;

use crate::outcome::{Matched, Outcome};
use crate::parser::{Message, Parser, Rule};
use crate::value::Value;

use super::optional;

/// Marks `rule`'s successes as committed (a cut).
///
/// A committed success poisons backtracking in the enclosing chain: when a
/// later step fails, the failure is re-raised with its abort flag set, and
/// enclosing alternations stop trying further branches.
pub fn commit<R>(rule: R) -> Parser
where
    R: Into<Rule>,
{
    let rule = rule.into();
    let message = {
        let inner = rule.describe();
        Message::lazy(move || inner.render())
    };
    Parser::new(message, move |drv, state, k| {
        rule.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Ok(m) => k(
                    drv,
                    Outcome {
                        state: out.state,
                        status: Ok(Matched { commit: true, ..m }),
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

/// Runs `first` then `second`, building the combined value with `combiner`.
///
/// A failure of `first` is forwarded as-is. A failure of `second` after a
/// committed `first` is re-raised with its abort flag set. The combined
/// success carries the commit flag of either side.
pub fn chain<A, B, F>(first: A, second: B, combiner: F) -> Parser
where
    A: Into<Rule>,
    B: Into<Rule>,
    F: Fn(Value, Value) -> Value + 'static,
{
    let first = first.into();
    let second = second.into();
    let combiner = Rc::new(combiner);
    let message = {
        let a = first.describe();
        let b = second.describe();
        Message::lazy(move || format!("{} then {}", a, b))
    };
    Parser::new(message, move |drv, state, k| {
        let second = second.clone();
        let combiner = Rc::clone(&combiner);
        first.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Err(fail) => k(
                    drv,
                    Outcome {
                        state: out.state,
                        status: Err(fail),
                    },
                ),
                Ok(first_match) => {
                    let k = Rc::clone(&k);
                    let combiner = Rc::clone(&combiner);
                    let first_value = first_match.value;
                    let first_commit = first_match.commit;
                    second.resolve().parse(
                        drv,
                        out.state,
                        Rc::new(move |drv, out| match out.status {
                            Err(mut fail) => {
                                if first_commit {
                                    fail.abort = true;
                                }
                                k(
                                    drv,
                                    Outcome {
                                        state: out.state,
                                        status: Err(fail),
                                    },
                                );
                            }
                            Ok(second_match) => {
                                let value =
                                    combiner(first_value.clone(), second_match.value);
                                k(
                                    drv,
                                    Outcome::matched_with(
                                        out.state,
                                        value,
                                        first_commit || second_match.commit,
                                    ),
                                );
                            }
                        }),
                    );
                }
            }),
        );
    })
}

/// Runs `rules` in order, collecting non-null values into a fresh list.
///
/// Discarded (null) values are elided from the list. A single-rule `seq` is
/// equivalent to that rule; an empty one succeeds with an empty list.
pub fn seq(rules: Vec<Rule>) -> Parser {
    let message = {
        let describes: Vec<Message> = rules.iter().map(Rule::describe).collect();
        Message::lazy(move || {
            let parts: Vec<String> = describes.iter().map(Message::render).collect();
            parts.join(" ")
        })
    };
    let mut rules = rules;
    match rules.len() {
        0 => Parser::new(message, |drv, state, k| {
            k(drv, Outcome::matched(state, Value::List(Vec::new())))
        }),
        1 => {
            let rule = rules.remove(0);
            Parser::new(message, move |drv, state, k| {
                rule.resolve().parse(drv, state, k)
            })
        }
        _ => {
            let head = rules.remove(0);
            let start = head.to_parser().map(|v| match v {
                Value::Null => Value::List(Vec::new()),
                v => Value::List(vec![v]),
            });
            let folded = rules.into_iter().fold(start, |prev, rule| {
                chain(prev, rule, |list, v| match list {
                    Value::List(mut items) => {
                        if !v.is_null() {
                            items.push(v);
                        }
                        Value::List(items)
                    }
                    _ => unreachable!(),
                })
            });
            Parser::new(message, move |drv, state, k| folded.parse(drv, state, k))
        }
    }
}

/// Like [`seq`], with an optional `ignore` rule tried before every element.
/// The usual use is whitespace skipping.
pub fn seq_ignore<I>(ignore: I, rules: Vec<Rule>) -> Parser
where
    I: Into<Rule>,
{
    let ignore = ignore.into();
    let mut interleaved = Vec::with_capacity(rules.len() * 2);
    for rule in rules {
        interleaved.push(Rule::from(optional(ignore.clone()).discard()));
        interleaved.push(rule);
    }
    seq(interleaved)
}
