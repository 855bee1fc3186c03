use std::rc::Rc;

use crate::driver::Driver;
use crate::error::NoProgress;
use crate::outcome::Outcome;
use crate::parser::{Continuation, Message, Parser, Rule};
use crate::state::State;
use crate::value::Value;

use super::{optional, seq};

fn bounds(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) => format!("{{{},{}}}", min, max),
        None => format!("{{{},}}", min),
    }
}

/// Matches `rule` repeatedly, enumerating every accepting count.
///
/// Each count within `[min, max]` is delivered as its own success, in
/// ascending order, with the list of non-null values collected so far.
/// Iterations are scheduled through the job queue, never by direct
/// recursion. An iteration that fails below `min` re-raises at the original
/// state with this parser's message; an aborting failure is forwarded at
/// any count. An iteration that matches without consuming input is a fatal
/// grammar error.
pub fn repeat<R>(rule: R, min: usize, max: Option<usize>) -> Parser
where
    R: Into<Rule>,
{
    debug_assert!(max.map_or(true, |max| min <= max));
    let rule = rule.into();
    let message = {
        let inner = rule.describe();
        Message::lazy(move || format!("{}{}", inner, bounds(min, max)))
    };
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        let round = Rc::new(RepeatRound {
            rule: rule.clone(),
            min,
            max,
            message: fail.clone(),
            origin: state.clone(),
            k: Rc::clone(&k),
        });
        round.step(drv, state, 0, Vec::new(), false);
    })
}

struct RepeatRound {
    rule: Rule,
    min: usize,
    max: Option<usize>,
    message: Message,
    origin: State,
    k: Continuation,
}

impl RepeatRound {
    fn step(
        self: Rc<Self>,
        drv: &mut Driver,
        state: State,
        count: usize,
        acc: Vec<Value>,
        commit: bool,
    ) {
        if count >= self.min {
            (self.k)(
                drv,
                Outcome::matched_with(state.clone(), Value::List(acc.clone()), commit),
            );
        }
        if self.max.map_or(false, |max| count >= max) {
            return;
        }
        let before = state.clone();
        let this = Rc::clone(&self);
        self.rule.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Ok(m) => {
                    if out.state.pos() == before.pos() {
                        drv.raise(NoProgress { pos: before.pos() }.build());
                        return;
                    }
                    let mut grown = acc.clone();
                    if !m.value.is_null() {
                        grown.push(m.value);
                    }
                    let commit = commit || m.commit;
                    let next = Rc::clone(&this);
                    let next_state = out.state.clone();
                    let label = this.message.clone();
                    let at = count + 1;
                    drv.add_job(
                        move || format!("{} iteration {}", label, at),
                        move |drv| next.step(drv, next_state, at, grown, commit),
                    );
                }
                Err(fail) => {
                    if fail.abort {
                        (this.k)(
                            drv,
                            Outcome {
                                state: out.state,
                                status: Err(fail),
                            },
                        );
                    } else if count < this.min {
                        (this.k)(
                            drv,
                            Outcome::failed_with(
                                this.origin.clone(),
                                this.message.clone(),
                                fail.commit,
                                false,
                            ),
                        );
                    }
                    // at or above the minimum every accepting count was
                    // already delivered; the failure only ends the loop
                }
            }),
        );
    }
}

/// Like [`repeat`], with an optional `ignore` rule tried before every
/// iteration of `rule`.
pub fn repeat_ignore<I, R>(ignore: I, rule: R, min: usize, max: Option<usize>) -> Parser
where
    I: Into<Rule>,
    R: Into<Rule>,
{
    let element = seq(vec![
        Rule::from(optional(ignore.into()).discard()),
        rule.into(),
    ])
    .map(|v| match v {
        Value::List(mut items) => {
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        }
        other => other,
    });
    repeat(element, min, max)
}

/// Matches `element (separator element)*`, discarding separator values and
/// producing the list of element values.
///
/// Unlike [`repeat`] this is a greedy fold: it delivers one success for the
/// longest separated sequence the input admits (capped by `max`), stopping
/// at the last good state when the next separator-element pair fails. An
/// ambiguous separator or element still enumerates: every branch failure
/// at or past the minimum is a stopping point with its own success.
pub fn repeat_separated<E, S>(
    element: E,
    separator: S,
    min: usize,
    max: Option<usize>,
) -> Parser
where
    E: Into<Rule>,
    S: Into<Rule>,
{
    reduce(
        element,
        separator,
        |v| Value::List(vec![v]),
        |acc, _sep, v| match acc {
            Value::List(mut items) => {
                items.push(v);
                Value::List(items)
            }
            _ => unreachable!(),
        },
        min,
        max,
    )
}

/// Like [`repeat_separated`], retaining the separator values: the
/// accumulator starts as `first(v0)` and each further element folds through
/// `fold(acc, separator_value, element_value)`.
///
/// With `min = 0` an immediately failing first element succeeds with an
/// empty list, and with `max = 0` nothing is parsed at all; `first` and
/// `fold` are never consulted for the empty cases.
pub fn reduce<E, S, F, G>(
    element: E,
    separator: S,
    first: F,
    fold: G,
    min: usize,
    max: Option<usize>,
) -> Parser
where
    E: Into<Rule>,
    S: Into<Rule>,
    F: Fn(Value) -> Value + 'static,
    G: Fn(Value, Value, Value) -> Value + 'static,
{
    debug_assert!(max.map_or(true, |max| min <= max));
    let element = element.into();
    let separator = separator.into();
    let message = {
        let e = element.describe();
        let s = separator.describe();
        Message::lazy(move || format!("{} separated by {}", e, s))
    };
    let fail = message.clone();
    let first: Rc<dyn Fn(Value) -> Value> = Rc::new(first);
    let fold: Rc<dyn Fn(Value, Value, Value) -> Value> = Rc::new(fold);
    Parser::new(message, move |drv, state, k| {
        if max == Some(0) {
            k(drv, Outcome::matched(state, Value::List(Vec::new())));
            return;
        }
        let round = Rc::new(ReduceRound {
            element: element.clone(),
            separator: separator.clone(),
            first: Rc::clone(&first),
            fold: Rc::clone(&fold),
            min,
            max,
            message: fail.clone(),
            origin: state.clone(),
            k: Rc::clone(&k),
        });
        round.start(drv, state);
    })
}

struct ReduceRound {
    element: Rule,
    separator: Rule,
    first: Rc<dyn Fn(Value) -> Value>,
    fold: Rc<dyn Fn(Value, Value, Value) -> Value>,
    min: usize,
    max: Option<usize>,
    message: Message,
    origin: State,
    k: Continuation,
}

impl ReduceRound {
    fn start(self: Rc<Self>, drv: &mut Driver, state: State) {
        let this = Rc::clone(&self);
        self.element.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Ok(m) => {
                    let commit = m.commit;
                    let acc = (this.first)(m.value);
                    if this.max == Some(1) {
                        (this.k)(drv, Outcome::matched_with(out.state.clone(), acc, commit));
                        return;
                    }
                    let next = Rc::clone(&this);
                    let next_state = out.state.clone();
                    let label = this.message.clone();
                    drv.add_job(
                        move || format!("{} element 2", label),
                        move |drv| next.step(drv, next_state, 1, acc, commit),
                    );
                }
                Err(fail) => {
                    if fail.abort {
                        (this.k)(
                            drv,
                            Outcome {
                                state: out.state,
                                status: Err(fail),
                            },
                        );
                    } else if this.min == 0 {
                        (this.k)(
                            drv,
                            Outcome::matched_with(
                                this.origin.clone(),
                                Value::List(Vec::new()),
                                fail.commit,
                            ),
                        );
                    } else {
                        (this.k)(
                            drv,
                            Outcome::failed_with(
                                this.origin.clone(),
                                this.message.clone(),
                                fail.commit,
                                false,
                            ),
                        );
                    }
                }
            }),
        );
    }

    /// One `separator element` round. `state` is the last good state; the
    /// fold stops there when the pair fails without aborting.
    fn step(
        self: Rc<Self>,
        drv: &mut Driver,
        state: State,
        count: usize,
        acc: Value,
        commit: bool,
    ) {
        let this = Rc::clone(&self);
        let before = state.clone();
        self.separator.resolve().parse(
            drv,
            state,
            Rc::new(move |drv, out| match out.status {
                Err(fail) => {
                    if fail.abort {
                        (this.k)(
                            drv,
                            Outcome {
                                state: out.state,
                                status: Err(fail),
                            },
                        );
                    } else if count < this.min {
                        (this.k)(
                            drv,
                            Outcome::failed_with(
                                this.origin.clone(),
                                this.message.clone(),
                                fail.commit,
                                false,
                            ),
                        );
                    } else {
                        (this.k)(
                            drv,
                            Outcome::matched_with(
                                before.clone(),
                                acc.clone(),
                                commit || fail.commit,
                            ),
                        );
                    }
                }
                Ok(sep) => {
                    let this = Rc::clone(&this);
                    let before = before.clone();
                    let acc = acc.clone();
                    let sep_value = sep.value;
                    let sep_commit = sep.commit;
                    let element = this.element.resolve();
                    element.parse(
                        drv,
                        out.state,
                        Rc::new(move |drv, out| match out.status {
                            Err(mut fail) => {
                                if sep_commit {
                                    fail.abort = true;
                                }
                                if fail.abort {
                                    (this.k)(
                                        drv,
                                        Outcome {
                                            state: out.state,
                                            status: Err(fail),
                                        },
                                    );
                                } else if count < this.min {
                                    (this.k)(
                                        drv,
                                        Outcome::failed_with(
                                            this.origin.clone(),
                                            this.message.clone(),
                                            fail.commit,
                                            false,
                                        ),
                                    );
                                } else {
                                    (this.k)(
                                        drv,
                                        Outcome::matched_with(
                                            before.clone(),
                                            acc.clone(),
                                            commit || fail.commit,
                                        ),
                                    );
                                }
                            }
                            Ok(elem) => {
                                if out.state.pos() == before.pos() {
                                    drv.raise(NoProgress { pos: before.pos() }.build());
                                    return;
                                }
                                let grown = (this.fold)(
                                    acc.clone(),
                                    sep_value.clone(),
                                    elem.value,
                                );
                                let commit = commit || sep_commit || elem.commit;
                                let at = count + 1;
                                if this.max == Some(at) {
                                    (this.k)(
                                        drv,
                                        Outcome::matched_with(out.state.clone(), grown, commit),
                                    );
                                    return;
                                }
                                let next = Rc::clone(&this);
                                let next_state = out.state.clone();
                                let label = this.message.clone();
                                drv.add_job(
                                    move || format!("{} element {}", label, at + 1),
                                    move |drv| next.step(drv, next_state, at, grown, commit),
                                );
                            }
                        }),
                    );
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use regex::Regex;

    use super::*;
    use crate::combinators::{alt, commit};
    use crate::driver::run;
    use crate::error::EngineError;
    use crate::primitive::{literal, pattern};
    use crate::testutil::probe;

    fn strs(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::str(s)).collect())
    }

    #[test]
    fn every_accepting_count_is_delivered_in_ascending_order() {
        let p = repeat(literal("a"), 2, Some(4));
        let results = run(&p, "aaaaa").unwrap();
        assert_eq!(
            results.values(),
            vec![strs(&["a", "a"]), strs(&["a", "a", "a"]), strs(&["a", "a", "a", "a"])],
        );
    }

    #[test]
    fn zero_minimum_accepts_the_empty_match() {
        let p = repeat(literal("a"), 0, None);
        let results = run(&p, "b").unwrap();
        assert_eq!(results.values(), vec![Value::List(Vec::new())]);
    }

    #[test]
    fn a_failure_below_the_minimum_is_raised_at_the_origin() {
        let p = repeat(literal("a"), 2, None);
        let outcomes = probe(&p, "ab");
        assert_eq!(outcomes.len(), 1);
        let (state, fail) = outcomes[0].clone().unwrap_err();
        assert_eq!(state.pos(), 0);
        assert_eq!(fail.message.render(), "\"a\"{2,}");
    }

    #[test]
    fn zero_width_repetition_is_a_grammar_error() {
        let p = repeat(optional(literal("x")), 0, None);
        let err = run(&p, "y").unwrap_err();
        assert_matches!(err, EngineError::NoProgress { pos: 0 });

        // it is a fatal condition even mid-input
        let p = repeat(optional(literal("x")), 1, None);
        let err = run(&p, "xy").unwrap_err();
        assert_matches!(err, EngineError::NoProgress { pos: 1 });
    }

    #[test]
    fn an_aborting_iteration_is_forwarded() {
        let p = repeat(
            seq(vec![commit(literal("a")).into(), literal("b").into()]),
            0,
            None,
        );
        let outcomes = probe(&p, "ax");
        // the empty match was already delivered, then the abort surfaced
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        let (_, fail) = outcomes[1].clone().unwrap_err();
        assert!(fail.abort);
    }

    #[test]
    fn repeat_ignore_skips_before_every_iteration() {
        let p = repeat_ignore(literal(" "), literal("a"), 2, Some(2));
        let results = run(&p, " a a").unwrap();
        assert_eq!(results.values(), vec![strs(&["a", "a"])]);
    }

    #[test]
    fn repeat_separated_folds_greedily_into_one_success() {
        let digits = pattern(Regex::new("[0-9]+").unwrap());
        let p = repeat_separated(digits, literal(","), 1, None);
        let results = run(&p, "1,22,333").unwrap();
        assert_eq!(results.values(), vec![strs(&["1", "22", "333"])]);
    }

    #[test]
    fn repeat_separated_stops_before_a_trailing_separator() {
        let digits = pattern(Regex::new("[0-9]+").unwrap());
        let p = repeat_separated(digits, literal(","), 1, None);
        let outcomes = probe(&p, "1,2,");
        assert_eq!(outcomes.len(), 1);
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 3);
        assert_eq!(value, strs(&["1", "2"]));
    }

    #[test]
    fn repeat_separated_honors_the_bounds() {
        let digits = pattern(Regex::new("[0-9]+").unwrap());

        let p = repeat_separated(digits.clone(), literal(","), 1, Some(2));
        let results = run(&p, "1,2,3").unwrap();
        assert_eq!(results.values(), vec![strs(&["1", "2"])]);

        let p = repeat_separated(digits.clone(), literal(","), 2, None);
        let outcomes = probe(&p, "7");
        assert!(outcomes[0].is_err());

        // a zero upper bound parses nothing, even when an element matches
        let p = repeat_separated(digits.clone(), literal(","), 0, Some(0));
        let outcomes = probe(&p, "1,2");
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 0);
        assert_eq!(value, Value::List(Vec::new()));

        let p = repeat_separated(digits, literal(","), 0, None);
        let outcomes = probe(&p, "x");
        let (state, value) = outcomes[0].clone().unwrap();
        assert_eq!(state.pos(), 0);
        assert_eq!(value, Value::List(Vec::new()));
    }

    #[test]
    fn reduce_folds_with_the_separator_value() {
        let digits = pattern(Regex::new("[0-9]+").unwrap());
        let p = reduce(
            digits,
            alt(vec![literal("+").into(), literal("-").into()]),
            |v| v,
            |acc, op, v| {
                let a: i64 = acc.as_str().unwrap().parse().unwrap();
                let b: i64 = v.as_str().unwrap().parse().unwrap();
                let total = if op.as_str() == Some("+") { a + b } else { a - b };
                Value::from(total.to_string())
            },
            1,
            None,
        );
        // with an ambiguous separator, every stopping point is a parse;
        // the longest fold arrives last
        let results = run(&p, "5+3-2").unwrap();
        assert_eq!(
            results.values(),
            vec![Value::str("5"), Value::str("8"), Value::str("6")],
        );
    }

    #[test]
    fn an_optional_separator_does_not_loop() {
        // the separator may match zero width as long as each round still
        // consumes input through the element
        let p = reduce(
            literal("a"),
            optional(literal(",")),
            |v| v,
            |acc, _, _| acc,
            1,
            None,
        );
        let outcomes = probe(&p, "a,a");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].clone().unwrap().1, Value::str("a"));
    }

    #[test]
    fn a_stuck_separator_element_pair_is_a_grammar_error() {
        let stuck = reduce(
            optional(literal("x")),
            optional(literal(",")),
            |v| v,
            |acc, _, _| acc,
            1,
            None,
        );
        let err = run(&stuck, "y").unwrap_err();
        assert_matches!(err, EngineError::NoProgress { pos: 0 });
    }
}
