use std::cell::Cell;
use std::rc::Rc;

use crate::outcome::Outcome;
use crate::parser::{Message, Parser, Rule};

/// Tries every alternative from the same starting state, delivering every
/// outcome of every branch.
///
/// Each branch is scheduled as its own job, in source order, so branch
/// enumeration never recurses on the call stack. The branches share an
/// aborting flag: a branch whose failure carries the abort flag sets it
/// before forwarding, and branches that have not started yet then do
/// nothing. Commit within a branch does not prune the other branches; only
/// abort does.
pub fn alt(rules: Vec<Rule>) -> Parser {
    let message = {
        let describes: Vec<Message> = rules.iter().map(Rule::describe).collect();
        Message::lazy(move || {
            if describes.is_empty() {
                return String::from("no alternatives");
            }
            let parts: Vec<String> = describes.iter().map(Message::render).collect();
            parts.join(" or ")
        })
    };
    let fail = message.clone();
    Parser::new(message, move |drv, state, k| {
        if rules.is_empty() {
            k(drv, Outcome::failed(state, fail.clone()));
            return;
        }
        let aborting = Rc::new(Cell::new(false));
        for (index, rule) in rules.iter().enumerate() {
            let rule = rule.clone();
            let state = state.clone();
            let k = Rc::clone(&k);
            let aborting = Rc::clone(&aborting);
            let label_rule = rule.clone();
            drv.add_job(
                move || format!("branch {}: {}", index, label_rule.describe()),
                move |drv| {
                    if aborting.get() {
                        return;
                    }
                    let watch = aborting;
                    rule.resolve().parse(
                        drv,
                        state,
                        Rc::new(move |drv, out| {
                            if let Err(fail) = &out.status {
                                if fail.abort {
                                    watch.set(true);
                                }
                            }
                            k(drv, out);
                        }),
                    );
                },
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::{commit, seq};
    use crate::driver::run;
    use crate::primitive::literal;
    use crate::testutil::probe;
    use crate::value::Value;

    #[test]
    fn every_matching_branch_is_delivered() {
        let p = alt(vec![literal("foo").into(), literal("foobar").into()]);
        let results = run(&p, "foobar").unwrap();
        assert_eq!(
            results.values(),
            vec![Value::str("foo"), Value::str("foobar")],
        );
    }

    #[test]
    fn branches_are_tried_in_source_order() {
        let p = alt(vec![
            literal("a").into(),
            literal("ab").into(),
            literal("abc").into(),
        ]);
        let results = run(&p, "abc").unwrap();
        assert_eq!(
            results.values(),
            vec![Value::str("a"), Value::str("ab"), Value::str("abc")],
        );
    }

    #[test]
    fn failures_are_forwarded_too() {
        let p = alt(vec![literal("a").into(), literal("b").into()]);
        let outcomes = probe(&p, "c");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(Outcome::is_err));
    }

    #[test]
    fn an_abort_stops_the_remaining_branches() {
        let p = alt(vec![
            seq(vec![commit(literal("a")).into(), literal("b").into()]).into(),
            literal("ax").into(),
        ]);
        let outcomes = probe(&p, "ax");
        // one aborting failure; the second branch never ran
        assert_eq!(outcomes.len(), 1);
        let (_, fail) = outcomes[0].clone().unwrap_err();
        assert!(fail.abort);
    }

    #[test]
    fn commit_alone_does_not_prune_branches() {
        let p = alt(vec![
            commit(literal("ab")).into(),
            literal("abc").into(),
        ]);
        let results = run(&p, "abc").unwrap();
        assert_eq!(
            results.values(),
            vec![Value::str("ab"), Value::str("abc")],
        );
    }

    #[test]
    fn an_empty_alternation_fails() {
        let outcomes = probe(&alt(Vec::new()), "x");
        let (_, fail) = outcomes[0].clone().unwrap_err();
        assert_eq!(fail.message.render(), "no alternatives");
    }
}
