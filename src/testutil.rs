//! Shared helpers for unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::driver::Driver;
use crate::outcome::Outcome;
use crate::parser::Parser;
use crate::state::State;

/// Invokes `parser` once from the start of `input`, draining the queue and
/// collecting every outcome delivered to the continuation, in delivery
/// order.
pub(crate) fn probe(parser: &Parser, input: &str) -> Vec<Outcome> {
    probe_state(parser, State::new(input))
}

/// Like [`probe`], starting from an explicit state.
pub(crate) fn probe_state(parser: &Parser, state: State) -> Vec<Outcome> {
    let mut drv = Driver::new();
    let collected = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&collected);
    let parser = parser.clone();
    drv.add_job(
        || String::from("probe"),
        move |drv| {
            parser.parse(
                drv,
                state,
                Rc::new(move |_, out| sink.borrow_mut().push(out)),
            )
        },
    );
    drv.drain().unwrap();
    let outcomes = collected.borrow().clone();
    outcomes
}
