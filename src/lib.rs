#![deny(rust_2018_idioms)]
#![warn(missing_docs)]

//! A backtracking parser combinator engine.
//!
//! Parsers are composed from a small algebra of combinators and executed
//! against an in-memory string. The engine backtracks fully, supports
//! commit points (cuts) that prune alternations, and reports every
//! distinct successful parse of an ambiguous grammar incrementally through
//! a [`ResultSet`].
//!
//! Execution is continuation-passing over a cooperative job queue: an
//! alternation schedules one job per branch and a repetition one job per
//! iteration, so deeply ambiguous or long-repeating grammars never exhaust
//! the call stack.
//!
//! ```
//! use ambit::combinators::{alt, repeat_separated};
//! use ambit::primitive::literal;
//! use ambit::run;
//!
//! let word = alt(vec![literal("cat").into(), literal("dog").into()]);
//! let list = repeat_separated(word, literal(","), 1, None);
//!
//! let results = run(&list, "cat,dog,cat").unwrap();
//! assert!(results.is_settled());
//! ```

pub mod combinators;
mod driver;
mod error;
mod outcome;
mod parser;
pub mod primitive;
mod result_set;
mod state;
mod value;

#[cfg(test)]
mod testutil;

pub use self::driver::{run, Driver};
pub use self::error::EngineError;
pub use self::outcome::{Failed, Matched, Outcome};
pub use self::parser::{defer, Continuation, Deferred, Message, Parser, Rule};
pub use self::result_set::{BestFailure, ListenerError, ResultSet};
pub use self::state::State;
pub use self::value::Value;
