use std::fmt;

use crate::parser::Message;
use crate::state::State;
use crate::value::Value;

/// A successful match: the parsed value plus the sticky commit flag.
#[derive(Debug, Clone)]
pub struct Matched {
    /// The parsed value.
    pub value: Value,
    /// Set once the match passed a [`commit`](crate::combinators::commit)
    /// point; composites inherit it from any committed constituent.
    pub commit: bool,
}

/// A failed match: the parser's self-description plus the commit and abort
/// flags.
#[derive(Debug, Clone)]
pub struct Failed {
    /// What the failing parser expected, rendered lazily.
    pub message: Message,
    /// Carries forward a commit from an earlier success in the same chain.
    pub commit: bool,
    /// Demands that enclosing alternations stop trying further branches.
    pub abort: bool,
}

/// The result of one parser invocation: where the parse stands and whether
/// it matched.
///
/// On success the state is the state *after* the match; on failure it is the
/// state *at which* the failure was detected.
#[must_use]
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The resulting location.
    pub state: State,
    /// Whether the invocation matched, and the per-variant payload.
    pub status: Result<Matched, Failed>,
}

impl Outcome {
    /// Creates a successful outcome with an unset commit flag.
    #[inline]
    pub fn matched(state: State, value: Value) -> Self {
        Self::matched_with(state, value, false)
    }

    /// Creates a successful outcome with an explicit commit flag.
    #[inline]
    pub fn matched_with(state: State, value: Value, commit: bool) -> Self {
        Self {
            state,
            status: Ok(Matched { value, commit }),
        }
    }

    /// Creates a failed outcome with unset flags.
    #[inline]
    pub fn failed(state: State, message: Message) -> Self {
        Self::failed_with(state, message, false, false)
    }

    /// Creates a failed outcome with explicit flags.
    #[inline]
    pub fn failed_with(state: State, message: Message, commit: bool, abort: bool) -> Self {
        Self {
            state,
            status: Err(Failed {
                message,
                commit,
                abort,
            }),
        }
    }

    /// `true` if the invocation matched.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// `true` if the invocation failed.
    #[inline]
    pub fn is_err(&self) -> bool {
        self.status.is_err()
    }

    /// Maps the parsed value, if there is one.
    #[inline]
    pub fn map_value<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Value,
    {
        Self {
            state: self.state,
            status: self.status.map(|m| Matched {
                value: f(m.value),
                commit: m.commit,
            }),
        }
    }

    /// Folds `commit` into the outcome, on either variant. The flag is
    /// sticky: it can be set here but never cleared.
    #[inline]
    pub fn with_commit(self, commit: bool) -> Self {
        Self {
            state: self.state,
            status: match self.status {
                Ok(m) => Ok(Matched {
                    commit: m.commit || commit,
                    ..m
                }),
                Err(f) => Err(Failed {
                    commit: f.commit || commit,
                    ..f
                }),
            },
        }
    }

    /// Unwraps into the state and the parsed value.
    ///
    /// Panics if the invocation failed.
    #[inline]
    pub fn unwrap(self) -> (State, Value) {
        match self.status {
            Ok(m) => (self.state, m.value),
            Err(f) => panic!("called `unwrap` on a failed `Outcome`: {}", f.message),
        }
    }

    /// Unwraps into the state and the failure.
    ///
    /// Panics if the invocation matched.
    #[inline]
    pub fn unwrap_err(self) -> (State, Failed) {
        match self.status {
            Ok(..) => panic!("called `unwrap_err` on a matched `Outcome`"),
            Err(f) => (self.state, f),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Ok(m) => write!(f, "matched {} {}", m.value, self.state),
            Err(fail) => write!(f, "expected {} {}", fail.message, self.state),
        }
    }
}
