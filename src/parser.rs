use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::driver::Driver;
use crate::outcome::{Failed, Outcome};
use crate::state::State;
use crate::value::Value;

/// The callback a parser invokes once per outcome it produces.
///
/// A continuation may be called zero, one, or many times over the course of
/// a run: an alternation delivers every matching branch, a repetition every
/// accepting count.
pub type Continuation = Rc<dyn Fn(&mut Driver, Outcome)>;

/// A lazily rendered parser self-description.
///
/// Rendering is deferred so that descriptions of recursive grammars can be
/// built before the grammar is complete.
#[derive(Clone)]
pub struct Message {
    kind: Rc<MessageKind>,
}

enum MessageKind {
    Fixed(String),
    Lazy(Box<dyn Fn() -> String>),
}

impl Message {
    /// A fixed description.
    #[inline]
    pub fn fixed<S: Into<String>>(text: S) -> Self {
        Self {
            kind: Rc::new(MessageKind::Fixed(text.into())),
        }
    }

    /// A description rendered on demand.
    #[inline]
    pub fn lazy<F>(render: F) -> Self
    where
        F: Fn() -> String + 'static,
    {
        Self {
            kind: Rc::new(MessageKind::Lazy(Box::new(render))),
        }
    }

    /// Renders the description.
    #[inline]
    pub fn render(&self) -> String {
        match &*self.kind {
            MessageKind::Fixed(text) => text.clone(),
            MessageKind::Lazy(render) => render(),
        }
    }
}

impl From<&str> for Message {
    #[inline]
    fn from(text: &str) -> Self {
        Message::fixed(text)
    }
}

impl From<String> for Message {
    #[inline]
    fn from(text: String) -> Self {
        Message::fixed(text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            MessageKind::Fixed(text) => f.write_str(text),
            MessageKind::Lazy(render) => f.write_str(&render()),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            MessageKind::Fixed(text) => f.debug_tuple("Message").field(text).finish(),
            MessageKind::Lazy(..) => f.write_str("Message(<lazy>)"),
        }
    }
}

/// A composable parser.
///
/// A parser carries a description for diagnostics and an execute function
/// that, given the driver, a state, and a continuation, eventually delivers
/// one or more [`Outcome`]s to that continuation. Parsers are cheap to clone
/// and may be reused across runs.
#[derive(Clone)]
pub struct Parser {
    inner: Rc<ParserInner>,
}

struct ParserInner {
    message: Message,
    exec: Box<dyn Fn(&mut Driver, State, Continuation)>,
}

impl Parser {
    /// Creates a parser from a description and an execute function.
    ///
    /// The execute function must deliver every outcome through the supplied
    /// continuation, either directly or from a job it enqueues on the
    /// driver.
    #[inline]
    pub fn new<M, F>(message: M, exec: F) -> Self
    where
        M: Into<Message>,
        F: Fn(&mut Driver, State, Continuation) + 'static,
    {
        Self {
            inner: Rc::new(ParserInner {
                message: message.into(),
                exec: Box::new(exec),
            }),
        }
    }

    /// This parser's self-description.
    #[inline]
    pub fn message(&self) -> &Message {
        &self.inner.message
    }

    /// Invokes the parser on `state`, delivering outcomes to `k`.
    ///
    /// Every failure flowing through the continuation is offered to the
    /// driver's furthest-failure record on the way out.
    pub fn parse(&self, drv: &mut Driver, state: State, k: Continuation) {
        let state = state.deeper();
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{:indent$}try {} {}",
                "",
                self.message(),
                state,
                indent = state.depth().min(32),
            );
        }
        let wrapped: Continuation = Rc::new(move |drv: &mut Driver, out: Outcome| {
            if let Err(fail) = &out.status {
                drv.note_failure(out.state.pos(), &fail.message);
            }
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("{:indent$}{}", "", out, indent = out.state.depth().min(32));
            }
            k(drv, out);
        });
        (self.inner.exec)(drv, state, wrapped);
    }

    /// Derives a parser that applies `f` to every parsed value.
    pub fn map<F>(&self, f: F) -> Parser
    where
        F: Fn(Value) -> Value + 'static,
    {
        let inner = self.clone();
        let f = Rc::new(f);
        Parser::new(self.message().clone(), move |drv, state, k| {
            let f = Rc::clone(&f);
            inner.parse(
                drv,
                state,
                Rc::new(move |drv, out| k(drv, out.map_value(|v| f(v)))),
            );
        })
    }

    /// Derives a parser that applies the fallible `f` to every parsed
    /// value. An `Err` becomes a failure at the state this parser was
    /// invoked at, keeping the sub-parser's commit flag.
    pub fn try_map<F>(&self, f: F) -> Parser
    where
        F: Fn(Value) -> Result<Value, String> + 'static,
    {
        let inner = self.clone();
        let f = Rc::new(f);
        Parser::new(self.message().clone(), move |drv, state, k| {
            let f = Rc::clone(&f);
            let start = state.clone();
            inner.parse(
                drv,
                state,
                Rc::new(move |drv, out| match out.status {
                    Ok(m) => match f(m.value) {
                        Ok(value) => k(drv, Outcome::matched_with(out.state, value, m.commit)),
                        Err(err) => k(
                            drv,
                            Outcome::failed_with(
                                start.clone(),
                                Message::fixed(err),
                                m.commit,
                                false,
                            ),
                        ),
                    },
                    Err(fail) => k(
                        drv,
                        Outcome {
                            state: out.state,
                            status: Err(fail),
                        },
                    ),
                }),
            );
        })
    }

    /// Derives a parser whose failures carry `message` instead of the
    /// original description.
    pub fn expecting<M>(&self, message: M) -> Parser
    where
        M: Into<Message>,
    {
        let inner = self.clone();
        let message = message.into();
        let replacement = message.clone();
        Parser::new(message, move |drv, state, k| {
            let replacement = replacement.clone();
            inner.parse(
                drv,
                state,
                Rc::new(move |drv, out| match out.status {
                    Err(fail) => k(
                        drv,
                        Outcome {
                            state: out.state,
                            status: Err(Failed {
                                message: replacement.clone(),
                                ..fail
                            }),
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

    /// Derives a parser that fails (with this parser's description) when
    /// `pred` rejects the parsed value.
    pub fn filter<F>(&self, pred: F) -> Parser
    where
        F: Fn(&Value) -> bool + 'static,
    {
        let inner = self.clone();
        let pred = Rc::new(pred);
        let message = self.message().clone();
        Parser::new(message.clone(), move |drv, state, k| {
            let pred = Rc::clone(&pred);
            let message = message.clone();
            let start = state.clone();
            inner.parse(
                drv,
                state,
                Rc::new(move |drv, out| match out.status {
                    Ok(m) if !pred(&m.value) => k(
                        drv,
                        Outcome::failed_with(start.clone(), message.clone(), m.commit, false),
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

    /// Derives a parser whose value is discarded. Sequencing combinators
    /// elide discarded values from their output lists.
    #[inline]
    pub fn discard(&self) -> Parser {
        self.map(|_| Value::Null)
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Parser").field(&self.inner.message).finish()
    }
}

/// A reference to a parser: either one that already exists, or one built on
/// first use.
///
/// Combinators accept rules rather than parsers so that mutually recursive
/// grammars can be composed before every piece exists. Resolution happens at
/// invocation time, never at composition time.
#[derive(Clone)]
pub enum Rule {
    /// An already-built parser.
    Direct(Parser),
    /// A parser built and memoized on first resolution.
    Deferred(Rc<Deferred>),
}

/// The shared site of a deferred parser reference.
pub struct Deferred {
    build: Box<dyn Fn() -> Parser>,
    resolved: RefCell<Option<Parser>>,
}

impl Rule {
    /// Resolves the rule to a parser, building and memoizing it on first
    /// use.
    pub fn resolve(&self) -> Parser {
        match self {
            Rule::Direct(p) => p.clone(),
            Rule::Deferred(site) => {
                if let Some(p) = site.resolved.borrow().as_ref() {
                    return p.clone();
                }
                let p = (site.build)();
                *site.resolved.borrow_mut() = Some(p.clone());
                p
            }
        }
    }

    /// Wraps the rule as a parser that resolves on each invocation.
    /// Resolution is memoized, so the wrapper costs one extra indirection.
    pub fn to_parser(&self) -> Parser {
        let rule = self.clone();
        Parser::new(self.describe(), move |drv, state, k| {
            rule.resolve().parse(drv, state, k)
        })
    }

    /// A description of the rule for composite messages. Deferred rules
    /// render as an ellipsis so that cyclic grammars keep rendering finite.
    pub fn describe(&self) -> Message {
        match self {
            Rule::Direct(p) => p.message().clone(),
            Rule::Deferred(..) => Message::fixed("…"),
        }
    }
}

impl From<Parser> for Rule {
    #[inline]
    fn from(parser: Parser) -> Self {
        Rule::Direct(parser)
    }
}

impl From<&Parser> for Rule {
    #[inline]
    fn from(parser: &Parser) -> Self {
        Rule::Direct(parser.clone())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Direct(p) => f.debug_tuple("Direct").field(p).finish(),
            Rule::Deferred(site) => {
                let resolved = site.resolved.borrow().is_some();
                f.debug_struct("Deferred").field("resolved", &resolved).finish()
            }
        }
    }
}

/// Creates a rule that builds its parser the first time it is invoked.
///
/// This is the knot-tying primitive for recursive grammars:
///
/// ```
/// use ambit::combinators::{alt, seq};
/// use ambit::primitive::literal;
/// use ambit::{defer, run, Parser};
///
/// fn parens() -> Parser {
///     alt(vec![
///         literal("()").into(),
///         seq(vec![
///             literal("(").into(),
///             defer(parens),
///             literal(")").into(),
///         ])
///         .into(),
///     ])
/// }
///
/// let results = run(&parens(), "(())").unwrap();
/// assert!(results.is_settled());
/// ```
#[inline]
pub fn defer<F>(build: F) -> Rule
where
    F: Fn() -> Parser + 'static,
{
    Rule::Deferred(Rc::new(Deferred {
        build: Box::new(build),
        resolved: RefCell::new(None),
    }))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::driver::run;
    use crate::primitive::literal;

    #[test]
    fn message_renders_lazily() {
        let rendered = Rc::new(Cell::new(false));
        let flag = Rc::clone(&rendered);
        let message = Message::lazy(move || {
            flag.set(true);
            String::from("later")
        });
        assert!(!rendered.get());
        assert_eq!(message.render(), "later");
        assert!(rendered.get());
    }

    #[test]
    fn map_transforms_every_value() {
        let p = literal("a").map(|_| Value::Bool(true));
        let results = run(&p, "a").unwrap();
        assert_eq!(results.values(), vec![Value::Bool(true)]);
    }

    #[test]
    fn try_map_error_becomes_a_failure() {
        let p = literal("a").try_map(|_| Err(String::from("rejected")));
        let results = run(&p, "a").unwrap();
        assert!(!results.is_settled());
        let best = results.best_failure().unwrap();
        assert_eq!(best.pos, 0);
        assert_eq!(best.message, "rejected");
    }

    #[test]
    fn expecting_replaces_the_failure_message() {
        let p = literal("a").expecting("the letter a");
        let results = run(&p, "b").unwrap();
        let best = results.best_failure().unwrap();
        assert_eq!(best.message, "the letter a");
    }

    #[test]
    fn filter_rejects_values() {
        let p = literal("a").filter(|v| v.as_str() == Some("b"));
        let results = run(&p, "a").unwrap();
        assert!(!results.is_settled());

        let p = literal("a").filter(|v| v.as_str() == Some("a"));
        let results = run(&p, "a").unwrap();
        assert!(results.is_settled());
    }

    #[test]
    fn deferred_rules_resolve_once() {
        let built = Rc::new(Cell::new(0));
        let counter = Rc::clone(&built);
        let rule = defer(move || {
            counter.set(counter.get() + 1);
            literal("x")
        });
        assert_eq!(built.get(), 0);
        let _ = rule.resolve();
        let _ = rule.resolve();
        assert_eq!(built.get(), 1);
    }
}
