use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::error::{EngineError, ListenerFailed, NullValue};
use crate::value::Value;

/// The error type result-set listeners may return.
pub type ListenerError = Box<dyn Error>;

type Listener = Box<dyn FnMut(&Value) -> Result<(), ListenerError>>;
type Equality = Box<dyn Fn(&Value, &Value) -> bool>;
type ErrorHook = Box<dyn FnMut(ListenerError)>;

/// The furthest-reaching failure of a run, kept as the diagnostic for runs
/// that produce no result.
#[derive(Debug, Clone, PartialEq)]
pub struct BestFailure {
    /// The offset the failure was detected at.
    pub pos: usize,
    /// The failing parser's rendered description.
    pub message: String,
}

impl fmt::Display for BestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} at offset {}", self.message, self.pos)
    }
}

/// The monotonically growing set of distinct successful top-level parses.
///
/// Values are de-duplicated by an equality predicate (structural equality
/// unless one is supplied) and published to listeners as they arrive. The
/// set only ever grows; every listener sees every value exactly once per
/// registration, in insertion order, and all listeners observe the same
/// sequence.
///
/// Handles are cheap clones sharing one underlying set.
#[derive(Clone)]
pub struct ResultSet {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    values: Vec<Value>,
    listeners: Vec<Option<Listener>>,
    equals: Equality,
    error_hook: Option<ErrorHook>,
    best_failure: Option<BestFailure>,
}

impl ResultSet {
    /// Creates a set that de-duplicates by structural equality.
    #[inline]
    pub fn new() -> Self {
        Self::with_equality(|a, b| a == b)
    }

    /// Creates a set with an explicit equality predicate.
    pub fn with_equality<F>(equals: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                values: Vec::new(),
                listeners: Vec::new(),
                equals: Box::new(equals),
                error_hook: None,
                best_failure: None,
            })),
        }
    }

    /// Installs the hook that receives listener errors. Without one, a
    /// listener error propagates out of the offending [`add`](Self::add).
    pub fn on_listener_error<H>(&self, hook: H)
    where
        H: FnMut(ListenerError) + 'static,
    {
        self.inner.borrow_mut().error_hook = Some(Box::new(hook));
    }

    /// Adds a value, if it is distinct from every value already present,
    /// and notifies every current listener synchronously in registration
    /// order.
    ///
    /// A failing listener never prevents the remaining listeners from
    /// being notified, nor future adds; with no error hook installed the
    /// first listener error is returned once all listeners have run. Null
    /// values are rejected.
    pub fn add(&self, value: Value) -> Result<(), EngineError> {
        if value.is_null() {
            return NullValue.fail();
        }
        {
            let inner = self.inner.borrow();
            if inner.values.iter().any(|seen| (inner.equals)(seen, &value)) {
                return Ok(());
            }
        }
        self.inner.borrow_mut().values.push(value.clone());

        let count = self.inner.borrow().listeners.len();
        let mut first_err = None;
        for index in 0..count {
            if let Some(err) = self.deliver(index, &value) {
                self.route(err, &mut first_err);
            }
        }
        match first_err {
            Some(err) => ListenerFailed {
                reason: err.to_string(),
            }
            .fail(),
            None => Ok(()),
        }
    }

    /// Registers a listener and immediately replays every value already
    /// present, in insertion order.
    ///
    /// Listeners are not de-duplicated: registering the same function
    /// twice delivers each value twice.
    pub fn then<F>(&self, listener: F) -> Result<(), EngineError>
    where
        F: FnMut(&Value) -> Result<(), ListenerError> + 'static,
    {
        let index = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.push(Some(Box::new(listener)));
            inner.listeners.len() - 1
        };
        let snapshot = self.inner.borrow().values.clone();
        let mut first_err = None;
        for value in &snapshot {
            if let Some(err) = self.deliver(index, value) {
                self.route(err, &mut first_err);
            }
        }
        match first_err {
            Some(err) => ListenerFailed {
                reason: err.to_string(),
            }
            .fail(),
            None => Ok(()),
        }
    }

    /// `true` once at least one value has been added.
    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.inner.borrow().values.is_empty()
    }

    /// The number of distinct values so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().values.len()
    }

    /// `true` if no value has been added yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().values.is_empty()
    }

    /// A snapshot of the values in insertion order.
    #[inline]
    pub fn values(&self) -> Vec<Value> {
        self.inner.borrow().values.clone()
    }

    /// The furthest-reaching failure of the run, the caller's diagnostic
    /// when the set is empty.
    #[inline]
    pub fn best_failure(&self) -> Option<BestFailure> {
        self.inner.borrow().best_failure.clone()
    }

    pub(crate) fn record_best_failure(&self, pos: usize, message: String) {
        self.inner.borrow_mut().best_failure = Some(BestFailure { pos, message });
    }

    /// Runs one listener with its slot checked out, so a listener that
    /// re-enters the set cannot observe itself.
    fn deliver(&self, index: usize, value: &Value) -> Option<ListenerError> {
        let slot = self.inner.borrow_mut().listeners[index].take();
        let mut listener = match slot {
            Some(listener) => listener,
            None => return None,
        };
        let result = listener(value);
        self.inner.borrow_mut().listeners[index] = Some(listener);
        result.err()
    }

    fn route(&self, err: ListenerError, first_err: &mut Option<ListenerError>) {
        let hook = self.inner.borrow_mut().error_hook.take();
        match hook {
            Some(mut hook) => {
                hook(err);
                let mut inner = self.inner.borrow_mut();
                if inner.error_hook.is_none() {
                    inner.error_hook = Some(hook);
                }
            }
            None => {
                if first_err.is_none() {
                    *first_err = Some(err);
                }
            }
        }
    }
}

impl Default for ResultSet {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ResultSet")
            .field("values", &inner.values)
            .field("listeners", &inner.listeners.len())
            .field("best_failure", &inner.best_failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn log_into(log: &Rc<RefCell<Vec<Value>>>) -> impl FnMut(&Value) -> Result<(), ListenerError> {
        let log = Rc::clone(log);
        move |v| {
            log.borrow_mut().push(v.clone());
            Ok(())
        }
    }

    #[test]
    fn duplicate_values_are_dropped() {
        let set = ResultSet::new();
        set.add(Value::str("a")).unwrap();
        set.add(Value::str("a")).unwrap();
        set.add(Value::str("b")).unwrap();
        assert_eq!(set.values(), vec![Value::str("a"), Value::str("b")]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn null_values_are_rejected() {
        let set = ResultSet::new();
        assert_matches!(set.add(Value::Null), Err(EngineError::NullValue));
        assert!(set.is_empty());
    }

    #[test]
    fn listeners_replay_existing_values() {
        let set = ResultSet::new();
        set.add(Value::str("a")).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        set.then(log_into(&log)).unwrap();
        assert_eq!(*log.borrow(), vec![Value::str("a")]);

        set.add(Value::str("b")).unwrap();
        assert_eq!(*log.borrow(), vec![Value::str("a"), Value::str("b")]);
    }

    #[test]
    fn all_listeners_observe_the_same_sequence() {
        let set = ResultSet::new();
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));
        set.then(log_into(&first)).unwrap();
        set.add(Value::str("a")).unwrap();
        set.then(log_into(&second)).unwrap();
        set.add(Value::str("b")).unwrap();
        assert_eq!(*first.borrow(), *second.borrow());
    }

    #[test]
    fn registration_is_not_deduplicated() {
        let set = ResultSet::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        set.then(log_into(&log)).unwrap();
        set.then(log_into(&log)).unwrap();
        set.add(Value::str("a")).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn custom_equality_controls_dedup() {
        let set = ResultSet::with_equality(|a, b| {
            a.as_str().map(str::len) == b.as_str().map(str::len)
        });
        set.add(Value::str("aa")).unwrap();
        set.add(Value::str("bb")).unwrap();
        set.add(Value::str("ccc")).unwrap();
        assert_eq!(set.values(), vec![Value::str("aa"), Value::str("ccc")]);
    }

    #[test]
    fn listener_errors_route_to_the_hook() {
        let set = ResultSet::new();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        set.on_listener_error(move |err| sink.borrow_mut().push(err.to_string()));

        set.then(|_| Err("boom".into())).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        set.then(log_into(&log)).unwrap();

        set.add(Value::str("a")).unwrap();
        assert_eq!(*errors.borrow(), vec![String::from("boom")]);
        // the failing listener did not disturb the healthy one
        assert_eq!(*log.borrow(), vec![Value::str("a")]);
    }

    #[test]
    fn listener_errors_propagate_without_a_hook() {
        let set = ResultSet::new();
        set.then(|_| Err("boom".into())).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        set.then(log_into(&log)).unwrap();

        let err = set.add(Value::str("a"));
        assert_matches!(err, Err(EngineError::ListenerFailed { .. }));
        // every listener still ran, and the value was kept
        assert_eq!(*log.borrow(), vec![Value::str("a")]);
        assert!(set.is_settled());
    }
}
