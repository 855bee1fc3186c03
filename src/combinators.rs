//! Parser combinators.

mod alternate;
pub use alternate::*;

mod chain;
pub use chain::*;

mod optional;
pub use optional::*;

mod repeat;
pub use repeat::*;

/// Builds a [`seq`](crate::combinators::seq) from parsers or rules,
/// converting each argument with `Into<Rule>`.
#[macro_export]
macro_rules! seq {
    ($($rule:expr),+ $(,)?) => {
        $crate::combinators::seq(vec![$($crate::Rule::from($rule)),+])
    };
}

/// Builds an [`alt`](crate::combinators::alt) from parsers or rules,
/// converting each argument with `Into<Rule>`.
#[macro_export]
macro_rules! alt {
    ($($rule:expr),+ $(,)?) => {
        $crate::combinators::alt(vec![$($crate::Rule::from($rule)),+])
    };
}

#[cfg(test)]
mod tests {
    use crate::driver::run;
    use crate::primitive::literal;
    use crate::value::Value;

    #[test]
    fn the_macros_accept_parsers_directly() {
        let p = seq![literal("a"), alt![literal("b"), literal("c")]];
        let results = run(&p, "ac").unwrap();
        assert_eq!(
            results.values(),
            vec![Value::List(vec![Value::str("a"), Value::str("c")])],
        );
    }
}
