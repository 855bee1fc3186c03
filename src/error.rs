use snafu::Snafu;

/// Fatal engine-level conditions.
///
/// These terminate a run outright and are distinct from parse failures,
/// which are ordinary [`Outcome`](crate::Outcome) values that backtracking
/// recovers from.
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum EngineError {
    /// A repetition iteration matched without consuming input. Left alone
    /// it would loop forever, so it is reported as a grammar bug.
    #[snafu(display("repetition matched without consuming input at offset {}", pos))]
    NoProgress {
        /// The offset the iteration was stuck at.
        pos: usize,
    },

    /// A null value reached the result set. Null is the dropped-value
    /// marker and must not escape a top-level parse.
    #[snafu(display("null value reported to the result set"))]
    NullValue,

    /// A result-set listener failed and no error hook was installed.
    #[snafu(display("result listener failed: {}", reason))]
    ListenerFailed {
        /// The listener's error, rendered.
        reason: String,
    },
}
