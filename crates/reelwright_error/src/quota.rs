//! Quota tracker error types.

/// Kinds of quota errors.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum QuotaErrorKind {
    /// Reservation would push consumption past the provider limit
    #[display(
        "Quota exceeded for {}: requested {}, remaining {}",
        provider,
        requested,
        remaining
    )]
    Exceeded {
        /// Provider whose budget is exhausted
        provider: String,
        /// Amount requested by the reservation
        requested: u64,
        /// Amount left in the current period
        remaining: u64,
    },
    /// Commit or release of a reservation the tracker does not know
    #[display("Unknown reservation: {}", _0)]
    UnknownReservation(u64),
    /// The ledger could not be read or written
    #[display("Ledger persistence failed: {}", _0)]
    Persistence(String),
}

/// Quota error with location tracking.
///
/// # Examples
///
/// ```
/// use reelwright_error::{QuotaError, QuotaErrorKind};
///
/// let err = QuotaError::new(QuotaErrorKind::Exceeded {
///     provider: "youtube".into(),
///     requested: 1,
///     remaining: 0,
/// });
/// assert!(err.is_exceeded());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Quota Error: {} at line {} in {}", kind, line, file)]
pub struct QuotaError {
    /// The kind of error that occurred
    pub kind: QuotaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl QuotaError {
    /// Create a new quota error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: QuotaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True for budget exhaustion, false for bookkeeping or I/O failures.
    pub fn is_exceeded(&self) -> bool {
        matches!(self.kind, QuotaErrorKind::Exceeded { .. })
    }
}
