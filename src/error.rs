use std::fmt;

use crate::pattern::Var;

/// Fatal conditions raised by the core (see the error-handling design notes).
///
/// These correspond to programming errors at the host/embedding boundary,
/// not to ordinary search-and-apply outcomes. A budget running out, a
/// rewrite simply not matching, or a dynamic right-hand side declining to
/// fire are not represented here -- they are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EqSatError {
    /// An operator head was used with an arity that disagrees with an
    /// earlier use of the same head.
    ArityMismatch {
        /// Arity recorded the first time this head was used.
        expected: usize,
        /// Arity seen on this use.
        found: usize,
    },
    /// A static rewrite right-hand side mentions a pattern variable that
    /// never occurs in the left-hand side.
    UnboundRhsVar(Var),
}

impl fmt::Display for EqSatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EqSatError::ArityMismatch { expected, found } => write!(
                f,
                "arity mismatch: head previously used with {expected} operand(s), now {found}"
            ),
            EqSatError::UnboundRhsVar(v) => {
                write!(f, "rewrite right-hand side references unbound variable {v}")
            }
        }
    }
}

impl std::error::Error for EqSatError {}

pub type Result<T> = std::result::Result<T, EqSatError>;
