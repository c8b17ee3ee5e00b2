use std::fmt;

pub(crate) type BuildHasher = fxhash::FxBuildHasher;

// Plain hashing is faster, but iteration order over `classes_by_op`/
// `classes` then depends on hash values, so two runs over the same rule
// set can extract different (equally-cheap) terms. The `deterministic`
// feature swaps in `indexmap`'s insertion-ordered maps for anyone who
// needs bit-identical output across runs, at the cost of a slower
// `remove`.
#[cfg(not(feature = "deterministic"))]
pub(crate) type HashMap<K, V, B = BuildHasher> = std::collections::HashMap<K, V, B>;
#[cfg(not(feature = "deterministic"))]
pub(crate) type HashSet<K, B = BuildHasher> = std::collections::HashSet<K, B>;

#[cfg(feature = "deterministic")]
pub(crate) type HashMap<K, V, B = BuildHasher> = indexmap::IndexMap<K, V, B>;
#[cfg(feature = "deterministic")]
pub(crate) type HashSet<K, B = BuildHasher> = indexmap::IndexSet<K, B>;

pub(crate) type Instant = quanta::Instant;

/// Writes an iterator as `start item, item, ... end`, used by the `Debug`/
/// `Display` impls of [`crate::construct::RecExpr`] and friends.
pub(crate) fn fmt_iter<E: fmt::Debug, F>(
    symbols: [&str; 3],
    mut it: impl Iterator<Item = E>,
    fmt_e: F,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result
where
    F: Fn(&E, &mut fmt::Formatter<'_>) -> fmt::Result,
{
    let start = symbols[0];
    let delimiter = symbols[1];
    let end = symbols[2];
    write!(f, "{start}")?;
    if let Some(first) = it.next() {
        fmt_e(&first, f)?;
    }
    for e in it {
        write!(f, "{delimiter}")?;
        fmt_e(&e, f)?;
    }
    write!(f, "{end}")?;
    Ok(())
}
