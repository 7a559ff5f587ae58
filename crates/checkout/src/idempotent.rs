//! Outcome wrapper for idempotent writes.

/// The result of an idempotent create: the row, plus whether this call
/// created it or replayed an earlier one. Callers that surface the
/// distinction (an HTTP 201 versus 200, for instance) branch on it;
/// everyone else calls [`into_inner`](Idempotent::into_inner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Idempotent<T> {
    /// This call created the row.
    Created(T),

    /// The row already existed; the stored outcome is returned.
    Replayed(T),
}

impl<T> Idempotent<T> {
    pub fn is_replay(&self) -> bool {
        matches!(self, Idempotent::Replayed(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Idempotent::Created(value) | Idempotent::Replayed(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Idempotent::Created(value) | Idempotent::Replayed(value) => value,
        }
    }
}
