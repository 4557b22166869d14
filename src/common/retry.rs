/// What a failed attempt asks of the surrounding retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<E> {
    /// Try again if there is budget left.
    Retry,
    /// Stop now and surface the error.
    Fatal(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError<E> {
    Exhausted,
    Fatal(E),
}

impl<E> RetryError<E> {
    /// Collapses the error, mapping an exhausted budget to `exhausted`.
    pub fn or_exhausted(self, exhausted: E) -> E {
        match self {
            RetryError::Exhausted => exhausted,
            RetryError::Fatal(e) => e,
        }
    }
}

/// Runs `op` at most `attempts` times, passing the zero-based attempt index.
pub fn retry<T, E, F>(attempts: u32, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, Attempt<E>>,
{
    for attempt in 0..attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(Attempt::Retry) => continue,
            Err(Attempt::Fatal(e)) => return Err(RetryError::Fatal(e)),
        }
    }
    Err(RetryError::Exhausted)
}
