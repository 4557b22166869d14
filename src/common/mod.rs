pub mod retry;

pub use retry::{retry, Attempt, RetryError};
