//! Cancellation primitives.

mod token;

pub use token::CancellationToken;
