//! Wire types for the ailoop protocol.
//!
//! [`message`] holds the envelope and its constructors, [`content`] the tagged
//! payload union, [`task`] the server-owned task records, and [`health`] the
//! health endpoint response.

pub mod content;
pub mod health;
pub mod message;
pub mod task;

pub use content::*;
pub use health::*;
pub use message::*;
pub use task::*;

use crate::error::{Error, Result};

/// Case-insensitive parse of an enum from its wire string.
///
/// Surrounding whitespace is ignored. On failure the error names the rejected
/// input and lists every accepted value.
pub(crate) fn parse_canonical<T: Copy>(
    input: &str,
    what: &str,
    all: &[T],
    name: fn(&T) -> &'static str,
) -> Result<T> {
    let wanted = input.trim().to_ascii_lowercase();
    if let Some(found) = all.iter().find(|candidate| name(candidate) == wanted) {
        return Ok(*found);
    }
    let accepted = all.iter().map(name).collect::<Vec<_>>().join(", ");
    Err(Error::validation(format!(
        "invalid {what} `{input}`: must be one of {accepted}"
    )))
}
