//! # Name Utilities
//!
//! Component names are copied into fixed-capacity strings so the tables
//! never borrow from their callers.

use heapless::String;

use crate::config::MAX_NAME_LEN;
use crate::error::Error;

/// An owned, bounded component name.
pub type Name = String<MAX_NAME_LEN>;

/// Copies `name` into a [`Name`].
///
/// Fails with [`Error::NameTooLong`] rather than truncating: a truncated
/// name could collide with another component.
pub fn to_name(name: &str) -> Result<Name, Error> {
    let mut owned = Name::new();
    if owned.push_str(name).is_err() {
        return Err(Error::NameTooLong);
    }
    Ok(owned)
}
