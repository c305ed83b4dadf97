//! Admin password hashing.
//!
//! Prints the value to put in `HASHED_ADMIN_PASSWORD`: base64 of the
//! password's SHA-512 digest, as checked by the admin's Basic auth gate.

use std::io::{self, BufRead, Write};

use econ_admin::middleware::hash_password;
use thiserror::Error;

/// Errors that can occur while hashing.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// No password was given on the command line or stdin.
    #[error("Password cannot be empty")]
    Empty,

    /// Reading stdin or writing stdout failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Hash `password`, or the first line of stdin when `None`, and print it.
///
/// # Errors
///
/// Returns [`PasswordError::Empty`] for an empty password.
pub fn hash(password: Option<String>) -> Result<(), PasswordError> {
    let password = match password {
        Some(password) => password,
        None => read_line(io::stdin().lock())?,
    };

    let hashed = hash_non_empty(&password)?;
    writeln!(io::stdout().lock(), "{hashed}")?;
    Ok(())
}

fn read_line(mut input: impl BufRead) -> Result<String, PasswordError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn hash_non_empty(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    Ok(hash_password(password))
}
