//! Order API bearer token.
//!
//! Formatting a [`SecretString`] prints a placeholder, and the buffer is
//! wiped when the value is dropped.

use std::fmt;
use zeroize::Zeroizing;

const MASK: &str = "<hidden>";

#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	/// Lends the token to `f`, e.g. to set the `Authorization` header.
	pub fn with_exposed<R>(&self, f: impl FnOnce(&str) -> R) -> R {
		f(&self.0)
	}

	/// Blank tokens count as no token at all.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl From<&str> for SecretString {
	fn from(token: &str) -> Self {
		Self(Zeroizing::new(token.to_string()))
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&MASK).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(MASK)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_is_masked_when_formatted() {
		let token = SecretString::from("bearer-abc123");
		assert_eq!(format!("{}", token), "<hidden>");
		assert!(!format!("{:?}", token).contains("abc123"));
		assert_eq!(token.with_exposed(str::len), 13);
	}

	#[test]
	fn test_blank_token_is_empty() {
		assert!(SecretString::from(" \t").is_empty());
		assert!(!SecretString::from("t").is_empty());
	}
}
