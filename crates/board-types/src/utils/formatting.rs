//! String formatting utilities for logs and navigation targets.

/// Truncates an identifier for log output.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}

/// Appends query parameters to a route path.
///
/// Values are percent-encoded; an existing query string is extended.
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
	if params.is_empty() {
		return path.to_string();
	}
	let query = params
		.iter()
		.map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
		.collect::<Vec<_>>()
		.join("&");
	let separator = if path.contains('?') { '&' } else { '?' };
	format!("{}{}{}", path, separator, query)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("abc"), "abc");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("64f1c0de9a1b"), "64f1c0de..");
	}

	#[test]
	fn test_with_query() {
		assert_eq!(
			with_query("/dashboard/custom-shafts", &[("orderId", "64f1")]),
			"/dashboard/custom-shafts?orderId=64f1"
		);
		assert_eq!(
			with_query("/orders/new?step=2", &[("orderId", "a b&c")]),
			"/orders/new?step=2&orderId=a%20b%26c"
		);
		assert_eq!(with_query("/x", &[]), "/x");
	}
}
