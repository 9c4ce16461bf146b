//! String formatting utilities.

/// Utility function to truncate an id for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncates_long_ids_only() {
		assert_eq!(truncate_id("short"), "short");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789abc"), "12345678..");
	}
}
