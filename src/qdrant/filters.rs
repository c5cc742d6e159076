//! Filter construction for user-scoped Qdrant operations.

use serde_json::{Value, json};

/// Compose the filter restricting an operation to a single user's memories.
///
/// Every search, list, and bulk delete goes through this filter; memories
/// are never visible across user boundaries.
pub fn user_filter(user_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "user_id",
                "match": { "value": user_id }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::user_filter;

    #[test]
    fn filter_matches_on_user_id() {
        let filter = user_filter("alice");
        assert_eq!(filter["must"][0]["key"], "user_id");
        assert_eq!(filter["must"][0]["match"]["value"], "alice");
    }
}
