//! Path rewriting for transfer sets
//!
//! Case modifiers work segment by segment so that `#` wildcards and `@`
//! modifiers in a path are left alone.

use serde::{Deserialize, Serialize};

/// One rewrite applied to a transfer path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PathModifier {
    /// `user_id` -> `userId`
    CamelCase,
    /// `userId` -> `user_id`
    SnakeCase,
    Lowercase,
    /// Strip a leading prefix from the whole path
    TrimPrefix(String),
}

impl PathModifier {
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathModifier::TrimPrefix(prefix) => {
                path.strip_prefix(prefix.as_str()).unwrap_or(path).to_string()
            }
            PathModifier::CamelCase => map_segments(path, to_camel_case),
            PathModifier::SnakeCase => map_segments(path, to_snake_case),
            PathModifier::Lowercase => map_segments(path, |s| s.to_lowercase()),
        }
    }
}

/// Apply modifiers in order
pub fn modify_path(path: &str, modifiers: &[PathModifier]) -> String {
    modifiers
        .iter()
        .fold(path.to_string(), |acc, modifier| modifier.apply(&acc))
}

fn map_segments(path: &str, f: impl Fn(&str) -> String) -> String {
    path.split('.')
        .map(|segment| {
            if segment == "#" || segment.starts_with('@') || segment.is_empty() {
                segment.to_string()
            } else {
                f(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Convert to lowerCamelCase
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    // SCREAMING_SNAKE_CASE words are lowered first
    let is_all_caps = s.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c == '-');

    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            capitalize_next = !result.is_empty();
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else if result.is_empty() || is_all_caps {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' {
            result.push('_');
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_camel_case("user_id"), "userId");
        assert_eq!(to_camel_case("UserName"), "userName");
        assert_eq!(to_camel_case("PAGE_SIZE"), "pageSize");
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("pageIndex2Size"), "page_index2_size");
    }

    #[test]
    fn test_segments_keep_wildcards_and_modifiers() {
        assert_eq!(
            PathModifier::SnakeCase.apply("@this.orderItems.#.unitPrice"),
            "@this.order_items.#.unit_price"
        );
        assert_eq!(PathModifier::CamelCase.apply("order_items.#.unit_price"), "orderItems.#.unitPrice");
        assert_eq!(PathModifier::Lowercase.apply("Items.#.ID"), "items.#.id");
    }

    #[test]
    fn test_trim_prefix_then_camel() {
        let modifiers = vec![
            PathModifier::TrimPrefix("data.".to_string()),
            PathModifier::CamelCase,
        ];
        assert_eq!(modify_path("data.user_name", &modifiers), "userName");
        assert_eq!(modify_path("other.user_name", &modifiers), "other.userName");
    }
}
