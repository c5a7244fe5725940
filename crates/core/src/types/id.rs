//! Newtype IDs for type-safe entity references.
//!
//! The commerce API is not consistent about id types: the same entity may
//! arrive as `"42"` in one payload and `42` in another. Ids are therefore
//! stored as strings and deserialize from either JSON strings or numbers.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a plain string
/// - `Deserialize` from a JSON string or number
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `from_value()`
/// - `From<&str>`, `From<String>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use sgtprepper_core::define_id;
/// define_id!(OrderId);
/// define_id!(ReviewId);
///
/// let order_id = OrderId::new("1");
/// let review_id = ReviewId::new("1");
///
/// // These are different types, so this won't compile:
/// // let _: OrderId = review_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Read an ID out of a loosely-typed JSON value.
            ///
            /// Accepts non-empty strings and numbers; everything else is `None`.
            #[must_use]
            pub fn from_value(value: &::serde_json::Value) -> Option<Self> {
                match value {
                    ::serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
                    ::serde_json::Value::Number(n) => Some(Self(n.to_string())),
                    _ => None,
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let value = <::serde_json::Value as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::from_value(&value).ok_or_else(|| {
                    <D::Error as ::serde::de::Error>::custom(concat!(
                        stringify!($name),
                        " must be a non-empty string or a number"
                    ))
                })
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(CartItemId);
define_id!(CategoryId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_deserializes_from_number() {
        let id: ProductId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_id_deserializes_from_string() {
        let id: CartItemId = serde_json::from_value(json!("line-7")).unwrap();
        assert_eq!(id, CartItemId::new("line-7"));
    }

    #[test]
    fn test_id_rejects_empty_and_null() {
        assert!(serde_json::from_value::<ProductId>(json!("")).is_err());
        assert!(serde_json::from_value::<ProductId>(json!(null)).is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = ProductId::new("9");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("9"));
        assert_eq!(id.to_string(), "9");
    }

    #[test]
    fn test_from_value_number_and_string_compare_equal() {
        assert_eq!(
            ProductId::from_value(&json!(3)),
            ProductId::from_value(&json!("3"))
        );
    }
}
