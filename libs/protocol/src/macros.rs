//! Macros for defining typed protocol IDs.

/// Macro to define a typed Mesos ID.
///
/// Mesos v1 JSON wraps every identifier in an object with a single `value`
/// field (`{"value": "..."}`). This generates a newtype wrapper with:
/// - `new()` from anything string-like
/// - `as_str()` for borrowing the raw value
/// - `Display` and `From<&str>` / `From<String>` implementations
/// - `Serialize` and `Deserialize` in the `{"value": ...}` shape
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_id!(OfferId);
///
/// let offer_id = OfferId::new("offer-1");
/// assert_eq!(serde_json::to_string(&offer_id)?, r#"{"value":"offer-1"}"#);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        /// A typed Mesos ID, serialized as `{"value": "..."}`.
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        pub struct $name {
            value: String,
        }

        impl $name {
            /// Creates an ID from a raw string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self {
                    value: value.into(),
                }
            }

            /// Returns the raw string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.value
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.value
            }
        }
    };
}
