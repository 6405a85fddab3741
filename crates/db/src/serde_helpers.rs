use serde::{Deserialize, Deserializer};

/// Deserializes a field that can be:
/// - Not present in JSON → None (outer Option)
/// - Present as null → Some(None)
/// - Present with value → Some(Some(T))
///
/// Template updates are PATCH-shaped, so the nullable columns need to
/// distinguish "field not provided" (keep existing) from "field
/// explicitly set to null" (clear value).
pub fn deserialize_optional_nullable<'de, D, T>(
    deserializer: D,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
