//! Procedure input decoding
//!
//! Every transport decodes input through [`decode_input`]. REST path and query
//! values arrive as JSON strings, so decoding is type driven: a string is read
//! as a number or boolean only when the target type asks for one. A `String`
//! field keeps `"02134"` verbatim, while a `u64` field accepts `"02134"` as
//! `2134`. The same rule applies to RPC input, so both transports accept and
//! reject exactly the same values.

use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde_json::{Error, Map, Value};

/// Decode `value` into `T`, reading numeric and boolean strings as scalars
/// where `T` expects them.
pub(crate) fn decode_input<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    T::deserialize(ScalarStrings(value))
}

struct ScalarStrings(Value);

impl<'de> IntoDeserializer<'de, Error> for ScalarStrings {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

fn visit_array<'de, V: Visitor<'de>>(items: Vec<Value>, visitor: V) -> Result<V::Value, Error> {
    let mut seq = SeqDeserializer::<_, Error>::new(items.into_iter().map(ScalarStrings));
    let value = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(value)
}

fn visit_object<'de, V: Visitor<'de>>(
    map: Map<String, Value>,
    visitor: V,
) -> Result<V::Value, Error> {
    let mut entries = MapDeserializer::<_, Error>::new(
        map.into_iter()
            .map(|(key, value)| (key, ScalarStrings(value))),
    );
    let value = visitor.visit_map(&mut entries)?;
    entries.end()?;
    Ok(value)
}

/// Parse a string scalar when the visitor wants `$ty`; otherwise let
/// `serde_json::Value` produce its usual result or error.
macro_rules! scalar_from_str {
    ($($method:ident => $ty:ty, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                if let Value::String(text) = &self.0
                    && let Ok(parsed) = text.parse::<$ty>()
                {
                    return visitor.$visit(parsed);
                }
                self.0.$method(visitor)
            }
        )*
    };
}

macro_rules! forward_to_value {
    ($($method:ident),*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                self.0.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ScalarStrings {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Array(items) => visit_array(items, visitor),
            Value::Object(map) => visit_object(map, visitor),
            other => other.deserialize_any(visitor),
        }
    }

    scalar_from_str! {
        deserialize_bool => bool, visit_bool;
        deserialize_i8 => i64, visit_i64;
        deserialize_i16 => i64, visit_i64;
        deserialize_i32 => i64, visit_i64;
        deserialize_i64 => i64, visit_i64;
        deserialize_u8 => u64, visit_u64;
        deserialize_u16 => u64, visit_u64;
        deserialize_u32 => u64, visit_u64;
        deserialize_u64 => u64, visit_u64;
        deserialize_f32 => f64, visit_f64;
        deserialize_f64 => f64, visit_f64;
    }

    forward_to_value!(
        deserialize_i128,
        deserialize_u128,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_unit,
        deserialize_identifier,
        deserialize_ignored_any
    );

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(ScalarStrings(other)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.0.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_any(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.0.deserialize_enum(name, variants, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ByName {
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        id: u64,
        name: String,
        verbose: bool,
        limit: Option<u8>,
        ratio: f64,
    }

    #[test]
    fn strings_stay_strings() {
        let input: ByName = decode_input(json!({"name": "02134"})).unwrap();
        assert_eq!(input.name, "02134");

        let input: ByName = decode_input(json!({"name": "true"})).unwrap();
        assert_eq!(input.name, "true");
    }

    #[test]
    fn numeric_and_boolean_strings_fill_typed_fields() {
        let page: Page = decode_input(json!({
            "id": "18446744073709551615",
            "name": "007",
            "verbose": "false",
            "limit": "20",
            "ratio": "0.5",
        }))
        .unwrap();

        assert_eq!(
            page,
            Page {
                id: u64::MAX,
                name: "007".to_string(),
                verbose: false,
                limit: Some(20),
                ratio: 0.5,
            }
        );
    }

    #[test]
    fn json_typed_input_decodes_unchanged() {
        let page: Page = decode_input(json!({
            "id": 3,
            "name": "ada",
            "verbose": true,
            "limit": null,
            "ratio": 1.0,
        }))
        .unwrap();
        assert_eq!(page.id, 3);
        assert_eq!(page.limit, None);
    }

    #[test]
    fn mismatches_are_still_errors() {
        assert!(decode_input::<Page>(json!({
            "id": "-1", "name": "a", "verbose": true, "limit": null, "ratio": 1.0
        }))
        .is_err());
        assert!(decode_input::<Page>(json!({
            "id": 1, "name": "a", "verbose": "yes", "limit": null, "ratio": 1.0
        }))
        .is_err());
        assert!(decode_input::<Page>(json!({
            "id": 1, "name": "a", "verbose": true, "limit": "300", "ratio": 1.0
        }))
        .is_err());
        assert!(decode_input::<ByName>(json!({"name": 5})).is_err());
    }

    #[test]
    fn nested_values_and_sequences() {
        #[derive(Deserialize)]
        struct Filter {
            ids: Vec<u32>,
            tag: (String, i32),
            inner: Option<ByName>,
        }

        let filter: Filter = decode_input(json!({
            "ids": ["1", 2],
            "tag": ["x", "-4"],
            "inner": {"name": "01"},
        }))
        .unwrap();
        assert_eq!(filter.ids, vec![1, 2]);
        assert_eq!(filter.tag, ("x".to_string(), -4));
        assert_eq!(filter.inner.unwrap().name, "01");
    }

    #[test]
    fn unit_and_raw_values() {
        decode_input::<()>(Value::Null).unwrap();
        let raw: Value = decode_input(json!({"id": "7"})).unwrap();
        assert_eq!(raw, json!({"id": "7"}));
    }
}
