/// 节点把 u64/u128 编码为字符串，个别字段又是数字；两种都接受。
pub mod field_as_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: ToString,
        S: Serializer,
    {
        value.to_string().serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(value) => value,
            StringOrNumber::Number(value) => value.to_string(),
        };
        raw.trim()
            .parse()
            .map_err(|err| de::Error::custom(format!("parse error for `{raw}`: {err}")))
    }
}

pub mod option_field_as_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: ToString,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.to_string().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(serde_json::Value::String(value)) => value,
            Some(serde_json::Value::Number(value)) => value.to_string(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "expected string or number, got {other}"
                )));
            }
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|err| de::Error::custom(format!("parse error for `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(with = "super::field_as_string")]
        version: u64,
        #[serde(default, with = "super::option_field_as_string")]
        epoch: Option<u64>,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let a: Sample = serde_json::from_str(r#"{"version":"12","epoch":3}"#).unwrap();
        assert_eq!((a.version, a.epoch), (12, Some(3)));
        let b: Sample = serde_json::from_str(r#"{"version":7}"#).unwrap();
        assert_eq!((b.version, b.epoch), (7, None));
        assert!(serde_json::from_str::<Sample>(r#"{"version":"x"}"#).is_err());
    }
}
