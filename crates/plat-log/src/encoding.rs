/// Base64 (de)serialization helpers for fixed-size byte arrays embedded in JSON config files
/// (session keys, device tokens used in fixtures, etc.), in the form `serde`'s `with` attribute
/// expects.
pub mod base64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize_fixed<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = <&str>::deserialize(deserializer)?;
        let decoded = base64::decode(encoded).map_err(de::Error::custom)?;

        if decoded.len() != N {
            return Err(de::Error::custom(format!(
                "expected {} decoded bytes, got {}",
                N,
                decoded.len()
            )));
        }

        let mut out = [0u8; N];
        out.copy_from_slice(&decoded);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn roundtrip_via_base64_crate() {
        let data = [1u8, 2, 3, 4];
        let encoded = base64::encode(&data);
        let decoded = base64::decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }
}
