use std::{fmt, str};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

macro_rules! impl_buf {
    ($name:ident, $len:expr) => {
        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(data: [u8; $len]) -> Self {
                Self(data)
            }

            pub const fn zero() -> Self {
                Self([0; $len])
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(data: [u8; $len]) -> Self {
                Self(data)
            }
        }

        impl<'a> From<&'a [u8; $len]> for $name {
            fn from(data: &'a [u8; $len]) -> Self {
                Self(*data)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Short form, first and last 3 bytes.
                let s = hex::encode(self.0);
                write!(f, "{}..{}", &s[..6], &s[s.len() - 6..])
            }
        }

        impl str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut buf = [0u8; $len];
                hex::decode_to_slice(s, &mut buf)?;
                Ok(Self(buf))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

/// 20-byte buf, used for coinbase addresses.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub struct Buf20([u8; 20]);
impl_buf!(Buf20, 20);

/// 32-byte buf, used for hashes, roots and field elements.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize, Arbitrary,
)]
pub struct Buf32([u8; 32]);
impl_buf!(Buf32, 32);

impl Buf32 {
    /// Builds a buf holding `v` as a big-endian integer in the low bytes, the way small
    /// field elements are encoded.
    pub fn from_u64(v: u64) -> Self {
        let mut buf = [0u8; 32];
        buf[24..].copy_from_slice(&v.to_be_bytes());
        Self(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buf32_hex_roundtrip_accepts_prefix() {
        let buf = Buf32::from([0xab; 32]);
        let encoded = format!("0x{buf:?}");
        let decoded: Buf32 = encoded.parse().unwrap();
        assert_eq!(buf, decoded);
    }

    #[test]
    fn test_buf32_serde_as_hex_string() {
        let buf = Buf32::from_u64(7);
        let json = serde_json::to_string(&buf).unwrap();
        assert_eq!(
            json,
            "\"0000000000000000000000000000000000000000000000000000000000000007\""
        );
        let back: Buf32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn test_buf20_serde_as_hex_string() {
        let buf = Buf20::from([0x11; 20]);
        let json = serde_json::to_string(&buf).unwrap();
        assert_eq!(json, format!("\"{}\"", "11".repeat(20)));
        let back: Buf20 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn test_buf32_rejects_short_hex() {
        assert!("abcd".parse::<Buf32>().is_err());
    }

    #[test]
    fn test_zero() {
        assert!(Buf32::zero().is_zero());
        assert!(!Buf32::from_u64(1).is_zero());
    }
}
