// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

use std::fmt;

use serde::de::{self, Unexpected, Visitor};

/// A visitor that deserializes a fixed-size identifier written in hex and prefixed with `0x`,
/// e.g. a 20 bytes address or a 32 bytes question identifier.
pub(crate) struct HexString(pub usize);

impl<'de> Visitor<'de> for HexString {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "a string representing {} bytes in hex value prefixed with 0x",
            self.0
        )
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match s.strip_prefix("0x") {
            Some(hex) if hex.len() == self.0 * 2 => Ok(hex.to_string()),
            _ => Err(de::Error::invalid_value(Unexpected::Str(s), &self)),
        }
    }
}

/// Implements `Serialize` and `Deserialize` for a `fixed_hash` type as a `0x` prefixed hex string.
macro_rules! impl_hex_serde {
    ($thing:ident, $len:expr) => {
        impl ::serde::Serialize for $thing {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(format!("{:#x}", self).as_ref())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $thing {
            fn deserialize<D>(deserializer: D) -> Result<$thing, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let hex = deserializer.deserialize_string($crate::hash::HexString($len))?;
                <$thing as ::std::str::FromStr>::from_str(&hex).map_err(::serde::de::Error::custom)
            }
        }
    };
}

/// Serde helpers for opaque byte strings written in hex and prefixed with `0x`, e.g. the
/// arbitrator extra data.
pub(crate) mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(de::Error::custom)
    }
}
