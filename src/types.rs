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

//! Identifiers and scalar values shared by both proxies: account addresses, question and
//! arbitration identifiers, oracle answers, court disputes and rulings.

use std::io;

use primitive_types::U256;
use tiny_keccak::{Hasher, Keccak};

use crate::consensus::{self, Decodable, Encodable};

fixed_hash::construct_fixed_hash!(
    /// An account on either chain: a user, a proxy, a messenger, a court or an oracle.
    pub struct Address(20);
);

fixed_hash::construct_fixed_hash!(
    /// Identify a question in the oracle on the home chain.
    pub struct QuestionId(32);
);

fixed_hash::construct_fixed_hash!(
    /// Identify an arbitration on the foreign chain. There is exactly one arbitration identifier
    /// per question, both share the same 32 bytes.
    pub struct ArbitrationId(32);
);

fixed_hash::construct_fixed_hash!(
    /// An answer in the oracle encoding.
    pub struct Answer(32);
);

fixed_hash::construct_fixed_hash!(
    /// Keccak-256 of a consensus-encoded envelope, identifies a message on the bridge.
    pub struct MessageHash(32);
);

impl_hex_serde!(Address, 20);
impl_hex_serde!(QuestionId, 32);
impl_hex_serde!(ArbitrationId, 32);
impl_hex_serde!(Answer, 32);
impl_hex_serde!(MessageHash, 32);

macro_rules! impl_fixed_hash_encoding {
    ($thing:ident) => {
        impl Encodable for $thing {
            fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
                self.0.consensus_encode(s)
            }
        }

        impl Decodable for $thing {
            fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
                Ok(Self(Decodable::consensus_decode(d)?))
            }
        }
    };
}

impl_fixed_hash_encoding!(Address);
impl_fixed_hash_encoding!(QuestionId);
impl_fixed_hash_encoding!(ArbitrationId);
impl_fixed_hash_encoding!(Answer);
impl_fixed_hash_encoding!(MessageHash);

impl From<QuestionId> for ArbitrationId {
    fn from(q: QuestionId) -> Self {
        ArbitrationId(q.0)
    }
}

impl From<ArbitrationId> for QuestionId {
    fn from(a: ArbitrationId) -> Self {
        QuestionId(a.0)
    }
}

/// The ruling option value reserved for "refuse to arbitrate".
pub const REFUSE_TO_ARBITRATE: Ruling = Ruling::new(0);

/// Number of ruling options offered to the court: every answer the oracle can represent, plus the
/// refusal.
pub const NUMBER_OF_CHOICES_FOR_ARBITRATOR: U256 = U256::MAX;

/// A ruling option as understood by the court. Option `0` is reserved for refusing to arbitrate,
/// option `n` stands for oracle answer `n - 1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display(inner)]
pub struct Ruling(pub U256);

impl Ruling {
    /// Ruling option `n`.
    pub const fn new(n: u64) -> Self {
        Ruling(U256([n, 0, 0, 0]))
    }

    /// Translate the court ruling in the oracle answer encoding.
    pub fn to_answer(self) -> Answer {
        if self.0.is_zero() {
            return Answer::invalid();
        }
        let mut out = [0u8; 32];
        (self.0 - 1).to_big_endian(&mut out);
        Answer(out)
    }
}

impl From<u64> for Ruling {
    fn from(n: u64) -> Self {
        Ruling::new(n)
    }
}

impl From<U256> for Ruling {
    fn from(n: U256) -> Self {
        Ruling(n)
    }
}

impl Encodable for Ruling {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        bytes.consensus_encode(s)
    }
}

impl Decodable for Ruling {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 32] = Decodable::consensus_decode(d)?;
        Ok(Self(U256::from_big_endian(&bytes)))
    }
}

impl Answer {
    /// The answer the oracle treats as invalid, all bits set.
    pub fn invalid() -> Self {
        Answer::repeat_byte(0xff)
    }

    /// Big-endian answer holding `value` in its 16 low bytes.
    pub fn from_value(value: u128) -> Self {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        Answer(out)
    }
}

/// Identifier of a dispute assigned by the court.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display(inner)]
pub struct DisputeId(pub u64);

impl Encodable for DisputeId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(s)
    }
}

impl Decodable for DisputeId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

/// Identifier of a chain, as used by the messenger to route messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
#[display(inner)]
pub struct ChainId(pub u64);

impl ChainId {
    /// The chain identifier left-padded to 32 bytes.
    pub fn to_bytes32(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&self.0.to_be_bytes());
        out
    }
}

impl Encodable for ChainId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(s)
    }
}

impl Decodable for ChainId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self(Decodable::consensus_decode(d)?))
    }
}

/// Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut out = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};

    use std::str::FromStr;

    #[test]
    fn ruling_translates_to_oracle_answer() {
        assert_eq!(Ruling::new(0).to_answer(), Answer::invalid());
        assert_eq!(Ruling::new(1).to_answer(), Answer::zero());
        assert_eq!(Ruling::new(12).to_answer(), Answer::from_low_u64_be(11));
        assert_eq!(
            Ruling(NUMBER_OF_CHOICES_FOR_ARBITRATOR).to_answer(),
            Answer::from_str("fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe")
                .unwrap()
        );
    }

    #[test]
    fn rulings_cover_the_full_answer_width() {
        // answer 0x01 followed by 31 zero bytes
        let mut high = [0u8; 32];
        high[0] = 0x01;
        let ruling = Ruling(U256([1, 0, 0, 1 << 56]));
        assert_eq!(ruling.to_answer(), Answer(high));
        assert!(ruling.0 <= NUMBER_OF_CHOICES_FOR_ARBITRATOR);

        let bytes = serialize(&ruling);
        assert_eq!(bytes.len(), 32);
        assert_eq!(deserialize::<Ruling>(&bytes).unwrap(), ruling);
    }

    #[test]
    fn question_and_arbitration_share_bytes() {
        let question = QuestionId::from_low_u64_be(42);
        let arbitration: ArbitrationId = question.into();
        assert_eq!(arbitration.as_bytes(), question.as_bytes());
        assert_eq!(QuestionId::from(arbitration), question);
    }

    #[test]
    fn addresses_are_encoded_as_fixed_arrays() {
        let address = Address::repeat_byte(0x11);
        let bytes = serialize(&address);
        assert_eq!(bytes.len(), 20);
        assert_eq!(deserialize::<Address>(&bytes).unwrap(), address);
    }

    #[test]
    fn serde_uses_prefixed_hex() {
        let address = Address::from_str("1111111111111111111111111111111111111111").unwrap();
        let yaml = serde_yaml::to_string(&address).unwrap();
        assert!(yaml.contains("0x1111111111111111111111111111111111111111"));
        let back: Address =
            serde_yaml::from_str("\"0x1111111111111111111111111111111111111111\"").unwrap();
        assert_eq!(back, address);
        assert!(serde_yaml::from_str::<Address>("\"0x1111\"").is_err());
    }

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn chain_id_is_left_padded() {
        let bytes = ChainId(5).to_bytes32();
        assert_eq!(bytes[31], 5);
        assert!(bytes[..31].iter().all(|b| *b == 0));
    }
}
