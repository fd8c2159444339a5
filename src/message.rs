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

//! Messages exchanged between the two proxies over the bridge.
//!
//! A payload is a 4 bytes selector followed by the consensus encoded fields of the message. The
//! selector is the first four bytes of the Keccak-256 of the handler signature, so the payloads
//! stay recognizable by an observer of the bridge.

use std::fmt;
use std::io;

use crate::consensus::{self, Decodable, Encodable};
use crate::role::ChainRole;
use crate::types::{keccak256, Address, Answer, QuestionId};

/// Signature of the home handler receiving a new arbitration request.
pub const RECEIVE_ARBITRATION_REQUEST: &str = "receiveArbitrationRequest(bytes32,address,uint256)";
/// Signature of the foreign handler receiving an acknowledgement.
pub const RECEIVE_ARBITRATION_ACKNOWLEDGEMENT: &str =
    "receiveArbitrationAcknowledgement(bytes32,address)";
/// Signature of the foreign handler receiving a cancelation.
pub const RECEIVE_ARBITRATION_CANCELATION: &str = "receiveArbitrationCancelation(bytes32,address)";
/// Signature of the home handler receiving a failed dispute creation.
pub const RECEIVE_ARBITRATION_FAILURE: &str = "receiveArbitrationFailure(bytes32,address)";
/// Signature of the home handler receiving the final answer.
pub const RECEIVE_ARBITRATION_ANSWER: &str = "receiveArbitrationAnswer(bytes32,bytes32)";

/// Compute the 4 bytes selector of a handler signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A cross-chain call from one proxy to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMessage {
    /// Foreign to home: `requester` escrowed a deposit to arbitrate `question_id`, provided the
    /// best answer bond does not exceed `max_previous`.
    ArbitrationRequest {
        question_id: QuestionId,
        requester: Address,
        max_previous: u128,
    },
    /// Home to foreign: the oracle accepted the request, a dispute can be created.
    ArbitrationAcknowledgement {
        question_id: QuestionId,
        requester: Address,
    },
    /// Home to foreign: the oracle refused the request, the deposit must be refunded.
    ArbitrationCancelation {
        question_id: QuestionId,
        requester: Address,
    },
    /// Foreign to home: the dispute could not be created, the oracle must leave arbitration.
    ArbitrationFailure {
        question_id: QuestionId,
        requester: Address,
    },
    /// Foreign to home: final answer decided by the court.
    ArbitrationAnswer {
        question_id: QuestionId,
        answer: Answer,
    },
}

impl BridgeMessage {
    /// Signature of the handler the message is addressed to.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::ArbitrationRequest { .. } => RECEIVE_ARBITRATION_REQUEST,
            Self::ArbitrationAcknowledgement { .. } => RECEIVE_ARBITRATION_ACKNOWLEDGEMENT,
            Self::ArbitrationCancelation { .. } => RECEIVE_ARBITRATION_CANCELATION,
            Self::ArbitrationFailure { .. } => RECEIVE_ARBITRATION_FAILURE,
            Self::ArbitrationAnswer { .. } => RECEIVE_ARBITRATION_ANSWER,
        }
    }

    /// Selector prefixing the encoded payload.
    pub fn selector(&self) -> [u8; 4] {
        selector(self.signature())
    }

    /// The chain on which the message is handled.
    pub fn destination(&self) -> ChainRole {
        match self {
            Self::ArbitrationRequest { .. }
            | Self::ArbitrationFailure { .. }
            | Self::ArbitrationAnswer { .. } => ChainRole::Home,
            Self::ArbitrationAcknowledgement { .. } | Self::ArbitrationCancelation { .. } => {
                ChainRole::Foreign
            }
        }
    }

    /// The question the message is about.
    pub fn question_id(&self) -> QuestionId {
        match self {
            Self::ArbitrationRequest { question_id, .. }
            | Self::ArbitrationAcknowledgement { question_id, .. }
            | Self::ArbitrationCancelation { question_id, .. }
            | Self::ArbitrationFailure { question_id, .. }
            | Self::ArbitrationAnswer { question_id, .. } => *question_id,
        }
    }
}

impl fmt::Display for BridgeMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.signature().split('(').next() {
            Some(name) => write!(f, "{}({:#x})", name, self.question_id()),
            None => write!(f, "{:?}", self),
        }
    }
}

impl Encodable for BridgeMessage {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.selector().consensus_encode(s)?;
        match self {
            Self::ArbitrationRequest {
                question_id,
                requester,
                max_previous,
            } => {
                len += question_id.consensus_encode(s)?;
                len += requester.consensus_encode(s)?;
                len += max_previous.consensus_encode(s)?;
            }
            Self::ArbitrationAcknowledgement {
                question_id,
                requester,
            }
            | Self::ArbitrationCancelation {
                question_id,
                requester,
            }
            | Self::ArbitrationFailure {
                question_id,
                requester,
            } => {
                len += question_id.consensus_encode(s)?;
                len += requester.consensus_encode(s)?;
            }
            Self::ArbitrationAnswer {
                question_id,
                answer,
            } => {
                len += question_id.consensus_encode(s)?;
                len += answer.consensus_encode(s)?;
            }
        }
        Ok(len)
    }
}

impl Decodable for BridgeMessage {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let prefix: [u8; 4] = Decodable::consensus_decode(d)?;
        if prefix == selector(RECEIVE_ARBITRATION_REQUEST) {
            Ok(Self::ArbitrationRequest {
                question_id: Decodable::consensus_decode(d)?,
                requester: Decodable::consensus_decode(d)?,
                max_previous: Decodable::consensus_decode(d)?,
            })
        } else if prefix == selector(RECEIVE_ARBITRATION_ACKNOWLEDGEMENT) {
            Ok(Self::ArbitrationAcknowledgement {
                question_id: Decodable::consensus_decode(d)?,
                requester: Decodable::consensus_decode(d)?,
            })
        } else if prefix == selector(RECEIVE_ARBITRATION_CANCELATION) {
            Ok(Self::ArbitrationCancelation {
                question_id: Decodable::consensus_decode(d)?,
                requester: Decodable::consensus_decode(d)?,
            })
        } else if prefix == selector(RECEIVE_ARBITRATION_FAILURE) {
            Ok(Self::ArbitrationFailure {
                question_id: Decodable::consensus_decode(d)?,
                requester: Decodable::consensus_decode(d)?,
            })
        } else if prefix == selector(RECEIVE_ARBITRATION_ANSWER) {
            Ok(Self::ArbitrationAnswer {
                question_id: Decodable::consensus_decode(d)?,
                answer: Decodable::consensus_decode(d)?,
            })
        } else {
            Err(consensus::Error::UnknownSelector(hex::encode(prefix)))
        }
    }
}

impl_strict_encoding!(BridgeMessage);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};

    #[test]
    fn selectors_are_distinct() {
        let selectors = [
            selector(RECEIVE_ARBITRATION_REQUEST),
            selector(RECEIVE_ARBITRATION_ACKNOWLEDGEMENT),
            selector(RECEIVE_ARBITRATION_CANCELATION),
            selector(RECEIVE_ARBITRATION_FAILURE),
            selector(RECEIVE_ARBITRATION_ANSWER),
        ];
        for (i, a) in selectors.iter().enumerate() {
            for b in selectors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn request_payload_layout() {
        let msg = BridgeMessage::ArbitrationRequest {
            question_id: QuestionId::zero(),
            requester: Address::repeat_byte(0xaa),
            max_previous: 2001,
        };
        let bytes = serialize(&msg);
        assert_eq!(bytes.len(), 4 + 32 + 20 + 16);
        assert_eq!(&bytes[..4], &selector(RECEIVE_ARBITRATION_REQUEST));
        // 2001 = 0x07d1, little endian
        assert_eq!(&bytes[56..58], &[0xd1, 0x07]);
        assert_eq!(deserialize::<BridgeMessage>(&bytes).unwrap(), msg);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        let mut bytes = serialize(&BridgeMessage::ArbitrationAnswer {
            question_id: QuestionId::zero(),
            answer: Answer::invalid(),
        });
        bytes[0] ^= 0xff;
        assert!(matches!(
            deserialize::<BridgeMessage>(&bytes),
            Err(consensus::Error::UnknownSelector(_))
        ));
        assert!(deserialize::<BridgeMessage>(&[0xfa]).is_err());
    }

    #[test]
    fn strict_encoding_matches_consensus() {
        let msg = BridgeMessage::ArbitrationCancelation {
            question_id: QuestionId::repeat_byte(0x01),
            requester: Address::repeat_byte(0x02),
        };
        let strict_ser = strict_encoding::strict_serialize(&msg).unwrap();
        assert_eq!(strict_ser, serialize(&msg));
        let res: BridgeMessage = strict_encoding::strict_deserialize(&strict_ser).unwrap();
        assert_eq!(res, msg);
        assert_eq!(msg.destination(), ChainRole::Foreign);
    }
}
