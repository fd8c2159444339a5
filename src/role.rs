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

//! Roles used to distinguish the two chains taking part in the protocol.

use std::io;
use std::str::FromStr;

use crate::consensus::{self, Decodable, Encodable};

/// The two sides of the bridge. The oracle lives on the home chain, the arbitration court lives on
/// the foreign chain; each side runs its own proxy.
#[derive(Display, Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[display(Debug)]
pub enum ChainRole {
    /// The chain hosting the oracle and the [`HomeProxy`](crate::home::HomeProxy).
    Home,
    /// The chain hosting the court and the [`ForeignProxy`](crate::foreign::ForeignProxy).
    Foreign,
}

impl ChainRole {
    /// Return the other side of the bridge.
    pub fn other(&self) -> Self {
        match self {
            Self::Home => Self::Foreign,
            Self::Foreign => Self::Home,
        }
    }
}

impl Encodable for ChainRole {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            ChainRole::Home => 0x01u8.consensus_encode(writer),
            ChainRole::Foreign => 0x02u8.consensus_encode(writer),
        }
    }
}

impl Decodable for ChainRole {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(ChainRole::Home),
            0x02u8 => Ok(ChainRole::Foreign),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(ChainRole);

impl FromStr for ChainRole {
    type Err = consensus::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Home" | "home" => Ok(ChainRole::Home),
            "Foreign" | "foreign" => Ok(ChainRole::Foreign),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}
