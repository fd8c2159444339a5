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

//! Cross-chain transport used by the proxies.
//!
//! Sending is fire-and-forget: [`Messenger::send_message`] only checks what the sending chain can
//! check (route and fee) and queues an [`Envelope`]. Delivery happens later, on the other chain,
//! when someone relays the envelope to the messenger of the destination chain. The destination
//! messenger authenticates the originating messenger, checks that it did emit the envelope, and
//! hands the decoded message to the [`MessageHandler`] with a [`Context`] whose `origin` carries
//! the authenticated sender.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chain::Context;
use crate::consensus::{self, serialize, Decodable, Encodable};
use crate::message::BridgeMessage;
use crate::role::ChainRole;
use crate::types::{keccak256, Address, MessageHash};
use crate::Res;

/// Errors raised by a messenger, either when sending or when relaying a message.
#[derive(Error, Debug)]
pub enum Error {
    /// The sender is not allowed to send through this messenger.
    #[error("No route registered for sender {0:#x}")]
    UnknownRoute(Address),
    /// The destination does not match the one the bridge expects for this sender.
    #[error("Unexpected destination: expected {expected:#x}, found {found:#x}")]
    UnexpectedDestination { expected: Address, found: Address },
    /// The message is not handled on the other side of the bridge.
    #[error("Message {0} cannot be sent to the {1} chain")]
    WrongDirection(String, ChainRole),
    /// The fee attached does not cover the delivery.
    #[error("Insufficient fee: required {required}, provided {provided}")]
    InsufficientFee { required: u128, provided: u128 },
    /// The envelope was not emitted by the counterpart messenger.
    #[error("Unauthenticated origin {0:#x}")]
    UnauthenticatedOrigin(Address),
    /// The origin messenger never emitted the envelope.
    #[error("Message {0:#x} was never sent")]
    UnknownMessage(MessageHash),
    /// The envelope was already delivered successfully.
    #[error("Message {0:#x} already relayed")]
    AlreadyRelayed(MessageHash),
    /// The handler does not match the envelope target.
    #[error("Unknown target {0:#x}")]
    UnknownTarget(Address),
    /// The payload cannot be decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] consensus::Error),
    /// The destination handler rejected the message.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// A message in flight between two chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Chain the message was sent from.
    pub origin: ChainRole,
    /// Messenger that emitted the envelope.
    pub origin_messenger: Address,
    /// Account that called the messenger on the origin chain.
    pub sender: Address,
    /// Account the message is addressed to on the destination chain.
    pub target: Address,
    /// Encoded [`BridgeMessage`].
    pub payload: Vec<u8>,
    /// Sequence number of the envelope in the origin messenger.
    pub nonce: u64,
}

impl Envelope {
    /// Keccak-256 of the consensus encoded envelope.
    pub fn hash(&self) -> MessageHash {
        MessageHash(keccak256(&serialize(self)))
    }

    /// Decode the carried message.
    pub fn message(&self) -> Result<BridgeMessage, consensus::Error> {
        consensus::deserialize(&self.payload)
    }
}

impl Encodable for Envelope {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.origin.consensus_encode(s)?;
        len += self.origin_messenger.consensus_encode(s)?;
        len += self.sender.consensus_encode(s)?;
        len += self.target.consensus_encode(s)?;
        len += self.payload.consensus_encode(s)?;
        Ok(len + self.nonce.consensus_encode(s)?)
    }
}

impl Decodable for Envelope {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Self {
            origin: Decodable::consensus_decode(d)?,
            origin_messenger: Decodable::consensus_decode(d)?,
            sender: Decodable::consensus_decode(d)?,
            target: Decodable::consensus_decode(d)?,
            payload: Decodable::consensus_decode(d)?,
            nonce: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Envelope);

/// Sending side of the bridge, as seen by a proxy.
pub trait Messenger {
    /// Address the messenger delivers from on its own chain.
    fn address(&self) -> Address;

    /// Queue `message` from `sender` to `target` on the other chain, paying `fee`. Returns the
    /// hash identifying the envelope.
    fn send_message(
        &mut self,
        sender: Address,
        target: Address,
        message: &BridgeMessage,
        fee: u128,
    ) -> Result<MessageHash, Error>;
}

/// Receiving side of a proxy: entry point the messenger delivers to.
pub trait MessageHandler {
    /// Address of the handler on its chain.
    fn address(&self) -> Address;

    /// Handle a message delivered by a messenger.
    fn handle_message(&mut self, ctx: Context, message: BridgeMessage) -> Res<()>;
}

/// In-memory messenger, one per chain. Two instances pointing at each other form a bridge.
#[derive(Debug, Clone)]
pub struct LocalMessenger {
    role: ChainRole,
    address: Address,
    remote: Address,
    routes: HashMap<Address, Address>,
    min_fee: u128,
    nonce: u64,
    outbox: VecDeque<Envelope>,
    collected_fees: u128,
    sent: HashSet<MessageHash>,
    relayed: HashSet<MessageHash>,
    failed: HashSet<MessageHash>,
}

impl LocalMessenger {
    /// Create a messenger living on the `role` chain at `address`, paired with the messenger
    /// `remote` on the other chain.
    pub fn new(role: ChainRole, address: Address, remote: Address) -> Self {
        Self {
            role,
            address,
            remote,
            routes: HashMap::new(),
            min_fee: 0,
            nonce: 0,
            outbox: VecDeque::new(),
            collected_fees: 0,
            sent: HashSet::new(),
            relayed: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    /// Allow `sender` to send messages, only to `target` on the other chain.
    pub fn register_route(&mut self, sender: Address, target: Address) {
        self.routes.insert(sender, target);
    }

    /// Minimum fee required to send a message.
    pub fn set_min_fee(&mut self, fee: u128) {
        self.min_fee = fee;
    }

    pub fn role(&self) -> ChainRole {
        self.role
    }

    pub fn remote(&self) -> Address {
        self.remote
    }

    /// Total fees paid by senders.
    pub fn collected_fees(&self) -> u128 {
        self.collected_fees
    }

    /// Envelopes waiting to be relayed to the other chain.
    pub fn outbox(&self) -> &VecDeque<Envelope> {
        &self.outbox
    }

    /// Take the oldest envelope waiting to be relayed.
    pub fn pop_outbound(&mut self) -> Option<Envelope> {
        self.outbox.pop_front()
    }

    /// Take all envelopes waiting to be relayed, in sending order.
    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain(..).collect()
    }

    /// Whether this messenger emitted the envelope.
    pub fn has_sent(&self, hash: &MessageHash) -> bool {
        self.sent.contains(hash)
    }

    /// Whether the envelope was delivered successfully on this chain.
    pub fn is_relayed(&self, hash: &MessageHash) -> bool {
        self.relayed.contains(hash)
    }

    /// Whether the last delivery attempt of the envelope failed.
    pub fn has_failed(&self, hash: &MessageHash) -> bool {
        self.failed.contains(hash)
    }

    /// Deliver an envelope sent from the other chain to `handler`. `source` is the paired
    /// messenger on the other chain, the envelope must be one it emitted. A failed delivery is
    /// recorded and can be retried, a successful one cannot be replayed.
    pub fn relay_message<H: MessageHandler>(
        &mut self,
        source: &LocalMessenger,
        envelope: &Envelope,
        now: u64,
        handler: &mut H,
    ) -> Result<(), Error> {
        if source.role != self.role.other() || source.address != self.remote {
            return Err(Error::UnauthenticatedOrigin(source.address));
        }
        if envelope.origin != source.role || envelope.origin_messenger != source.address {
            return Err(Error::UnauthenticatedOrigin(envelope.origin_messenger));
        }
        let hash = envelope.hash();
        if !source.has_sent(&hash) {
            return Err(Error::UnknownMessage(hash));
        }
        if self.relayed.contains(&hash) {
            return Err(Error::AlreadyRelayed(hash));
        }
        if handler.address() != envelope.target {
            return Err(Error::UnknownTarget(envelope.target));
        }
        let message = envelope.message()?;
        if message.destination() != self.role {
            return Err(Error::WrongDirection(message.to_string(), self.role));
        }

        let ctx = Context::bridged(self.address, envelope.sender, now);
        debug!(%hash, %message, "relaying message");
        match handler.handle_message(ctx, message) {
            Ok(()) => {
                self.failed.remove(&hash);
                self.relayed.insert(hash);
                info!(%hash, "message relayed");
                Ok(())
            }
            Err(e) => {
                warn!(%hash, error = %e, "message delivery failed");
                self.failed.insert(hash);
                Err(Error::DeliveryFailed(e.to_string()))
            }
        }
    }
}

impl Messenger for LocalMessenger {
    fn address(&self) -> Address {
        self.address
    }

    fn send_message(
        &mut self,
        sender: Address,
        target: Address,
        message: &BridgeMessage,
        fee: u128,
    ) -> Result<MessageHash, Error> {
        let expected = *self
            .routes
            .get(&sender)
            .ok_or(Error::UnknownRoute(sender))?;
        if expected != target {
            return Err(Error::UnexpectedDestination {
                expected,
                found: target,
            });
        }
        if message.destination() != self.role.other() {
            return Err(Error::WrongDirection(message.to_string(), self.role.other()));
        }
        if fee < self.min_fee {
            return Err(Error::InsufficientFee {
                required: self.min_fee,
                provided: fee,
            });
        }

        let envelope = Envelope {
            origin: self.role,
            origin_messenger: self.address,
            sender,
            target,
            payload: serialize(message),
            nonce: self.nonce,
        };
        let hash = envelope.hash();
        self.nonce += 1;
        self.collected_fees = self.collected_fees.saturating_add(fee);
        self.sent.insert(hash);
        self.outbox.push_back(envelope);
        debug!(%hash, %message, "message queued");
        Ok(hash)
    }
}
