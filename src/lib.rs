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

//! Cross-chain arbitration proxies.
//!
//! A question asked on an oracle living on the **home** chain can be escalated to an arbitration
//! court living on the **foreign** chain. Two cooperating state machines implement the protocol:
//!
//! - the [`foreign::ForeignProxy`] escrows the requester's deposit, creates the dispute in the
//!   court, runs the appeal crowdfunding rounds and relays the final ruling;
//! - the [`home::HomeProxy`] validates requests against the oracle, acknowledges or cancels them
//!   and hands the final answer to the oracle.
//!
//! The two proxies never read each other's state, they only exchange [`message::BridgeMessage`]s
//! through a fire-and-forget [`messenger::Messenger`]. Every entry point either fully applies or
//! returns an error without any effect.
//!
//! ```text
//!  requester --requestArbitration--> ForeignProxy ==request==> HomeProxy --notify--> Oracle
//!                                        ^                        |
//!                                        +=====ack / cancel=======+  (relay step)
//!  Court --rule--> ForeignProxy ==answer==> HomeProxy --submitAnswerByArbitrator--> Oracle
//! ```

#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate serde;

use thiserror::Error;

#[macro_use]
pub mod consensus;
#[macro_use]
pub(crate) mod hash;

pub mod arbitrator;
pub mod chain;
pub mod config;
pub mod events;
pub mod foreign;
pub mod governance;
pub mod home;
pub mod message;
pub mod messenger;
pub mod oracle;
pub mod role;
pub mod types;

/// Caller lacks the capability required by the entry point.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// The caller is not the current governor.
    #[error("The caller must be the governor")]
    NotGovernor,
    /// The call was not delivered by the messenger on behalf of the counterpart proxy.
    #[error("The caller must be the bridge relaying the counterpart proxy")]
    NotBridge,
    /// The caller is not the court the dispute was created in.
    #[error("The caller must be the arbitrator")]
    NotCourt,
}

/// The request is not in the state the operation requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// An arbitration request is already pending for this question and requester.
    #[error("Arbitration already requested")]
    AlreadyRequested,
    /// A dispute already exists for this question.
    #[error("Dispute already created")]
    DisputeAlreadyCreated,
    /// Generic status mismatch.
    #[error("Invalid status for operation: expected {expected}, found {found}")]
    InvalidStatusForOperation {
        /// Status(es) accepted by the operation.
        expected: &'static str,
        /// Status found in storage.
        found: String,
    },
}

/// Value or timing constraints violated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingError {
    /// The value sent does not cover arbitration cost plus surplus.
    #[error("Deposit value too low: required {required}, provided {provided}")]
    InsufficientDeposit { required: u128, provided: u128 },
    /// The appeal window is closed, possibly only for the losing side.
    #[error("Appeal period is over")]
    AppealPeriodOver,
    /// The option is already fully funded for the current round.
    #[error("Appeal fee is already paid")]
    AppealAlreadyFullyFunded,
    /// An amount computation overflowed.
    #[error("Arithmetic overflow")]
    Overflow,
}

/// A list of possible errors when running the cross-chain arbitration protocol. Collaborator
/// failures are wrapped so the caller always sees the whole transition rejected.
#[derive(Error, Debug)]
pub enum Error {
    /// Access control failure.
    #[error("Access error: {0}")]
    Access(#[from] AccessError),
    /// Status check failure.
    #[error("State error: {0}")]
    State(#[from] StateError),
    /// Value or timing failure.
    #[error("Funding error: {0}")]
    Funding(#[from] FundingError),
    /// The relay step could not hand the stored outcome to the bridge. Nothing was mutated, the
    /// relay can be retried.
    #[error("Bridge delivery failed: {0}")]
    BridgeDeliveryFailed(#[source] messenger::Error),
    /// Messenger failure while sending a message outside of a relay step.
    #[error("Messenger error: {0}")]
    Messenger(#[from] messenger::Error),
    /// The arbitration court refused the call.
    #[error("Arbitrator error: {0}")]
    Arbitrator(#[from] arbitrator::Error),
    /// The oracle refused the call.
    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::Error),
    /// Encoding or decoding error of a bridge payload.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] config::Error),
}

/// Result of every proxy entry point.
pub type Res<T> = Result<T, Error>;
