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

//! Execution environment of a single chain: who is calling, with how much value, at what time,
//! and where payouts land.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::Address;

/// Errors raised by the in-memory [`Balances`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The account does not hold enough value.
    #[error("Insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance { available: u128, requested: u128 },
}

/// The context of a call into a proxy, a court, an oracle or a messenger.
///
/// `origin` is only set by a messenger delivering a cross-chain message: it carries the address
/// of the sender on the other chain that the messenger authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// The immediate caller.
    pub sender: Address,
    /// Value transferred along with the call.
    pub value: u128,
    /// Timestamp of the block including the call, in seconds.
    pub timestamp: u64,
    /// Authenticated sender on the other chain, if delivered by a messenger.
    pub origin: Option<Address>,
}

impl Context {
    /// A call by `sender` without value at time zero.
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            value: 0,
            timestamp: 0,
            origin: None,
        }
    }

    /// A call delivered by `messenger` on behalf of `origin`.
    pub fn bridged(messenger: Address, origin: Address, timestamp: u64) -> Self {
        Self {
            sender: messenger,
            value: 0,
            timestamp,
            origin: Some(origin),
        }
    }

    /// Attach `value` to the call.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Set the block timestamp of the call.
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Where value leaving a proxy is credited. Mirrors a plain value transfer: it cannot fail from
/// the point of view of the sender.
pub trait Ledger {
    /// Credit `amount` to `account`.
    fn credit(&mut self, account: Address, amount: u128);
}

/// In-memory account balances of one chain.
#[derive(Debug, Clone, Default)]
pub struct Balances {
    accounts: HashMap<Address, u128>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`, zero if unknown.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// Withdraw `amount` from `account`, used to fund the value of a call.
    pub fn debit(&mut self, account: Address, amount: u128) -> Result<(), Error> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(Error::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.accounts.insert(account, available - amount);
        Ok(())
    }
}

impl Ledger for Balances {
    fn credit(&mut self, account: Address, amount: u128) {
        let balance = self.accounts.entry(account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}
