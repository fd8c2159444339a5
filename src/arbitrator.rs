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

//! Interface of the arbitration court living on the foreign chain and an in-memory court with
//! appealable rulings.

use primitive_types::U256;
use thiserror::Error;
use tracing::debug;

use crate::chain::Context;
use crate::types::{Address, DisputeId, Ruling};
use crate::Res;

/// Errors raised by the court.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Only the owner of the court can rule.
    #[error("Only the court owner can rule")]
    NotOwner,
    /// The court is not the one the dispute belongs to.
    #[error("Unexpected court {0:#x}")]
    UnexpectedCourt(Address),
    /// No dispute with this identifier.
    #[error("Unknown dispute {0}")]
    UnknownDispute(DisputeId),
    /// The value does not cover the requested fee.
    #[error("Not enough value: required {required}, provided {provided}")]
    InsufficientFee { required: u128, provided: u128 },
    /// The ruling is not one of the dispute options.
    #[error("Invalid ruling {0}")]
    InvalidRuling(Ruling),
    /// The dispute is not in the status the call requires.
    #[error("Invalid dispute status: expected {expected}, found {found}")]
    InvalidStatus {
        expected: DisputeStatus,
        found: DisputeStatus,
    },
    /// The appeal window is closed.
    #[error("The appeal period is over")]
    AppealPeriodOver,
    /// The appeal window is still open.
    #[error("The appeal period is not over yet")]
    AppealPeriodNotOver,
    /// The arbitrated contract refused the ruling.
    #[error("Ruling rejected by the arbitrable: {0}")]
    RulingRejected(String),
}

/// Lifecycle of a dispute in the court.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(Debug)]
pub enum DisputeStatus {
    /// Created or appealed, waiting for a ruling.
    Waiting,
    /// Ruled, the ruling can be appealed until the end of the appeal period.
    Appealable,
    /// Final.
    Solved,
}

/// The court a [`ForeignProxy`](crate::foreign::ForeignProxy) creates disputes in.
///
/// Every call carries the [`Context`] of the caller: the arbitrated contract is `ctx.sender`, the
/// fees are `ctx.value`.
pub trait Arbitrator {
    /// Address of the court.
    fn address(&self) -> Address;

    /// Fee to create a dispute.
    fn arbitration_cost(&self, extra_data: &[u8]) -> u128;

    /// Create a dispute with `choices` ruling options, funded with `ctx.value`.
    fn create_dispute(
        &mut self,
        ctx: Context,
        choices: U256,
        extra_data: &[u8],
    ) -> Result<DisputeId, Error>;

    /// Fee to appeal the current ruling of `dispute`.
    fn appeal_cost(&self, dispute: DisputeId, extra_data: &[u8]) -> Result<u128, Error>;

    /// Start and end of the appeal window of `dispute`. Both are zero when the dispute is not
    /// appealable.
    fn appeal_period(&self, dispute: DisputeId) -> Result<(u64, u64), Error>;

    /// Current ruling of `dispute`.
    fn current_ruling(&self, dispute: DisputeId) -> Result<Ruling, Error>;

    fn dispute_status(&self, dispute: DisputeId) -> Result<DisputeStatus, Error>;

    /// Appeal the current ruling of `dispute`, paying `ctx.value`.
    fn appeal(&mut self, ctx: Context, dispute: DisputeId, extra_data: &[u8]) -> Result<(), Error>;
}

/// A contract the court hands its rulings to.
pub trait Arbitrable {
    /// Receive the `ruling` of `dispute`. `ctx.sender` is the court.
    fn rule(&mut self, ctx: Context, dispute: DisputeId, ruling: Ruling) -> Res<()>;
}

/// A dispute as stored by the [`AutoAppealableArbitrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispute {
    /// The contract that created the dispute and receives the ruling.
    pub arbitrated: Address,
    /// Number of ruling options, excluding the refusal to arbitrate.
    pub choices: U256,
    /// Fees paid so far.
    pub fees: u128,
    pub ruling: Ruling,
    pub status: DisputeStatus,
    pub appeal_cost: u128,
    pub appeal_period_start: u64,
    pub appeal_period_end: u64,
}

/// A court ruled by its owner, where each ruling can be made appealable for a given cost and
/// duration.
#[derive(Debug, Clone)]
pub struct AutoAppealableArbitrator {
    address: Address,
    owner: Address,
    arbitration_price: u128,
    disputes: Vec<Dispute>,
}

impl AutoAppealableArbitrator {
    pub fn new(address: Address, owner: Address, arbitration_price: u128) -> Self {
        Self {
            address,
            owner,
            arbitration_price,
            disputes: vec![],
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Change the price of new disputes.
    pub fn set_arbitration_price(&mut self, price: u128) {
        self.arbitration_price = price;
    }

    /// All disputes, indexed by their identifier.
    pub fn disputes(&self) -> &[Dispute] {
        &self.disputes
    }

    pub fn dispute(&self, dispute: DisputeId) -> Result<&Dispute, Error> {
        self.disputes
            .get(dispute.0 as usize)
            .ok_or(Error::UnknownDispute(dispute))
    }

    fn dispute_mut(&mut self, dispute: DisputeId) -> Result<&mut Dispute, Error> {
        self.disputes
            .get_mut(dispute.0 as usize)
            .ok_or(Error::UnknownDispute(dispute))
    }

    /// Give a final ruling and hand it to `arbitrable`. If the arbitrable rejects the ruling the
    /// dispute is left untouched.
    pub fn give_ruling<T: Arbitrable>(
        &mut self,
        ctx: Context,
        dispute: DisputeId,
        ruling: Ruling,
        arbitrable: &mut T,
    ) -> Result<(), Error> {
        if ctx.sender != self.owner {
            return Err(Error::NotOwner);
        }
        let stored = self.dispute(dispute)?;
        if ruling.0 > stored.choices {
            return Err(Error::InvalidRuling(ruling));
        }
        match stored.status {
            DisputeStatus::Solved => {
                return Err(Error::InvalidStatus {
                    expected: DisputeStatus::Waiting,
                    found: DisputeStatus::Solved,
                })
            }
            DisputeStatus::Appealable if ctx.timestamp < stored.appeal_period_end => {
                return Err(Error::AppealPeriodNotOver)
            }
            _ => {}
        }

        let court = Context::new(self.address).at(ctx.timestamp);
        arbitrable
            .rule(court, dispute, ruling)
            .map_err(|e| Error::RulingRejected(e.to_string()))?;

        let stored = self.dispute_mut(dispute)?;
        stored.ruling = ruling;
        stored.status = DisputeStatus::Solved;
        debug!(%dispute, %ruling, "dispute solved");
        Ok(())
    }

    /// Give a ruling that can be appealed for `appeal_cost` during `time_to_appeal` seconds.
    pub fn give_appealable_ruling(
        &mut self,
        ctx: Context,
        dispute: DisputeId,
        ruling: Ruling,
        appeal_cost: u128,
        time_to_appeal: u64,
    ) -> Result<(), Error> {
        if ctx.sender != self.owner {
            return Err(Error::NotOwner);
        }
        let stored = self.dispute_mut(dispute)?;
        if ruling.0 > stored.choices {
            return Err(Error::InvalidRuling(ruling));
        }
        if stored.status != DisputeStatus::Waiting {
            return Err(Error::InvalidStatus {
                expected: DisputeStatus::Waiting,
                found: stored.status,
            });
        }
        stored.ruling = ruling;
        stored.status = DisputeStatus::Appealable;
        stored.appeal_cost = appeal_cost;
        stored.appeal_period_start = ctx.timestamp;
        stored.appeal_period_end = ctx.timestamp.saturating_add(time_to_appeal);
        debug!(%dispute, %ruling, appeal_cost, "appealable ruling given");
        Ok(())
    }
}

impl Arbitrator for AutoAppealableArbitrator {
    fn address(&self) -> Address {
        self.address
    }

    fn arbitration_cost(&self, _extra_data: &[u8]) -> u128 {
        self.arbitration_price
    }

    fn create_dispute(
        &mut self,
        ctx: Context,
        choices: U256,
        extra_data: &[u8],
    ) -> Result<DisputeId, Error> {
        let required = self.arbitration_cost(extra_data);
        if ctx.value < required {
            return Err(Error::InsufficientFee {
                required,
                provided: ctx.value,
            });
        }
        let id = DisputeId(self.disputes.len() as u64);
        self.disputes.push(Dispute {
            arbitrated: ctx.sender,
            choices,
            fees: ctx.value,
            ruling: Ruling::default(),
            status: DisputeStatus::Waiting,
            appeal_cost: 0,
            appeal_period_start: 0,
            appeal_period_end: 0,
        });
        debug!(dispute = %id, arbitrated = %ctx.sender, "dispute created");
        Ok(id)
    }

    fn appeal_cost(&self, dispute: DisputeId, _extra_data: &[u8]) -> Result<u128, Error> {
        Ok(self.dispute(dispute)?.appeal_cost)
    }

    fn appeal_period(&self, dispute: DisputeId) -> Result<(u64, u64), Error> {
        let stored = self.dispute(dispute)?;
        match stored.status {
            DisputeStatus::Appealable => Ok((stored.appeal_period_start, stored.appeal_period_end)),
            _ => Ok((0, 0)),
        }
    }

    fn current_ruling(&self, dispute: DisputeId) -> Result<Ruling, Error> {
        Ok(self.dispute(dispute)?.ruling)
    }

    fn dispute_status(&self, dispute: DisputeId) -> Result<DisputeStatus, Error> {
        Ok(self.dispute(dispute)?.status)
    }

    fn appeal(&mut self, ctx: Context, dispute: DisputeId, _extra_data: &[u8]) -> Result<(), Error> {
        let stored = self.dispute_mut(dispute)?;
        if stored.status != DisputeStatus::Appealable {
            return Err(Error::InvalidStatus {
                expected: DisputeStatus::Appealable,
                found: stored.status,
            });
        }
        if ctx.value < stored.appeal_cost {
            return Err(Error::InsufficientFee {
                required: stored.appeal_cost,
                provided: ctx.value,
            });
        }
        if ctx.timestamp >= stored.appeal_period_end {
            return Err(Error::AppealPeriodOver);
        }
        stored.fees = stored.fees.saturating_add(ctx.value);
        stored.status = DisputeStatus::Waiting;
        debug!(%dispute, "ruling appealed");
        Ok(())
    }
}
