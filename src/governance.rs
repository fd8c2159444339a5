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

//! Governed parameters of the foreign proxy and the basis-point arithmetic of appeal funding.

use crate::types::Address;
use crate::FundingError;

/// Divisor of every multiplier, multipliers are expressed in basis points.
pub const MULTIPLIER_DIVISOR: u64 = 10_000;

/// Multipliers applied to the court appeal cost to compute what each side must fund, and to the
/// appeal period to compute the funding window of the losing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Multipliers {
    /// Extra share paid by the side of the current ruling.
    pub winner: u64,
    /// Extra share paid by the other sides.
    pub loser: u64,
    /// Share of the appeal period during which the other sides can fund.
    pub loser_appeal_period: u64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            winner: 3000,
            loser: 7000,
            loser_appeal_period: 5000,
        }
    }
}

/// A configuration field overwritten by the governor, with its new value.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum GovernanceField {
    Governor(Address),
    Arbitrator {
        arbitrator: Address,
        extra_data: Vec<u8>,
    },
    MetaEvidence {
        id: u64,
        evidence: String,
    },
    Surplus(u128),
    HomeProxy(Address),
    Messenger(Address),
    WinnerMultiplier(u64),
    LoserMultiplier(u64),
    LoserAppealPeriodMultiplier(u64),
}

/// Amount a side must raise to be fully funded: the appeal cost plus its `multiplier` share.
pub fn appeal_total_cost(appeal_cost: u128, multiplier: u64) -> Result<u128, FundingError> {
    appeal_cost
        .checked_mul(u128::from(multiplier))
        .map(|extra| extra / u128::from(MULTIPLIER_DIVISOR))
        .and_then(|extra| appeal_cost.checked_add(extra))
        .ok_or(FundingError::Overflow)
}

/// Whether the losing side can still fund at `now`, given the appeal period `[start, end)`. The
/// window closes once the elapsed share of the period reaches `loser_appeal_period` basis points.
pub fn loser_window_open(start: u64, end: u64, now: u64, loser_appeal_period: u64) -> bool {
    let elapsed = u128::from(now.saturating_sub(start));
    let duration = u128::from(end.saturating_sub(start));
    elapsed * u128::from(MULTIPLIER_DIVISOR) < duration * u128::from(loser_appeal_period)
}

/// Share of `pool` owed to a `contribution` out of `total` contributions, rounded down.
pub fn proportional_share(
    contribution: u128,
    pool: u128,
    total: u128,
) -> Result<u128, FundingError> {
    if total == 0 {
        return Ok(0);
    }
    contribution
        .checked_mul(pool)
        .map(|product| product / total)
        .ok_or(FundingError::Overflow)
}
