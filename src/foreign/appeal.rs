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

//! Crowdfunded appeals of a created dispute.
//!
//! Each ruling cycle of the court opens a [`Round`]. During the appeal period anyone can fund a
//! ruling option; the side of the current ruling owes the appeal cost plus the winner share, the
//! other sides owe the appeal cost plus the loser share and must be funded within the first part
//! of the period. Once two options are fully funded the court is appealed and a new round opens.
//! When the dispute is ruled, contributors withdraw from the rounds: unfunded options are
//! reimbursed, the contributors of the winning option share the reward pool.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::arbitrator::Arbitrator;
use crate::chain::{Context, Ledger};
use crate::events::Event;
use crate::governance::{appeal_total_cost, loser_window_open, proportional_share};
use crate::types::{Address, ArbitrationId, Ruling};
use crate::{FundingError, Res, StateError};

use super::{invalid_status, ArbitrationRequest, ForeignProxy, Status};

/// Appeal funding of one ruling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    paid_by_option: HashMap<Ruling, u128>,
    fully_funded_options: Vec<Ruling>,
    total_reward_pool: u128,
    contributions: HashMap<Address, HashMap<Ruling, u128>>,
    funding_deadline: u64,
}

impl Round {
    /// Amount contributed to `ruling`.
    pub fn paid(&self, ruling: Ruling) -> u128 {
        self.paid_by_option.get(&ruling).copied().unwrap_or(0)
    }

    /// Whether `ruling` reached its required amount.
    pub fn has_paid(&self, ruling: Ruling) -> bool {
        self.fully_funded_options.contains(&ruling)
    }

    /// Fully funded options, in funding order.
    pub fn fully_funded_options(&self) -> &[Ruling] {
        &self.fully_funded_options
    }

    /// Amount shared by the winners once the dispute is ruled.
    pub fn total_reward_pool(&self) -> u128 {
        self.total_reward_pool
    }

    pub fn contribution(&self, contributor: &Address, ruling: Ruling) -> u128 {
        self.contributions
            .get(contributor)
            .and_then(|by_option| by_option.get(&ruling))
            .copied()
            .unwrap_or(0)
    }

    pub fn has_contributions(&self) -> bool {
        !self.paid_by_option.is_empty()
    }

    /// End of the appeal period the round was funded in, zero if never funded.
    pub fn funding_deadline(&self) -> u64 {
        self.funding_deadline
    }

    fn contribute(&mut self, contributor: Address, ruling: Ruling, amount: u128) {
        if amount == 0 {
            return;
        }
        let paid = self.paid_by_option.entry(ruling).or_insert(0);
        *paid = paid.saturating_add(amount);
        let contribution = self
            .contributions
            .entry(contributor)
            .or_default()
            .entry(ruling)
            .or_insert(0);
        *contribution = contribution.saturating_add(amount);
    }

    /// What `beneficiary` can withdraw for its contributions to `ruling`, once `final_ruling` is
    /// known. Rounded down, the remainder stays in the pool.
    pub fn withdrawable(
        &self,
        beneficiary: &Address,
        ruling: Ruling,
        final_ruling: Ruling,
    ) -> Result<u128, FundingError> {
        let contribution = self.contribution(beneficiary, ruling);
        if !self.has_paid(ruling) {
            // not fully funded, reimbursed
            Ok(contribution)
        } else if !self.has_paid(final_ruling) {
            // the winner was not funded, funded sides share the pool
            match self.fully_funded_options.as_slice() {
                [first, second, ..] => proportional_share(
                    contribution,
                    self.total_reward_pool,
                    self.paid(*first).saturating_add(self.paid(*second)),
                ),
                _ => Ok(0),
            }
        } else if ruling == final_ruling {
            proportional_share(contribution, self.total_reward_pool, self.paid(ruling))
        } else {
            Ok(0)
        }
    }

    /// Options `contributor` contributed to that ended fully funded, with the amounts.
    pub fn contributions_to_successful_fundings(&self, contributor: &Address) -> Vec<(Ruling, u128)> {
        self.fully_funded_options
            .iter()
            .map(|ruling| (*ruling, self.contribution(contributor, *ruling)))
            .collect()
    }
}

/// Snapshot of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundInfo {
    /// Paid amount of every fully funded option.
    pub paid_fees: Vec<(Ruling, u128)>,
    pub fee_rewards: u128,
}

impl ForeignProxy {
    fn created_request(
        &self,
        arbitration_id: ArbitrationId,
    ) -> Res<(Address, ArbitrationRequest)> {
        let requester = self
            .arbitration_id_to_requester
            .get(&arbitration_id)
            .copied()
            .ok_or_else(|| invalid_status("Created", Status::None))?;
        let request = self.request(arbitration_id, requester);
        Ok((requester, request))
    }

    /// Fund the appeal of `ruling` with `ctx.value`. Only the missing amount is taken, the rest
    /// is refunded to the sender. Returns whether the option is fully funded.
    pub fn fund_appeal<A: Arbitrator, L: Ledger>(
        &mut self,
        ctx: Context,
        arbitration_id: ArbitrationId,
        ruling: Ruling,
        arbitrator: &mut A,
        ledger: &mut L,
    ) -> Res<bool> {
        let (requester, request) = self.created_request(arbitration_id)?;
        if request.status != Status::Created {
            return Err(invalid_status("Created", request.status).into());
        }
        Self::check_court(request.arbitrator, arbitrator)?;
        let dispute_id = request.dispute_id;
        let extra_data = &request.arbitrator_extra_data;

        let (start, end) = arbitrator.appeal_period(dispute_id)?;
        if ctx.timestamp < start || ctx.timestamp >= end {
            return Err(FundingError::AppealPeriodOver.into());
        }
        let multipliers = self.config.multipliers;
        let multiplier = if ruling == arbitrator.current_ruling(dispute_id)? {
            multipliers.winner
        } else {
            if !loser_window_open(start, end, ctx.timestamp, multipliers.loser_appeal_period) {
                return Err(FundingError::AppealPeriodOver.into());
            }
            multipliers.loser
        };

        let mut round = request.rounds.last().cloned().unwrap_or_default();
        if round.has_paid(ruling) {
            return Err(FundingError::AppealAlreadyFullyFunded.into());
        }
        let appeal_cost = arbitrator.appeal_cost(dispute_id, extra_data)?;
        let total_cost = appeal_total_cost(appeal_cost, multiplier)?;
        let contribution = ctx
            .value
            .min(total_cost.saturating_sub(round.paid(ruling)));

        let mut events = vec![Event::AppealContribution {
            arbitration_id,
            ruling,
            contributor: ctx.sender,
            amount: contribution,
        }];
        round.contribute(ctx.sender, ruling, contribution);
        round.funding_deadline = end;
        let fully_funded = round.paid(ruling) >= total_cost;
        if fully_funded {
            round.total_reward_pool = round.total_reward_pool.saturating_add(round.paid(ruling));
            round.fully_funded_options.push(ruling);
            events.push(Event::HasPaidAppealFee {
                arbitration_id,
                ruling,
            });
        }

        let appealed = round.fully_funded_options.len() > 1;
        if appealed {
            let fees = Context::new(self.address)
                .with_value(appeal_cost)
                .at(ctx.timestamp);
            arbitrator.appeal(fees, dispute_id, extra_data)?;
            round.total_reward_pool = round.total_reward_pool.saturating_sub(appeal_cost);
        }

        // every fallible call is done, commit
        let stored = self
            .requests
            .entry((arbitration_id, requester))
            .or_default();
        match stored.rounds.last_mut() {
            Some(last) => *last = round,
            None => stored.rounds.push(round),
        }
        if appealed {
            stored.rounds.push(Round::default());
            events.push(Event::RulingAppealed {
                arbitration_id,
                dispute_id,
                round: stored.rounds.len() - 1,
            });
            info!(%arbitration_id, %dispute_id, "ruling appealed");
        }
        self.balance = self
            .balance
            .saturating_add(contribution)
            .saturating_sub(if appealed { appeal_cost } else { 0 });
        let excess = ctx.value - contribution;
        if excess > 0 {
            ledger.credit(ctx.sender, excess);
        }
        debug!(%arbitration_id, %ruling, contribution, fully_funded, "appeal funded");
        self.events.extend(events);
        Ok(fully_funded)
    }

    fn ruled_request(&self, arbitration_id: ArbitrationId) -> Res<(Address, ArbitrationRequest)> {
        let (requester, request) = self.created_request(arbitration_id)?;
        if request.status != Status::Ruled {
            return Err(StateError::InvalidStatusForOperation {
                expected: "Ruled",
                found: request.status.to_string(),
            }
            .into());
        }
        Ok((requester, request))
    }

    /// Pay `beneficiary` its reimbursement or reward for the contributions to `ruling` in
    /// `round`. Returns the amount paid, zero if nothing is owed.
    pub fn withdraw_fees_and_rewards<L: Ledger>(
        &mut self,
        _ctx: Context,
        arbitration_id: ArbitrationId,
        beneficiary: Address,
        round: usize,
        ruling: Ruling,
        ledger: &mut L,
    ) -> Res<u128> {
        let (requester, request) = self.ruled_request(arbitration_id)?;
        let amount = match request.rounds.get(round) {
            Some(stored) => stored.withdrawable(&beneficiary, ruling, request.ruling)?,
            None => return Ok(0),
        };
        self.pay_out(
            arbitration_id,
            requester,
            beneficiary,
            &[(round, amount)],
            ruling,
            ledger,
        );
        Ok(amount)
    }

    /// Same as [`Self::withdraw_fees_and_rewards`] over every round.
    pub fn withdraw_fees_and_rewards_for_all_rounds<L: Ledger>(
        &mut self,
        _ctx: Context,
        arbitration_id: ArbitrationId,
        beneficiary: Address,
        ruling: Ruling,
        ledger: &mut L,
    ) -> Res<u128> {
        let (requester, request) = self.ruled_request(arbitration_id)?;
        let amounts = request
            .rounds
            .iter()
            .enumerate()
            .map(|(i, round)| {
                round
                    .withdrawable(&beneficiary, ruling, request.ruling)
                    .map(|amount| (i, amount))
            })
            .collect::<Result<Vec<_>, FundingError>>()?;
        let total = amounts
            .iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(FundingError::Overflow)?;
        self.pay_out(arbitration_id, requester, beneficiary, &amounts, ruling, ledger);
        Ok(total)
    }

    fn pay_out<L: Ledger>(
        &mut self,
        arbitration_id: ArbitrationId,
        requester: Address,
        beneficiary: Address,
        amounts: &[(usize, u128)],
        ruling: Ruling,
        ledger: &mut L,
    ) {
        let stored = self
            .requests
            .entry((arbitration_id, requester))
            .or_default();
        for (round, amount) in amounts {
            if let Some(by_option) = stored
                .rounds
                .get_mut(*round)
                .and_then(|r| r.contributions.get_mut(&beneficiary))
            {
                by_option.remove(&ruling);
            }
            if *amount == 0 {
                continue;
            }
            self.balance = self.balance.saturating_sub(*amount);
            ledger.credit(beneficiary, *amount);
            self.events.push(Event::Withdrawal {
                arbitration_id,
                round: *round,
                ruling,
                contributor: beneficiary,
                amount: *amount,
            });
        }
    }

    /// Total `beneficiary` can withdraw for `ruling` over every round, zero until the dispute is
    /// ruled.
    pub fn get_total_withdrawable_amount(
        &self,
        arbitration_id: ArbitrationId,
        beneficiary: Address,
        ruling: Ruling,
    ) -> u128 {
        match self.ruled_request(arbitration_id) {
            Ok((_, request)) => request
                .rounds
                .iter()
                .filter_map(|round| round.withdrawable(&beneficiary, ruling, request.ruling).ok())
                .fold(0u128, u128::saturating_add),
            Err(_) => 0,
        }
    }

    pub fn get_number_of_rounds(&self, arbitration_id: ArbitrationId) -> usize {
        self.created_request(arbitration_id)
            .map(|(_, request)| request.rounds.len())
            .unwrap_or(0)
    }

    fn round(&self, arbitration_id: ArbitrationId, round: usize) -> Option<Round> {
        self.created_request(arbitration_id)
            .ok()
            .and_then(|(_, request)| request.rounds.get(round).cloned())
    }

    pub fn get_round_info(&self, arbitration_id: ArbitrationId, round: usize) -> Option<RoundInfo> {
        self.round(arbitration_id, round).map(|round| RoundInfo {
            paid_fees: round
                .fully_funded_options
                .iter()
                .map(|ruling| (*ruling, round.paid(*ruling)))
                .collect(),
            fee_rewards: round.total_reward_pool,
        })
    }

    /// Amount paid for `ruling` in `round` and whether it is fully funded.
    pub fn get_funding_status(
        &self,
        arbitration_id: ArbitrationId,
        round: usize,
        ruling: Ruling,
    ) -> (u128, bool) {
        self.round(arbitration_id, round)
            .map(|round| (round.paid(ruling), round.has_paid(ruling)))
            .unwrap_or((0, false))
    }

    pub fn get_contributions_to_successful_fundings(
        &self,
        arbitration_id: ArbitrationId,
        round: usize,
        contributor: Address,
    ) -> Vec<(Ruling, u128)> {
        self.round(arbitration_id, round)
            .map(|round| round.contributions_to_successful_fundings(&contributor))
            .unwrap_or_default()
    }
}
