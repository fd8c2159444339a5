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

//! The proxy living on the foreign chain, next to the arbitration court.
//!
//! ```text
//! None --request_arbitration--> Requested
//! Requested --acknowledgement--> Created    (dispute created, extra deposit refunded)
//! Requested --acknowledgement--> Failed     (deposit below cost, or court refused)
//! Requested --cancelation------> None       (deposit refunded)
//! Failed --relay_arbitration_failure--> None (failure sent, deposit refunded)
//! Created --appeal funded on two options--> Created (new round)
//! Created --rule--> Ruled                   (answer sent to the home proxy)
//! ```
//!
//! Every entry point performs all its fallible calls to collaborators before writing to the proxy
//! state, so an error always leaves the proxy untouched.

use std::collections::{HashMap, HashSet};

use primitive_types::U256;
use tracing::{debug, info, warn};

use crate::arbitrator::{self, Arbitrable, Arbitrator};
use crate::chain::{Context, Ledger};
use crate::config::{self, ForeignProxyConfig};
use crate::consensus;
use crate::events::Event;
use crate::governance::{GovernanceField, Multipliers};
use crate::message::BridgeMessage;
use crate::messenger::{MessageHandler, Messenger};
use crate::types::{
    Address, ArbitrationId, ChainId, DisputeId, QuestionId, Ruling,
    NUMBER_OF_CHOICES_FOR_ARBITRATOR,
};
use crate::{AccessError, FundingError, Res, StateError};

pub mod appeal;

pub use appeal::{Round, RoundInfo};

/// Status of an arbitration request on the foreign chain.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[display(Debug)]
pub enum Status {
    None,
    Requested,
    Created,
    Ruled,
    Failed,
}

impl Status {
    /// Numeric code of the status, as exposed to off-chain observers.
    pub fn code(&self) -> u8 {
        match self {
            Status::None => 0,
            Status::Requested => 1,
            Status::Created => 2,
            Status::Ruled => 3,
            Status::Failed => 4,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::None
    }
}

/// An arbitration request, keyed by arbitration identifier and requester.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbitrationRequest {
    pub status: Status,
    /// Value escrowed net of the surplus spent on the request message.
    pub deposit: u128,
    /// Court dispute, meaningful from `Created` on.
    pub dispute_id: DisputeId,
    /// Final ruling, meaningful once `Ruled`.
    pub ruling: Ruling,
    /// Court the dispute was created in, and the extra data used.
    pub arbitrator: Address,
    pub arbitrator_extra_data: Vec<u8>,
    /// Appeal funding rounds, one per ruling cycle of the court.
    pub rounds: Vec<Round>,
}

/// Back-reference from a court dispute to its arbitration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisputeDetails {
    pub arbitration_id: ArbitrationId,
    pub requester: Address,
}

/// State machine of the foreign side of the bridge.
#[derive(Debug, Clone)]
pub struct ForeignProxy {
    address: Address,
    config: ForeignProxyConfig,
    meta_evidence_updates: u64,
    requests: HashMap<(ArbitrationId, Address), ArbitrationRequest>,
    arbitration_id_to_requester: HashMap<ArbitrationId, Address>,
    arbitration_id_to_dispute_exists: HashSet<ArbitrationId>,
    external_id_to_local_id: HashMap<DisputeId, ArbitrationId>,
    dispute_details: HashMap<(Address, DisputeId), DisputeDetails>,
    balance: u128,
    events: Vec<Event>,
}

fn invalid_status(expected: &'static str, found: Status) -> StateError {
    StateError::InvalidStatusForOperation {
        expected,
        found: found.to_string(),
    }
}

impl ForeignProxy {
    /// Deploy the proxy at `address`. The initial meta-evidence is published.
    pub fn new(address: Address, config: ForeignProxyConfig) -> Self {
        let events = vec![Event::MetaEvidence {
            id: 0,
            evidence: config.meta_evidence.clone(),
        }];
        Self {
            address,
            config,
            meta_evidence_updates: 0,
            requests: HashMap::new(),
            arbitration_id_to_requester: HashMap::new(),
            arbitration_id_to_dispute_exists: HashSet::new(),
            external_id_to_local_id: HashMap::new(),
            dispute_details: HashMap::new(),
            balance: 0,
            events,
        }
    }

    fn only_governor(&self, ctx: &Context) -> Res<()> {
        if ctx.sender != self.config.governor {
            return Err(AccessError::NotGovernor.into());
        }
        Ok(())
    }

    fn only_bridge(&self, ctx: &Context) -> Res<()> {
        if ctx.sender != self.config.messenger || ctx.origin != Some(self.config.home_proxy) {
            return Err(AccessError::NotBridge.into());
        }
        Ok(())
    }

    fn check_court<A: Arbitrator>(expected: Address, arbitrator: &A) -> Res<()> {
        if arbitrator.address() != expected {
            return Err(arbitrator::Error::UnexpectedCourt(arbitrator.address()).into());
        }
        Ok(())
    }

    fn request(&self, arbitration_id: ArbitrationId, requester: Address) -> ArbitrationRequest {
        self.requests
            .get(&(arbitration_id, requester))
            .cloned()
            .unwrap_or_default()
    }

    /// Escrow `ctx.value` and ask the home proxy to notify the oracle. The value must cover the
    /// arbitration cost plus the surplus, the surplus pays for the request message.
    pub fn request_arbitration<A: Arbitrator, M: Messenger>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        max_previous: u128,
        arbitrator: &A,
        messenger: &mut M,
    ) -> Res<()> {
        let arbitration_id = ArbitrationId::from(question_id);
        if self.arbitration_id_to_dispute_exists.contains(&arbitration_id) {
            return Err(StateError::DisputeAlreadyCreated.into());
        }
        if self.request(arbitration_id, ctx.sender).status != Status::None {
            return Err(StateError::AlreadyRequested.into());
        }
        Self::check_court(self.config.arbitrator, arbitrator)?;

        let surplus = self.config.surplus;
        let required = arbitrator
            .arbitration_cost(&self.config.arbitrator_extra_data)
            .checked_add(surplus)
            .ok_or(FundingError::Overflow)?;
        if ctx.value < required {
            return Err(FundingError::InsufficientDeposit {
                required,
                provided: ctx.value,
            }
            .into());
        }

        let message = BridgeMessage::ArbitrationRequest {
            question_id,
            requester: ctx.sender,
            max_previous,
        };
        messenger.send_message(self.address, self.config.home_proxy, &message, surplus)?;

        let deposit = ctx.value - surplus;
        let request = self
            .requests
            .entry((arbitration_id, ctx.sender))
            .or_default();
        request.status = Status::Requested;
        request.deposit = deposit;
        self.balance = self.balance.saturating_add(deposit);
        info!(%question_id, requester = %ctx.sender, deposit, "arbitration requested");
        self.events.push(Event::ArbitrationRequested {
            question_id,
            requester: ctx.sender,
            max_previous,
        });
        Ok(())
    }

    /// The home proxy acknowledged the request: create the dispute with the escrowed deposit. If
    /// the deposit no longer covers the cost or the court refuses the dispute, the request is
    /// marked `Failed` and the deposit stays escrowed until the failure is relayed.
    pub fn receive_arbitration_acknowledgement<A: Arbitrator, L: Ledger>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        requester: Address,
        arbitrator: &mut A,
        ledger: &mut L,
    ) -> Res<()> {
        self.only_bridge(&ctx)?;
        let arbitration_id = ArbitrationId::from(question_id);
        let request = self.request(arbitration_id, requester);
        if request.status != Status::Requested {
            return Err(StateError::DisputeAlreadyCreated.into());
        }
        Self::check_court(self.config.arbitrator, arbitrator)?;

        let extra_data = self.config.arbitrator_extra_data.clone();
        let cost = arbitrator.arbitration_cost(&extra_data);
        let created = if request.deposit >= cost {
            let funding = Context::new(self.address)
                .with_value(cost)
                .at(ctx.timestamp);
            match arbitrator.create_dispute(funding, NUMBER_OF_CHOICES_FOR_ARBITRATOR, &extra_data)
            {
                Ok(dispute_id) => Some(dispute_id),
                Err(e) => {
                    warn!(%question_id, %requester, error = %e, "dispute creation failed");
                    None
                }
            }
        } else {
            warn!(%question_id, %requester, deposit = request.deposit, cost, "deposit below arbitration cost");
            None
        };

        let stored = self
            .requests
            .entry((arbitration_id, requester))
            .or_default();
        let dispute_id = match created {
            Some(dispute_id) => dispute_id,
            None => {
                stored.status = Status::Failed;
                self.events.push(Event::ArbitrationFailed {
                    question_id,
                    requester,
                });
                return Ok(());
            }
        };

        let remainder = stored.deposit - cost;
        stored.status = Status::Created;
        stored.deposit = 0;
        stored.dispute_id = dispute_id;
        stored.arbitrator = self.config.arbitrator;
        stored.arbitrator_extra_data = extra_data;
        stored.rounds.push(Round::default());

        self.dispute_details.insert(
            (self.config.arbitrator, dispute_id),
            DisputeDetails {
                arbitration_id,
                requester,
            },
        );
        self.external_id_to_local_id.insert(dispute_id, arbitration_id);
        self.arbitration_id_to_dispute_exists.insert(arbitration_id);
        self.arbitration_id_to_requester.insert(arbitration_id, requester);
        self.balance = self.balance.saturating_sub(cost + remainder);
        if remainder > 0 {
            ledger.credit(requester, remainder);
        }

        info!(%question_id, %requester, %dispute_id, "dispute created");
        self.events.push(Event::ArbitrationCreated {
            question_id,
            requester,
            dispute_id,
        });
        self.events.push(Event::Dispute {
            arbitrator: self.config.arbitrator,
            dispute_id,
            meta_evidence_id: self.meta_evidence_updates,
            evidence_group_id: arbitration_id,
        });
        Ok(())
    }

    /// The home proxy canceled the request: refund the deposit and forget the request.
    pub fn receive_arbitration_cancelation<L: Ledger>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        requester: Address,
        ledger: &mut L,
    ) -> Res<()> {
        self.only_bridge(&ctx)?;
        let arbitration_id = ArbitrationId::from(question_id);
        let request = self.request(arbitration_id, requester);
        if request.status != Status::Requested {
            return Err(invalid_status("Requested", request.status).into());
        }

        self.requests.remove(&(arbitration_id, requester));
        self.balance = self.balance.saturating_sub(request.deposit);
        ledger.credit(requester, request.deposit);
        info!(%question_id, %requester, refund = request.deposit, "arbitration canceled");
        self.events.push(Event::ArbitrationCanceled {
            question_id,
            requester,
        });
        Ok(())
    }

    /// Tell the home proxy the dispute could not be created, then refund the deposit. Anyone can
    /// trigger it.
    pub fn relay_arbitration_failure<M: Messenger, L: Ledger>(
        &mut self,
        _ctx: Context,
        question_id: QuestionId,
        requester: Address,
        messenger: &mut M,
        ledger: &mut L,
    ) -> Res<()> {
        let arbitration_id = ArbitrationId::from(question_id);
        let request = self.request(arbitration_id, requester);
        if request.status != Status::Failed {
            return Err(invalid_status("Failed", request.status).into());
        }

        let message = BridgeMessage::ArbitrationFailure {
            question_id,
            requester,
        };
        messenger.send_message(self.address, self.config.home_proxy, &message, 0)?;

        self.requests.remove(&(arbitration_id, requester));
        self.balance = self.balance.saturating_sub(request.deposit);
        ledger.credit(requester, request.deposit);
        info!(%question_id, %requester, refund = request.deposit, "arbitration failure relayed");
        self.events.push(Event::ArbitrationCanceled {
            question_id,
            requester,
        });
        Ok(())
    }

    /// Ruling callback of the court.
    ///
    /// If the last round still has appeal funding in progress at `ctx.timestamp` the ruling is
    /// only recorded as provisional. Otherwise it becomes final: an option that was the only one
    /// fully funded in the last round wins over the court ruling, the request is `Ruled` and the
    /// answer is sent to the home proxy.
    pub fn rule<M: Messenger>(
        &mut self,
        ctx: Context,
        dispute_id: DisputeId,
        ruling: Ruling,
        messenger: &mut M,
    ) -> Res<()> {
        // the court that created the dispute rules on it, even after a court change
        let details = *self
            .dispute_details
            .get(&(ctx.sender, dispute_id))
            .ok_or(AccessError::NotCourt)?;
        let request = self.request(details.arbitration_id, details.requester);
        if ctx.sender != request.arbitrator {
            return Err(AccessError::NotCourt.into());
        }
        if request.status != Status::Created {
            return Err(invalid_status("Created", request.status).into());
        }

        let last = request.rounds.last().cloned().unwrap_or_default();
        if last.has_contributions() && ctx.timestamp < last.funding_deadline() {
            debug!(%dispute_id, %ruling, "provisional ruling, appeal funding still open");
            self.events.push(Event::ProvisionalRuling { dispute_id, ruling });
            return Ok(());
        }

        let final_ruling = match last.fully_funded_options() {
            [only] => *only,
            _ => ruling,
        };
        let question_id = QuestionId::from(details.arbitration_id);
        let answer = final_ruling.to_answer();
        let message = BridgeMessage::ArbitrationAnswer {
            question_id,
            answer,
        };
        messenger.send_message(self.address, self.config.home_proxy, &message, 0)?;

        let stored = self
            .requests
            .entry((details.arbitration_id, details.requester))
            .or_default();
        stored.status = Status::Ruled;
        stored.ruling = final_ruling;
        info!(%question_id, %dispute_id, ruling = %final_ruling, "ruling relayed");
        self.events.push(Event::Ruling {
            arbitrator: ctx.sender,
            dispute_id,
            ruling: final_ruling,
        });
        Ok(())
    }

    /// Publish evidence for the arbitration. Attributed to the court of the dispute if one
    /// exists, to the current court otherwise.
    pub fn submit_evidence(
        &mut self,
        ctx: Context,
        arbitration_id: ArbitrationId,
        evidence: String,
    ) -> Res<()> {
        let arbitrator = self
            .arbitration_id_to_requester
            .get(&arbitration_id)
            .and_then(|requester| self.requests.get(&(arbitration_id, *requester)))
            .filter(|request| request.status != Status::None)
            .map(|request| request.arbitrator)
            .unwrap_or(self.config.arbitrator);
        self.events.push(Event::Evidence {
            arbitrator,
            evidence_group_id: arbitration_id,
            party: ctx.sender,
            evidence,
        });
        Ok(())
    }

    // Governance

    fn governance_changed(&mut self, field: GovernanceField) {
        info!(%field, "governance field changed");
        self.events.push(Event::GovernanceChanged(field));
    }

    /// Transfer the governance. The former governor loses its rights immediately.
    pub fn change_governor(&mut self, ctx: Context, governor: Address) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.governor = governor;
        self.governance_changed(GovernanceField::Governor(governor));
        Ok(())
    }

    /// Change the court and its extra data. Disputes already created keep their court.
    pub fn change_arbitrator(
        &mut self,
        ctx: Context,
        arbitrator: Address,
        extra_data: Vec<u8>,
    ) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.arbitrator = arbitrator;
        self.config.arbitrator_extra_data = extra_data.clone();
        self.governance_changed(GovernanceField::Arbitrator {
            arbitrator,
            extra_data,
        });
        Ok(())
    }

    /// Publish new meta-evidence, used by the disputes created from now on.
    pub fn change_meta_evidence(&mut self, ctx: Context, evidence: String) -> Res<()> {
        self.only_governor(&ctx)?;
        self.meta_evidence_updates += 1;
        self.config.meta_evidence = evidence.clone();
        self.events.push(Event::MetaEvidence {
            id: self.meta_evidence_updates,
            evidence: evidence.clone(),
        });
        self.governance_changed(GovernanceField::MetaEvidence {
            id: self.meta_evidence_updates,
            evidence,
        });
        Ok(())
    }

    pub fn change_surplus(&mut self, ctx: Context, surplus: u128) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.surplus = surplus;
        self.governance_changed(GovernanceField::Surplus(surplus));
        Ok(())
    }

    pub fn change_home_proxy(&mut self, ctx: Context, home_proxy: Address) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.home_proxy = home_proxy;
        self.governance_changed(GovernanceField::HomeProxy(home_proxy));
        Ok(())
    }

    pub fn change_messenger(&mut self, ctx: Context, messenger: Address) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.messenger = messenger;
        self.governance_changed(GovernanceField::Messenger(messenger));
        Ok(())
    }

    pub fn change_winner_multiplier(&mut self, ctx: Context, multiplier: u64) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.multipliers.winner = multiplier;
        self.governance_changed(GovernanceField::WinnerMultiplier(multiplier));
        Ok(())
    }

    pub fn change_loser_multiplier(&mut self, ctx: Context, multiplier: u64) -> Res<()> {
        self.only_governor(&ctx)?;
        self.config.multipliers.loser = multiplier;
        self.governance_changed(GovernanceField::LoserMultiplier(multiplier));
        Ok(())
    }

    pub fn change_loser_appeal_period_multiplier(
        &mut self,
        ctx: Context,
        multiplier: u64,
    ) -> Res<()> {
        self.only_governor(&ctx)?;
        config::check_loser_appeal_period(multiplier)?;
        self.config.multipliers.loser_appeal_period = multiplier;
        self.governance_changed(GovernanceField::LoserAppealPeriodMultiplier(multiplier));
        Ok(())
    }

    // Read-only accessors

    pub fn address(&self) -> Address {
        self.address
    }

    /// The governed configuration record.
    pub fn config(&self) -> &ForeignProxyConfig {
        &self.config
    }

    pub fn governor(&self) -> Address {
        self.config.governor
    }

    pub fn arbitrator(&self) -> Address {
        self.config.arbitrator
    }

    pub fn arbitrator_extra_data(&self) -> &[u8] {
        &self.config.arbitrator_extra_data
    }

    pub fn messenger(&self) -> Address {
        self.config.messenger
    }

    pub fn home_proxy(&self) -> Address {
        self.config.home_proxy
    }

    pub fn home_chain_id(&self) -> ChainId {
        self.config.home_chain_id
    }

    pub fn surplus_amount(&self) -> u128 {
        self.config.surplus
    }

    pub fn meta_evidence_updates(&self) -> u64 {
        self.meta_evidence_updates
    }

    pub fn multipliers(&self) -> Multipliers {
        self.config.multipliers
    }

    /// Value currently held by the proxy: escrowed deposits and appeal fees not yet spent.
    pub fn balance(&self) -> u128 {
        self.balance
    }

    /// Number of ruling options of the disputes, refusal to arbitrate excluded.
    pub fn number_of_ruling_options(&self) -> U256 {
        NUMBER_OF_CHOICES_FOR_ARBITRATOR
    }

    /// Value to send with [`Self::request_arbitration`].
    pub fn get_dispute_fee<A: Arbitrator>(&self, arbitrator: &A) -> Res<u128> {
        Self::check_court(self.config.arbitrator, arbitrator)?;
        Ok(arbitrator
            .arbitration_cost(&self.config.arbitrator_extra_data)
            .checked_add(self.config.surplus)
            .ok_or(FundingError::Overflow)?)
    }

    pub fn arbitration_request(
        &self,
        arbitration_id: ArbitrationId,
        requester: Address,
    ) -> Option<&ArbitrationRequest> {
        self.requests.get(&(arbitration_id, requester))
    }

    /// Status of the request, `None` when unknown.
    pub fn status(&self, arbitration_id: ArbitrationId, requester: Address) -> Status {
        self.arbitration_request(arbitration_id, requester)
            .map(|request| request.status)
            .unwrap_or_default()
    }

    pub fn deposit(&self, arbitration_id: ArbitrationId, requester: Address) -> u128 {
        self.arbitration_request(arbitration_id, requester)
            .map(|request| request.deposit)
            .unwrap_or(0)
    }

    pub fn dispute_id(
        &self,
        arbitration_id: ArbitrationId,
        requester: Address,
    ) -> Option<DisputeId> {
        self.arbitration_request(arbitration_id, requester)
            .filter(|request| matches!(request.status, Status::Created | Status::Ruled))
            .map(|request| request.dispute_id)
    }

    pub fn arbitration_id_to_requester(&self, arbitration_id: ArbitrationId) -> Option<Address> {
        self.arbitration_id_to_requester.get(&arbitration_id).copied()
    }

    pub fn arbitration_id_to_dispute_exists(&self, arbitration_id: ArbitrationId) -> bool {
        self.arbitration_id_to_dispute_exists
            .contains(&arbitration_id)
    }

    /// Arbitration of a court dispute.
    pub fn external_id_to_local_id(&self, dispute_id: DisputeId) -> Option<ArbitrationId> {
        self.external_id_to_local_id.get(&dispute_id).copied()
    }

    pub fn arbitrator_dispute_id_to_dispute_details(
        &self,
        arbitrator: Address,
        dispute_id: DisputeId,
    ) -> Option<DisputeDetails> {
        self.dispute_details.get(&(arbitrator, dispute_id)).copied()
    }

    /// Notifications emitted since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

/// Entry point of the messenger on the foreign chain: routes the messages of the home proxy to
/// the [`ForeignProxy`] along with the collaborators they need.
pub struct Endpoint<'a, A, L> {
    pub proxy: &'a mut ForeignProxy,
    pub arbitrator: &'a mut A,
    pub ledger: &'a mut L,
}

impl<'a, A, L> MessageHandler for Endpoint<'a, A, L>
where
    A: Arbitrator,
    L: Ledger,
{
    fn address(&self) -> Address {
        self.proxy.address()
    }

    fn handle_message(&mut self, ctx: Context, message: BridgeMessage) -> Res<()> {
        match message {
            BridgeMessage::ArbitrationAcknowledgement {
                question_id,
                requester,
            } => self.proxy.receive_arbitration_acknowledgement(
                ctx,
                question_id,
                requester,
                &mut *self.arbitrator,
                &mut *self.ledger,
            ),
            BridgeMessage::ArbitrationCancelation {
                question_id,
                requester,
            } => self
                .proxy
                .receive_arbitration_cancelation(ctx, question_id, requester, &mut *self.ledger),
            _ => Err(consensus::Error::TypeMismatch.into()),
        }
    }
}

/// Receives the rulings of the court on behalf of the [`ForeignProxy`].
pub struct RulingReceiver<'a, M> {
    pub proxy: &'a mut ForeignProxy,
    pub messenger: &'a mut M,
}

impl<'a, M> Arbitrable for RulingReceiver<'a, M>
where
    M: Messenger,
{
    fn rule(&mut self, ctx: Context, dispute_id: DisputeId, ruling: Ruling) -> Res<()> {
        self.proxy.rule(ctx, dispute_id, ruling, &mut *self.messenger)
    }
}
