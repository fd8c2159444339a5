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

//! The proxy living on the home chain, registered as the arbitrator of the oracle questions.
//!
//! Incoming requests are decided immediately against the oracle, the outcome is only sent back
//! by a separate relay step anyone can trigger:
//!
//! ```text
//! None --request, oracle accepts--> AwaitingAcknowledgement --handle_notified_request--> Acknowledged
//! None --request, oracle refuses--> Rejected --handle_rejected_request--> None
//! Acknowledged --failure--> None
//! Acknowledged --answer--> Finished
//! ```

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::chain::Context;
use crate::config::HomeProxyConfig;
use crate::consensus;
use crate::events::Event;
use crate::message::BridgeMessage;
use crate::messenger::{MessageHandler, Messenger};
use crate::oracle::{self, Oracle};
use crate::types::{Address, Answer, ChainId, QuestionId};
use crate::{AccessError, Error, Res, StateError};

/// Status of an arbitration request on the home chain.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[display(Debug)]
pub enum Status {
    None,
    /// Refused, the cancelation awaits the relay step.
    Rejected,
    /// Accepted by the oracle, the acknowledgement awaits the relay step.
    AwaitingAcknowledgement,
    Acknowledged,
    Finished,
}

impl Status {
    /// Numeric code of the status, as exposed to off-chain observers.
    pub fn code(&self) -> u8 {
        match self {
            Status::None => 0,
            Status::Rejected => 1,
            Status::AwaitingAcknowledgement => 2,
            Status::Acknowledged => 3,
            Status::Finished => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::None => "None",
            Status::Rejected => "Rejected",
            Status::AwaitingAcknowledgement => "AwaitingAcknowledgement",
            Status::Acknowledged => "Acknowledged",
            Status::Finished => "Finished",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::None
    }
}

/// An arbitration request, keyed by question and requester.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeRequest {
    pub status: Status,
    /// Final answer, set once `Finished`.
    pub answer: Answer,
}

/// State machine of the home side of the bridge.
#[derive(Debug, Clone)]
pub struct HomeProxy {
    address: Address,
    config: HomeProxyConfig,
    requests: HashMap<(QuestionId, Address), HomeRequest>,
    question_id_to_requester: HashMap<QuestionId, Address>,
    events: Vec<Event>,
}

impl HomeProxy {
    pub fn new(address: Address, config: HomeProxyConfig) -> Self {
        Self {
            address,
            config,
            requests: HashMap::new(),
            question_id_to_requester: HashMap::new(),
            events: vec![],
        }
    }

    fn only_bridge(&self, ctx: &Context) -> Res<()> {
        if ctx.sender != self.config.messenger || ctx.origin != Some(self.config.foreign_proxy) {
            return Err(AccessError::NotBridge.into());
        }
        Ok(())
    }

    fn check_oracle<O: Oracle>(&self, oracle: &O) -> Res<()> {
        if oracle.address() != self.config.oracle {
            return Err(oracle::Error::UnexpectedOracle(oracle.address()).into());
        }
        Ok(())
    }

    fn expect_status(
        &self,
        question_id: QuestionId,
        requester: Address,
        expected: Status,
    ) -> Res<()> {
        let found = self.status(question_id, requester);
        if found != expected {
            return Err(StateError::InvalidStatusForOperation {
                expected: expected.as_str(),
                found: found.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Why the oracle cannot take the request, if it cannot.
    fn rejection_reason<O: Oracle>(
        &self,
        ctx: &Context,
        question_id: QuestionId,
        max_previous: u128,
        oracle: &O,
    ) -> Result<Option<String>, oracle::Error> {
        if oracle.is_finalized(question_id, ctx.timestamp)? {
            return Ok(Some(oracle::Error::Finalized.to_string()));
        }
        if oracle.is_pending_arbitration(question_id)? {
            return Ok(Some(oracle::Error::PendingArbitration.to_string()));
        }
        let bond = oracle.best_bond(question_id)?;
        if bond > max_previous {
            return Ok(Some(
                oracle::Error::BondTooHigh { bond, max_previous }.to_string(),
            ));
        }
        Ok(None)
    }

    /// A request arrived from the foreign proxy. The oracle is notified if the question can be
    /// arbitrated, otherwise the request is rejected; either way the decision is only stored
    /// and waits for the relay step.
    pub fn receive_arbitration_request<O: Oracle>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        requester: Address,
        max_previous: u128,
        oracle: &mut O,
    ) -> Res<()> {
        self.only_bridge(&ctx)?;
        self.expect_status(question_id, requester, Status::None)?;
        self.check_oracle(oracle)?;

        let reason = match self.rejection_reason(&ctx, question_id, max_previous, oracle) {
            Ok(None) => {
                let arbitrator = Context::new(self.address).at(ctx.timestamp);
                oracle
                    .notify_of_arbitration_request(arbitrator, question_id, requester, max_previous)
                    .err()
                    .map(|e| e.to_string())
            }
            Ok(Some(reason)) => Some(reason),
            Err(e) => Some(e.to_string()),
        };

        let request = self.requests.entry((question_id, requester)).or_default();
        match reason {
            Some(reason) => {
                request.status = Status::Rejected;
                warn!(%question_id, %requester, %reason, "arbitration request rejected");
                self.events.push(Event::RequestRejected {
                    question_id,
                    requester,
                    max_previous,
                    reason,
                });
            }
            None => {
                request.status = Status::AwaitingAcknowledgement;
                self.question_id_to_requester.insert(question_id, requester);
                info!(%question_id, %requester, "arbitration request notified");
                self.events.push(Event::RequestNotified {
                    question_id,
                    requester,
                    max_previous,
                });
            }
        }
        Ok(())
    }

    /// Relay step of an accepted request: send the acknowledgement. Anyone can trigger it. A
    /// failed send leaves the request untouched so the relay can be retried.
    pub fn handle_notified_request<M: Messenger>(
        &mut self,
        _ctx: Context,
        question_id: QuestionId,
        requester: Address,
        messenger: &mut M,
    ) -> Res<()> {
        self.expect_status(question_id, requester, Status::AwaitingAcknowledgement)?;
        let message = BridgeMessage::ArbitrationAcknowledgement {
            question_id,
            requester,
        };
        messenger
            .send_message(self.address, self.config.foreign_proxy, &message, 0)
            .map_err(Error::BridgeDeliveryFailed)?;

        self.requests
            .entry((question_id, requester))
            .or_default()
            .status = Status::Acknowledged;
        info!(%question_id, %requester, "acknowledgement relayed");
        self.events.push(Event::RequestAcknowledged {
            question_id,
            requester,
        });
        Ok(())
    }

    /// Relay step of a rejected request: send the cancelation and forget the request. Anyone can
    /// trigger it. A failed send leaves the request untouched so the relay can be retried.
    pub fn handle_rejected_request<M: Messenger>(
        &mut self,
        _ctx: Context,
        question_id: QuestionId,
        requester: Address,
        messenger: &mut M,
    ) -> Res<()> {
        self.expect_status(question_id, requester, Status::Rejected)?;
        let message = BridgeMessage::ArbitrationCancelation {
            question_id,
            requester,
        };
        messenger
            .send_message(self.address, self.config.foreign_proxy, &message, 0)
            .map_err(Error::BridgeDeliveryFailed)?;

        self.requests.remove(&(question_id, requester));
        info!(%question_id, %requester, "cancelation relayed");
        self.events.push(Event::RequestCanceled {
            question_id,
            requester,
        });
        Ok(())
    }

    /// The foreign proxy could not create the dispute: the oracle leaves arbitration and the
    /// request is forgotten.
    pub fn receive_arbitration_failure<O: Oracle>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        requester: Address,
        oracle: &mut O,
    ) -> Res<()> {
        self.only_bridge(&ctx)?;
        self.expect_status(question_id, requester, Status::Acknowledged)?;
        self.check_oracle(oracle)?;
        oracle.cancel_arbitration(Context::new(self.address).at(ctx.timestamp), question_id)?;

        self.requests.remove(&(question_id, requester));
        self.question_id_to_requester.remove(&question_id);
        warn!(%question_id, %requester, "arbitration failed on the foreign chain");
        self.events.push(Event::ArbitrationFailureReceived {
            question_id,
            requester,
        });
        Ok(())
    }

    /// The final answer arrived: hand it to the oracle on behalf of the requester.
    pub fn receive_arbitration_answer<O: Oracle>(
        &mut self,
        ctx: Context,
        question_id: QuestionId,
        answer: Answer,
        oracle: &mut O,
    ) -> Res<()> {
        self.only_bridge(&ctx)?;
        let requester = self
            .question_id_to_requester
            .get(&question_id)
            .copied()
            .ok_or_else(|| StateError::InvalidStatusForOperation {
                expected: Status::Acknowledged.as_str(),
                found: Status::None.to_string(),
            })?;
        self.expect_status(question_id, requester, Status::Acknowledged)?;
        self.check_oracle(oracle)?;
        oracle.submit_answer_by_arbitrator(
            Context::new(self.address).at(ctx.timestamp),
            question_id,
            answer,
            requester,
        )?;

        let request = self.requests.entry((question_id, requester)).or_default();
        request.status = Status::Finished;
        request.answer = answer;
        info!(%question_id, %requester, "arbitration answer submitted");
        self.events.push(Event::ArbitratorAnswered {
            question_id,
            answer,
        });
        self.events.push(Event::ArbitrationFinished { question_id });
        Ok(())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &HomeProxyConfig {
        &self.config
    }

    pub fn metadata(&self) -> &str {
        &self.config.metadata
    }

    pub fn foreign_chain_id(&self) -> ChainId {
        self.config.foreign_chain_id
    }

    pub fn foreign_proxy(&self) -> Address {
        self.config.foreign_proxy
    }

    pub fn oracle(&self) -> Address {
        self.config.oracle
    }

    pub fn messenger(&self) -> Address {
        self.config.messenger
    }

    pub fn request(&self, question_id: QuestionId, requester: Address) -> Option<&HomeRequest> {
        self.requests.get(&(question_id, requester))
    }

    /// Status of the request, `None` when unknown.
    pub fn status(&self, question_id: QuestionId, requester: Address) -> Status {
        self.request(question_id, requester)
            .map(|request| request.status)
            .unwrap_or_default()
    }

    /// Final answer of the request, zero until `Finished`.
    pub fn answer(&self, question_id: QuestionId, requester: Address) -> Answer {
        self.request(question_id, requester)
            .map(|request| request.answer)
            .unwrap_or_default()
    }

    pub fn question_id_to_requester(&self, question_id: QuestionId) -> Option<Address> {
        self.question_id_to_requester.get(&question_id).copied()
    }

    /// Notifications emitted since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

/// Entry point of the messenger on the home chain: routes the messages of the foreign proxy to
/// the [`HomeProxy`] along with the oracle.
pub struct Endpoint<'a, O> {
    pub proxy: &'a mut HomeProxy,
    pub oracle: &'a mut O,
}

impl<'a, O> MessageHandler for Endpoint<'a, O>
where
    O: Oracle,
{
    fn address(&self) -> Address {
        self.proxy.address()
    }

    fn handle_message(&mut self, ctx: Context, message: BridgeMessage) -> Res<()> {
        debug!(%message, "home proxy handling message");
        match message {
            BridgeMessage::ArbitrationRequest {
                question_id,
                requester,
                max_previous,
            } => self.proxy.receive_arbitration_request(
                ctx,
                question_id,
                requester,
                max_previous,
                &mut *self.oracle,
            ),
            BridgeMessage::ArbitrationFailure {
                question_id,
                requester,
            } => self.proxy.receive_arbitration_failure(
                ctx,
                question_id,
                requester,
                &mut *self.oracle,
            ),
            BridgeMessage::ArbitrationAnswer {
                question_id,
                answer,
            } => self.proxy.receive_arbitration_answer(
                ctx,
                question_id,
                answer,
                &mut *self.oracle,
            ),
            _ => Err(consensus::Error::TypeMismatch.into()),
        }
    }
}
