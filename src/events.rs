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

//! Notifications emitted by the proxies. Each carries the keys and new values an off-chain
//! observer needs to follow the state of a request without reading the proxies.

use crate::governance::GovernanceField;
use crate::role::ChainRole;
use crate::types::{Address, Answer, ArbitrationId, DisputeId, QuestionId, Ruling};

/// Every notification of both proxies.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum Event {
    // Foreign proxy
    /// A deposit was escrowed and the request sent to the home proxy.
    ArbitrationRequested {
        question_id: QuestionId,
        requester: Address,
        max_previous: u128,
    },
    /// The dispute was created in the court.
    ArbitrationCreated {
        question_id: QuestionId,
        requester: Address,
        dispute_id: DisputeId,
    },
    /// Links a court dispute to the meta-evidence and the evidence group of the arbitration.
    Dispute {
        arbitrator: Address,
        dispute_id: DisputeId,
        meta_evidence_id: u64,
        evidence_group_id: ArbitrationId,
    },
    /// The home proxy canceled the request, the deposit was refunded.
    ArbitrationCanceled {
        question_id: QuestionId,
        requester: Address,
    },
    /// The dispute could not be created, the deposit stays escrowed until the failure is relayed.
    ArbitrationFailed {
        question_id: QuestionId,
        requester: Address,
    },
    /// A contribution to the appeal fees of `ruling`.
    AppealContribution {
        arbitration_id: ArbitrationId,
        ruling: Ruling,
        contributor: Address,
        amount: u128,
    },
    /// The appeal fees of `ruling` are fully paid for the current round.
    HasPaidAppealFee {
        arbitration_id: ArbitrationId,
        ruling: Ruling,
    },
    /// Two options were funded, the court was appealed and a new round opened.
    RulingAppealed {
        arbitration_id: ArbitrationId,
        dispute_id: DisputeId,
        round: usize,
    },
    /// The court ruled while the appeal funding of the last round was still open.
    ProvisionalRuling {
        dispute_id: DisputeId,
        ruling: Ruling,
    },
    /// Final ruling, relayed to the home proxy.
    Ruling {
        arbitrator: Address,
        dispute_id: DisputeId,
        ruling: Ruling,
    },
    /// Fees and rewards paid out to a contributor.
    Withdrawal {
        arbitration_id: ArbitrationId,
        round: usize,
        ruling: Ruling,
        contributor: Address,
        amount: u128,
    },
    /// Evidence submitted for the arbitration.
    Evidence {
        arbitrator: Address,
        evidence_group_id: ArbitrationId,
        party: Address,
        evidence: String,
    },
    /// New meta-evidence used by the following disputes.
    MetaEvidence { id: u64, evidence: String },
    /// A governed field was overwritten.
    GovernanceChanged(GovernanceField),

    // Home proxy
    /// The oracle accepted the request, the acknowledgement awaits the relay step.
    RequestNotified {
        question_id: QuestionId,
        requester: Address,
        max_previous: u128,
    },
    /// The request was refused, the cancelation awaits the relay step.
    RequestRejected {
        question_id: QuestionId,
        requester: Address,
        max_previous: u128,
        reason: String,
    },
    /// The acknowledgement was handed to the bridge.
    RequestAcknowledged {
        question_id: QuestionId,
        requester: Address,
    },
    /// The cancelation was handed to the bridge.
    RequestCanceled {
        question_id: QuestionId,
        requester: Address,
    },
    /// The foreign proxy failed to create the dispute, the oracle resumes.
    ArbitrationFailureReceived {
        question_id: QuestionId,
        requester: Address,
    },
    /// The final answer was submitted to the oracle.
    ArbitratorAnswered { question_id: QuestionId, answer: Answer },
    /// The request reached its terminal status.
    ArbitrationFinished { question_id: QuestionId },
}

impl Event {
    /// The chain on which the event is emitted.
    pub fn chain(&self) -> ChainRole {
        match self {
            Self::RequestNotified { .. }
            | Self::RequestRejected { .. }
            | Self::RequestAcknowledged { .. }
            | Self::RequestCanceled { .. }
            | Self::ArbitrationFailureReceived { .. }
            | Self::ArbitratorAnswered { .. }
            | Self::ArbitrationFinished { .. } => ChainRole::Home,
            _ => ChainRole::Foreign,
        }
    }
}
