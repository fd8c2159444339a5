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

//! Interface of the question oracle living on the home chain and an in-memory oracle where
//! answers are backed by escalating bonds.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::chain::Context;
use crate::types::{keccak256, Address, Answer, QuestionId};

/// Errors raised by the oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The oracle is not the one the proxy is configured with.
    #[error("Unexpected oracle {0:#x}")]
    UnexpectedOracle(Address),
    #[error("Question {0:#x} does not exist")]
    UnknownQuestion(QuestionId),
    /// Only the arbitrator of the question can perform the call.
    #[error("The caller must be the arbitrator of the question")]
    NotArbitrator,
    #[error("Question must not be finalized")]
    Finalized,
    #[error("Question must be finalized")]
    NotFinalized,
    #[error("Question must not be pending arbitration")]
    PendingArbitration,
    #[error("Question must be pending arbitration")]
    NotPendingArbitration,
    /// The bond of the current best answer exceeds the limit set by the requester.
    #[error("Bond {bond} exceeds max previous {max_previous}")]
    BondTooHigh { bond: u128, max_previous: u128 },
    /// A new answer must at least double the previous bond.
    #[error("Bond must be at least {required}, got {provided}")]
    BondTooLow { required: u128, provided: u128 },
}

/// The oracle a [`HomeProxy`](crate::home::HomeProxy) is the arbitrator of.
///
/// State changing calls carry the [`Context`] of the caller, which must be the arbitrator of the
/// question.
pub trait Oracle {
    /// Address of the oracle.
    fn address(&self) -> Address;

    /// Whether the question has a final answer at time `now`.
    fn is_finalized(&self, question: QuestionId, now: u64) -> Result<bool, Error>;

    /// Whether the question is waiting for the arbitrator answer.
    fn is_pending_arbitration(&self, question: QuestionId) -> Result<bool, Error>;

    /// Bond backing the current best answer.
    fn best_bond(&self, question: QuestionId) -> Result<u128, Error>;

    /// Freeze the question while the arbitration is pending. Fails if the question is finalized,
    /// already pending arbitration, or if its bond exceeds `max_previous`.
    fn notify_of_arbitration_request(
        &mut self,
        ctx: Context,
        question: QuestionId,
        requester: Address,
        max_previous: u128,
    ) -> Result<(), Error>;

    /// Unfreeze the question, answering resumes.
    fn cancel_arbitration(&mut self, ctx: Context, question: QuestionId) -> Result<(), Error>;

    /// Finalize the question with the arbitrator `answer`. `answerer` is the account credited for
    /// the answer, the requester of the arbitration.
    fn submit_answer_by_arbitrator(
        &mut self,
        ctx: Context,
        question: QuestionId,
        answer: Answer,
        answerer: Address,
    ) -> Result<(), Error>;
}

/// A question as stored by [`Realitio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub arbitrator: Address,
    /// Seconds an answer must stay unchallenged to become final.
    pub timeout: u64,
    /// Time at which the best answer becomes final, zero while unanswered.
    pub finalize_ts: u64,
    pub best_answer: Answer,
    pub best_answerer: Address,
    pub bond: u128,
    pub is_pending_arbitration: bool,
    /// Requester of the pending arbitration.
    pub arbitration_requester: Option<Address>,
}

/// In-memory oracle: anyone answers by posting a bond at least twice the previous one, the last
/// answer becomes final after the question timeout unless an arbitration is requested.
#[derive(Debug, Clone, Default)]
pub struct Realitio {
    address: Address,
    questions: HashMap<QuestionId, Question>,
    nonce: u64,
}

impl Realitio {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Ask a new question arbitrated by `arbitrator`.
    pub fn ask_question(&mut self, arbitrator: Address, timeout: u64, content: &str) -> QuestionId {
        let mut preimage = content.as_bytes().to_vec();
        preimage.extend_from_slice(arbitrator.as_bytes());
        preimage.extend_from_slice(&self.nonce.to_le_bytes());
        self.nonce += 1;
        let id = QuestionId(keccak256(&preimage));
        self.questions.insert(
            id,
            Question {
                arbitrator,
                timeout,
                finalize_ts: 0,
                best_answer: Answer::zero(),
                best_answerer: Address::zero(),
                bond: 0,
                is_pending_arbitration: false,
                arbitration_requester: None,
            },
        );
        debug!(question = %id, "question asked");
        id
    }

    /// Answer `question` with a bond of `ctx.value`.
    pub fn submit_answer(
        &mut self,
        ctx: Context,
        question: QuestionId,
        answer: Answer,
    ) -> Result<(), Error> {
        let stored = self
            .questions
            .get_mut(&question)
            .ok_or(Error::UnknownQuestion(question))?;
        if stored.finalize_ts > 0 && stored.finalize_ts <= ctx.timestamp {
            return Err(Error::Finalized);
        }
        if stored.is_pending_arbitration {
            return Err(Error::PendingArbitration);
        }
        let required = stored.bond.saturating_mul(2).max(1);
        if ctx.value < required {
            return Err(Error::BondTooLow {
                required,
                provided: ctx.value,
            });
        }
        stored.best_answer = answer;
        stored.best_answerer = ctx.sender;
        stored.bond = ctx.value;
        stored.finalize_ts = ctx.timestamp.saturating_add(stored.timeout);
        Ok(())
    }

    pub fn question(&self, question: QuestionId) -> Result<&Question, Error> {
        self.questions
            .get(&question)
            .ok_or(Error::UnknownQuestion(question))
    }

    /// Final answer of `question`.
    pub fn result_for(&self, question: QuestionId, now: u64) -> Result<Answer, Error> {
        if !self.is_finalized(question, now)? {
            return Err(Error::NotFinalized);
        }
        Ok(self.question(question)?.best_answer)
    }

    fn arbitrated_question(
        &mut self,
        ctx: &Context,
        question: QuestionId,
    ) -> Result<&mut Question, Error> {
        let stored = self
            .questions
            .get_mut(&question)
            .ok_or(Error::UnknownQuestion(question))?;
        if stored.arbitrator != ctx.sender {
            return Err(Error::NotArbitrator);
        }
        Ok(stored)
    }
}

impl Oracle for Realitio {
    fn address(&self) -> Address {
        self.address
    }

    fn is_finalized(&self, question: QuestionId, now: u64) -> Result<bool, Error> {
        let stored = self.question(question)?;
        Ok(!stored.is_pending_arbitration && stored.finalize_ts > 0 && stored.finalize_ts <= now)
    }

    fn is_pending_arbitration(&self, question: QuestionId) -> Result<bool, Error> {
        Ok(self.question(question)?.is_pending_arbitration)
    }

    fn best_bond(&self, question: QuestionId) -> Result<u128, Error> {
        Ok(self.question(question)?.bond)
    }

    fn notify_of_arbitration_request(
        &mut self,
        ctx: Context,
        question: QuestionId,
        requester: Address,
        max_previous: u128,
    ) -> Result<(), Error> {
        if self.is_finalized(question, ctx.timestamp)? {
            return Err(Error::Finalized);
        }
        let stored = self.arbitrated_question(&ctx, question)?;
        if stored.is_pending_arbitration {
            return Err(Error::PendingArbitration);
        }
        if max_previous > 0 && stored.bond > max_previous {
            return Err(Error::BondTooHigh {
                bond: stored.bond,
                max_previous,
            });
        }
        stored.is_pending_arbitration = true;
        stored.arbitration_requester = Some(requester);
        debug!(%question, %requester, "arbitration pending");
        Ok(())
    }

    fn cancel_arbitration(&mut self, ctx: Context, question: QuestionId) -> Result<(), Error> {
        let stored = self.arbitrated_question(&ctx, question)?;
        if !stored.is_pending_arbitration {
            return Err(Error::NotPendingArbitration);
        }
        stored.is_pending_arbitration = false;
        stored.arbitration_requester = None;
        if stored.finalize_ts > 0 {
            stored.finalize_ts = ctx.timestamp.saturating_add(stored.timeout);
        }
        debug!(%question, "arbitration canceled");
        Ok(())
    }

    fn submit_answer_by_arbitrator(
        &mut self,
        ctx: Context,
        question: QuestionId,
        answer: Answer,
        answerer: Address,
    ) -> Result<(), Error> {
        let stored = self.arbitrated_question(&ctx, question)?;
        if !stored.is_pending_arbitration {
            return Err(Error::NotPendingArbitration);
        }
        stored.best_answer = answer;
        stored.best_answerer = answerer;
        stored.is_pending_arbitration = false;
        stored.arbitration_requester = None;
        stored.finalize_ts = ctx.timestamp.max(1);
        debug!(%question, "answered by arbitrator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Realitio, Address, QuestionId) {
        let arbitrator = Address::repeat_byte(0xab);
        let mut oracle = Realitio::new(Address::repeat_byte(0x0e));
        let question = oracle.ask_question(arbitrator, 86400, "Will it rain?");
        (oracle, arbitrator, question)
    }

    #[test]
    fn answers_need_doubling_bonds() {
        let (mut oracle, _, question) = setup();
        let alice = Context::new(Address::repeat_byte(0x0a)).at(10);
        oracle
            .submit_answer(alice.with_value(2000), question, Answer::zero())
            .unwrap();
        assert_eq!(
            oracle.submit_answer(alice.with_value(3999), question, Answer::invalid()),
            Err(Error::BondTooLow {
                required: 4000,
                provided: 3999
            })
        );
        assert_eq!(oracle.best_bond(question).unwrap(), 2000);
        assert!(!oracle.is_finalized(question, 86409).unwrap());
        assert!(oracle.is_finalized(question, 86410).unwrap());
        assert_eq!(oracle.result_for(question, 86410).unwrap(), Answer::zero());
    }

    #[test]
    fn arbitration_lifecycle() {
        let (mut oracle, arbitrator, question) = setup();
        let requester = Address::repeat_byte(0x0b);
        oracle
            .submit_answer(
                Context::new(requester).with_value(2000).at(1),
                question,
                Answer::zero(),
            )
            .unwrap();

        let proxy = Context::new(arbitrator).at(2);
        assert_eq!(
            oracle.notify_of_arbitration_request(Context::new(requester), question, requester, 0),
            Err(Error::NotArbitrator)
        );
        assert_eq!(
            oracle.notify_of_arbitration_request(proxy, question, requester, 1999),
            Err(Error::BondTooHigh {
                bond: 2000,
                max_previous: 1999
            })
        );
        oracle
            .notify_of_arbitration_request(proxy, question, requester, 2001)
            .unwrap();
        assert!(oracle.is_pending_arbitration(question).unwrap());
        assert_eq!(
            oracle.notify_of_arbitration_request(proxy, question, requester, 2001),
            Err(Error::PendingArbitration)
        );
        assert!(!oracle.is_finalized(question, u64::MAX).unwrap());

        oracle
            .submit_answer_by_arbitrator(proxy.at(50), question, Answer::invalid(), requester)
            .unwrap();
        assert!(oracle.is_finalized(question, 50).unwrap());
        assert_eq!(oracle.result_for(question, 50).unwrap(), Answer::invalid());
        assert_eq!(oracle.question(question).unwrap().best_answerer, requester);
    }

    #[test]
    fn cancel_resumes_answering() {
        let (mut oracle, arbitrator, question) = setup();
        let proxy = Context::new(arbitrator).at(5);
        let requester = Address::repeat_byte(0x0b);
        assert_eq!(
            oracle.cancel_arbitration(proxy, question),
            Err(Error::NotPendingArbitration)
        );
        oracle
            .notify_of_arbitration_request(proxy, question, requester, 0)
            .unwrap();
        oracle.cancel_arbitration(proxy, question).unwrap();
        assert!(!oracle.is_pending_arbitration(question).unwrap());
        oracle
            .submit_answer(Context::new(requester).with_value(1).at(6), question, Answer::zero())
            .unwrap();
    }
}
