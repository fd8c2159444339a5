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

#![allow(dead_code)]

use arbitration_bridge::arbitrator::{self, AutoAppealableArbitrator};
use arbitration_bridge::chain::{Balances, Context};
use arbitration_bridge::config::{ForeignProxyConfig, HomeProxyConfig, ProxyConfig};
use arbitration_bridge::foreign::{self, ForeignProxy};
use arbitration_bridge::home::{self, HomeProxy};
use arbitration_bridge::messenger::{self, LocalMessenger};
use arbitration_bridge::oracle::Realitio;
use arbitration_bridge::role::ChainRole;
use arbitration_bridge::types::{Address, Answer, ArbitrationId, DisputeId, QuestionId};
use arbitration_bridge::Res;

pub const GOVERNOR: Address = Address([0x11; 20]);
pub const COURT: Address = Address([0x22; 20]);
pub const FOREIGN_MESSENGER: Address = Address([0x33; 20]);
pub const HOME_PROXY: Address = Address([0x44; 20]);
pub const ORACLE: Address = Address([0x55; 20]);
pub const HOME_MESSENGER: Address = Address([0x66; 20]);
pub const FOREIGN_PROXY: Address = Address([0x77; 20]);
pub const COURT_OWNER: Address = Address([0x0c; 20]);
pub const REQUESTER: Address = Address([0xa1; 20]);
pub const ANSWERER: Address = Address([0xb0; 20]);
pub const CROWDFUNDER1: Address = Address([0xc1; 20]);
pub const CROWDFUNDER2: Address = Address([0xc2; 20]);
pub const OTHER: Address = Address([0xee; 20]);

pub const ARBITRATION_COST: u128 = 1000;
pub const SURPLUS: u128 = 20000;
/// Value to send along a request: arbitration cost plus surplus.
pub const DISPUTE_FEE: u128 = ARBITRATION_COST + SURPLUS;
pub const APPEAL_COST: u128 = 5000;
pub const APPEAL_TIMEOUT: u64 = 180;
pub const QUESTION_TIMEOUT: u64 = 180;
pub const BOND: u128 = 2000;
pub const MAX_PREVIOUS: u128 = 2001;

const FOREIGN_YAML: &str = r#"
governor: "0x1111111111111111111111111111111111111111"
arbitrator: "0x2222222222222222222222222222222222222222"
arbitrator_extra_data: "0x85"
messenger: "0x3333333333333333333333333333333333333333"
home_proxy: "0x4444444444444444444444444444444444444444"
home_chain_id: 10200
surplus: "20000"
meta_evidence: "ipfs/X"
multipliers:
  winner: 3000
  loser: 7000
  loser_appeal_period: 5000
"#;

const HOME_YAML: &str = r#"
oracle: "0x5555555555555555555555555555555555555555"
messenger: "0x6666666666666666666666666666666666666666"
foreign_proxy: "0x7777777777777777777777777777777777777777"
foreign_chain_id: 5
metadata: "ipfs/Y"
"#;

lazy_static::lazy_static! {
    pub static ref FOREIGN_CONFIG: ForeignProxyConfig =
        ForeignProxyConfig::from_yaml_str(FOREIGN_YAML).unwrap();
    pub static ref HOME_CONFIG: HomeProxyConfig =
        HomeProxyConfig::from_yaml_str(HOME_YAML).unwrap();
}

/// Both chains with their proxies and collaborators, and a question answered with [`BOND`].
pub struct Bridge {
    pub foreign: ForeignProxy,
    pub home: HomeProxy,
    pub foreign_messenger: LocalMessenger,
    pub home_messenger: LocalMessenger,
    pub court: AutoAppealableArbitrator,
    pub oracle: Realitio,
    /// Payouts on the foreign chain.
    pub ledger: Balances,
    pub question_id: QuestionId,
}

pub fn setup() -> Bridge {
    let mut foreign_messenger =
        LocalMessenger::new(ChainRole::Foreign, FOREIGN_MESSENGER, HOME_MESSENGER);
    foreign_messenger.register_route(FOREIGN_PROXY, HOME_PROXY);
    let mut home_messenger =
        LocalMessenger::new(ChainRole::Home, HOME_MESSENGER, FOREIGN_MESSENGER);
    home_messenger.register_route(HOME_PROXY, FOREIGN_PROXY);

    let mut oracle = Realitio::new(ORACLE);
    let question_id =
        oracle.ask_question(HOME_PROXY, QUESTION_TIMEOUT, "Will it rain tomorrow?");
    oracle
        .submit_answer(
            Context::new(ANSWERER).with_value(BOND).at(1),
            question_id,
            Answer::from_value(1),
        )
        .unwrap();

    let mut foreign = ForeignProxy::new(FOREIGN_PROXY, FOREIGN_CONFIG.clone());
    foreign.take_events();

    Bridge {
        foreign,
        home: HomeProxy::new(HOME_PROXY, HOME_CONFIG.clone()),
        foreign_messenger,
        home_messenger,
        court: AutoAppealableArbitrator::new(COURT, COURT_OWNER, ARBITRATION_COST),
        oracle,
        ledger: Balances::new(),
        question_id,
    }
}

impl Bridge {
    pub fn arbitration_id(&self) -> ArbitrationId {
        self.question_id.into()
    }

    /// Request the arbitration of the question from the foreign chain.
    pub fn request(
        &mut self,
        requester: Address,
        value: u128,
        max_previous: u128,
        now: u64,
    ) -> Res<()> {
        self.foreign.request_arbitration(
            Context::new(requester).with_value(value).at(now),
            self.question_id,
            max_previous,
            &self.court,
            &mut self.foreign_messenger,
        )
    }

    /// Deliver every pending foreign message to the home proxy.
    pub fn relay_to_home(&mut self, now: u64) -> Result<(), messenger::Error> {
        for envelope in self.foreign_messenger.take_outbox() {
            let mut endpoint = home::Endpoint {
                proxy: &mut self.home,
                oracle: &mut self.oracle,
            };
            self.home_messenger
                .relay_message(&self.foreign_messenger, &envelope, now, &mut endpoint)?;
        }
        Ok(())
    }

    /// Deliver every pending home message to the foreign proxy.
    pub fn relay_to_foreign(&mut self, now: u64) -> Result<(), messenger::Error> {
        for envelope in self.home_messenger.take_outbox() {
            let mut endpoint = foreign::Endpoint {
                proxy: &mut self.foreign,
                arbitrator: &mut self.court,
                ledger: &mut self.ledger,
            };
            self.foreign_messenger
                .relay_message(&self.home_messenger, &envelope, now, &mut endpoint)?;
        }
        Ok(())
    }

    /// Relay step of an accepted request on the home chain.
    pub fn acknowledge(&mut self, requester: Address, now: u64) -> Res<()> {
        self.home.handle_notified_request(
            Context::new(OTHER).at(now),
            self.question_id,
            requester,
            &mut self.home_messenger,
        )
    }

    /// Relay step of a rejected request on the home chain.
    pub fn cancel(&mut self, requester: Address, now: u64) -> Res<()> {
        self.home.handle_rejected_request(
            Context::new(OTHER).at(now),
            self.question_id,
            requester,
            &mut self.home_messenger,
        )
    }

    /// Run the request until the dispute exists in the court.
    pub fn create_dispute(&mut self) -> DisputeId {
        self.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
        self.relay_to_home(20).unwrap();
        self.acknowledge(REQUESTER, 20).unwrap();
        self.relay_to_foreign(30).unwrap();
        self.foreign
            .dispute_id(self.arbitration_id(), REQUESTER)
            .unwrap()
    }

    /// Make the current ruling appealable during `[start, start + APPEAL_TIMEOUT)`.
    pub fn appealable_ruling(&mut self, dispute_id: DisputeId, ruling: u64, start: u64) {
        self.court
            .give_appealable_ruling(
                Context::new(COURT_OWNER).at(start),
                dispute_id,
                ruling.into(),
                APPEAL_COST,
                APPEAL_TIMEOUT,
            )
            .unwrap();
    }

    /// Final ruling of the court, handed to the foreign proxy.
    pub fn give_ruling(
        &mut self,
        dispute_id: DisputeId,
        ruling: u64,
        now: u64,
    ) -> Result<(), arbitrator::Error> {
        let mut receiver = foreign::RulingReceiver {
            proxy: &mut self.foreign,
            messenger: &mut self.foreign_messenger,
        };
        self.court.give_ruling(
            Context::new(COURT_OWNER).at(now),
            dispute_id,
            ruling.into(),
            &mut receiver,
        )
    }

    pub fn fund_appeal(
        &mut self,
        contributor: Address,
        ruling: u64,
        value: u128,
        now: u64,
    ) -> Res<bool> {
        let arbitration_id = self.arbitration_id();
        self.foreign.fund_appeal(
            Context::new(contributor).with_value(value).at(now),
            arbitration_id,
            ruling.into(),
            &mut self.court,
            &mut self.ledger,
        )
    }
}
