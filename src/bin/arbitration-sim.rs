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

//! Run a full arbitration between two in-memory chains configured from YAML files: a question is
//! answered on the oracle, escalated to the court through the bridge, ruled, and the ruling is
//! reported back to the oracle.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arbitration_bridge::arbitrator::AutoAppealableArbitrator;
use arbitration_bridge::chain::{Balances, Context, Ledger};
use arbitration_bridge::config::{ForeignProxyConfig, HomeProxyConfig, ProxyConfig};
use arbitration_bridge::events::Event;
use arbitration_bridge::foreign::{self, ForeignProxy, RulingReceiver};
use arbitration_bridge::home::{self, HomeProxy};
use arbitration_bridge::messenger::LocalMessenger;
use arbitration_bridge::oracle::{Oracle, Realitio};
use arbitration_bridge::role::ChainRole;
use arbitration_bridge::types::{Address, Answer, Ruling};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Configuration of the foreign proxy
    #[clap(long)]
    foreign: PathBuf,
    /// Configuration of the home proxy
    #[clap(long)]
    home: PathBuf,
    /// Ruling given by the court, 0 refuses to arbitrate
    #[clap(long, default_value_t = 1)]
    ruling: u64,
    /// Price of a dispute in the court
    #[clap(long, default_value_t = 1000)]
    arbitration_price: u128,
    /// Seconds an oracle answer must stay unchallenged
    #[clap(long, default_value_t = 180)]
    timeout: u64,
}

fn print_events(chain: ChainRole, events: Vec<Event>) {
    for event in events {
        info!(%chain, %event, "event");
        println!("[{}] {}", chain, event);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let foreign_config = ForeignProxyConfig::from_file(&args.foreign)?;
    let home_config = HomeProxyConfig::from_file(&args.home)?;
    if foreign_config.home_proxy == home_config.foreign_proxy {
        bail!("both proxies cannot share the same address");
    }

    let court_owner = Address::repeat_byte(0x0c);
    let requester = Address::repeat_byte(0xa1);
    let answerer = Address::repeat_byte(0xb0);
    let surplus = foreign_config.surplus;

    let mut foreign_messenger = LocalMessenger::new(
        ChainRole::Foreign,
        foreign_config.messenger,
        home_config.messenger,
    );
    let mut home_messenger = LocalMessenger::new(
        ChainRole::Home,
        home_config.messenger,
        foreign_config.messenger,
    );
    let mut court = AutoAppealableArbitrator::new(
        foreign_config.arbitrator,
        court_owner,
        args.arbitration_price,
    );
    let mut oracle = Realitio::new(home_config.oracle);
    let mut foreign_ledger = Balances::new();

    let mut foreign_proxy = ForeignProxy::new(home_config.foreign_proxy, foreign_config);
    let mut home_proxy = HomeProxy::new(foreign_proxy.home_proxy(), home_config);
    foreign_messenger.register_route(foreign_proxy.address(), home_proxy.address());
    home_messenger.register_route(home_proxy.address(), foreign_proxy.address());
    info!(
        foreign = %foreign_proxy.address(),
        home = %home_proxy.address(),
        "proxies deployed"
    );

    // the question to escalate, answered once on the oracle
    let question_id = oracle.ask_question(home_proxy.address(), args.timeout, "Is it raining?");
    oracle.submit_answer(
        Context::new(answerer).with_value(2000).at(10),
        question_id,
        Answer::from_value(0),
    )?;
    let max_previous = oracle.best_bond(question_id)?;

    let fee = foreign_proxy.get_dispute_fee(&court)?;
    foreign_ledger.credit(requester, fee.saturating_mul(2));
    foreign_ledger.debit(requester, fee)?;
    foreign_proxy.request_arbitration(
        Context::new(requester).with_value(fee).at(20),
        question_id,
        max_previous,
        &court,
        &mut foreign_messenger,
    )?;
    print_events(ChainRole::Foreign, foreign_proxy.take_events());

    for envelope in foreign_messenger.take_outbox() {
        let mut endpoint = home::Endpoint {
            proxy: &mut home_proxy,
            oracle: &mut oracle,
        };
        home_messenger.relay_message(&foreign_messenger, &envelope, 30, &mut endpoint)?;
    }
    match home_proxy.status(question_id, requester) {
        home::Status::AwaitingAcknowledgement => home_proxy.handle_notified_request(
            Context::new(answerer).at(30),
            question_id,
            requester,
            &mut home_messenger,
        )?,
        home::Status::Rejected => home_proxy.handle_rejected_request(
            Context::new(answerer).at(30),
            question_id,
            requester,
            &mut home_messenger,
        )?,
        status => bail!("unexpected home status {}", status),
    }
    print_events(ChainRole::Home, home_proxy.take_events());

    for envelope in home_messenger.take_outbox() {
        let mut endpoint = foreign::Endpoint {
            proxy: &mut foreign_proxy,
            arbitrator: &mut court,
            ledger: &mut foreign_ledger,
        };
        foreign_messenger.relay_message(&home_messenger, &envelope, 40, &mut endpoint)?;
    }
    print_events(ChainRole::Foreign, foreign_proxy.take_events());

    let dispute_id = match foreign_proxy.dispute_id(question_id.into(), requester) {
        Some(dispute_id) => dispute_id,
        None => {
            println!(
                "no dispute created, request is {}, requester holds {}",
                foreign_proxy.status(question_id.into(), requester),
                foreign_ledger.balance_of(&requester)
            );
            return Ok(());
        }
    };

    let mut receiver = RulingReceiver {
        proxy: &mut foreign_proxy,
        messenger: &mut foreign_messenger,
    };
    court.give_ruling(
        Context::new(court_owner).at(50),
        dispute_id,
        Ruling::new(args.ruling),
        &mut receiver,
    )?;
    print_events(ChainRole::Foreign, foreign_proxy.take_events());

    for envelope in foreign_messenger.take_outbox() {
        let mut endpoint = home::Endpoint {
            proxy: &mut home_proxy,
            oracle: &mut oracle,
        };
        home_messenger.relay_message(&foreign_messenger, &envelope, 60, &mut endpoint)?;
    }
    print_events(ChainRole::Home, home_proxy.take_events());

    let answer = oracle.result_for(question_id, 60)?;
    println!(
        "question {:#x} settled on {:#x}, surplus {} paid to the bridge, requester holds {}",
        question_id,
        answer,
        surplus,
        foreign_ledger.balance_of(&requester)
    );
    Ok(())
}
