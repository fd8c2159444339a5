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

use arbitration_bridge::chain::Context;
use arbitration_bridge::events::Event;
use arbitration_bridge::foreign;
use arbitration_bridge::home::Status;
use arbitration_bridge::message::BridgeMessage;
use arbitration_bridge::messenger;
use arbitration_bridge::oracle::{self, Oracle, Realitio};
use arbitration_bridge::types::Answer;
use arbitration_bridge::{AccessError, Error, StateError};

mod bridge;

use bridge::*;

#[test]
fn accepted_request_awaits_acknowledgement() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();

    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::AwaitingAcknowledgement);
    assert_eq!(bridge.home.status(question_id, REQUESTER).code(), 2);
    assert_eq!(bridge.home.question_id_to_requester(question_id), Some(REQUESTER));
    assert!(bridge.oracle.is_pending_arbitration(question_id).unwrap());
    assert_eq!(
        bridge.oracle.question(question_id).unwrap().arbitration_requester,
        Some(REQUESTER)
    );
    assert_eq!(
        bridge.home.take_events(),
        vec![Event::RequestNotified {
            question_id,
            requester: REQUESTER,
            max_previous: MAX_PREVIOUS,
        }]
    );
    // nothing is sent before the relay step
    assert!(bridge.home_messenger.outbox().is_empty());

    bridge.acknowledge(REQUESTER, 21).unwrap();
    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::Acknowledged);
    assert_eq!(bridge.home.status(question_id, REQUESTER).code(), 3);
    assert_eq!(
        bridge.home.take_events(),
        vec![Event::RequestAcknowledged {
            question_id,
            requester: REQUESTER,
        }]
    );
    let outbox = bridge.home_messenger.outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(
        outbox[0].message().unwrap(),
        BridgeMessage::ArbitrationAcknowledgement {
            question_id,
            requester: REQUESTER,
        }
    );
}

#[test]
fn bond_above_max_previous_is_rejected_and_refunded() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    let arbitration_id = bridge.arbitration_id();
    bridge.request(REQUESTER, DISPUTE_FEE, BOND - 1, 10).unwrap();
    bridge.relay_to_home(20).unwrap();

    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::Rejected);
    assert_eq!(bridge.home.status(question_id, REQUESTER).code(), 1);
    assert!(!bridge.oracle.is_pending_arbitration(question_id).unwrap());
    assert_eq!(bridge.home.question_id_to_requester(question_id), None);
    match bridge.home.take_events().as_slice() {
        [Event::RequestRejected {
            requester,
            max_previous,
            reason,
            ..
        }] => {
            assert_eq!(*requester, REQUESTER);
            assert_eq!(*max_previous, BOND - 1);
            assert!(reason.contains("exceeds max previous"));
        }
        events => panic!("unexpected events {:?}", events),
    }

    bridge.cancel(REQUESTER, 21).unwrap();
    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::None);
    assert!(bridge.home.request(question_id, REQUESTER).is_none());
    assert_eq!(
        bridge.home.take_events(),
        vec![Event::RequestCanceled {
            question_id,
            requester: REQUESTER,
        }]
    );

    bridge.relay_to_foreign(30).unwrap();
    assert_eq!(bridge.foreign.status(arbitration_id, REQUESTER), foreign::Status::None);
    assert_eq!(bridge.ledger.balance_of(&REQUESTER), ARBITRATION_COST);
    assert_eq!(bridge.foreign.balance(), 0);

    // a new request with a higher limit goes through
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 40).unwrap();
    bridge.relay_to_home(50).unwrap();
    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::AwaitingAcknowledgement);
}

#[test]
fn bond_equal_to_max_previous_is_accepted() {
    let mut bridge = setup();
    bridge.request(REQUESTER, DISPUTE_FEE, BOND, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    assert_eq!(
        bridge.home.status(bridge.question_id, REQUESTER),
        Status::AwaitingAcknowledgement
    );
}

#[test]
fn finalized_question_is_rejected() {
    let mut bridge = setup();
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    // the answer given at 1 is final at 1 + QUESTION_TIMEOUT
    bridge.relay_to_home(1 + QUESTION_TIMEOUT).unwrap();
    assert_eq!(bridge.home.status(bridge.question_id, REQUESTER), Status::Rejected);
    assert!(bridge.oracle.is_finalized(bridge.question_id, 1 + QUESTION_TIMEOUT).unwrap());
}

#[test]
fn second_requester_is_rejected_while_pending() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.request(OTHER, DISPUTE_FEE, MAX_PREVIOUS, 11).unwrap();
    bridge.relay_to_home(20).unwrap();

    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::AwaitingAcknowledgement);
    assert_eq!(bridge.home.status(question_id, OTHER), Status::Rejected);
    assert_eq!(bridge.home.question_id_to_requester(question_id), Some(REQUESTER));

    bridge.cancel(OTHER, 21).unwrap();
    bridge.relay_to_foreign(30).unwrap();
    assert_eq!(bridge.ledger.balance_of(&OTHER), ARBITRATION_COST);
    assert_eq!(
        bridge.foreign.status(bridge.arbitration_id(), REQUESTER),
        foreign::Status::Requested
    );
}

#[test]
fn only_the_bridge_delivers_foreign_messages() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    let res = bridge.home.receive_arbitration_request(
        Context::new(FOREIGN_PROXY),
        question_id,
        REQUESTER,
        MAX_PREVIOUS,
        &mut bridge.oracle,
    );
    assert!(matches!(res, Err(Error::Access(AccessError::NotBridge))));
    let res = bridge.home.receive_arbitration_answer(
        Context::bridged(HOME_MESSENGER, OTHER, 20),
        question_id,
        Answer::zero(),
        &mut bridge.oracle,
    );
    assert!(matches!(res, Err(Error::Access(AccessError::NotBridge))));
    assert!(!bridge.oracle.is_pending_arbitration(question_id).unwrap());
    assert!(bridge.home.take_events().is_empty());
}

#[test]
fn duplicate_request_is_refused() {
    let mut bridge = setup();
    let bridged = Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 20);
    bridge
        .home
        .receive_arbitration_request(
            bridged,
            bridge.question_id,
            REQUESTER,
            MAX_PREVIOUS,
            &mut bridge.oracle,
        )
        .unwrap();
    let res = bridge.home.receive_arbitration_request(
        bridged,
        bridge.question_id,
        REQUESTER,
        MAX_PREVIOUS,
        &mut bridge.oracle,
    );
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));
}

#[test]
fn unknown_oracle_is_refused() {
    let mut bridge = setup();
    let mut other_oracle = Realitio::new(OTHER);
    let res = bridge.home.receive_arbitration_request(
        Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 20),
        bridge.question_id,
        REQUESTER,
        MAX_PREVIOUS,
        &mut other_oracle,
    );
    assert!(matches!(
        res,
        Err(Error::Oracle(oracle::Error::UnexpectedOracle(address))) if address == OTHER
    ));
    assert_eq!(bridge.home.status(bridge.question_id, REQUESTER), Status::None);
}

#[test]
fn unknown_question_is_rejected() {
    let mut bridge = setup();
    let unknown = arbitration_bridge::types::QuestionId::repeat_byte(0x42);
    bridge
        .home
        .receive_arbitration_request(
            Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 20),
            unknown,
            REQUESTER,
            MAX_PREVIOUS,
            &mut bridge.oracle,
        )
        .unwrap();
    assert_eq!(bridge.home.status(unknown, REQUESTER), Status::Rejected);
}

#[test]
fn relay_steps_require_their_status() {
    let mut bridge = setup();
    let res = bridge.acknowledge(REQUESTER, 10);
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    let res = bridge.cancel(REQUESTER, 21);
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));
    assert!(bridge.home_messenger.outbox().is_empty());
}

#[test]
fn failed_relay_is_retried_without_side_effects() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    bridge.home.take_events();

    // misrouted messenger
    bridge.home_messenger.register_route(HOME_PROXY, OTHER);
    let res = bridge.acknowledge(REQUESTER, 21);
    assert!(matches!(
        res,
        Err(Error::BridgeDeliveryFailed(
            messenger::Error::UnexpectedDestination { .. }
        ))
    ));
    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::AwaitingAcknowledgement);
    assert!(bridge.home_messenger.outbox().is_empty());
    assert!(bridge.home.take_events().is_empty());

    // fee required by the bridge
    bridge.home_messenger.register_route(HOME_PROXY, FOREIGN_PROXY);
    bridge.home_messenger.set_min_fee(1);
    let res = bridge.acknowledge(REQUESTER, 22);
    assert!(matches!(
        res,
        Err(Error::BridgeDeliveryFailed(
            messenger::Error::InsufficientFee { .. }
        ))
    ));

    bridge.home_messenger.set_min_fee(0);
    bridge.acknowledge(REQUESTER, 23).unwrap();
    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::Acknowledged);
    assert_eq!(bridge.home_messenger.outbox().len(), 1);
}

#[test]
fn answer_requires_acknowledged_request() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    let bridged = Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 20);
    let res = bridge.home.receive_arbitration_answer(
        bridged,
        question_id,
        Answer::zero(),
        &mut bridge.oracle,
    );
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));

    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    // awaiting the relay step
    let res = bridge.home.receive_arbitration_answer(
        bridged,
        question_id,
        Answer::zero(),
        &mut bridge.oracle,
    );
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));
    assert!(bridge.oracle.is_pending_arbitration(question_id).unwrap());
}

#[test]
fn answer_is_submitted_to_the_oracle() {
    let mut bridge = setup();
    let question_id = bridge.question_id;
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    bridge.acknowledge(REQUESTER, 20).unwrap();
    bridge.home.take_events();

    let answer = Answer::from_value(7);
    bridge
        .home
        .receive_arbitration_answer(
            Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 500),
            question_id,
            answer,
            &mut bridge.oracle,
        )
        .unwrap();

    assert_eq!(bridge.home.status(question_id, REQUESTER), Status::Finished);
    assert_eq!(bridge.home.status(question_id, REQUESTER).code(), 4);
    assert_eq!(bridge.home.answer(question_id, REQUESTER), answer);
    assert_eq!(bridge.oracle.result_for(question_id, 500).unwrap(), answer);
    assert_eq!(
        bridge.oracle.question(question_id).unwrap().best_answerer,
        REQUESTER
    );
    assert_eq!(
        bridge.home.take_events(),
        vec![
            Event::ArbitratorAnswered {
                question_id,
                answer
            },
            Event::ArbitrationFinished { question_id },
        ]
    );
}

#[test]
fn failure_requires_acknowledged_request() {
    let mut bridge = setup();
    bridge.request(REQUESTER, DISPUTE_FEE, MAX_PREVIOUS, 10).unwrap();
    bridge.relay_to_home(20).unwrap();
    let res = bridge.home.receive_arbitration_failure(
        Context::bridged(HOME_MESSENGER, FOREIGN_PROXY, 30),
        bridge.question_id,
        REQUESTER,
        &mut bridge.oracle,
    );
    assert!(matches!(
        res,
        Err(Error::State(StateError::InvalidStatusForOperation { .. }))
    ));
    assert!(bridge.oracle.is_pending_arbitration(bridge.question_id).unwrap());
}

#[test]
fn proxy_reads_its_configuration() {
    let bridge = setup();
    assert_eq!(bridge.home.oracle(), ORACLE);
    assert_eq!(bridge.home.messenger(), HOME_MESSENGER);
    assert_eq!(bridge.home.foreign_proxy(), FOREIGN_PROXY);
    assert_eq!(bridge.home.foreign_chain_id().0, 5);
    assert_eq!(bridge.home.metadata(), "ipfs/Y");
}
