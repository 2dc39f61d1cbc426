//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::sync::Arc;

use common::*;
use const_addrs::ip4;
use ospf_gr::collections::ObjectKey;
use ospf_gr::interface::ism;
use ospf_gr::lsdb::LsaOriginateEvent;
use ospf_gr::neighbor::nsm;
use ospf_gr::packet::lsa::LsaOpaqueType;
use ospf_gr::packet::tlv::GracePeriodTlv;
use ospf_gr::tasks::messages::ProtocolOutputMsg;
use ospf_gr::tasks::messages::input::{GracePeriodMsg, ProtocolMsg};

fn helper_timeout_msg() -> ProtocolMsg {
    ProtocolMsg::GracePeriod(GracePeriodMsg {
        area_key: ObjectKey::Value(AREA0),
        iface_key: ObjectKey::Value("eth0".to_owned()),
        nbr_key: ObjectKey::Value(NBR_RTR_ID),
    })
}

// Enters helper mode for the fixture's neighbor.
fn enter_helper(ctx: &mut TestContext, grace_period: u32) {
    arm_inactivity_timer(ctx);
    let lsa = grace_lsa(1, grace_period, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_some());
}

#[test]
fn test_helper_enter() {
    let mut ctx = setup(false);

    arm_inactivity_timer(&mut ctx);
    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    let gr = nbr.gr.as_ref().unwrap();
    assert_eq!(gr.grace_period, 60);
    // The neighbor inactivity timer is suppressed for the whole session.
    assert!(nbr.tasks.inactivity_timer.is_none());
    assert_eq!(ctx.instance.state.as_ref().unwrap().gr_helper_count, 1);
}

// Scenario: the restarting neighbor never comes back and the advertised
// grace period runs out.
#[test]
fn test_helper_timeout() {
    let mut ctx = setup(false);
    enter_helper(&mut ctx, 60);
    drain_output(&mut ctx);

    ctx.instance.process_protocol_msg(helper_timeout_msg());

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
    assert_eq!(ctx.instance.state.as_ref().unwrap().gr_helper_count, 0);

    // The adjacency is torn down as if the neighbor had been unreachable
    // all along, and the self-originated LSAs are refreshed.
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::NsmEvent(msg) => {
            assert_eq!(msg.event, nsm::Event::InactivityTimer);
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::LsaOrig(msg) => {
            assert!(matches!(
                msg.event,
                LsaOriginateEvent::RouterLsaRefresh { .. }
            ));
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
}

// A timer firing after the session ended must be a no-op.
#[test]
fn test_helper_timeout_stale() {
    let mut ctx = setup(false);
    enter_helper(&mut ctx, 60);

    ctx.instance.process_protocol_msg(helper_timeout_msg());
    drain_output(&mut ctx);
    ctx.instance.process_protocol_msg(helper_timeout_msg());

    assert!(ctx.output_rx.try_recv().is_err());
}

// Scenario: the neighbor finishes restarting early and flushes its
// Grace-LSA.
#[test]
fn test_helper_early_completion() {
    let mut ctx = setup(false);

    arm_inactivity_timer(&mut ctx);
    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa.clone());
    drain_output(&mut ctx);

    delete_lsa(&mut ctx, link_lsdb_key(), &lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());

    // On ordinary completion the DR is recalculated instead of the
    // adjacency being torn down.
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::IsmEvent(msg) => {
            assert_eq!(msg.event, ism::Event::NbrChange);
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
}

// A Grace-LSA advertised at MaxAge means "stop helping now".
#[test]
fn test_helper_maxage_completion() {
    let mut ctx = setup(false);
    enter_helper(&mut ctx, 60);
    drain_output(&mut ctx);

    let lsa = grace_lsa(3600, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::IsmEvent(msg) => {
            assert_eq!(msg.event, ism::Event::NbrChange);
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
}

// Scenario: with strict LSA checking, any LSDB content change forces every
// helper session to end within the same event-loop turn.
#[test]
fn test_helper_strict_lsa_check() {
    let mut ctx = setup(false);
    ctx.instance.config.gr.strict_lsa_checking = true;
    enter_helper(&mut ctx, 60);
    drain_output(&mut ctx);

    let lsa = router_lsa(
        ip4!("9.9.9.9"),
        vec![transit_link(ip4!("10.0.1.1"), ip4!("10.0.1.9"))],
    );
    install_lsa(&mut ctx, area_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::NsmEvent(msg) => {
            assert_eq!(msg.event, nsm::Event::InactivityTimer);
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
}

// Reinstalling an identical LSA is a refresh, not a topology change.
#[test]
fn test_helper_strict_lsa_check_refresh() {
    let mut ctx = setup(false);
    ctx.instance.config.gr.strict_lsa_checking = true;

    let lsa = router_lsa(
        ip4!("9.9.9.9"),
        vec![transit_link(ip4!("10.0.1.1"), ip4!("10.0.1.9"))],
    );
    install_lsa(&mut ctx, area_lsdb_key(), lsa.clone());

    enter_helper(&mut ctx, 60);
    install_lsa(&mut ctx, area_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_some());
}

// Without strict checking, LSDB changes don't end helper sessions.
#[test]
fn test_helper_no_strict_lsa_check() {
    let mut ctx = setup(false);
    enter_helper(&mut ctx, 60);

    let lsa = router_lsa(
        ip4!("9.9.9.9"),
        vec![transit_link(ip4!("10.0.1.1"), ip4!("10.0.1.9"))],
    );
    install_lsa(&mut ctx, area_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_some());
}

#[test]
fn test_helper_reject_disabled() {
    let mut ctx = setup(false);
    ctx.instance.config.gr.helper_enabled = false;

    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

#[test]
fn test_helper_reject_unknown_neighbor() {
    let mut ctx = setup(false);

    let lsa = grace_lsa(1, 60, 1, Some(ip4!("10.0.9.9")), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

// At most one helper session per neighbor: a re-announcement is ignored.
#[test]
fn test_helper_reject_already_helping() {
    let mut ctx = setup(false);
    enter_helper(&mut ctx, 60);

    let lsa = grace_lsa(2, 90, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert_eq!(nbr.gr.as_ref().unwrap().grace_period, 60);
}

#[test]
fn test_helper_reject_expired() {
    let mut ctx = setup(false);

    // The LSA aged past the advertised grace period in transit.
    let lsa = grace_lsa(100, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

#[test]
fn test_helper_reject_not_full() {
    let mut ctx = setup(false);
    ctx.instance.arenas.neighbors[ctx.nbr_idx].state = nsm::State::Exchange;

    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

#[test]
fn test_helper_reject_retransmit_pending() {
    let mut ctx = setup(false);

    // A non-self LSA awaiting acknowledgment means the network already
    // diverged from the restarting router's view.
    let pending = router_lsa(
        ip4!("9.9.9.9"),
        vec![transit_link(ip4!("10.0.1.1"), ip4!("10.0.1.9"))],
    );
    let nbr = &mut ctx.instance.arenas.neighbors[ctx.nbr_idx];
    nbr.lists.ls_rxmt.insert(pending.hdr.key(), Arc::new(pending));

    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

// Self-originated LSAs on the retransmission list don't block helper entry.
#[test]
fn test_helper_self_retransmit_ok() {
    let mut ctx = setup(false);

    let pending = router_lsa(
        RTR_ID,
        vec![transit_link(ip4!("10.0.1.1"), IFACE_ADDR)],
    );
    let nbr = &mut ctx.instance.arenas.neighbors[ctx.nbr_idx];
    nbr.lists.ls_rxmt.insert(pending.hdr.key(), Arc::new(pending));

    let lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_some());
}

// A Grace-LSA missing its mandatory TLVs is ignored.
#[test]
fn test_helper_malformed_grace_lsa() {
    let mut ctx = setup(false);

    let mut lsa = grace_lsa(1, 60, 1, Some(NBR_ADDR), NBR_RTR_ID);
    if let ospf_gr::packet::lsa::LsaBody::OpaqueLink(
        ospf_gr::packet::lsa::LsaOpaque::Grace(grace),
    ) = &mut lsa.body
    {
        grace.grace_period = None;
    }
    install_lsa(&mut ctx, link_lsdb_key(), lsa);

    let nbr = &ctx.instance.arenas.neighbors[ctx.nbr_idx];
    assert!(nbr.gr.is_none());
}

// The DR's Network-LSA is refreshed on helper exit.
#[test]
fn test_helper_exit_with_dr() {
    let mut ctx = setup(false);
    ctx.instance.arenas.interfaces[ctx.iface_idx].state.dr =
        Some(NBR_ADDR.into());
    enter_helper(&mut ctx, 60);
    drain_output(&mut ctx);

    ctx.instance.process_protocol_msg(helper_timeout_msg());

    let mut events = vec![];
    while let Ok(msg) = ctx.output_rx.try_recv() {
        if let ProtocolOutputMsg::LsaOrig(msg) = msg {
            events.push(msg.event);
        }
    }
    assert!(matches!(
        events[..],
        [
            LsaOriginateEvent::RouterLsaRefresh { .. },
            LsaOriginateEvent::NetworkLsaRefresh { .. },
        ]
    ));
}

// Duplicate opaque-type registrations are refused.
#[test]
fn test_opaque_registration() {
    let mut ctx = setup(false);

    let state = ctx.instance.state.as_mut().unwrap();
    assert!(
        state
            .opaque_functab
            .register(LsaOpaqueType::Grace, "another-consumer")
            .is_err()
    );
}

// The advertised grace period is recorded verbatim.
#[test]
fn test_helper_grace_period_tlv() {
    let lsa = grace_lsa(1, 1800, 2, Some(NBR_ADDR), NBR_RTR_ID);
    if let ospf_gr::packet::lsa::LsaBody::OpaqueLink(
        ospf_gr::packet::lsa::LsaOpaque::Grace(grace),
    ) = &lsa.body
    {
        assert_eq!(grace.grace_period, Some(GracePeriodTlv::new(1800)));
        assert_eq!(grace.addr.map(|addr| addr.get()), Some(NBR_ADDR));
    } else {
        panic!("not a Grace-LSA");
    }
}
