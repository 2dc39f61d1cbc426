//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::fs;

use common::*;
use const_addrs::ip4;
use ospf_gr::collections::ObjectKey;
use ospf_gr::gr::{self, GrExitReason, GrResumeState, GrStatus};
use ospf_gr::interface::ism;
use ospf_gr::lsdb::LsaOriginateEvent;
use ospf_gr::marker;
use ospf_gr::neighbor::nsm;
use ospf_gr::packet::tlv::GrReason;
use ospf_gr::tasks::messages::ProtocolOutputMsg;
use ospf_gr::tasks::messages::input::{
    GrGraceExpiryMsg, GrMonitorMsg, GrNoNbrWatchdogMsg, ProtocolMsg,
};

fn grace_expiry_msg() -> ProtocolMsg {
    ProtocolMsg::GrGraceExpiry(GrGraceExpiryMsg {})
}

fn monitor_msg() -> ProtocolMsg {
    ProtocolMsg::GrMonitor(GrMonitorMsg {})
}

fn nonbr_watchdog_msg() -> ProtocolMsg {
    ProtocolMsg::GrNoNbrWatchdog(GrNoNbrWatchdogMsg {
        area_key: ObjectKey::Value(AREA0),
        iface_key: ObjectKey::Value("eth0".to_owned()),
    })
}

fn resume_state(ctx: &TestContext) -> GrResumeState {
    ctx.instance.arenas.interfaces[ctx.iface_idx].state.gr.resume
}

fn gr_status(ctx: &TestContext) -> GrStatus {
    ctx.instance.state.as_ref().unwrap().gr.status
}

fn gr_exit_reason(ctx: &TestContext) -> GrExitReason {
    ctx.instance.state.as_ref().unwrap().gr.exit_reason
}

// Collects the exit-task output: MaxAge Grace-LSA floods must come before
// the self-originated LSAs are refreshed.
fn assert_exit_outputs(
    ctx: &mut TestContext,
    expected_events: &[LsaOriginateEvent],
) {
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::GraceLsaFlood(msg) => {
            assert!(msg.lsa.hdr.is_maxage());
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }
    for expected in expected_events {
        match ctx.output_rx.try_recv().unwrap() {
            ProtocolOutputMsg::LsaOrig(msg) => {
                assert_eq!(msg.event, *expected);
            }
            msg => panic!("unexpected output message: {:?}", msg),
        }
    }
    assert!(ctx.output_rx.try_recv().is_err());
}

#[test]
fn test_restart_creation_policy() {
    let ctx = setup(true);
    let gr = &ctx.instance.state.as_ref().unwrap().gr;

    assert_eq!(gr.status, GrStatus::PlannedRestart);
    assert_eq!(gr.exit_reason, GrExitReason::InProgress);
    assert!(gr.start_time.is_some());
    // The grace period expiry timer is armed for as long as the instance is
    // restarting.
    assert!(gr.grace_timer.is_some());

    let ctx = setup(false);
    let gr = &ctx.instance.state.as_ref().unwrap().gr;
    assert_eq!(gr.status, GrStatus::NotRestart);
    assert_eq!(gr.exit_reason, GrExitReason::None);
    assert!(gr.grace_timer.is_none());
}

// Scenario: single non-DR interface, the neighbor comes back and the
// pre-restart LSDB still describes the adjacency.
#[test]
fn test_restart_complete() {
    let mut ctx = setup(true);

    // Interface resumes: Grace-LSA goes out, monitor and watchdog start.
    ism_change(&mut ctx, ism::State::DrOther, None);
    assert_eq!(resume_state(&ctx), GrResumeState::InProgress);
    {
        let iface = &ctx.instance.arenas.interfaces[ctx.iface_idx];
        assert!(iface.state.gr.nonbr_watchdog.is_some());
        assert!(ctx.instance.state.as_ref().unwrap().gr.monitor.is_some());
    }
    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::GraceLsaFlood(msg) => {
            assert!(!msg.lsa.hdr.is_maxage());
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }

    // The neighbor reaches Full; the consistency check finds nothing to
    // disprove the adjacency.
    nsm_change(&mut ctx, nsm::State::Full);
    run_input_queue(&mut ctx);
    assert_eq!(resume_state(&ctx), GrResumeState::Ok);
    {
        let iface = &ctx.instance.arenas.interfaces[ctx.iface_idx];
        assert!(iface.state.gr.nonbr_watchdog.is_none());
    }

    // The monitor observes every interface settled and exits the restart.
    ctx.instance.process_protocol_msg(monitor_msg());
    assert_eq!(gr_status(&ctx), GrStatus::NotRestart);
    assert_eq!(gr_exit_reason(&ctx), GrExitReason::Completed);
    assert!(ctx.instance.state.as_ref().unwrap().gr.grace_timer.is_none());
    assert!(ctx.instance.state.as_ref().unwrap().gr.monitor.is_none());

    // The exit task runs on the next event-loop iteration.
    run_input_queue(&mut ctx);
    assert_exit_outputs(
        &mut ctx,
        &[LsaOriginateEvent::RouterLsaRefresh { area_id: 1 }],
    );
    assert!(!ctx.instance.shared.restart_in_progress.get());
    assert_eq!(ctx.instance.shared.restart_reason.get(), GrReason::Unknown);
}

// Scenario: the neighbor never reaches Full and the grace period runs out.
#[test]
fn test_restart_grace_expiry() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::DrOther, None);

    // A Network-LSA this router originated as DR before the restart.
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        network_lsa(IFACE_ADDR, RTR_ID, &[RTR_ID, NBR_RTR_ID]),
    );
    {
        let iface = &ctx.instance.arenas.interfaces[ctx.iface_idx];
        assert!(iface.state.network_lsa_self.is_some());
    }
    drain_output(&mut ctx);

    ctx.instance.process_protocol_msg(grace_expiry_msg());
    assert_eq!(resume_state(&ctx), GrResumeState::Nok);
    assert_eq!(gr_status(&ctx), GrStatus::NotRestart);
    assert_eq!(gr_exit_reason(&ctx), GrExitReason::TimedOut);

    // With no DR elected, the stale self-originated Network-LSA is flushed.
    run_input_queue(&mut ctx);
    assert_exit_outputs(
        &mut ctx,
        &[
            LsaOriginateEvent::RouterLsaRefresh { area_id: 1 },
            LsaOriginateEvent::NetworkLsaFlush {
                area_id: 1,
                iface_id: 1,
            },
        ],
    );
}

// Scenario: this router was the segment's DR; the neighbor is missing from
// the pre-restart Network-LSA.
#[test]
fn test_restart_dr_network_lsa_inconsistent() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::Waiting, Some(IFACE_ADDR.into()));

    // Pre-restart self-originated LSAs.
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        router_lsa(RTR_ID, vec![transit_link(IFACE_ADDR, IFACE_ADDR)]),
    );
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        network_lsa(RTR_ID, RTR_ID, &[RTR_ID, ip4!("3.3.3.3")]),
    );
    drain_output(&mut ctx);

    nsm_change(&mut ctx, nsm::State::Full);
    run_input_queue(&mut ctx);

    assert_eq!(resume_state(&ctx), GrResumeState::Nok);
    assert_eq!(gr_exit_reason(&ctx), GrExitReason::TopologyChanged);
}

// The neighbor's pre-restart Router-LSA claims a point-to-point adjacency
// that our own Router-LSA claims back.
#[test]
fn test_restart_p2p_consistent() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::PointToPoint, None);
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        router_lsa(RTR_ID, vec![p2p_link(NBR_RTR_ID, IFACE_ADDR)]),
    );
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        router_lsa(NBR_RTR_ID, vec![p2p_link(RTR_ID, NBR_ADDR)]),
    );
    drain_output(&mut ctx);

    nsm_change(&mut ctx, nsm::State::Full);
    run_input_queue(&mut ctx);

    assert_eq!(resume_state(&ctx), GrResumeState::Ok);
}

// The neighbor's pre-restart Router-LSA points at a different DR.
#[test]
fn test_restart_transit_inconsistent() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::DrOther, None);
    install_lsa(
        &mut ctx,
        area_lsdb_key(),
        router_lsa(NBR_RTR_ID, vec![transit_link(ip4!("10.0.9.9"), NBR_ADDR)]),
    );
    drain_output(&mut ctx);

    nsm_change(&mut ctx, nsm::State::Full);
    run_input_queue(&mut ctx);

    assert_eq!(resume_state(&ctx), GrResumeState::Nok);
    assert_eq!(gr_exit_reason(&ctx), GrExitReason::TopologyChanged);
}

// The monitor keeps waiting while any interface is still resuming.
#[test]
fn test_restart_monitor_waits() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::DrOther, None);
    ctx.instance.process_protocol_msg(monitor_msg());

    assert_eq!(gr_status(&ctx), GrStatus::PlannedRestart);
    assert!(ctx.input_rx.gr_instance_exit.try_recv().is_err());
}

// An interface with no neighbors left can't hold the restart forever.
#[test]
fn test_restart_nonbr_watchdog() {
    let mut ctx = setup(true);

    let iface = &mut ctx.instance.arenas.interfaces[ctx.iface_idx];
    iface
        .state
        .neighbors
        .delete(&mut ctx.instance.arenas.neighbors, ctx.nbr_idx);

    ism_change(&mut ctx, ism::State::DrOther, None);
    ctx.instance.process_protocol_msg(nonbr_watchdog_msg());

    assert_eq!(resume_state(&ctx), GrResumeState::Nok);
}

// The watchdog is a no-op once neighbors showed up.
#[test]
fn test_restart_nonbr_watchdog_with_neighbors() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::DrOther, None);
    ctx.instance.process_protocol_msg(nonbr_watchdog_msg());

    assert_eq!(resume_state(&ctx), GrResumeState::InProgress);
}

// An interface going down while resuming fails the restart on it.
#[test]
fn test_restart_interface_down() {
    let mut ctx = setup(true);

    ism_change(&mut ctx, ism::State::DrOther, None);
    assert_eq!(resume_state(&ctx), GrResumeState::InProgress);

    ism_change(&mut ctx, ism::State::Down, None);
    assert_eq!(resume_state(&ctx), GrResumeState::Nok);
}

// Arming a planned restart persists the marker and announces the grace
// period on every operational interface.
#[test]
fn test_prepare_restart() {
    let dir = std::env::temp_dir()
        .join(format!("ospf-gr-prepare-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();

    let mut ctx = setup(false);
    ctx.instance.shared.sysconfdir = dir.clone();
    ctx.instance.config.gr.restart_enabled = true;

    let (mut instance, arenas) = ctx.instance.as_up().unwrap();
    gr::prepare_restart(&mut instance, arenas, GrReason::SoftwareRestart)
        .unwrap();

    match ctx.output_rx.try_recv().unwrap() {
        ProtocolOutputMsg::GraceLsaFlood(msg) => {
            assert!(!msg.lsa.hdr.is_maxage());
            assert_eq!(msg.lsa.hdr.adv_rtr, RTR_ID);
        }
        msg => panic!("unexpected output message: {:?}", msg),
    }

    let record = marker::read(&dir).unwrap().unwrap();
    assert!(record.enabled);
    assert_eq!(record.reason, GrReason::SoftwareRestart);
}
