//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;
use const_addrs::ip4;
use ospf_gr::collections::{
    AreaIndex, InterfaceIndex, LsdbKey, NeighborIndex, ObjectKey,
};
use ospf_gr::events;
use ospf_gr::instance::{Instance, InstanceShared, ProtocolInputChannelsRx};
use ospf_gr::interface::ism;
use ospf_gr::lsdb::LSA_INIT_SEQ_NO;
use ospf_gr::neighbor::{NeighborNetId, nsm};
use ospf_gr::packet::Options;
use ospf_gr::packet::lsa::{
    Lsa, LsaBody, LsaGrace, LsaNetwork, LsaOpaque, LsaRouter, LsaRouterFlags,
    LsaRouterLink, LsaRouterLinkType, OpaqueLsaId,
};
use ospf_gr::packet::tlv::{
    GrInterfaceAddrTlv, GrReason, GrReasonTlv, GracePeriodTlv,
};
use ospf_gr::tasks::messages::input::ProtocolMsg as ProtocolInputMsg;
use ospf_gr::tasks::messages::output::ProtocolMsg as ProtocolOutputMsg;
use tokio::sync::mpsc::UnboundedReceiver;

pub const RTR_ID: Ipv4Addr = ip4!("1.1.1.1");
pub const AREA0: Ipv4Addr = ip4!("0.0.0.0");
pub const IFACE_ADDR: Ipv4Addr = ip4!("10.0.1.1");
pub const NBR_RTR_ID: Ipv4Addr = ip4!("2.2.2.2");
pub const NBR_ADDR: Ipv4Addr = ip4!("10.0.1.2");

pub struct TestContext {
    pub instance: Instance,
    pub input_rx: ProtocolInputChannelsRx,
    pub output_rx: UnboundedReceiver<ProtocolOutputMsg>,
    pub area_idx: AreaIndex,
    pub iface_idx: InterfaceIndex,
    pub nbr_idx: NeighborIndex,
}

// Builds a started instance with a single broadcast interface and a single
// fully-adjacent neighbor attached to it.
pub fn setup(restarting: bool) -> TestContext {
    let (tx, input_rx, output_rx) = Instance::channels();

    let shared = InstanceShared::default();
    if restarting {
        // Simulate a consumed restart marker.
        shared.restart_in_progress.set(true);
        shared.restart_reason.set(GrReason::SoftwareRestart);
        shared.marker_time.set(Some(Utc::now()));
    }

    let mut instance = Instance::new("test".to_owned(), shared, tx);
    instance.config.router_id = Some(RTR_ID);
    instance.update();
    assert!(instance.is_active());

    let (area_idx, area) = instance.arenas.areas.insert(AREA0);
    let (iface_idx, iface) =
        area.interfaces.insert(&mut instance.arenas.interfaces, "eth0");
    iface.system.addr = Some(IFACE_ADDR);
    if !restarting {
        iface.state.ism_state = ism::State::DrOther;
    }
    let (nbr_idx, nbr) = iface.state.neighbors.insert(
        &mut instance.arenas.neighbors,
        NBR_RTR_ID,
        NBR_ADDR,
    );
    nbr.state = nsm::State::Full;

    TestContext {
        instance,
        input_rx,
        output_rx,
        area_idx,
        iface_idx,
        nbr_idx,
    }
}

// Runs all self-posted messages to completion, like one would observe on a
// live event loop.
pub fn run_input_queue(ctx: &mut TestContext) {
    loop {
        let msg = if let Ok(msg) = ctx.input_rx.gr_adj_check.try_recv() {
            ProtocolInputMsg::GrAdjCheck(msg)
        } else if let Ok(msg) = ctx.input_rx.gr_instance_exit.try_recv() {
            ProtocolInputMsg::GrInstanceExit(msg)
        } else if let Ok(msg) = ctx.input_rx.grace_period.try_recv() {
            ProtocolInputMsg::GracePeriod(msg)
        } else if let Ok(msg) = ctx.input_rx.gr_grace_expiry.try_recv() {
            ProtocolInputMsg::GrGraceExpiry(msg)
        } else if let Ok(msg) = ctx.input_rx.gr_monitor.try_recv() {
            ProtocolInputMsg::GrMonitor(msg)
        } else if let Ok(msg) = ctx.input_rx.gr_nonbr_watchdog.try_recv() {
            ProtocolInputMsg::GrNoNbrWatchdog(msg)
        } else {
            break;
        };
        ctx.instance.process_protocol_msg(msg);
    }
}

pub fn drain_output(ctx: &mut TestContext) {
    while ctx.output_rx.try_recv().is_ok() {}
}

pub fn link_lsdb_key() -> LsdbKey {
    LsdbKey::Link(
        ObjectKey::Value(AREA0),
        ObjectKey::Value("eth0".to_owned()),
    )
}

pub fn area_lsdb_key() -> LsdbKey {
    LsdbKey::Area(ObjectKey::Value(AREA0))
}

pub fn install_lsa(ctx: &mut TestContext, lsdb_key: LsdbKey, lsa: Lsa) {
    let (mut instance, arenas) = ctx.instance.as_up().unwrap();
    events::process_lsa_install(&mut instance, arenas, lsdb_key, Arc::new(lsa))
        .unwrap();
}

pub fn delete_lsa(ctx: &mut TestContext, lsdb_key: LsdbKey, lsa: &Lsa) {
    let (mut instance, arenas) = ctx.instance.as_up().unwrap();
    events::process_lsa_delete(&mut instance, arenas, lsdb_key, lsa.hdr.key())
        .unwrap();
}

pub fn ism_change(
    ctx: &mut TestContext,
    state: ism::State,
    dr: Option<NeighborNetId>,
) {
    let (mut instance, arenas) = ctx.instance.as_up().unwrap();
    events::process_ism_change(
        &mut instance,
        arenas,
        ObjectKey::Value(AREA0),
        ObjectKey::Value("eth0".to_owned()),
        state,
        dr,
        None,
    )
    .unwrap();
}

pub fn nsm_change(ctx: &mut TestContext, state: nsm::State) {
    let (mut instance, arenas) = ctx.instance.as_up().unwrap();
    events::process_nsm_change(
        &mut instance,
        arenas,
        ObjectKey::Value(AREA0),
        ObjectKey::Value("eth0".to_owned()),
        ObjectKey::Value(NBR_RTR_ID),
        state,
    )
    .unwrap();
}

pub fn arm_inactivity_timer(ctx: &mut TestContext) {
    let (instance, arenas) = ctx.instance.as_up().unwrap();
    let area = &arenas.areas[ctx.area_idx];
    let iface = &arenas.interfaces[ctx.iface_idx];
    let nbr = &mut arenas.neighbors[ctx.nbr_idx];
    nbr.inactivity_timer_start(iface, area, &instance);
}

// ===== LSA builders =====

pub fn grace_lsa(
    age: u16,
    grace_period: u32,
    reason: u8,
    addr: Option<Ipv4Addr>,
    adv_rtr: Ipv4Addr,
) -> Lsa {
    let grace = LsaGrace {
        grace_period: Some(GracePeriodTlv::new(grace_period)),
        gr_reason: Some(GrReasonTlv::new(reason)),
        addr: addr.map(GrInterfaceAddrTlv::new),
        unknown_tlvs: vec![],
    };
    Lsa::new(
        age,
        Options::E | Options::O,
        OpaqueLsaId::new(3, 0).into(),
        adv_rtr,
        LSA_INIT_SEQ_NO,
        LsaBody::OpaqueLink(LsaOpaque::Grace(grace)),
    )
}

pub fn router_lsa(adv_rtr: Ipv4Addr, links: Vec<LsaRouterLink>) -> Lsa {
    Lsa::new(
        1,
        Options::E,
        adv_rtr,
        adv_rtr,
        LSA_INIT_SEQ_NO,
        LsaBody::Router(LsaRouter {
            flags: LsaRouterFlags::default(),
            links,
        }),
    )
}

pub fn p2p_link(link_id: Ipv4Addr, link_data: Ipv4Addr) -> LsaRouterLink {
    LsaRouterLink::new(LsaRouterLinkType::PointToPoint, link_id, link_data, 10)
}

pub fn transit_link(link_id: Ipv4Addr, link_data: Ipv4Addr) -> LsaRouterLink {
    LsaRouterLink::new(
        LsaRouterLinkType::TransitNetwork,
        link_id,
        link_data,
        10,
    )
}

pub fn network_lsa(
    lsa_id: Ipv4Addr,
    adv_rtr: Ipv4Addr,
    attached_rtrs: &[Ipv4Addr],
) -> Lsa {
    Lsa::new(
        1,
        Options::E,
        lsa_id,
        adv_rtr,
        LSA_INIT_SEQ_NO,
        LsaBody::Network(LsaNetwork {
            mask: ip4!("255.255.255.0"),
            attached_rtrs: attached_rtrs.iter().copied().collect(),
        }),
    )
}
