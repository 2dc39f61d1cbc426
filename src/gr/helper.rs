//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use chrono::Utc;

use crate::area::Area;
use crate::collections::{AreaIndex, InterfaceIndex};
use crate::debug::{Debug, GrRejectReason};
use crate::gr::GrExitReason;
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::{Interface, ism};
use crate::lsdb::{LSA_MAX_AGE, LsaOriginateEvent};
use crate::neighbor::{Neighbor, NeighborGrHelper, nsm};
use crate::packet::lsa::{LsaHdr, LsaType};
use crate::packet::tlv::GrReason;
use crate::tasks;

// ===== global functions =====

// Processes an installed Grace-LSA (RFC 3623, section 3.1).
//
// A Grace-LSA installed with age equal to MaxAge means the neighbor finished
// its restart and the helper session ends now.
pub(crate) fn process_grace_lsa(
    area_idx: AreaIndex,
    iface_idx: InterfaceIndex,
    lsa_hdr: &LsaHdr,
    grace_period: u32,
    reason: GrReason,
    addr: Option<Ipv4Addr>,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    let area = &arenas.areas[area_idx];
    let iface = &mut arenas.interfaces[iface_idx];

    // The restarting neighbor is identified by the IP interface address
    // carried in the body of the Grace-LSA.
    let nbr = match addr {
        Some(addr) => iface
            .state
            .neighbors
            .get_mut_by_net_id(&mut arenas.neighbors, addr.into())
            .map(|(_, nbr)| nbr),
        None => None,
    };

    if lsa_hdr.is_maxage() {
        // The neighbor finished restarting; any active helper session ends
        // here.
        if let Some(nbr) = nbr
            && nbr.gr.is_some()
        {
            helper_exit(nbr, iface, area, GrExitReason::Completed, instance);
        }
        return;
    }

    // Entry preconditions, in order. Failure of any is a no-op.
    if !instance.config.gr.helper_enabled {
        let reason = GrRejectReason::HelperDisabled;
        Debug::GrHelperReject(lsa_hdr.adv_rtr, reason).log();
        return;
    }

    let Some(nbr) = nbr else {
        let reason = GrRejectReason::NeighborNotFound;
        Debug::GrHelperReject(lsa_hdr.adv_rtr, reason).log();
        return;
    };

    // At most one concurrent helper session per neighbor.
    if nbr.gr.is_some() {
        let reason = GrRejectReason::AlreadyHelping;
        Debug::GrHelperReject(nbr.router_id, reason).log();
        return;
    }

    // An LSA that aged past the advertised grace period, or past MaxAge,
    // announces a grace window that is already over.
    if lsa_hdr.age >= LSA_MAX_AGE || u32::from(lsa_hdr.age) >= grace_period {
        let reason = GrRejectReason::GracePeriodExpired;
        Debug::GrHelperReject(nbr.router_id, reason).log();
        return;
    }

    // Only fully adjacent neighbors qualify for help.
    if nbr.state != nsm::State::Full {
        let reason = GrRejectReason::NeighborNotFull;
        Debug::GrHelperReject(nbr.router_id, reason).log();
        return;
    }

    // A non-self LSA pending retransmission to the neighbor means the
    // network already diverged from the restarting router's view.
    let router_id = instance.state.router_id;
    if nbr
        .lists
        .ls_rxmt
        .values()
        .any(|lsa| lsa.hdr.adv_rtr != router_id)
    {
        let reason = GrRejectReason::RetransmitPending;
        Debug::GrHelperReject(nbr.router_id, reason).log();
        return;
    }

    // Every precondition holds; start helping.
    helper_enter(nbr, iface, area, grace_period, reason, instance);
}

// Processes the deletion of a Grace-LSA: the restarting neighbor flushed it
// after rebuilding its adjacencies (RFC 3623, section 3.2).
pub(crate) fn process_grace_lsa_delete(
    area_idx: AreaIndex,
    iface_idx: InterfaceIndex,
    addr: Option<Ipv4Addr>,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    let area = &arenas.areas[area_idx];
    let iface = &mut arenas.interfaces[iface_idx];

    if let Some(addr) = addr
        && let Some((_, nbr)) = iface
            .state
            .neighbors
            .get_mut_by_net_id(&mut arenas.neighbors, addr.into())
        && nbr.gr.is_some()
    {
        helper_exit(nbr, iface, area, GrExitReason::Completed, instance);
    }
}

// A change in link-state database contents indicates a network topology
// change, which forces termination of all helper sessions (RFC 3623,
// section 3.2, condition 3).
pub(crate) fn process_topology_change(
    lsa_type: Option<LsaType>,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    Debug::GrTopologyChange(lsa_type).log();

    // Sweep every neighbor on every interface.
    for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
        let area = &arenas.areas[area_idx];
        for iface_idx in area.interfaces.indexes().collect::<Vec<_>>() {
            let iface = &arenas.interfaces[iface_idx];
            for nbr_idx in
                iface.state.neighbors.indexes().collect::<Vec<_>>()
            {
                let nbr = &mut arenas.neighbors[nbr_idx];
                if nbr.gr.is_none() {
                    continue;
                }

                helper_exit(
                    nbr,
                    iface,
                    area,
                    GrExitReason::TopologyChanged,
                    instance,
                );
            }
        }
    }
}

pub(crate) fn helper_exit(
    nbr: &mut Neighbor,
    iface: &Interface,
    area: &Area,
    reason: GrExitReason,
    instance: &mut InstanceUpView<'_>,
) {
    Debug::GrHelperExit(nbr.router_id, reason).log();

    // Dropping the session record cancels the grace period timeout.
    nbr.gr = None;

    match reason {
        GrExitReason::TimedOut | GrExitReason::TopologyChanged => {
            // Tear the adjacency down as if the neighbor had been
            // unreachable all along.
            instance.tx.host.nsm_event(
                area.id,
                iface.id,
                nbr.id,
                nsm::Event::InactivityTimer,
            );
        }
        _ => {
            // Have the segment re-run its DR election.
            instance.tx.host.ism_event(
                area.id,
                iface.id,
                ism::Event::NbrChange,
            );
        }
    }

    // Refresh the self-originated LSAs describing the segment.
    instance.tx.host.lsa_orig_event(LsaOriginateEvent::RouterLsaRefresh {
        area_id: area.id,
    });
    if iface.state.dr.is_some() {
        instance.tx.host.lsa_orig_event(
            LsaOriginateEvent::NetworkLsaRefresh {
                area_id: area.id,
                iface_id: iface.id,
            },
        );
    }

    // One less neighbor being helped.
    instance.state.gr_helper_count -= 1;
}

// ===== helper functions =====

fn helper_enter(
    nbr: &mut Neighbor,
    iface: &Interface,
    area: &Area,
    grace_period: u32,
    restart_reason: GrReason,
    instance: &mut InstanceUpView<'_>,
) {
    Debug::GrHelperEnter(nbr.router_id, restart_reason, grace_period).log();

    // Stop the neighbor inactivity timer for the duration of the helper
    // session.
    nbr.tasks.inactivity_timer = None;

    // Arm the grace period timeout and record the session.
    let timeout =
        tasks::grace_period_timer(nbr, iface, area, instance, grace_period);

    nbr.gr = Some(NeighborGrHelper {
        restart_reason,
        grace_period,
        start_time: Utc::now(),
        timeout,
    });

    // One more neighbor being helped.
    instance.state.gr_helper_count += 1;
}
