//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use crate::area::Area;
use crate::collections::{Arena, AreaIndex, InterfaceIndex, NeighborIndex};
use crate::debug::Debug;
use crate::gr::{GrResumeEvent, GrStatus, restart};
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::Interface;
use crate::lsdb::LsaEntry;
use crate::neighbor::{Neighbor, nsm};
use crate::packet::lsa::{LsaRouterLinkType, LsaTypeCode};

// Outcome of the per-neighbor adjacency consistency check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjCheck {
    Ok,
    Nok,
    InProgress,
}

// ===== global functions =====

// Decides, for a neighbor that reached Full during a restart, whether the
// pre-restart LSDB still describes the adjacency (RFC 3623, section 2.2,
// exit conditions 1 and 2).
pub(crate) fn process_adj_check(
    area_idx: AreaIndex,
    iface_idx: InterfaceIndex,
    nbr_idx: NeighborIndex,
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    let area = &arenas.areas[area_idx];
    let iface = &mut arenas.interfaces[iface_idx];
    let nbr = &arenas.neighbors[nbr_idx];

    // The check was posted; the world may have moved on since.
    if instance.state.gr.status == GrStatus::NotRestart
        || nbr.state != nsm::State::Full
    {
        return;
    }

    let router_id = instance.state.router_id;

    if iface.is_dr() {
        // This router was the Designated Router for the segment before the
        // restart.
        if area.state.router_lsa_self.is_none() {
            restart::resume_event(
                iface,
                instance,
                GrResumeEvent::NbrInconsistent,
            );
            return;
        }

        if examine_router_lsas(
            nbr,
            iface,
            area,
            router_id,
            &arenas.lsa_entries,
        ) == AdjCheck::Ok
        {
            let result = examine_network_lsas(
                nbr,
                iface,
                router_id,
                area,
                &arenas.lsa_entries,
            );
            Debug::GrAdjCheck(nbr.router_id, result).log();

            match result {
                AdjCheck::Ok => {
                    restart::resume_event(
                        iface,
                        instance,
                        GrResumeEvent::IntAdjComplete,
                    );
                }
                AdjCheck::Nok => {
                    restart::resume_event(
                        iface,
                        instance,
                        GrResumeEvent::NbrInconsistent,
                    );
                }
                AdjCheck::InProgress => {
                    // Wait for more LSAs to arrive.
                }
            }
        }
    } else {
        let result =
            examine_router_lsas(nbr, iface, area, router_id, &arenas.lsa_entries);
        Debug::GrAdjCheck(nbr.router_id, result).log();

        if result == AdjCheck::Ok {
            restart::resume_event(
                iface,
                instance,
                GrResumeEvent::IntAdjComplete,
            );
        } else {
            restart::resume_event(
                iface,
                instance,
                GrResumeEvent::NbrInconsistent,
            );
        }
    }
}

// ===== helper functions =====

// Scans the Router-LSAs advertised by the restarting neighbor for evidence
// about the adjacency. When nothing is found the neighbor relationship
// cannot be disproven and the adjacency counts as consistent.
fn examine_router_lsas(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    router_id: Ipv4Addr,
    lsa_entries: &Arena<LsaEntry>,
) -> AdjCheck {
    for (_, lse) in area
        .state
        .lsdb
        .iter_by_type(lsa_entries, LsaTypeCode::Router.into())
        .filter(|(_, lse)| lse.data.hdr.adv_rtr == nbr.router_id)
    {
        let Some(rlsa) = lse.data.body.as_router() else {
            continue;
        };

        for link in &rlsa.links {
            match link.link_type {
                LsaRouterLinkType::PointToPoint
                    if link.link_id == router_id =>
                {
                    // The neighbor claims a point-to-point adjacency with
                    // this router; our own pre-restart Router-LSA must claim
                    // it back.
                    return examine_self_router_lsa(nbr, area, lsa_entries);
                }
                LsaRouterLinkType::TransitNetwork
                    if link.link_data == nbr.src =>
                {
                    return match iface.state.dr {
                        Some(dr) if link.link_id == dr.get() => AdjCheck::Ok,
                        _ => AdjCheck::Nok,
                    };
                }
                _ => (),
            }
        }
    }

    AdjCheck::Ok
}

// Checks whether the self-originated pre-restart Router-LSA lists a
// point-to-point link back to the neighbor.
fn examine_self_router_lsa(
    nbr: &Neighbor,
    area: &Area,
    lsa_entries: &Arena<LsaEntry>,
) -> AdjCheck {
    if let Some(lsa_key) = &area.state.router_lsa_self
        && let Some((_, lse)) = area.state.lsdb.get(lsa_entries, lsa_key)
        && let Some(rlsa) = lse.data.body.as_router()
        && rlsa.links.iter().any(|link| {
            link.link_type == LsaRouterLinkType::PointToPoint
                && link.link_id == nbr.router_id
        })
    {
        AdjCheck::Ok
    } else {
        AdjCheck::Nok
    }
}

// Examines the Network-LSAs this router originated as the segment's DR
// before restarting. The adjacency is consistent once every attached router
// listed there is back in the neighbor table.
fn examine_network_lsas(
    nbr: &Neighbor,
    iface: &Interface,
    router_id: Ipv4Addr,
    area: &Area,
    lsa_entries: &Arena<LsaEntry>,
) -> AdjCheck {
    for (_, lse) in area
        .state
        .lsdb
        .iter_by_type(lsa_entries, LsaTypeCode::Network.into())
        .filter(|(_, lse)| lse.data.hdr.lsa_id == router_id)
    {
        let Some(nlsa) = lse.data.body.as_network() else {
            continue;
        };

        let mut cnt = 0;
        let mut match_count = 0;
        let mut match_found = false;
        for rtr in &nlsa.attached_rtrs {
            cnt += 1;
            if iface.state.neighbors.contains_router_id(*rtr) {
                match_count += 1;
            }
            if *rtr == nbr.router_id {
                match_found = true;
            }
        }

        if cnt == match_count {
            return AdjCheck::Ok;
        }
        if !match_found {
            return AdjCheck::Nok;
        }
    }

    AdjCheck::InProgress
}
