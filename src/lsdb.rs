//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collections::{
    Areas, Arena, AreaId, InterfaceId, LsaEntryId, LsaEntryIndex, Lsdb,
    LsdbIndex,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::gr::GrStatus;
use crate::gr::helper;
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::Interface;
use crate::packet::lsa::{
    Lsa, LsaHdr, LsaOpaqueType, LsaTypeCode, OpaqueLsaId,
};

// Architectural constants.
pub const LSA_MAX_AGE: u16 = 3600;
pub const LSA_INIT_SEQ_NO: u32 = 0x80000001;

// Owner tag under which the GR subsystem claims the Grace opaque type.
pub const GR_OPAQUE_OWNER: &str = "graceful-restart";

#[derive(Debug)]
pub struct LsaEntry {
    pub id: LsaEntryId,
    pub data: Arc<Lsa>,
}

// Requests toward the host's LSA origination entry points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaOriginateEvent {
    RouterLsaRefresh {
        area_id: AreaId,
    },
    NetworkLsaRefresh {
        area_id: AreaId,
        iface_id: InterfaceId,
    },
    NetworkLsaFlush {
        area_id: AreaId,
        iface_id: InterfaceId,
    },
}

// Dispatch table for opaque LSA consumers.
//
// Mirrors the host's opaque function registration: an installed opaque LSA
// is only handed to a subsystem that successfully claimed its opaque type.
#[derive(Debug, Default)]
pub struct OpaqueFunctab(BTreeMap<LsaOpaqueType, &'static str>);

// ===== impl LsaEntry =====

impl LsaEntry {
    pub(crate) fn new(id: LsaEntryId, data: Arc<Lsa>) -> LsaEntry {
        LsaEntry { id, data }
    }
}

// ===== impl OpaqueFunctab =====

impl OpaqueFunctab {
    pub fn register(
        &mut self,
        opaque_type: LsaOpaqueType,
        owner: &'static str,
    ) -> Result<(), Error> {
        match self.0.entry(opaque_type) {
            btree_map::Entry::Vacant(e) => {
                e.insert(owner);
                Ok(())
            }
            btree_map::Entry::Occupied(_) => {
                Err(Error::RegistrationFailed(opaque_type))
            }
        }
    }

    pub(crate) fn owner(&self, opaque_type: LsaOpaqueType) -> Option<&str> {
        self.0.get(&opaque_type).copied()
    }
}

// ===== global functions =====

// Checks whether two instances of an LSA carry identical contents, per the
// comparison rules of RFC 2328 section 13.2.
pub(crate) fn lsa_same_contents(a: &Lsa, b: &Lsa) -> bool {
    if a.hdr.options != b.hdr.options {
        return false;
    }

    if a.hdr.is_maxage() ^ b.hdr.is_maxage() {
        return false;
    }

    if a.hdr.length != b.hdr.length {
        return false;
    }

    let hdr_length = LsaHdr::LENGTH as usize;
    a.raw[hdr_length..] == b.raw[hdr_length..]
}

// Resolves the LSDB addressed by the given LSDB index.
pub(crate) fn lsdb_index_mut<'a>(
    as_lsdb: &'a mut Lsdb,
    areas: &'a mut Areas,
    interfaces: &'a mut Arena<Interface>,
    lsdb_idx: LsdbIndex,
) -> &'a mut Lsdb {
    match lsdb_idx {
        LsdbIndex::Link(_, iface_idx) => {
            &mut interfaces[iface_idx].state.lsdb
        }
        LsdbIndex::Area(area_idx) => &mut areas[area_idx].state.lsdb,
        LsdbIndex::As => as_lsdb,
    }
}

// Installs the provided LSA to the specified LSDB.
pub(crate) fn install(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lsa: Arc<Lsa>,
) -> LsaEntryIndex {
    Debug::LsaInstall(&lsa.hdr).log();

    let (lse_idx, old_lsa) = {
        let lsdb = lsdb_index_mut(
            &mut instance.state.lsdb,
            &mut arenas.areas,
            &mut arenas.interfaces,
            lsdb_idx,
        );

        // Displace the stored copy, keeping it around for the content
        // comparison below.
        let old_lsa = match lsdb.get(&arenas.lsa_entries, &lsa.hdr.key()) {
            Some((old_lse_idx, old_lse)) => {
                let old_lsa = old_lse.data.clone();
                lsdb.delete(&mut arenas.lsa_entries, old_lse_idx);
                Some(old_lsa)
            }
            None => None,
        };

        // Add LSA entry to LSDB.
        let (lse_idx, _) = lsdb.insert(&mut arenas.lsa_entries, lsa.clone());
        (lse_idx, old_lsa)
    };

    // Keep track of the self-originated Router-LSA and Network-LSA keys,
    // which feed the adjacency consistency check and the restart exit
    // actions.
    self_originated_track(instance, arenas, lsdb_idx, &lsa, true);

    // A reinstall with unchanged contents is a refresh, not a topology
    // change (RFC 2328, section 13.2).
    let content_change = match &old_lsa {
        Some(old_lsa) => !lsa_same_contents(old_lsa, &lsa),
        None => true,
    };

    // A network topology change forces the termination of a graceful
    // restart on every neighbor being helped.
    if content_change
        && lsa.hdr.lsa_type.is_gr_topology_info()
        && instance.state.gr_helper_count > 0
        && instance.config.gr.helper_enabled
        && instance.config.gr.strict_lsa_checking
        && instance.state.gr.status == GrStatus::NotRestart
    {
        helper::process_topology_change(
            Some(lsa.hdr.lsa_type),
            instance,
            arenas,
        );
    }

    // Grace-LSA processing, restricted to the registered consumer.
    if let LsdbIndex::Link(area_idx, iface_idx) = lsdb_idx
        && is_grace_lsa(&lsa)
        && instance.state.opaque_functab.owner(LsaOpaqueType::Grace)
            == Some(GR_OPAQUE_OWNER)
    {
        match lsa.body.as_grace() {
            Some((grace_period, reason, addr)) => {
                helper::process_grace_lsa(
                    area_idx,
                    iface_idx,
                    &lsa.hdr,
                    grace_period,
                    reason,
                    addr,
                    instance,
                    arenas,
                );
            }
            None => {
                // A mandatory TLV is missing.
                Error::MalformedGraceLsa(lsa.hdr.adv_rtr).log();
            }
        }
    }

    lse_idx
}

// Removes the provided LSA from the specified LSDB.
//
// A deleted Grace-LSA means the restarting neighbor flushed it after
// successfully rebuilding its adjacencies.
pub(crate) fn delete(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lse_idx: LsaEntryIndex,
) {
    let lsa = arenas.lsa_entries[lse_idx].data.clone();
    Debug::LsaDelete(&lsa.hdr).log();

    let lsdb = lsdb_index_mut(
        &mut instance.state.lsdb,
        &mut arenas.areas,
        &mut arenas.interfaces,
        lsdb_idx,
    );
    lsdb.delete(&mut arenas.lsa_entries, lse_idx);

    self_originated_track(instance, arenas, lsdb_idx, &lsa, false);

    if let LsdbIndex::Link(area_idx, iface_idx) = lsdb_idx
        && is_grace_lsa(&lsa)
        && instance.state.opaque_functab.owner(LsaOpaqueType::Grace)
            == Some(GR_OPAQUE_OWNER)
    {
        let addr = lsa.body.as_grace().and_then(|(_, _, addr)| addr);
        helper::process_grace_lsa_delete(
            area_idx, iface_idx, addr, instance, arenas,
        );
    }
}

// ===== helper functions =====

fn is_grace_lsa(lsa: &Lsa) -> bool {
    lsa.hdr.lsa_type.type_code() == Some(LsaTypeCode::OpaqueLink)
        && OpaqueLsaId::from(lsa.hdr.lsa_id).opaque_type
            == LsaOpaqueType::Grace as u8
}

// Records (or clears) the keys of the self-originated Router-LSA of an area
// and Network-LSA of an interface. Network-LSAs are matched to interfaces by
// their link-state ID, which is the DR's interface address.
fn self_originated_track(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_idx: LsdbIndex,
    lsa: &Lsa,
    installed: bool,
) {
    if lsa.hdr.adv_rtr != instance.state.router_id {
        return;
    }
    let LsdbIndex::Area(area_idx) = lsdb_idx else {
        return;
    };

    let key = installed.then(|| lsa.hdr.key());
    match lsa.hdr.lsa_type.type_code() {
        Some(LsaTypeCode::Router) => {
            arenas.areas[area_idx].state.router_lsa_self = key;
        }
        Some(LsaTypeCode::Network) => {
            let area = &arenas.areas[area_idx];
            let iface_idx = area.interfaces.indexes().find(|iface_idx| {
                arenas.interfaces[*iface_idx].system.addr
                    == Some(lsa.hdr.lsa_id)
            });
            if let Some(iface_idx) = iface_idx {
                arenas.interfaces[iface_idx].state.network_lsa_self = key;
            }
        }
        _ => (),
    }
}
