//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use crate::collections::{
    AreaKey, InterfaceKey, LsaEntryIndex, LsdbIndex, LsdbKey, NeighborKey,
};
use crate::error::Error;
use crate::gr::{GrExitReason, consistency, helper, restart};
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::ism;
use crate::lsdb;
use crate::neighbor::{NeighborNetId, nsm};
use crate::packet::lsa::{Lsa, LsaKey};

// ===== LSDB install hook =====

// Called by the host synchronously with the LSDB mutation, before flooding
// continues.
pub fn process_lsa_install(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_key: LsdbKey,
    lsa: Arc<Lsa>,
) -> Result<LsaEntryIndex, Error> {
    let lsdb_idx = lsdb_index(arenas, &lsdb_key)?;
    Ok(lsdb::install(instance, arenas, lsdb_idx, lsa))
}

// ===== LSDB delete hook =====

pub fn process_lsa_delete(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    lsdb_key: LsdbKey,
    lsa_key: LsaKey,
) -> Result<(), Error> {
    let lsdb_idx = lsdb_index(arenas, &lsdb_key)?;

    let lse_idx = {
        let lsdb = lsdb::lsdb_index_mut(
            &mut instance.state.lsdb,
            &mut arenas.areas,
            &mut arenas.interfaces,
            lsdb_idx,
        );
        lsdb.get(&arenas.lsa_entries, &lsa_key).map(|(idx, _)| idx)
    };
    if let Some(lse_idx) = lse_idx {
        lsdb::delete(instance, arenas, lsdb_idx, lse_idx);
    }

    Ok(())
}

// ===== ISM change hook =====

// Mirrors the new interface state reported by the host's interface state
// machine, including the outcome of the DR election.
pub fn process_ism_change(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    state: ism::State,
    dr: Option<NeighborNetId>,
    bdr: Option<NeighborNetId>,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;

    iface.state.ism_state = state;
    iface.state.dr = dr;
    iface.state.bdr = bdr;

    restart::process_ism_change(iface, area, instance);

    Ok(())
}

// ===== NSM change hook =====

// Mirrors the new neighbor state reported by the host's neighbor state
// machine.
pub fn process_nsm_change(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    nbr_key: NeighborKey,
    state: nsm::State,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;
    let (_, nbr) = iface
        .state
        .neighbors
        .get_mut_by_key(&mut arenas.neighbors, &nbr_key)?;

    nbr.state = state;

    restart::process_nsm_change(nbr, iface, area, instance);

    Ok(())
}

// ===== Helper grace period timeout =====

pub(crate) fn process_grace_period_timeout(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    nbr_key: NeighborKey,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;
    let (_, nbr) = iface
        .state
        .neighbors
        .get_mut_by_key(&mut arenas.neighbors, &nbr_key)?;

    // The session may have ended while the timeout message was in flight.
    if nbr.gr.is_some() {
        helper::helper_exit(nbr, iface, area, GrExitReason::TimedOut, instance);
    }

    Ok(())
}

// ===== Instance grace period expiry =====

pub(crate) fn process_gr_grace_expiry(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    restart::process_grace_expiry(instance, arenas);
    Ok(())
}

// ===== Restart monitor tick =====

pub(crate) fn process_gr_monitor(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    restart::process_monitor(instance, arenas);
    Ok(())
}

// ===== No-neighbor watchdog =====

pub(crate) fn process_gr_nonbr_watchdog(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
) -> Result<(), Error> {
    // Lookup area and interface.
    let (_, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (_, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;

    restart::process_nonbr_watchdog(iface, instance);

    Ok(())
}

// ===== Adjacency consistency check =====

pub(crate) fn process_gr_adj_check(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    area_key: AreaKey,
    iface_key: InterfaceKey,
    nbr_key: NeighborKey,
) -> Result<(), Error> {
    // Lookup area, interface and neighbor.
    let (area_idx, area) = arenas.areas.get_mut_by_key(&area_key)?;
    let (iface_idx, iface) = area
        .interfaces
        .get_mut_by_key(&mut arenas.interfaces, &iface_key)?;
    let (nbr_idx, _) = iface
        .state
        .neighbors
        .get_mut_by_key(&mut arenas.neighbors, &nbr_key)?;

    consistency::process_adj_check(
        area_idx, iface_idx, nbr_idx, instance, arenas,
    );

    Ok(())
}

// ===== Instance exit task =====

pub(crate) fn process_gr_instance_exit(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    restart::process_instance_exit(instance, arenas);
    Ok(())
}

// ===== helper functions =====

fn lsdb_index(
    arenas: &InstanceArenas,
    lsdb_key: &LsdbKey,
) -> Result<LsdbIndex, Error> {
    match lsdb_key {
        LsdbKey::Link(area_key, iface_key) => {
            let (area_idx, area) = arenas.areas.get_by_key(area_key)?;
            let (iface_idx, _) =
                area.interfaces.get_by_key(&arenas.interfaces, iface_key)?;
            Ok(LsdbIndex::Link(area_idx, iface_idx))
        }
        LsdbKey::Area(area_key) => {
            let (area_idx, _) = arenas.areas.get_by_key(area_key)?;
            Ok(LsdbIndex::Area(area_idx))
        }
        LsdbKey::As => Ok(LsdbIndex::As),
    }
}
