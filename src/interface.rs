//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::collections::{Arena, InterfaceId, Lsdb, Neighbors};
use crate::debug::Debug;
use crate::gr::InterfaceGr;
use crate::neighbor::{Neighbor, NeighborNetId};
use crate::packet::lsa::LsaKey;

#[derive(Debug)]
pub struct Interface {
    pub id: InterfaceId,
    pub name: String,
    pub system: InterfaceSys,
    pub config: InterfaceCfg,
    pub state: InterfaceState,
}

#[derive(Debug, Default)]
pub struct InterfaceSys {
    // Primary address.
    pub addr: Option<Ipv4Addr>,
}

#[derive(Debug)]
pub struct InterfaceCfg {
    pub if_type: InterfaceType,
    pub dead_interval: u32,
}

#[derive(Debug, Default)]
pub struct InterfaceState {
    // ISM state as last reported by the host's interface state machine.
    pub ism_state: ism::State,
    // The network DR/BDR.
    pub dr: Option<NeighborNetId>,
    pub bdr: Option<NeighborNetId>,
    // List of neighbors attached to this interface.
    pub neighbors: Neighbors,
    // LSDB of link-scope LSAs.
    pub lsdb: Lsdb,
    // Key of the self-originated Network-LSA.
    pub network_lsa_self: Option<LsaKey>,
    // Graceful restart resume state.
    pub gr: InterfaceGr,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterfaceType {
    Broadcast,
    NonBroadcast,
    PointToMultipoint,
    PointToPoint,
}

// Interface state machine.
//
// The full ISM transition table lives in the host OSPF implementation; this
// crate mirrors the reported state and raises events toward the host.
pub mod ism {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Loopback,
        Waiting,
        PointToPoint,
        DrOther,
        Backup,
        Dr,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        NbrChange,
    }
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(id: InterfaceId, name: String) -> Interface {
        Debug::InterfaceCreate(&name).log();

        Interface {
            id,
            name,
            system: InterfaceSys::default(),
            config: InterfaceCfg::default(),
            state: InterfaceState::default(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.state.ism_state == ism::State::Down
    }

    // Returns whether this router is the DR for the attached network.
    pub(crate) fn is_dr(&self) -> bool {
        match (self.state.dr, self.system.addr) {
            (Some(dr), Some(addr)) => dr.get() == addr,
            _ => false,
        }
    }

    // Returns the number of neighbors attached to this interface that are
    // currently undergoing a graceful restart.
    pub fn gr_helping_count(&self, neighbors: &Arena<Neighbor>) -> usize {
        self.state
            .neighbors
            .iter(neighbors)
            .filter(|nbr| nbr.gr.is_some())
            .count()
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        Debug::InterfaceDelete(&self.name).log();
    }
}

// ===== impl InterfaceCfg =====

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            if_type: InterfaceType::Broadcast,
            dead_interval: 40,
        }
    }
}
