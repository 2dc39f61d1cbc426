//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::area::Area;
use crate::collections::NeighborId;
use crate::debug::Debug;
use crate::instance::InstanceUpView;
use crate::interface::Interface;
use crate::packet::lsa::{Lsa, LsaKey};
use crate::packet::tlv::GrReason;
use crate::tasks;
use crate::tasks::TimeoutTask;

#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    pub router_id: Ipv4Addr,
    // Source address of the neighbor's packets on the attached network.
    pub src: Ipv4Addr,
    // NSM state as last reported by the host's neighbor state machine.
    pub state: nsm::State,

    pub gr: Option<NeighborGrHelper>,
    pub lists: NeighborLsaLists,
    pub tasks: NeighborTasks,
}

// IPv4 address used to identify the neighbor on a multi-access network.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct NeighborNetId(Ipv4Addr);

#[derive(Debug, Default)]
pub struct NeighborLsaLists {
    // LSAs waiting to be acknowledged by this neighbor.
    pub ls_rxmt: BTreeMap<LsaKey, Arc<Lsa>>,
}

// Graceful restart helper session for a restarting neighbor.
//
// The presence of this record is the "Helping" state; its absence is
// "NotHelping". The grace period timeout is armed for exactly as long as the
// record exists.
#[derive(Debug)]
pub struct NeighborGrHelper {
    pub restart_reason: GrReason,
    pub grace_period: u32,
    pub start_time: DateTime<Utc>,
    pub timeout: TimeoutTask,
}

#[derive(Debug, Default)]
pub struct NeighborTasks {
    pub inactivity_timer: Option<TimeoutTask>,
}

// Neighbor state machine.
//
// The full NSM transition table lives in the host OSPF implementation; this
// crate mirrors the reported state and raises events toward the host.
pub mod nsm {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        InactivityTimer,
    }
}

// ===== impl Neighbor =====

impl Neighbor {
    pub(crate) fn new(
        id: NeighborId,
        router_id: Ipv4Addr,
        src: Ipv4Addr,
    ) -> Neighbor {
        Debug::NeighborCreate(router_id).log();

        Neighbor {
            id,
            router_id,
            src,
            state: nsm::State::Down,
            gr: None,
            lists: Default::default(),
            tasks: Default::default(),
        }
    }

    pub(crate) fn network_id(&self) -> NeighborNetId {
        NeighborNetId(self.src)
    }

    pub fn inactivity_timer_start(
        &mut self,
        iface: &Interface,
        area: &Area,
        instance: &InstanceUpView<'_>,
    ) {
        let task = tasks::nsm_inactivity_timer(self, iface, area, instance);
        self.tasks.inactivity_timer = Some(task);
    }

    // Returns the number of seconds left in the helper session, or zero when
    // the neighbor isn't being helped.
    pub fn gr_helper_remaining(&self) -> u32 {
        match &self.gr {
            Some(gr) => gr.timeout.remaining().as_secs() as u32,
            None => 0,
        }
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        Debug::NeighborDelete(self.router_id).log();
    }
}

// ===== impl NeighborNetId =====

impl NeighborNetId {
    pub(crate) fn get(&self) -> Ipv4Addr {
        self.0
    }
}

impl std::fmt::Display for NeighborNetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Ipv4Addr> for NeighborNetId {
    fn from(addr: Ipv4Addr) -> NeighborNetId {
        NeighborNetId(addr)
    }
}
