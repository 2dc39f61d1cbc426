//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use crate::collections::{AreaId, Interfaces, Lsdb};
use crate::packet::lsa::LsaKey;

#[derive(Debug)]
pub struct Area {
    pub id: AreaId,
    // Area ID in dotted notation.
    pub area_id: Ipv4Addr,
    // Area interfaces.
    pub interfaces: Interfaces,
    // Area state data.
    pub state: AreaState,
}

#[derive(Debug, Default)]
pub struct AreaState {
    // LSDB of area-scope LSAs.
    pub lsdb: Lsdb,
    // Key of the self-originated Router-LSA.
    pub router_lsa_self: Option<LsaKey>,
}

// ===== impl Area =====

impl Area {
    pub(crate) fn new(id: AreaId, area_id: Ipv4Addr) -> Area {
        Area {
            id,
            area_id,
            interfaces: Default::default(),
            state: Default::default(),
        }
    }
}
