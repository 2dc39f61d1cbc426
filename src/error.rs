//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use tracing::warn;

use crate::collections::{AreaId, InterfaceId, NeighborId};
use crate::packet::lsa::LsaOpaqueType;

// GR errors.
//
// None of these propagate to the packet path; they are absorbed into logs
// and local state transitions.
#[derive(Debug)]
pub enum Error {
    // Inter-task communication
    AreaIdNotFound(AreaId),
    InterfaceIdNotFound(InterfaceId),
    NeighborIdNotFound(NeighborId),
    // Grace-LSA input
    MalformedGraceLsa(Ipv4Addr),
    // Persistent marker
    PersistentMarkerIo(std::io::Error),
    // Subsystem initialization
    RegistrationFailed(LsaOpaqueType),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::AreaIdNotFound(area_id) => {
                warn!(?area_id, "{}", self);
            }
            Error::InterfaceIdNotFound(iface_id) => {
                warn!(?iface_id, "{}", self);
            }
            Error::NeighborIdNotFound(nbr_id) => {
                warn!(?nbr_id, "{}", self);
            }
            Error::MalformedGraceLsa(adv_rtr) => {
                warn!(%adv_rtr, "{}", self);
            }
            Error::PersistentMarkerIo(error) => {
                warn!(%error, "{}", self);
            }
            Error::RegistrationFailed(opaque_type) => {
                warn!(?opaque_type, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AreaIdNotFound(..) => {
                write!(f, "area ID not found")
            }
            Error::InterfaceIdNotFound(..) => {
                write!(f, "interface ID not found")
            }
            Error::NeighborIdNotFound(..) => {
                write!(f, "neighbor ID not found")
            }
            Error::MalformedGraceLsa(..) => {
                write!(f, "malformed Grace-LSA")
            }
            Error::PersistentMarkerIo(..) => {
                write!(f, "restart marker I/O failure")
            }
            Error::RegistrationFailed(..) => {
                write!(f, "failed to register opaque function table")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PersistentMarkerIo(error) => Some(error),
            _ => None,
        }
    }
}
