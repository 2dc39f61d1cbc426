//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::gr::consistency::AdjCheck;
use crate::gr::{GrExitReason, GrResumeEvent, GrResumeState};
use crate::marker::MarkerRecord;
use crate::packet::lsa::{LsaHdr, LsaType};
use crate::packet::tlv::GrReason;

// GR debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceCreate,
    InstanceDelete,
    InstanceStart,
    InstanceStop,
    // Interfaces
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    // Neighbors
    NeighborCreate(Ipv4Addr),
    NeighborDelete(Ipv4Addr),
    // LSDB maintenance
    LsaInstall(&'a LsaHdr),
    LsaDelete(&'a LsaHdr),
    GraceLsaOriginate(&'a str, &'a LsaHdr),
    // Restarting role
    GrRestartArm(u32),
    GrMarkerRead(&'a MarkerRecord),
    GrMarkerWrite(&'a Path),
    GrMarkerClockSkew(DateTime<Utc>),
    GrResumeEvent(&'a str, GrResumeState, GrResumeEvent),
    GrResumeTransition(&'a str, GrResumeState),
    GrAdjCheck(Ipv4Addr, AdjCheck),
    GrExit(GrExitReason),
    // Helper role
    GrTopologyChange(Option<LsaType>),
    GrHelperReject(Ipv4Addr, GrRejectReason),
    GrHelperEnter(Ipv4Addr, GrReason, u32),
    GrHelperExit(Ipv4Addr, GrExitReason),
}

// Reason why the router failed to enter the helper mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GrRejectReason {
    HelperDisabled,
    NeighborNotFound,
    AlreadyHelping,
    GracePeriodExpired,
    NeighborNotFull,
    RetransmitPending,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Emit the message through the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate
            | Debug::InstanceDelete
            | Debug::InstanceStart
            | Debug::InstanceStop => {
                // Parent span(s): ospf-instance
                debug!("{}", self);
            }
            Debug::InterfaceCreate(name) | Debug::InterfaceDelete(name) => {
                // Parent span(s): ospf-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NeighborCreate(router_id)
            | Debug::NeighborDelete(router_id) => {
                // Parent span(s): ospf-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::LsaInstall(lsa_hdr) | Debug::LsaDelete(lsa_hdr) => {
                // Parent span(s): ospf-instance
                debug!(?lsa_hdr, "{}", self);
            }
            Debug::GraceLsaOriginate(name, lsa_hdr) => {
                // Parent span(s): ospf-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug!(?lsa_hdr, "{}", self);
                })
            }
            Debug::GrRestartArm(grace_period) => {
                // Parent span(s): ospf-instance
                debug!(%grace_period, "{}", self);
            }
            Debug::GrMarkerRead(record) => {
                // Parent span(s): ospf-instance
                debug!(?record, "{}", self);
            }
            Debug::GrMarkerWrite(path) => {
                // Parent span(s): ospf-instance
                debug!(path = %path.display(), "{}", self);
            }
            Debug::GrMarkerClockSkew(restart_time) => {
                // Parent span(s): ospf-instance
                debug!(%restart_time, "{}", self);
            }
            Debug::GrResumeEvent(name, state, event) => {
                // Parent span(s): ospf-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?state, ?event, "{}", self);
                    })
                })
            }
            Debug::GrResumeTransition(name, new_state) => {
                // Parent span(s): ospf-instance
                debug_span!("interface", %name).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?new_state, "{}", self);
                    })
                })
            }
            Debug::GrAdjCheck(router_id, result) => {
                // Parent span(s): ospf-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?result, "{}", self);
                })
            }
            Debug::GrExit(reason) => {
                // Parent span(s): ospf-instance
                debug!(%reason, "{}", self);
            }
            Debug::GrTopologyChange(lsa_type) => {
                // Parent span(s): ospf-instance
                debug!(?lsa_type, "{}", self);
            }
            Debug::GrHelperReject(router_id, reason) => {
                // Parent span(s): ospf-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%reason, "{}", self);
                })
            }
            Debug::GrHelperEnter(router_id, reason, grace_period) => {
                // Parent span(s): ospf-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%reason, %grace_period, "{}", self);
                })
            }
            Debug::GrHelperExit(router_id, reason) => {
                // Parent span(s): ospf-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%reason, "{}", self);
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InstanceDelete => {
                write!(f, "instance deleted")
            }
            Debug::InstanceStart => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop => {
                write!(f, "stopping instance")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceDelete(..) => {
                write!(f, "interface deleted")
            }
            Debug::NeighborCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NeighborDelete(..) => {
                write!(f, "neighbor deleted")
            }
            Debug::LsaInstall(..) => {
                write!(f, "installing LSA")
            }
            Debug::LsaDelete(..) => {
                write!(f, "deleting LSA")
            }
            Debug::GraceLsaOriginate(..) => {
                write!(f, "originating Grace-LSA")
            }
            Debug::GrRestartArm(..) => {
                write!(f, "arming grace period timer")
            }
            Debug::GrMarkerRead(..) => {
                write!(f, "restart marker read")
            }
            Debug::GrMarkerWrite(..) => {
                write!(f, "restart marker written")
            }
            Debug::GrMarkerClockSkew(..) => {
                write!(f, "restart marker written in the future")
            }
            Debug::GrResumeEvent(..) => {
                write!(f, "resume event")
            }
            Debug::GrResumeTransition(..) => {
                write!(f, "resume state transition")
            }
            Debug::GrAdjCheck(..) => {
                write!(f, "adjacency consistency check")
            }
            Debug::GrExit(..) => {
                write!(f, "exiting from graceful restart")
            }
            Debug::GrTopologyChange(..) => {
                write!(f, "topology change during graceful restart")
            }
            Debug::GrHelperReject(..) => {
                write!(f, "failed to enter helper mode")
            }
            Debug::GrHelperEnter(..) => {
                write!(f, "entering helper mode")
            }
            Debug::GrHelperExit(..) => {
                write!(f, "exiting from helper mode")
            }
        }
    }
}

// ===== impl GrRejectReason =====

impl std::fmt::Display for GrRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrRejectReason::HelperDisabled => {
                write!(f, "graceful restart helper mode is disabled")
            }
            GrRejectReason::NeighborNotFound => {
                write!(f, "no neighbor matches the announced address")
            }
            GrRejectReason::AlreadyHelping => {
                write!(f, "a helper session is already active")
            }
            GrRejectReason::GracePeriodExpired => {
                write!(f, "grace period has already expired")
            }
            GrRejectReason::NeighborNotFull => {
                write!(f, "neighbor is not fully adjacent")
            }
            GrRejectReason::RetransmitPending => {
                write!(f, "non-self LSAs are pending retransmission")
            }
        }
    }
}
