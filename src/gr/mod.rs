//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod consistency;
pub mod helper;
pub mod restart;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::lsdb::GR_OPAQUE_OWNER;
use crate::marker;
use crate::packet::lsa::LsaOpaqueType;
use crate::packet::tlv::GrReason;
use crate::tasks;
use crate::tasks::{IntervalTask, TimeoutTask};

// Maximum grace period, in seconds (RFC 3623, appendix B.1).
pub const GRACE_PERIOD_MAX: u32 = 1800;

// OSPF Graceful Restart status.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GrStatus {
    #[default]
    NotRestart,
    PlannedRestart,
}

// OSPF Graceful Restart exit reason.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GrExitReason {
    #[default]
    None,
    InProgress,
    Completed,
    TimedOut,
    TopologyChanged,
}

// Graceful restart state of the routing instance (restarting role).
#[derive(Debug, Default)]
pub struct InstanceGr {
    pub status: GrStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub exit_reason: GrExitReason,
    // Wall clock recorded in the restart marker, when one was read.
    pub marker_time: Option<DateTime<Utc>>,
    // A planned shutdown was armed; Grace-LSAs may be announced before the
    // process exits.
    pub shutdown_pending: bool,
    // Grace period expiry timer.
    pub grace_timer: Option<TimeoutTask>,
    // Periodic restart monitor.
    pub monitor: Option<IntervalTask>,
    // The instance exit task was posted and hasn't run yet.
    pub exit_task_pending: bool,
}

// Graceful restart resume state of an interface.
#[derive(Debug, Default)]
pub struct InterfaceGr {
    pub resume: GrResumeState,
    // Watchdog that fails the interface when no neighbor shows up within
    // twice the dead interval.
    pub nonbr_watchdog: Option<TimeoutTask>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GrResumeState {
    #[default]
    Idle,
    InProgress,
    Ok,
    Nok,
}

// Events driving the per-interface resume state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GrResumeEvent {
    IntAdjComplete,
    Extend,
    Expiry,
    NbrInconsistent,
    NoNbr,
}

// ===== impl GrStatus =====

impl std::fmt::Display for GrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrStatus::NotRestart => {
                write!(f, "not restarting")
            }
            GrStatus::PlannedRestart => {
                write!(f, "planned restart")
            }
        }
    }
}

// ===== impl GrExitReason =====

impl std::fmt::Display for GrExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrExitReason::None => {
                write!(f, "none")
            }
            GrExitReason::InProgress => {
                write!(f, "in progress")
            }
            GrExitReason::Completed => {
                write!(f, "completed")
            }
            GrExitReason::TimedOut => {
                write!(f, "timed out")
            }
            GrExitReason::TopologyChanged => {
                write!(f, "topology changed")
            }
        }
    }
}

// ===== impl InstanceGr =====

impl InstanceGr {
    // Creation policy: an instance created while a restart is in progress
    // starts out in restarting mode.
    pub(crate) fn new(
        restart_in_progress: bool,
        marker_time: Option<DateTime<Utc>>,
    ) -> InstanceGr {
        if restart_in_progress {
            InstanceGr {
                status: GrStatus::PlannedRestart,
                start_time: Some(Utc::now()),
                exit_reason: GrExitReason::InProgress,
                marker_time,
                ..Default::default()
            }
        } else {
            InstanceGr::default()
        }
    }
}

// ===== global functions =====

// Registers the Grace opaque type with the LSDB dispatcher. Without a
// successful registration the subsystem stays inert: installed Grace-LSAs
// are never delivered to the helper state machine.
pub(crate) fn init(instance: &mut InstanceUpView<'_>) -> Result<(), Error> {
    instance
        .state
        .opaque_functab
        .register(LsaOpaqueType::Grace, GR_OPAQUE_OWNER)
}

// Arms the grace period expiry timer if the instance is set up to restart
// and the timer isn't running yet.
pub(crate) fn check_and_arm_restart(instance: &mut InstanceUpView<'_>) {
    if instance.config.gr.restart_enabled
        && instance.config.gr.grace_period > 0
        && instance.state.gr.status == GrStatus::PlannedRestart
        && instance.state.gr.exit_reason == GrExitReason::InProgress
        && instance.state.gr.grace_timer.is_none()
    {
        let grace_period = effective_grace_period(instance);
        Debug::GrRestartArm(grace_period).log();
        let task = tasks::gr_grace_expiry_timer(instance, grace_period);
        instance.state.gr.grace_timer = Some(task);
    }
}

// Returns the number of seconds left in the grace period, or zero when the
// instance isn't restarting.
pub fn restart_remaining(instance: &InstanceUpView<'_>) -> u32 {
    if instance.state.gr.status == GrStatus::NotRestart {
        return 0;
    }
    let Some(start_time) = instance.state.gr.start_time else {
        return 0;
    };

    let elapsed = (Utc::now() - start_time).num_seconds().max(0) as u32;
    instance.config.gr.grace_period.saturating_sub(elapsed)
}

// Arms a planned restart: the marker is persisted for the next incarnation
// of the process and the grace period is announced on every operational
// interface.
pub fn prepare_restart(
    instance: &mut InstanceUpView<'_>,
    arenas: &InstanceArenas,
    reason: GrReason,
) -> Result<(), Error> {
    marker::write(
        &instance.shared.sysconfdir,
        instance.config.gr.restart_enabled,
        reason,
    )?;

    instance.shared.restart_reason.set(reason);
    instance.state.gr.shutdown_pending = true;
    for area in arenas.areas.iter() {
        for iface in area.interfaces.iter(&arenas.interfaces) {
            if iface.is_down() {
                continue;
            }
            restart::grace_lsa_originate(iface, area, instance);
        }
    }

    Ok(())
}

// Grace period to arm, after clamping and optional downtime compensation.
fn effective_grace_period(instance: &InstanceUpView<'_>) -> u32 {
    let config = &instance.config.gr;
    let mut period = std::cmp::min(config.grace_period, GRACE_PERIOD_MAX);

    if config.compensate_downtime
        && let Some(marker_time) = instance.state.gr.marker_time
    {
        let now = Utc::now();
        if marker_time <= now {
            let downtime = (now - marker_time).num_seconds() as u32;
            period = std::cmp::max(period.saturating_sub(downtime), 1);
        } else {
            // The wall clock went backwards across the restart. The marker
            // time can't tell us anything useful in that case.
            Debug::GrMarkerClockSkew(marker_time).log();
        }
    }

    period
}
