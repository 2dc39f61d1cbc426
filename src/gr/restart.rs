//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use num_traits::ToPrimitive;

use crate::area::Area;
use crate::debug::Debug;
use crate::gr::{self, GrExitReason, GrResumeEvent, GrResumeState, GrStatus};
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::{Interface, ism};
use crate::lsdb::{LSA_INIT_SEQ_NO, LSA_MAX_AGE, LsaOriginateEvent};
use crate::neighbor::{Neighbor, nsm};
use crate::packet::Options;
use crate::packet::lsa::{
    Lsa, LsaBody, LsaGrace, LsaOpaque, LsaOpaqueType, OpaqueLsaId,
};
use crate::packet::tlv::{GrInterfaceAddrTlv, GrReasonTlv, GracePeriodTlv};
use crate::tasks;

// Interval between two runs of the restart monitor.
const GR_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

// ===== global functions =====

// ISM hook: tracks interfaces becoming operational while the instance is
// restarting (RFC 3623, section 2.2).
pub(crate) fn process_ism_change(
    iface: &mut Interface,
    area: &Area,
    instance: &mut InstanceUpView<'_>,
) {
    if instance.state.gr.status == GrStatus::NotRestart {
        return;
    }

    match iface.state.ism_state {
        ism::State::PointToPoint | ism::State::DrOther | ism::State::Waiting
            if iface.state.gr.resume == GrResumeState::Idle =>
        {
            iface.state.gr.resume = GrResumeState::InProgress;
            Debug::GrResumeTransition(&iface.name, iface.state.gr.resume)
                .log();

            // Arm the restart monitor on the first resuming interface.
            if instance.state.gr.monitor.is_none() {
                let task =
                    tasks::gr_monitor_interval(instance, GR_MONITOR_INTERVAL);
                instance.state.gr.monitor = Some(task);
            }

            // Fail the interface if no neighbor shows up within twice the
            // dead interval.
            if iface.state.gr.nonbr_watchdog.is_none() {
                let task =
                    tasks::gr_nonbr_watchdog_timer(iface, area, instance);
                iface.state.gr.nonbr_watchdog = Some(task);
            }

            // Announce the remaining grace period to the segment.
            grace_lsa_originate(iface, area, instance);
        }
        ism::State::Down
            if iface.state.gr.resume == GrResumeState::InProgress =>
        {
            resume_event(iface, instance, GrResumeEvent::Expiry);
        }
        _ => {}
    }
}

// NSM hook: a neighbor reaching Full during a restart gets its adjacency
// checked for consistency against the pre-restart LSDB.
pub(crate) fn process_nsm_change(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &mut InstanceUpView<'_>,
) {
    if nbr.state == nsm::State::Full
        && instance.state.gr.status != GrStatus::NotRestart
    {
        instance
            .tx
            .protocol_input
            .gr_adj_check(area.id, iface.id, nbr.id);
    }
}

// Per-interface resume state machine.
pub(crate) fn resume_event(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
    event: GrResumeEvent,
) {
    Debug::GrResumeEvent(&iface.name, iface.state.gr.resume, event).log();

    let new_state = match event {
        GrResumeEvent::IntAdjComplete | GrResumeEvent::Extend => {
            GrResumeState::Ok
        }
        GrResumeEvent::Expiry | GrResumeEvent::NoNbr => GrResumeState::Nok,
        GrResumeEvent::NbrInconsistent => {
            instance.state.gr.exit_reason = GrExitReason::TopologyChanged;
            GrResumeState::Nok
        }
    };

    iface.state.gr.resume = new_state;
    iface.state.gr.nonbr_watchdog = None;
    Debug::GrResumeTransition(&iface.name, new_state).log();
}

// Grace period expiry (RFC 3623, section 2.2, exit condition 3).
pub(crate) fn process_grace_expiry(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    if instance.state.gr.status == GrStatus::NotRestart {
        return;
    }

    instance.state.gr.grace_timer = None;

    for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
        let area = &arenas.areas[area_idx];
        for iface_idx in area.interfaces.indexes().collect::<Vec<_>>() {
            let iface = &mut arenas.interfaces[iface_idx];
            resume_event(iface, instance, GrResumeEvent::Expiry);
        }
    }
    instance.state.gr.exit_reason = GrExitReason::TimedOut;

    // Don't wait for the next monitor tick to notice that every interface
    // has settled.
    process_monitor(instance, arenas);
}

// Per-interface no-neighbor watchdog.
pub(crate) fn process_nonbr_watchdog(
    iface: &mut Interface,
    instance: &mut InstanceUpView<'_>,
) {
    iface.state.gr.nonbr_watchdog = None;

    if iface.state.gr.resume == GrResumeState::InProgress
        && iface.state.neighbors.is_empty()
    {
        resume_event(iface, instance, GrResumeEvent::NoNbr);
    }
}

// Restart monitor: once every interface has settled in OK or NOK, leave the
// restarting mode and post the instance exit task.
pub(crate) fn process_monitor(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    if instance.state.gr.status == GrStatus::NotRestart {
        return;
    }

    let mut ok_cnt = 0;
    let mut nok_cnt = 0;
    let mut cnt = 0;
    for area in arenas.areas.iter() {
        for iface in area.interfaces.iter(&arenas.interfaces) {
            match iface.state.gr.resume {
                GrResumeState::Ok => ok_cnt += 1,
                GrResumeState::Nok => nok_cnt += 1,
                _ => (),
            }
            cnt += 1;
        }
    }

    if cnt != ok_cnt + nok_cnt {
        // Keep monitoring.
        return;
    }

    instance.state.gr.status = GrStatus::NotRestart;
    instance.state.gr.grace_timer = None;
    instance.state.gr.monitor = None;
    if cnt > 0 && cnt == ok_cnt {
        instance.state.gr.exit_reason = GrExitReason::Completed;
    }

    // Post the instance exit task so that the LSDB sees a stable state
    // before the self-originated LSAs are refreshed.
    if !instance.state.gr.exit_task_pending {
        instance.state.gr.exit_task_pending = true;
        instance.tx.protocol_input.gr_instance_exit();
    }
}

// Actions on exiting graceful restart (RFC 3623, section 2.3).
pub(crate) fn process_instance_exit(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) {
    instance.state.gr.exit_task_pending = false;
    Debug::GrExit(instance.state.gr.exit_reason).log();

    for area_idx in arenas.areas.indexes().collect::<Vec<_>>() {
        let area = &arenas.areas[area_idx];
        for iface_idx in area.interfaces.indexes().collect::<Vec<_>>() {
            let iface = &arenas.interfaces[iface_idx];

            // Signal the helpers that the restart is over, then refresh the
            // self-originated LSAs.
            grace_lsa_originate(iface, area, instance);
            instance.tx.host.lsa_orig_event(
                LsaOriginateEvent::RouterLsaRefresh { area_id: area.id },
            );
            if iface.state.dr.is_some() {
                instance.tx.host.lsa_orig_event(
                    LsaOriginateEvent::NetworkLsaRefresh {
                        area_id: area.id,
                        iface_id: iface.id,
                    },
                );
            } else if iface.state.network_lsa_self.is_some() {
                instance.tx.host.lsa_orig_event(
                    LsaOriginateEvent::NetworkLsaFlush {
                        area_id: area.id,
                        iface_id: iface.id,
                    },
                );
            }
        }
    }

    // The restart is no longer in progress for this process.
    instance.shared.restart_in_progress.set(false);
    instance.shared.restart_reason.set(Default::default());
}

// Originates the Grace-LSA for the given interface.
//
// Refused outside of a pending shutdown or an ongoing/exiting restart.
pub(crate) fn grace_lsa_originate(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) {
    let gr = &instance.state.gr;
    if !gr.shutdown_pending && gr.exit_reason == GrExitReason::None {
        return;
    }

    let lsa = grace_lsa_build(iface, instance);
    Debug::GraceLsaOriginate(&iface.name, &lsa.hdr).log();
    instance.tx.host.grace_lsa_flood(area.id, iface.id, Arc::new(lsa));
}

// ===== helper functions =====

fn grace_lsa_build(iface: &Interface, instance: &InstanceUpView<'_>) -> Lsa {
    let gr = &instance.state.gr;

    // An exited restart is signaled by flooding the Grace-LSA at MaxAge.
    let age = match gr.exit_reason {
        GrExitReason::Completed
        | GrExitReason::TimedOut
        | GrExitReason::TopologyChanged => LSA_MAX_AGE,
        _ => 0,
    };

    // Advertise the seconds remaining in the grace period.
    let grace_period = if gr.status != GrStatus::NotRestart {
        gr::restart_remaining(instance)
    } else {
        std::cmp::min(instance.config.gr.grace_period, gr::GRACE_PERIOD_MAX)
    };

    let reason = instance.shared.restart_reason.get();
    let grace = LsaGrace {
        grace_period: Some(GracePeriodTlv::new(grace_period)),
        gr_reason: Some(GrReasonTlv::new(reason.to_u8().unwrap())),
        addr: iface.system.addr.map(GrInterfaceAddrTlv::new),
        unknown_tlvs: Default::default(),
    };

    let lsa_id: Ipv4Addr =
        OpaqueLsaId::new(LsaOpaqueType::Grace as u8, 0).into();
    Lsa::new(
        age,
        Options::E | Options::O,
        lsa_id,
        instance.state.router_id,
        LSA_INIT_SEQ_NO,
        LsaBody::OpaqueLink(LsaOpaque::Grace(grace)),
    )
}
