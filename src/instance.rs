//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::Cell;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::collections::{
    AreaId, Areas, Arena, InterfaceId, Lsdb, NeighborId,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::gr::{self, InstanceGr};
use crate::interface::{Interface, ism};
use crate::lsdb::{LsaEntry, LsaOriginateEvent, OpaqueFunctab};
use crate::marker;
use crate::neighbor::{Neighbor, nsm};
use crate::packet::lsa::Lsa;
use crate::packet::tlv::GrReason;
use crate::tasks::messages::input::{
    GrAdjCheckMsg, GrGraceExpiryMsg, GrInstanceExitMsg, GrMonitorMsg,
    GrNoNbrWatchdogMsg, GracePeriodMsg,
};
use crate::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg, output};

#[derive(Debug)]
pub struct Instance {
    // Instance name.
    pub name: String,
    // Instance system data.
    pub system: InstanceSys,
    // Instance configuration data.
    pub config: InstanceCfg,
    // Instance state data.
    pub state: Option<InstanceState>,
    // Instance arenas.
    pub arenas: InstanceArenas,
    // Instance Tx channels.
    pub tx: InstanceChannelsTx,
    // Shared data.
    pub shared: InstanceShared,
}

#[derive(Debug, Default)]
pub struct InstanceSys {
    pub router_id: Option<Ipv4Addr>,
}

#[derive(Debug, Default)]
pub struct InstanceCfg {
    pub router_id: Option<Ipv4Addr>,
    pub gr: GrCfg,
}

// Graceful restart configuration knobs.
#[derive(Debug)]
pub struct GrCfg {
    // Restarting role.
    pub restart_enabled: bool,
    // Helper role.
    pub helper_enabled: bool,
    // Grace period, in seconds.
    pub grace_period: u32,
    // Exit helper sessions whenever the LSDB changes.
    pub strict_lsa_checking: bool,
    // Subtract the time spent restarting from the grace period.
    pub compensate_downtime: bool,
}

#[derive(Debug)]
pub struct InstanceState {
    // Instance Router ID.
    pub router_id: Ipv4Addr,
    // LSDB of AS-scope LSAs.
    pub lsdb: Lsdb,
    // Graceful restart state (restarting role).
    pub gr: InstanceGr,
    // Number of neighbors performing a graceful restart.
    pub gr_helper_count: usize,
    // Opaque LSA consumers.
    pub opaque_functab: OpaqueFunctab,
}

#[derive(Debug, Default)]
pub struct InstanceArenas {
    pub areas: Areas,
    pub interfaces: Arena<Interface>,
    pub neighbors: Arena<Neighbor>,
    pub lsa_entries: Arena<LsaEntry>,
}

// State shared by all instances of the process.
#[derive(Debug)]
pub struct InstanceShared {
    // Directory holding the persistent restart marker.
    pub sysconfdir: PathBuf,
    // A restart is in progress for at least one instance.
    pub restart_in_progress: Cell<bool>,
    // Restart reason recorded by the previous incarnation.
    pub restart_reason: Cell<GrReason>,
    // Wall clock recorded in the restart marker.
    pub marker_time: Cell<Option<DateTime<Utc>>>,
}

#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    pub protocol_input: ProtocolInputChannelsTx,
    pub host: HostChannelsTx,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Helper grace period timeout.
    pub grace_period: UnboundedSender<GracePeriodMsg>,
    // Instance grace period expiry.
    pub gr_grace_expiry: UnboundedSender<GrGraceExpiryMsg>,
    // Restart monitor tick.
    pub gr_monitor: UnboundedSender<GrMonitorMsg>,
    // Per-interface no-neighbor watchdog.
    pub gr_nonbr_watchdog: UnboundedSender<GrNoNbrWatchdogMsg>,
    // Deferred adjacency consistency check.
    pub gr_adj_check: UnboundedSender<GrAdjCheckMsg>,
    // Deferred instance exit task.
    pub gr_instance_exit: UnboundedSender<GrInstanceExitMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Helper grace period timeout.
    pub grace_period: UnboundedReceiver<GracePeriodMsg>,
    // Instance grace period expiry.
    pub gr_grace_expiry: UnboundedReceiver<GrGraceExpiryMsg>,
    // Restart monitor tick.
    pub gr_monitor: UnboundedReceiver<GrMonitorMsg>,
    // Per-interface no-neighbor watchdog.
    pub gr_nonbr_watchdog: UnboundedReceiver<GrNoNbrWatchdogMsg>,
    // Deferred adjacency consistency check.
    pub gr_adj_check: UnboundedReceiver<GrAdjCheckMsg>,
    // Deferred instance exit task.
    pub gr_instance_exit: UnboundedReceiver<GrInstanceExitMsg>,
}

// Requests toward the host OSPF implementation.
#[derive(Clone, Debug)]
pub struct HostChannelsTx(UnboundedSender<ProtocolOutputMsg>);

pub struct InstanceUpView<'a> {
    pub name: &'a str,
    pub system: &'a InstanceSys,
    pub config: &'a InstanceCfg,
    pub state: &'a mut InstanceState,
    pub tx: &'a InstanceChannelsTx,
    pub shared: &'a InstanceShared,
}

// ===== impl Instance =====

impl Instance {
    pub fn new(
        name: String,
        shared: InstanceShared,
        tx: InstanceChannelsTx,
    ) -> Instance {
        Debug::InstanceCreate.log();

        Instance {
            name,
            system: Default::default(),
            config: Default::default(),
            state: None,
            arenas: Default::default(),
            tx,
            shared,
        }
    }

    // Checks if the instance needs to be started in response to a
    // configuration or system event.
    pub fn update(&mut self) {
        if let Some(router_id) = self.get_router_id()
            && !self.is_active()
        {
            self.start(router_id);
        }
    }

    fn start(&mut self, router_id: Ipv4Addr) {
        Debug::InstanceStart.log();

        // The restarting role is enabled by the marker of the previous
        // incarnation or by configuration.
        if self.shared.restart_in_progress.get() {
            self.config.gr.restart_enabled = true;
        }

        // Store instance initial state.
        self.state = Some(InstanceState::new(router_id, &self.shared));

        let (mut instance, _) = self.as_up().unwrap();

        // Claim the Grace opaque type. Without it the subsystem stays
        // inert.
        if let Err(error) = gr::init(&mut instance) {
            error.log();
            return;
        }

        gr::check_and_arm_restart(&mut instance);
    }

    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }

        Debug::InstanceStop.log();

        // Clear instance state. All pending timers are cancelled on drop.
        self.state = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn get_router_id(&self) -> Option<Ipv4Addr> {
        self.config.router_id.or(self.system.router_id)
    }

    // Returns whether a restart is in progress, which gates whether stale
    // self-originated LSAs get flushed at startup.
    pub fn gr_restart_in_progress(&self) -> bool {
        self.shared.restart_in_progress.get()
    }

    pub fn as_up(
        &mut self,
    ) -> Option<(InstanceUpView<'_>, &mut InstanceArenas)> {
        if let Some(state) = &mut self.state {
            let instance = InstanceUpView {
                name: &self.name,
                system: &self.system,
                config: &self.config,
                state,
                tx: &self.tx,
                shared: &self.shared,
            };
            Some((instance, &mut self.arenas))
        } else {
            None
        }
    }

    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        // Ignore event if the instance isn't active.
        if let Some((mut instance, arenas)) = self.as_up()
            && let Err(error) =
                process_protocol_msg(&mut instance, arenas, msg)
        {
            error.log();
        }
    }

    // Runs the instance event loop.
    pub async fn run(&mut self, mut rx: ProtocolInputChannelsRx) {
        while let Some(msg) = rx.recv().await {
            self.process_protocol_msg(msg);
        }
    }

    pub fn channels() -> (
        InstanceChannelsTx,
        ProtocolInputChannelsRx,
        UnboundedReceiver<ProtocolOutputMsg>,
    ) {
        let (grace_periodp, grace_periodc) = mpsc::unbounded_channel();
        let (gr_grace_expiryp, gr_grace_expiryc) = mpsc::unbounded_channel();
        let (gr_monitorp, gr_monitorc) = mpsc::unbounded_channel();
        let (gr_nonbr_watchdogp, gr_nonbr_watchdogc) =
            mpsc::unbounded_channel();
        let (gr_adj_checkp, gr_adj_checkc) = mpsc::unbounded_channel();
        let (gr_instance_exitp, gr_instance_exitc) = mpsc::unbounded_channel();
        let (hostp, hostc) = mpsc::unbounded_channel();

        let tx = InstanceChannelsTx {
            protocol_input: ProtocolInputChannelsTx {
                grace_period: grace_periodp,
                gr_grace_expiry: gr_grace_expiryp,
                gr_monitor: gr_monitorp,
                gr_nonbr_watchdog: gr_nonbr_watchdogp,
                gr_adj_check: gr_adj_checkp,
                gr_instance_exit: gr_instance_exitp,
            },
            host: HostChannelsTx(hostp),
        };
        let rx = ProtocolInputChannelsRx {
            grace_period: grace_periodc,
            gr_grace_expiry: gr_grace_expiryc,
            gr_monitor: gr_monitorc,
            gr_nonbr_watchdog: gr_nonbr_watchdogc,
            gr_adj_check: gr_adj_checkc,
            gr_instance_exit: gr_instance_exitc,
        };

        (tx, rx, hostc)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        Debug::InstanceDelete.log();
    }
}

// ===== impl GrCfg =====

impl Default for GrCfg {
    fn default() -> GrCfg {
        GrCfg {
            restart_enabled: false,
            helper_enabled: true,
            grace_period: 120,
            strict_lsa_checking: false,
            compensate_downtime: false,
        }
    }
}

// ===== impl InstanceState =====

impl InstanceState {
    fn new(router_id: Ipv4Addr, shared: &InstanceShared) -> InstanceState {
        InstanceState {
            router_id,
            lsdb: Default::default(),
            gr: InstanceGr::new(
                shared.restart_in_progress.get(),
                shared.marker_time.get(),
            ),
            gr_helper_count: 0,
            opaque_functab: Default::default(),
        }
    }
}

// ===== impl InstanceShared =====

impl InstanceShared {
    // Reads the persistent restart marker, consuming it. The stored state
    // seeds the graceful restart of every instance created afterwards.
    pub fn load(sysconfdir: PathBuf) -> InstanceShared {
        let shared = InstanceShared {
            sysconfdir,
            restart_in_progress: Cell::new(false),
            restart_reason: Cell::new(GrReason::Unknown),
            marker_time: Cell::new(None),
        };

        match marker::read(&shared.sysconfdir) {
            Ok(Some(record)) => {
                if record.enabled {
                    shared.restart_in_progress.set(true);
                }
                shared.restart_reason.set(record.reason);
                shared.marker_time.set(Some(record.restart_time));
            }
            Ok(None) => (),
            Err(error) => error.log(),
        }

        shared
    }
}

impl Default for InstanceShared {
    fn default() -> InstanceShared {
        InstanceShared {
            sysconfdir: PathBuf::from("/etc"),
            restart_in_progress: Cell::new(false),
            restart_reason: Cell::new(GrReason::Unknown),
            marker_time: Cell::new(None),
        }
    }
}

// ===== impl ProtocolInputChannelsTx =====

impl ProtocolInputChannelsTx {
    // Posts a deferred adjacency consistency check for the neighbor.
    pub(crate) fn gr_adj_check(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
    ) {
        let _ = self.gr_adj_check.send(GrAdjCheckMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            nbr_key: nbr_id.into(),
        });
    }

    // Posts the instance exit task so it runs on a later event-loop
    // iteration.
    pub(crate) fn gr_instance_exit(&self) {
        let _ = self.gr_instance_exit.send(GrInstanceExitMsg {});
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            biased;
            msg = self.grace_period.recv() => {
                msg.map(ProtocolInputMsg::GracePeriod)
            }
            msg = self.gr_grace_expiry.recv() => {
                msg.map(ProtocolInputMsg::GrGraceExpiry)
            }
            msg = self.gr_monitor.recv() => {
                msg.map(ProtocolInputMsg::GrMonitor)
            }
            msg = self.gr_nonbr_watchdog.recv() => {
                msg.map(ProtocolInputMsg::GrNoNbrWatchdog)
            }
            msg = self.gr_adj_check.recv() => {
                msg.map(ProtocolInputMsg::GrAdjCheck)
            }
            msg = self.gr_instance_exit.recv() => {
                msg.map(ProtocolInputMsg::GrInstanceExit)
            }
        }
    }
}

// ===== impl HostChannelsTx =====

impl HostChannelsTx {
    pub(crate) fn send(&self, msg: ProtocolOutputMsg) {
        let _ = self.0.send(msg);
    }

    pub(crate) fn ism_event(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        event: ism::Event,
    ) {
        self.send(ProtocolOutputMsg::IsmEvent(output::IsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            event,
        }));
    }

    pub(crate) fn nsm_event(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        event: nsm::Event,
    ) {
        self.send(ProtocolOutputMsg::NsmEvent(output::NsmEventMsg {
            area_key: area_id.into(),
            iface_key: iface_id.into(),
            nbr_key: nbr_id.into(),
            event,
        }));
    }

    pub(crate) fn lsa_orig_event(&self, event: LsaOriginateEvent) {
        self.send(ProtocolOutputMsg::LsaOrig(output::LsaOrigEventMsg {
            event,
        }));
    }

    pub(crate) fn grace_lsa_flood(
        &self,
        area_id: AreaId,
        iface_id: InterfaceId,
        lsa: Arc<Lsa>,
    ) {
        self.send(ProtocolOutputMsg::GraceLsaFlood(
            output::GraceLsaFloodMsg {
                area_key: area_id.into(),
                iface_key: iface_id.into(),
                lsa,
            },
        ));
    }
}

// ===== helper functions =====

fn process_protocol_msg(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    msg: ProtocolInputMsg,
) -> Result<(), Error> {
    match msg {
        // Helper grace period timeout.
        ProtocolInputMsg::GracePeriod(msg) => {
            events::process_grace_period_timeout(
                instance,
                arenas,
                msg.area_key,
                msg.iface_key,
                msg.nbr_key,
            )?
        }
        // Instance grace period expiry.
        ProtocolInputMsg::GrGraceExpiry(_) => {
            events::process_gr_grace_expiry(instance, arenas)?
        }
        // Restart monitor tick.
        ProtocolInputMsg::GrMonitor(_) => {
            events::process_gr_monitor(instance, arenas)?
        }
        // Per-interface no-neighbor watchdog.
        ProtocolInputMsg::GrNoNbrWatchdog(msg) => {
            events::process_gr_nonbr_watchdog(
                instance,
                arenas,
                msg.area_key,
                msg.iface_key,
            )?
        }
        // Deferred adjacency consistency check.
        ProtocolInputMsg::GrAdjCheck(msg) => events::process_gr_adj_check(
            instance,
            arenas,
            msg.area_key,
            msg.iface_key,
            msg.nbr_key,
        )?,
        // Instance exit task.
        ProtocolInputMsg::GrInstanceExit(_) => {
            events::process_gr_instance_exit(instance, arenas)?
        }
    }

    Ok(())
}
