//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#[cfg(not(feature = "testing"))]
use std::future::Future;
use std::time::Duration;

#[cfg(not(feature = "testing"))]
use tokio::task;
#[cfg(not(feature = "testing"))]
use tokio::time::{self, Instant};
#[cfg(not(feature = "testing"))]
use tracing::Instrument;

use crate::area::Area;
use crate::instance::InstanceUpView;
use crate::interface::Interface;
use crate::neighbor::Neighbor;

//
// Graceful restart tasks diagram:
//
//                                  +--------------+
//            grace_period (Nx) ->  |              |
//     gr_grace_expiry_timer (1x) ->|              |
//       gr_monitor_interval (1x) ->|   instance   | -> (1x) host output
//   gr_nonbr_watchdog_timer (Nx) ->|              |
//      nsm_inactivity_timer (Nx) ->|              |
//                                  +--------------+
//

// GR inter-task message types.
pub mod messages {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::collections::{AreaKey, InterfaceKey, NeighborKey};
    use crate::interface::ism;
    use crate::lsdb::LsaOriginateEvent;
    use crate::neighbor::nsm;
    use crate::packet::lsa::Lsa;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;
    pub type ProtocolOutputMsg = output::ProtocolMsg;

    // Input messages (timers and deferred tasks -> main task).
    pub mod input {
        use super::*;

        #[derive(Debug, Deserialize, Serialize)]
        pub enum ProtocolMsg {
            GracePeriod(GracePeriodMsg),
            GrGraceExpiry(GrGraceExpiryMsg),
            GrMonitor(GrMonitorMsg),
            GrNoNbrWatchdog(GrNoNbrWatchdogMsg),
            GrAdjCheck(GrAdjCheckMsg),
            GrInstanceExit(GrInstanceExitMsg),
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GracePeriodMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub nbr_key: NeighborKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GrGraceExpiryMsg {}

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GrMonitorMsg {}

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GrNoNbrWatchdogMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GrAdjCheckMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub nbr_key: NeighborKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct GrInstanceExitMsg {}
    }

    // Output messages (main task -> host OSPF).
    pub mod output {
        use super::*;

        #[derive(Debug, Serialize)]
        pub enum ProtocolMsg {
            IsmEvent(IsmEventMsg),
            NsmEvent(NsmEventMsg),
            LsaOrig(LsaOrigEventMsg),
            GraceLsaFlood(GraceLsaFloodMsg),
        }

        #[derive(Clone, Debug, Serialize)]
        pub struct IsmEventMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub event: ism::Event,
        }

        #[derive(Clone, Debug, Serialize)]
        pub struct NsmEventMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub nbr_key: NeighborKey,
            pub event: nsm::Event,
        }

        #[derive(Clone, Debug, Serialize)]
        pub struct LsaOrigEventMsg {
            pub event: LsaOriginateEvent,
        }

        #[derive(Clone, Debug, Serialize)]
        pub struct GraceLsaFloodMsg {
            pub area_key: AreaKey,
            pub iface_key: InterfaceKey,
            pub lsa: Arc<Lsa>,
        }
    }
}

// ===== task primitives =====

/// Owning handle for a one-shot timer.
///
/// The callback runs once the timeout elapses. There is no explicit cancel
/// or reset operation: dropping the handle aborts the underlying task. In
/// testing builds the handle is inert and nothing ever fires.
#[derive(Debug)]
pub struct TimeoutTask {
    #[cfg(not(feature = "testing"))]
    inner: TimeoutTaskInner,
}

#[cfg(not(feature = "testing"))]
#[derive(Debug)]
struct TimeoutTaskInner {
    handle: task::JoinHandle<()>,
    deadline: Instant,
}

/// Owning handle for a periodic timer.
///
/// The callback runs on every tick until the handle is dropped. Inert in
/// testing builds, like [`TimeoutTask`].
#[derive(Debug)]
pub struct IntervalTask {
    #[cfg(not(feature = "testing"))]
    inner: IntervalTaskInner,
}

#[cfg(not(feature = "testing"))]
#[derive(Debug)]
struct IntervalTaskInner {
    handle: task::JoinHandle<()>,
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Schedules `cb` to run once, `timeout` from now.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let deadline = Instant::now() + timeout;
        let handle = task::spawn(
            async move {
                time::sleep_until(deadline).await;
                (cb)().await;
            }
            .in_current_span(),
        );

        TimeoutTask {
            inner: TimeoutTaskInner { handle, deadline },
        }
    }

    /// Time left before the callback runs. Zero once the deadline passed,
    /// and always zero in testing builds.
    pub fn remaining(&self) -> Duration {
        #[cfg(not(feature = "testing"))]
        {
            self.inner
                .deadline
                .saturating_duration_since(Instant::now())
        }
        #[cfg(feature = "testing")]
        {
            Duration::ZERO
        }
    }
}

#[cfg(not(feature = "testing"))]
impl Drop for TimeoutTask {
    fn drop(&mut self) {
        self.inner.handle.abort();
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Schedules `cb` to run every `interval`, optionally starting with an
    /// immediate tick.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(
        interval: Duration,
        tick_on_start: bool,
        mut cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let first_tick = if tick_on_start {
            Instant::now()
        } else {
            Instant::now() + interval
        };
        let handle = task::spawn(
            async move {
                let mut ticker = time::interval_at(first_tick, interval);
                loop {
                    ticker.tick().await;
                    (cb)().await;
                }
            }
            .in_current_span(),
        );

        IntervalTask {
            inner: IntervalTaskInner { handle },
        }
    }
}

#[cfg(not(feature = "testing"))]
impl Drop for IntervalTask {
    fn drop(&mut self) {
        self.inner.handle.abort();
    }
}

// ===== GR tasks =====

// Neighbor inactivity timer.
//
// On expiry the host NSM is asked to run the InactivityTimer event. The
// helper state machine disarms this timer for the whole helper session.
pub(crate) fn nsm_inactivity_timer(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout = Duration::from_secs(iface.config.dead_interval.into());
        let area_id = area.id;
        let iface_id = iface.id;
        let nbr_id = nbr.id;
        let hostp = instance.tx.host.clone();

        TimeoutTask::new(timeout, move || async move {
            let msg = messages::output::NsmEventMsg {
                area_key: area_id.into(),
                iface_key: iface_id.into(),
                nbr_key: nbr_id.into(),
                event: crate::neighbor::nsm::Event::InactivityTimer,
            };
            let _ = hostp.send(messages::output::ProtocolMsg::NsmEvent(msg));
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Helper grace period timer task.
pub(crate) fn grace_period_timer(
    nbr: &Neighbor,
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
    grace_period: u32,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let area_id = area.id;
        let iface_id = iface.id;
        let nbr_id = nbr.id;
        let grace_periodp = instance.tx.protocol_input.grace_period.clone();

        TimeoutTask::new(
            Duration::from_secs(grace_period.into()),
            move || async move {
                let _ = grace_periodp.send(messages::input::GracePeriodMsg {
                    area_key: area_id.into(),
                    iface_key: iface_id.into(),
                    nbr_key: nbr_id.into(),
                });
            },
        )
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Instance grace period expiry timer task.
pub(crate) fn gr_grace_expiry_timer(
    instance: &InstanceUpView<'_>,
    grace_period: u32,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let grace_expiryp = instance.tx.protocol_input.gr_grace_expiry.clone();

        TimeoutTask::new(
            Duration::from_secs(grace_period.into()),
            move || async move {
                let _ = grace_expiryp
                    .send(messages::input::GrGraceExpiryMsg {});
            },
        )
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Restart monitor interval task.
pub(crate) fn gr_monitor_interval(
    instance: &InstanceUpView<'_>,
    interval: Duration,
) -> IntervalTask {
    #[cfg(not(feature = "testing"))]
    {
        let gr_monitorp = instance.tx.protocol_input.gr_monitor.clone();

        IntervalTask::new(interval, false, move || {
            let gr_monitorp = gr_monitorp.clone();
            async move {
                let _ = gr_monitorp.send(messages::input::GrMonitorMsg {});
            }
        })
    }
    #[cfg(feature = "testing")]
    {
        IntervalTask {}
    }
}

// Per-interface no-neighbor watchdog.
//
// Armed for twice the dead interval when the interface resumes during a
// restart.
pub(crate) fn gr_nonbr_watchdog_timer(
    iface: &Interface,
    area: &Area,
    instance: &InstanceUpView<'_>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let timeout =
            Duration::from_secs((2 * iface.config.dead_interval).into());
        let area_id = area.id;
        let iface_id = iface.id;
        let nonbr_watchdogp =
            instance.tx.protocol_input.gr_nonbr_watchdog.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ =
                nonbr_watchdogp.send(messages::input::GrNoNbrWatchdogMsg {
                    area_key: area_id.into(),
                    iface_key: iface_id.into(),
                });
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}
