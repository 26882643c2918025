use crate::gshare_client::{ServiceKind, ServiceState, Snapshot};

use super::surface::{Panel, RenderOp, Surface};

const SERVICES: [ServiceKind; 4] = [
    ServiceKind::Vm,
    ServiceKind::Share,
    ServiceKind::NetworkMount,
    ServiceKind::Relay,
];

/// Panels and the service whose state drives their interactivity.
const PANELS: [(Panel, ServiceKind); 2] = [
    (Panel::VmControls, ServiceKind::Vm),
    (Panel::Share, ServiceKind::NetworkMount),
];

/// Indicator projection of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorState {
    pub vm: ServiceState,
    pub share: ServiceState,
    pub network_mount: ServiceState,
    pub relay: ServiceState,
}

/// Pure function of the latest snapshot; no side effects.
pub fn project(snapshot: &Snapshot) -> IndicatorState {
    IndicatorState {
        vm: snapshot.vm,
        share: snapshot.share,
        network_mount: snapshot.network_mount,
        relay: snapshot.relay,
    }
}

impl IndicatorState {
    pub fn service(&self, kind: ServiceKind) -> ServiceState {
        match kind {
            ServiceKind::Vm => self.vm,
            ServiceKind::Share => self.share,
            ServiceKind::NetworkMount => self.network_mount,
            ServiceKind::Relay => self.relay,
        }
    }

    fn set_service(&mut self, kind: ServiceKind, state: ServiceState) {
        match kind {
            ServiceKind::Vm => self.vm = state,
            ServiceKind::Share => self.share = state,
            ServiceKind::NetworkMount => self.network_mount = state,
            ServiceKind::Relay => self.relay = state,
        }
    }

    pub fn panel_enabled(&self, panel: Panel) -> bool {
        match panel {
            Panel::VmControls => self.vm.is_on(),
            Panel::Share => self.network_mount.is_on(),
        }
    }
}

/// Diffs successive indicator projections and writes only the transitions.
///
/// Services under a local pending lock are skipped entirely so a mid-toggle
/// control is never overwritten; their stored projection keeps the previous
/// value, so the transition is emitted once the lock releases.
#[derive(Default)]
pub struct StatusProjector {
    last: Option<IndicatorState>,
}

impl StatusProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<S, F>(&mut self, snapshot: &Snapshot, locked: F, surface: &mut S)
    where
        S: Surface,
        F: Fn(ServiceKind) -> bool,
    {
        let next = project(snapshot);

        for kind in SERVICES {
            if locked(kind) {
                continue;
            }
            let state = next.service(kind);
            if self.last.map(|prev| prev.service(kind)) != Some(state) {
                surface.apply(RenderOp::SetIndicator {
                    service: kind,
                    state,
                    label: state.label().to_string(),
                });
            }
        }

        for (panel, driver) in PANELS {
            if locked(driver) {
                continue;
            }
            let enabled = next.panel_enabled(panel);
            if self.last.map(|prev| prev.panel_enabled(panel)) != Some(enabled) {
                surface.apply(RenderOp::SetPanelEnabled { panel, enabled });
                if panel == Panel::VmControls && !enabled {
                    surface.apply(RenderOp::SetCheckProgress { percent: 0 });
                }
            }
        }

        let mut stored = next;
        if let Some(prev) = self.last {
            for kind in SERVICES {
                if locked(kind) {
                    stored.set_service(kind, prev.service(kind));
                }
            }
        }
        self.last = Some(stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gshare_client::{FolderEntry, MonitorMode};
    use crate::view::surface::RecordingSurface;

    fn snapshot(vm: &str, nfs: &str) -> Snapshot {
        Snapshot {
            last_check_time: String::new(),
            last_action: String::new(),
            vm: ServiceState::from_flag(Some(vm)),
            share: ServiceState::Off,
            network_mount: ServiceState::from_flag(Some(nfs)),
            relay: ServiceState::Unknown,
            relay_last_seen: None,
            cpu_usage: 0.0,
            low_cpu_streak: 0,
            low_cpu_threshold: 0,
            uptime: String::new(),
            last_shutdown_time: "-".to_string(),
            check_interval_secs: 60,
            monitor_mode: MonitorMode::Event,
            initial_scan_in_progress: false,
            folders: Vec::<FolderEntry>::new(),
        }
    }

    #[test]
    fn first_apply_emits_all_indicators_and_panels() {
        let mut projector = StatusProjector::new();
        let mut surface = RecordingSurface::new();

        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);

        assert_eq!(surface.count(|op| matches!(op, RenderOp::SetIndicator { .. })), 4);
        assert_eq!(
            surface.count(|op| matches!(op, RenderOp::SetPanelEnabled { .. })),
            2
        );
    }

    #[test]
    fn unchanged_snapshot_emits_nothing() {
        let mut projector = StatusProjector::new();
        let mut surface = RecordingSurface::new();

        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);
        surface.clear();
        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);

        assert!(surface.ops.is_empty());
    }

    #[test]
    fn vm_going_down_disables_panel_and_resets_progress() {
        let mut projector = StatusProjector::new();
        let mut surface = RecordingSurface::new();

        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);
        surface.clear();
        projector.apply(&snapshot("OFF", "ON"), |_| false, &mut surface);

        assert!(surface.ops.contains(&RenderOp::SetPanelEnabled {
            panel: Panel::VmControls,
            enabled: false,
        }));
        assert!(surface.ops.contains(&RenderOp::SetCheckProgress { percent: 0 }));
        // The share panel's driver didn't change.
        assert!(!surface
            .ops
            .iter()
            .any(|op| matches!(op, RenderOp::SetPanelEnabled { panel: Panel::Share, .. })));
    }

    #[test]
    fn network_mount_drives_share_panel() {
        let mut projector = StatusProjector::new();
        let mut surface = RecordingSurface::new();

        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);
        surface.clear();
        projector.apply(&snapshot("ON", "OFF"), |_| false, &mut surface);

        assert!(surface.ops.contains(&RenderOp::SetPanelEnabled {
            panel: Panel::Share,
            enabled: false,
        }));
        assert!(!surface.ops.contains(&RenderOp::SetCheckProgress { percent: 0 }));
    }

    #[test]
    fn locked_service_is_skipped_until_released() {
        let mut projector = StatusProjector::new();
        let mut surface = RecordingSurface::new();

        projector.apply(&snapshot("ON", "ON"), |_| false, &mut surface);
        surface.clear();

        // VM toggle pending: the flip must not touch the VM indicator.
        projector.apply(&snapshot("OFF", "ON"), |kind| kind == ServiceKind::Vm, &mut surface);
        assert!(!surface
            .ops
            .iter()
            .any(|op| matches!(op, RenderOp::SetIndicator { service: ServiceKind::Vm, .. })));

        // Lock released: the transition is written now.
        surface.clear();
        projector.apply(&snapshot("OFF", "ON"), |_| false, &mut surface);
        assert!(surface.ops.iter().any(|op| matches!(
            op,
            RenderOp::SetIndicator {
                service: ServiceKind::Vm,
                state: ServiceState::Off,
                ..
            }
        )));
    }
}
