use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::gshare_client::FolderEntry;

use super::relative_time::{TimeFormatter, COLLECTING_LABEL, UNKNOWN_SENTINEL};
use super::surface::{Bucket, RenderOp, Surface};
use super::visibility::VisibilityTracker;

/// Mirror of one rendered entry node. The reconciler diffs against these
/// handles; the actual render write is the emitted op.
#[derive(Debug)]
pub struct NodeHandle {
    pub raw_mtime: String,
    pub time_label: String,
    bound: bool,
}

impl NodeHandle {
    /// Whether the node's interactive sub-elements have been wired. Wiring
    /// happens exactly once, at creation.
    pub fn bound(&self) -> bool {
        self.bound
    }
}

struct PendingPass {
    entries: Vec<FolderEntry>,
    scan_in_progress: bool,
}

struct Pass {
    entries: Vec<FolderEntry>,
    cursor: usize,
    seen: HashSet<String>,
    scan_in_progress: bool,
    created: usize,
    updated: usize,
}

impl Pass {
    fn new(pending: PendingPass) -> Self {
        Self {
            entries: pending.entries,
            cursor: 0,
            seen: HashSet::new(),
            scan_in_progress: pending.scan_in_progress,
            created: 0,
            updated: 0,
        }
    }
}

struct Container {
    bucket: Bucket,
    nodes: HashMap<String, NodeHandle>,
    /// Append-only render order; existing nodes never move.
    order: Vec<String>,
    pass: Option<Pass>,
    queued: Option<PendingPass>,
    empty_shown: bool,
}

impl Container {
    fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            nodes: HashMap::new(),
            order: Vec::new(),
            pass: None,
            queued: None,
            empty_shown: false,
        }
    }

    fn has_work(&self) -> bool {
        self.pass.is_some() || self.queued.is_some()
    }

    fn complete<S: Surface>(
        &mut self,
        pass: Pass,
        tracker: &mut VisibilityTracker,
        surface: &mut S,
    ) {
        // A known-transient gap: the server has not finished its initial
        // scan, so an empty list means "nothing reported yet", not "nothing
        // exists". Keep the prior nodes and stay quiet.
        let transient_gap = pass.entries.is_empty() && pass.scan_in_progress;

        if !transient_gap {
            let stale: Vec<String> = self
                .order
                .iter()
                .filter(|key| !pass.seen.contains(*key))
                .cloned()
                .collect();
            if !stale.is_empty() {
                let stale_set: HashSet<&String> = stale.iter().collect();
                self.order.retain(|key| !stale_set.contains(key));
                for key in stale {
                    self.nodes.remove(&key);
                    tracker.forget(&key);
                    surface.apply(RenderOp::RemoveEntry {
                        container: self.bucket,
                        key,
                    });
                }
            }
        }

        let show_empty = self.nodes.is_empty() && !pass.scan_in_progress;
        if show_empty != self.empty_shown {
            self.empty_shown = show_empty;
            surface.apply(RenderOp::SetEmptyState {
                container: self.bucket,
                visible: show_empty,
            });
        }

        debug!(
            bucket = ?self.bucket,
            created = pass.created,
            updated = pass.updated,
            total = self.nodes.len(),
            "Reconcile pass complete"
        );
    }
}

/// Patches the two rendered entry lists to match the latest snapshot with
/// minimal churn.
///
/// Incoming lists are processed in fixed-size chunks so one pass never
/// monopolizes the scheduler; the session yields between `step` calls. A pass
/// arriving while another is draining is queued (latest wins) and starts only
/// after the current one completes, so per-container passes never interleave.
pub struct ListReconciler {
    mountable: Container,
    mounted: Container,
    chunk_size: usize,
    formatter: TimeFormatter,
}

impl ListReconciler {
    pub fn new(chunk_size: usize, formatter: TimeFormatter) -> Self {
        Self {
            mountable: Container::new(Bucket::Mountable),
            mounted: Container::new(Bucket::Mounted),
            chunk_size: chunk_size.max(1),
            formatter,
        }
    }

    fn container(&self, bucket: Bucket) -> &Container {
        match bucket {
            Bucket::Mountable => &self.mountable,
            Bucket::Mounted => &self.mounted,
        }
    }

    fn container_mut(&mut self, bucket: Bucket) -> &mut Container {
        match bucket {
            Bucket::Mountable => &mut self.mountable,
            Bucket::Mounted => &mut self.mounted,
        }
    }

    /// Start (or queue) a reconcile pass for one container.
    pub fn begin(&mut self, bucket: Bucket, entries: Vec<FolderEntry>, scan_in_progress: bool) {
        let container = self.container_mut(bucket);
        let pending = PendingPass {
            entries,
            scan_in_progress,
        };
        if container.pass.is_some() {
            container.queued = Some(pending);
        } else {
            container.pass = Some(Pass::new(pending));
        }
    }

    pub fn has_pending(&self) -> bool {
        self.mountable.has_work() || self.mounted.has_work()
    }

    /// Process one chunk for the given container. Returns `true` while work
    /// remains.
    pub fn step<S: Surface>(
        &mut self,
        bucket: Bucket,
        tracker: &mut VisibilityTracker,
        surface: &mut S,
        now: DateTime<Utc>,
    ) -> bool {
        let chunk_size = self.chunk_size;
        let formatter = self.formatter;
        let container = self.container_mut(bucket);

        let Some(pass) = container.pass.as_mut() else {
            return false;
        };

        let end = (pass.cursor + chunk_size).min(pass.entries.len());
        for index in pass.cursor..end {
            let entry = &pass.entries[index];
            pass.seen.insert(entry.path.clone());

            match container.nodes.get_mut(&entry.path) {
                Some(node) => {
                    // Same mtime: nothing to recompute or write.
                    if node.raw_mtime != entry.mtime {
                        let label = entry_label(&formatter, &entry.mtime, now);
                        node.raw_mtime = entry.mtime.clone();
                        node.time_label = label.clone();
                        pass.updated += 1;
                        surface.apply(RenderOp::UpdateEntryTime {
                            container: bucket,
                            key: entry.path.clone(),
                            time_label: label,
                            raw_mtime: entry.mtime.clone(),
                        });
                    }
                }
                None => {
                    let label = entry_label(&formatter, &entry.mtime, now);
                    container.nodes.insert(
                        entry.path.clone(),
                        NodeHandle {
                            raw_mtime: entry.mtime.clone(),
                            time_label: label.clone(),
                            bound: true,
                        },
                    );
                    container.order.push(entry.path.clone());
                    tracker.register(&entry.path);
                    pass.created += 1;
                    surface.apply(RenderOp::CreateEntry {
                        container: bucket,
                        key: entry.path.clone(),
                        time_label: label,
                        raw_mtime: entry.mtime.clone(),
                        action: bucket.action(),
                    });
                }
            }
        }
        pass.cursor = end;

        if pass.cursor < pass.entries.len() {
            return true;
        }

        if let Some(pass) = container.pass.take() {
            container.complete(pass, tracker, surface);
        }

        if let Some(pending) = container.queued.take() {
            container.pass = Some(Pass::new(pending));
            return true;
        }
        false
    }

    /// Advance pending passes by one scheduling slice. When `staggered` is
    /// set (large snapshots), only one container advances per slice so the
    /// two lists never reconcile in the same frame.
    pub fn step_all<S: Surface>(
        &mut self,
        tracker: &mut VisibilityTracker,
        surface: &mut S,
        now: DateTime<Utc>,
        staggered: bool,
    ) {
        let mut advanced = false;
        for bucket in [Bucket::Mountable, Bucket::Mounted] {
            if staggered && advanced {
                break;
            }
            if self.container(bucket).has_work() {
                self.step(bucket, tracker, surface, now);
                advanced = true;
            }
        }
    }

    /// Drain every pending pass synchronously.
    pub fn run_to_completion<S: Surface>(
        &mut self,
        tracker: &mut VisibilityTracker,
        surface: &mut S,
        now: DateTime<Utc>,
    ) {
        while self.has_pending() {
            self.step_all(tracker, surface, now, false);
        }
    }

    /// Recompute relative-time labels for the currently visible nodes only,
    /// writing only labels whose text actually changed.
    pub fn refresh_visible<S: Surface>(
        &mut self,
        tracker: &VisibilityTracker,
        now: DateTime<Utc>,
        surface: &mut S,
    ) {
        let formatter = self.formatter;
        for container in [&mut self.mountable, &mut self.mounted] {
            for key in tracker.visible_keys() {
                if let Some(node) = container.nodes.get_mut(key) {
                    let label = entry_label(&formatter, &node.raw_mtime, now);
                    if label != node.time_label {
                        node.time_label = label.clone();
                        surface.apply(RenderOp::UpdateEntryTime {
                            container: container.bucket,
                            key: key.clone(),
                            time_label: label,
                            raw_mtime: node.raw_mtime.clone(),
                        });
                    }
                }
            }
        }
    }

    pub fn node(&self, bucket: Bucket, key: &str) -> Option<&NodeHandle> {
        self.container(bucket).nodes.get(key)
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.container(bucket).nodes.len()
    }

    pub fn rendered_order(&self, bucket: Bucket) -> &[String] {
        &self.container(bucket).order
    }
}

/// Partition snapshot folders into the two buckets, each ordered by
/// descending mtime; unknown/unparseable mtimes sort last.
pub fn partition_entries(
    folders: &[FolderEntry],
    formatter: &TimeFormatter,
) -> (Vec<FolderEntry>, Vec<FolderEntry>) {
    let mut mountable: Vec<FolderEntry> = Vec::new();
    let mut mounted: Vec<FolderEntry> = Vec::new();
    for entry in folders {
        if entry.mounted {
            mounted.push(entry.clone());
        } else {
            mountable.push(entry.clone());
        }
    }
    mountable.sort_by_key(|entry| std::cmp::Reverse(formatter.sort_key(&entry.mtime)));
    mounted.sort_by_key(|entry| std::cmp::Reverse(formatter.sort_key(&entry.mtime)));
    (mountable, mounted)
}

fn entry_label(formatter: &TimeFormatter, raw: &str, now: DateTime<Utc>) -> String {
    if raw.trim() == UNKNOWN_SENTINEL {
        COLLECTING_LABEL.to_string()
    } else {
        formatter.relative(raw, now)
    }
}
