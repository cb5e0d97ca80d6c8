//! Resource guards: disk pre-flight and monitoring, memory-based batch
//! throttling, and the bounded-queue/bounded-walk caps (spec §5).

use crate::error::{Result, SearchError};
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, System};

pub const DISK_ESTIMATE_BASE_BYTES: u64 = 100 * 1024 * 1024;
pub const DISK_ESTIMATE_PER_FILE_BYTES: u64 = 5 * 1024;
pub const DISK_ESTIMATE_SLACK: f64 = 1.1;
pub const DISK_MONITOR_INTERVAL: Duration = Duration::from_secs(5);
pub const DISK_ABORT_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

pub const MEMORY_THROTTLE_THRESHOLD: f64 = 0.70;
pub const MEMORY_CRITICAL_THRESHOLD: f64 = 0.85;
pub const MEMORY_RESPONSIVENESS_FLOOR_BYTES: u64 = 256 * 1024 * 1024;

pub const BOUNDED_QUEUE_CAP: usize = 1000;
pub const BOUNDED_QUEUE_WARNING_THRESHOLD: usize = (BOUNDED_QUEUE_CAP * 8) / 10;

pub const WALK_MAX_DEPTH: usize = 20;
pub const WALK_MAX_ENTRIES: usize = 100_000;
pub const WALK_WALL_CLOCK_CEILING: Duration = Duration::from_secs(30);

/// Estimate the disk headroom a full index of `file_count` files requires.
pub fn estimated_required_bytes(file_count: usize) -> u64 {
    let base = DISK_ESTIMATE_BASE_BYTES + DISK_ESTIMATE_PER_FILE_BYTES * file_count as u64;
    (base as f64 * DISK_ESTIMATE_SLACK) as u64
}

/// Pre-flight disk check before starting an indexing run.
pub fn check_disk_preflight(path: &Path, file_count: usize) -> Result<()> {
    let available = available_disk_bytes(path);
    let required = estimated_required_bytes(file_count);
    if available < required {
        return Err(SearchError::resource_limit(format!(
            "insufficient disk space: need ~{required} bytes, {available} available"
        )));
    }
    Ok(())
}

/// Sampled during an indexing run; callers loop this on a
/// `DISK_MONITOR_INTERVAL` tick and abort the run on `Err`.
pub fn check_disk_monitor(path: &Path) -> Result<()> {
    let available = available_disk_bytes(path);
    if available < DISK_ABORT_THRESHOLD_BYTES {
        return Err(SearchError::resource_limit(format!(
            "available disk fell below {DISK_ABORT_THRESHOLD_BYTES} bytes during indexing"
        )));
    }
    Ok(())
}

fn available_disk_bytes(path: &Path) -> u64 {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let len = mount.as_os_str().len();
            if best.map(|(best_len, _)| len > best_len).unwrap_or(true) {
                best = Some((len, disk.available_space()));
            }
        }
    }
    best.map(|(_, bytes)| bytes).unwrap_or(u64::MAX)
}

/// Halve the batch size at the 70% heap threshold, shrink to `floor` at the
/// 85% threshold, only when total heap exceeds the responsiveness floor —
/// a small heap's transient spikes should not throttle the pipeline.
pub fn throttled_batch_size(default_batch_size: usize, floor: usize) -> usize {
    let mut system = System::new();
    system.refresh_memory();
    let total = system.total_memory();
    let used = system.used_memory();

    if total < MEMORY_RESPONSIVENESS_FLOOR_BYTES {
        return default_batch_size;
    }
    let ratio = used as f64 / total as f64;
    if ratio >= MEMORY_CRITICAL_THRESHOLD {
        floor.max(1)
    } else if ratio >= MEMORY_THROTTLE_THRESHOLD {
        (default_batch_size / 2).max(floor).max(1)
    } else {
        default_batch_size
    }
}

/// A bounded FIFO queue with an 80%-full warning, used for watcher/event
/// queues.
pub struct BoundedQueue<T> {
    items: std::collections::VecDeque<T>,
    cap: usize,
}

pub enum PushOutcome {
    Ok,
    OkNearCapacity,
    Rejected,
}

impl<T> BoundedQueue<T> {
    pub fn new(cap: usize) -> Self {
        Self { items: std::collections::VecDeque::new(), cap }
    }

    pub fn push(&mut self, item: T) -> PushOutcome {
        if self.items.len() >= self.cap {
            return PushOutcome::Rejected;
        }
        self.items.push_back(item);
        if self.items.len() >= (self.cap * 8) / 10 {
            PushOutcome::OkNearCapacity
        } else {
            PushOutcome::Ok
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Returns whether a directory walk should keep descending, given its
/// current depth, entry count, and elapsed wall-clock time.
pub fn walk_should_continue(depth: usize, entries_seen: usize, elapsed: Duration) -> bool {
    depth <= WALK_MAX_DEPTH && entries_seen < WALK_MAX_ENTRIES && elapsed < WALK_WALL_CLOCK_CEILING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimated_bytes_scales_with_file_count_and_slack() {
        let small = estimated_required_bytes(0);
        let large = estimated_required_bytes(1000);
        assert!(large > small);
        assert_eq!(small, (DISK_ESTIMATE_BASE_BYTES as f64 * DISK_ESTIMATE_SLACK) as u64);
    }

    #[test]
    fn bounded_queue_rejects_past_capacity() {
        let mut queue = BoundedQueue::new(2);
        assert!(matches!(queue.push(1), PushOutcome::Ok | PushOutcome::OkNearCapacity));
        assert!(matches!(queue.push(2), PushOutcome::Ok | PushOutcome::OkNearCapacity));
        assert!(matches!(queue.push(3), PushOutcome::Rejected));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn bounded_queue_warns_past_eighty_percent() {
        let mut queue = BoundedQueue::new(10);
        for i in 0..7 {
            queue.push(i);
        }
        assert!(matches!(queue.push(7), PushOutcome::OkNearCapacity));
    }

    #[test]
    fn walk_stops_at_depth_cap() {
        assert!(!walk_should_continue(WALK_MAX_DEPTH + 1, 0, Duration::ZERO));
        assert!(walk_should_continue(WALK_MAX_DEPTH, 0, Duration::ZERO));
    }

    #[test]
    fn walk_stops_at_entry_cap() {
        assert!(!walk_should_continue(0, WALK_MAX_ENTRIES, Duration::ZERO));
    }

    #[test]
    fn small_heap_is_never_throttled() {
        // total_memory on most CI machines exceeds the floor, so this test
        // asserts the function returns a usize without panicking rather
        // than asserting a specific branch.
        let size = throttled_batch_size(32, 4);
        assert!(size >= 1);
    }
}
