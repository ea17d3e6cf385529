// SPDX-License-Identifier: AGPL-3.0-or-later
//! Allocation tracking global allocator.
//!
//! [`TrackingAllocator`] forwards every request to the system allocator and,
//! while a trace is active on the calling thread, keeps a running total of
//! outstanding bytes and its high-water mark. Counters are thread-local, so a
//! trace only sees allocations made by the thread that opened it.
//!
//! Every block carries a hidden tag in front of the returned pointer naming the
//! trace that allocated it (0 for none). A free only counts against the trace
//! that allocated the block, so releasing memory owned before `start` never
//! offsets bytes allocated inside the trace. Reallocating a foreign block
//! inside a trace charges the whole new size and adopts the block.
//!
//! The allocator must be installed by the final binary:
//!
//! ```no_run
//! use cbenchlib::memory::alloc::TrackingAllocator;
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::system();
//! # fn main() {}
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{BenchError, Result};
use crate::memory::{HeapTracer, HeapUsage};

/// Set on the first allocation routed through any `TrackingAllocator`
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Source of trace ids; 0 is reserved for untraced blocks
static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

const TAG_SIZE: usize = std::mem::size_of::<u64>();

struct TraceState {
    /// Id of the running trace, 0 when inactive
    id: Cell<u64>,
    current: Cell<usize>,
    peak: Cell<usize>,
}

impl TraceState {
    const fn new() -> Self {
        Self {
            id: Cell::new(0),
            current: Cell::new(0),
            peak: Cell::new(0),
        }
    }

    fn charge(&self, bytes: usize) {
        let current = self.current.get().saturating_add(bytes);
        self.current.set(current);
        if current > self.peak.get() {
            self.peak.set(current);
        }
    }

    fn release(&self, bytes: usize) {
        self.current.set(self.current.get().saturating_sub(bytes));
    }
}

thread_local! {
    // No destructor, so access never allocates and works during thread teardown.
    static TRACE: TraceState = const { TraceState::new() };
}

/// Charge a fresh block and return the tag to store with it
fn record_alloc(bytes: usize) -> u64 {
    if !INSTALLED.load(Ordering::Relaxed) {
        INSTALLED.store(true, Ordering::Relaxed);
    }
    TRACE
        .try_with(|t| {
            let id = t.id.get();
            if id != 0 {
                t.charge(bytes);
            }
            id
        })
        .unwrap_or(0)
}

fn record_free(tag: u64, bytes: usize) {
    let _ = TRACE.try_with(|t| {
        if tag != 0 && t.id.get() == tag {
            t.release(bytes);
        }
    });
}

/// Account for a resize and return the block's new tag
fn record_realloc(tag: u64, old_size: usize, new_size: usize) -> u64 {
    TRACE
        .try_with(|t| {
            let id = t.id.get();
            if id == 0 {
                tag
            } else if id == tag {
                if new_size >= old_size {
                    t.charge(new_size - old_size);
                } else {
                    t.release(old_size - new_size);
                }
                id
            } else {
                t.charge(new_size);
                id
            }
        })
        .unwrap_or(tag)
}

/// Layout requested from the system allocator and the offset of the caller's pointer
fn tagged_layout(layout: Layout) -> Option<(Layout, usize)> {
    let offset = layout.align().max(TAG_SIZE);
    let size = layout.size().checked_add(offset)?;
    let full = Layout::from_size_align(size, offset).ok()?;
    Some((full, offset))
}

/// Tag slot sitting right before a caller's pointer
unsafe fn tag_slot(user: *mut u8) -> *mut u64 {
    user.sub(TAG_SIZE).cast::<u64>()
}

/// Global allocator wrapper that feeds [`AllocationTracer`]
pub struct TrackingAllocator {
    inner: System,
}

impl TrackingAllocator {
    pub const fn system() -> Self {
        Self { inner: System }
    }

    unsafe fn finish_alloc(base: *mut u8, offset: usize, size: usize) -> *mut u8 {
        if base.is_null() {
            return base;
        }
        let user = base.add(offset);
        tag_slot(user).write(record_alloc(size));
        user
    }
}

// SAFETY: every block handed out is `offset` bytes into a block obtained from
// `System` with `tagged_layout(layout)`, and `offset` is a multiple of
// `layout.align()`. The tag slot is 8-byte aligned because `offset >= 8` and
// both `offset` and the base alignment are powers of two.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let Some((full, offset)) = tagged_layout(layout) else {
            return ptr::null_mut();
        };
        Self::finish_alloc(self.inner.alloc(full), offset, layout.size())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let Some((full, offset)) = tagged_layout(layout) else {
            return ptr::null_mut();
        };
        Self::finish_alloc(self.inner.alloc_zeroed(full), offset, layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // Always Some: the same layout succeeded in `alloc`.
        let Some((full, offset)) = tagged_layout(layout) else {
            return;
        };
        record_free(tag_slot(ptr).read(), layout.size());
        self.inner.dealloc(ptr.sub(offset), full);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let Some((full, offset)) = tagged_layout(layout) else {
            return ptr::null_mut();
        };
        let Some((new_full, _)) = Layout::from_size_align(new_size, layout.align())
            .ok()
            .and_then(tagged_layout)
        else {
            return ptr::null_mut();
        };
        let tag = tag_slot(ptr).read();
        let base = self.inner.realloc(ptr.sub(offset), full, new_full.size());
        if base.is_null() {
            return base;
        }
        let user = base.add(offset);
        tag_slot(user).write(record_realloc(tag, layout.size(), new_size));
        user
    }
}

/// [`HeapTracer`] backed by the thread-local counters of [`TrackingAllocator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationTracer;

impl AllocationTracer {
    pub fn new() -> Self {
        Self
    }

    /// Whether a `TrackingAllocator` is serving this process's allocations
    pub fn is_installed() -> bool {
        if INSTALLED.load(Ordering::Relaxed) {
            return true;
        }
        drop(std::hint::black_box(Box::new(0u64)));
        INSTALLED.load(Ordering::Relaxed)
    }
}

impl HeapTracer for AllocationTracer {
    fn start(&self) -> Result<()> {
        if !Self::is_installed() {
            return Err(BenchError::MetricsUnavailable(
                "TrackingAllocator is not the global allocator".to_string(),
            ));
        }
        TRACE
            .try_with(|t| {
                if t.id.get() != 0 {
                    return Err(BenchError::MetricsUnavailable(
                        "heap trace already active on this thread".to_string(),
                    ));
                }
                t.current.set(0);
                t.peak.set(0);
                t.id.set(NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed));
                Ok(())
            })
            .map_err(|_| {
                BenchError::MetricsUnavailable("thread-local trace state destroyed".to_string())
            })?
    }

    fn usage(&self) -> HeapUsage {
        TRACE
            .try_with(|t| HeapUsage {
                current_bytes: t.current.get(),
                peak_bytes: t.peak.get(),
            })
            .unwrap_or_default()
    }

    fn stop(&self) {
        let _ = TRACE.try_with(|t| {
            t.id.set(0);
            t.current.set(0);
            t.peak.set(0);
        });
    }
}
