// buffers.rs - Shared attribute columns handed to worker threads
//
// Columns are shared between the store and every in-flight job through an
// `Arc<SharedBuffers>`. Element access goes through `UnsafeCell` so chunks of
// one job can write disjoint index ranges concurrently without locks.
// Structural changes (push, remove, reserve) happen only through the owning
// store while no lease is outstanding.

use super::in_flight::InFlightJobs;
use glam::{Quat, Vec3};
use parking_lot::{Mutex, MutexGuard};
use std::cell::UnsafeCell;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one store; conflict checks only compare jobs on the same store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One attribute buffer.
pub struct Column<T> {
    cells: UnsafeCell<Vec<UnsafeCell<T>>>,
}

// SAFETY: element access is partitioned by the scheduler (disjoint write
// ranges, no reader concurrent with a writer) and structural access is
// exclusive to the owning store while no lease is held.
unsafe impl<T: Send> Send for Column<T> {}
unsafe impl<T: Send + Sync> Sync for Column<T> {}

impl<T: Copy> Column<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: UnsafeCell::new(Vec::with_capacity(capacity)),
        }
    }

    /// # Safety
    /// No structural mutation may run concurrently.
    #[inline]
    unsafe fn cells(&self) -> &Vec<UnsafeCell<T>> {
        &*self.cells.get()
    }

    /// # Safety
    /// Caller holds exclusive structural access: no lease is outstanding and
    /// no other reference into this column is alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn cells_mut(&self) -> &mut Vec<UnsafeCell<T>> {
        &mut *self.cells.get()
    }

    /// # Safety
    /// No writer may touch the column while the returned slice is alive.
    #[inline]
    pub(crate) unsafe fn as_slice(&self) -> &[T] {
        let cells = self.cells();
        // UnsafeCell<T> is repr(transparent) over T.
        std::slice::from_raw_parts(cells.as_ptr() as *const T, cells.len())
    }

    /// # Safety
    /// `range` must be in bounds and not aliased by any other live slice.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [T] {
        let cells = self.cells();
        debug_assert!(range.end <= cells.len());
        let ptr = UnsafeCell::raw_get(cells.as_ptr().add(range.start));
        std::slice::from_raw_parts_mut(ptr, range.len())
    }
}

/// Attribute columns for one simulation domain.
pub struct SharedBuffers {
    id: StoreId,
    leases: AtomicUsize,
    in_flight: Mutex<InFlightJobs>,
    pub(crate) position: Column<Vec3>,
    pub(crate) velocity: Column<Vec3>,
    pub(crate) mass: Column<f32>,
    pub(crate) force: Column<Vec3>,
    pub(crate) rotation: Column<Quat>,
}

impl SharedBuffers {
    pub(crate) fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            id: StoreId::next(),
            leases: AtomicUsize::new(0),
            in_flight: Mutex::new(InFlightJobs::new()),
            position: Column::with_capacity(capacity),
            velocity: Column::with_capacity(capacity),
            mass: Column::with_capacity(capacity),
            force: Column::with_capacity(capacity),
            rotation: Column::with_capacity(capacity),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> StoreId {
        self.id
    }

    #[inline]
    pub(crate) fn outstanding(&self) -> usize {
        self.leases.load(Ordering::Acquire)
    }

    /// Access sets of jobs submitted against these buffers, shared by every
    /// scheduler. Hold the guard across the conflict check and registration.
    pub(crate) fn in_flight(&self) -> MutexGuard<'_, InFlightJobs> {
        self.in_flight.lock()
    }
}

/// Row of values written by [`SharedBuffers::push_row`].
pub(crate) struct Row {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub force: Vec3,
    pub rotation: Quat,
}

/// Mutable references to one row of every column.
pub(crate) struct RowMut<'a> {
    pub position: &'a mut Vec3,
    pub velocity: &'a mut Vec3,
    pub mass: &'a mut f32,
    pub force: &'a mut Vec3,
    pub rotation: &'a mut Quat,
}

// Structural operations. Every one touches all columns in lockstep so the
// equal-length invariant holds after each call.
impl SharedBuffers {
    /// # Safety
    /// No lease outstanding; caller has exclusive access to the store.
    pub(crate) unsafe fn push_row(&self, row: Row) {
        self.position.cells_mut().push(UnsafeCell::new(row.position));
        self.velocity.cells_mut().push(UnsafeCell::new(row.velocity));
        self.mass.cells_mut().push(UnsafeCell::new(row.mass));
        self.force.cells_mut().push(UnsafeCell::new(row.force));
        self.rotation.cells_mut().push(UnsafeCell::new(row.rotation));
    }

    /// # Safety
    /// No lease outstanding; `index` in bounds.
    pub(crate) unsafe fn swap_remove_row(&self, index: usize) {
        self.position.cells_mut().swap_remove(index);
        self.velocity.cells_mut().swap_remove(index);
        self.mass.cells_mut().swap_remove(index);
        self.force.cells_mut().swap_remove(index);
        self.rotation.cells_mut().swap_remove(index);
    }

    /// # Safety
    /// No lease outstanding; `index` in bounds; the returned references must be
    /// dropped before any other access to the columns.
    pub(crate) unsafe fn row_mut(&self, index: usize) -> RowMut<'_> {
        RowMut {
            position: self.position.cells_mut()[index].get_mut(),
            velocity: self.velocity.cells_mut()[index].get_mut(),
            mass: self.mass.cells_mut()[index].get_mut(),
            force: self.force.cells_mut()[index].get_mut(),
            rotation: self.rotation.cells_mut()[index].get_mut(),
        }
    }

    /// # Safety
    /// No lease outstanding.
    pub(crate) unsafe fn set_capacity(&self, capacity: usize) {
        fn fit<T>(cells: &mut Vec<T>, capacity: usize) {
            if capacity > cells.capacity() {
                cells.reserve_exact(capacity - cells.len());
            } else {
                cells.shrink_to(capacity);
            }
        }
        fit(self.position.cells_mut(), capacity);
        fit(self.velocity.cells_mut(), capacity);
        fit(self.mass.cells_mut(), capacity);
        fit(self.force.cells_mut(), capacity);
        fit(self.rotation.cells_mut(), capacity);
    }

    /// # Safety
    /// No lease outstanding.
    pub(crate) unsafe fn release_all(&self) {
        *self.position.cells_mut() = Vec::new();
        *self.velocity.cells_mut() = Vec::new();
        *self.mass.cells_mut() = Vec::new();
        *self.force.cells_mut() = Vec::new();
        *self.rotation.cells_mut() = Vec::new();
    }
}

/// Keeps the store from structural mutation while a job may still touch it.
///
/// Taken at submission, dropped right before the job's handle settles.
pub(crate) struct StoreLease {
    buffers: Arc<SharedBuffers>,
}

impl StoreLease {
    pub(crate) fn acquire(buffers: &Arc<SharedBuffers>) -> Self {
        buffers.leases.fetch_add(1, Ordering::AcqRel);
        Self {
            buffers: Arc::clone(buffers),
        }
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        self.buffers.leases.fetch_sub(1, Ordering::Release);
    }
}
