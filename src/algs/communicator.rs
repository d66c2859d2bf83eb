//! Thin façade over intra-process (threads) or inter-process (MPI) message
//! passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: `isend`/`irecv` only post
//! the operation, and the halo exchanger calls `.wait()` before it trusts
//! that a receive buffer is ready. `Wait::wait` consumes the handle, so each
//! posted operation is completed exactly once.
//!
//! Messages on one `(source, dest, tag)` channel are delivered in FIFO order.

use crate::algs::wire::WireF64;
use crate::jacobi_error::JacobiError;
use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `k` slots above this one.
    pub const fn offset(self, k: u16) -> CommTag {
        CommTag(self.0 + k)
    }
}

/// Halo messages use `HALO_TAG_BASE + direction of travel`.
pub const HALO_TAG_BASE: CommTag = CommTag(0x4A00);
/// Reserved for the point-to-point fallback of [`Communicator::all_reduce_sum`].
pub const REDUCE_TAG: CommTag = CommTag(0xF00D);

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Best-effort name of the machine this process runs on.
pub fn host_name() -> &'static str {
    static HOST: Lazy<String> = Lazy::new(|| {
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string())
    });
    HOST.as_str()
}

/// Non-blocking communication interface plus the few collectives the solver
/// needs.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`. The payload is copied or pinned before
    /// returning, so `buf` may be reused immediately.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of up to `buf.len()` bytes from `peer`; the data comes
    /// back from `wait()`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Host identity for the startup banner.
    fn processor_name(&self) -> String {
        host_name().to_string()
    }

    /// Sum `local` over all workers; every worker gets the same value.
    ///
    /// The default gathers to rank 0 over [`REDUCE_TAG`], sums in rank order
    /// and sends the total back, so the result is bitwise identical on every
    /// worker and independent of arrival order.
    fn all_reduce_sum(&self, local: f64) -> Result<f64, JacobiError> {
        let size = self.size();
        if size <= 1 {
            return Ok(local);
        }
        let tag = REDUCE_TAG.as_u16();
        let width = std::mem::size_of::<WireF64>();
        if self.rank() == 0 {
            let pending: Vec<_> = (1..size)
                .map(|peer| {
                    let mut buf = vec![0u8; width];
                    (peer, self.irecv(peer, tag, &mut buf))
                })
                .collect();
            let mut total = local;
            for (peer, h) in pending {
                total += decode_scalar(peer, h.wait())?;
            }
            let payload = WireF64::of(total);
            let sends: Vec<_> = (1..size)
                .map(|peer| self.isend(peer, tag, bytemuck::bytes_of(&payload)))
                .collect();
            for s in sends {
                let _ = s.wait();
            }
            Ok(total)
        } else {
            let payload = WireF64::of(local);
            let send = self.isend(0, tag, bytemuck::bytes_of(&payload));
            let mut buf = vec![0u8; width];
            let recv = self.irecv(0, tag, &mut buf);
            let _ = send.wait();
            decode_scalar(0, recv.wait())
        }
    }

    /// Block until every worker has reached the barrier.
    fn barrier(&self) -> Result<(), JacobiError> {
        self.all_reduce_sum(0.0).map(|_| ())
    }

    /// Bring down every worker of the run. Backends that cannot terminate
    /// their peers directly make all pending and future waits fail instead.
    fn abort(&self, code: i32);
}

fn decode_scalar(peer: usize, data: Option<Vec<u8>>) -> Result<f64, JacobiError> {
    let width = std::mem::size_of::<WireF64>();
    match data {
        Some(bytes) if bytes.len() == width => {
            Ok(bytemuck::pod_read_unaligned::<WireF64>(&bytes).get())
        }
        Some(bytes) => Err(JacobiError::CommError {
            neighbor: peer,
            reason: format!("expected {width} bytes for reduction, got {}", bytes.len()),
        }),
        None => Err(JacobiError::CommError {
            neighbor: peer,
            reason: "reduction message never arrived".into(),
        }),
    }
}

/// Compile-time no-op comm for a single worker and pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
    fn abort(&self, code: i32) {
        log::error!("abort requested (code {code}) on a single-worker run");
    }
}

// --- ThreadComm: one OS thread per worker, shared in-process mailbox ---

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    bell: Mutex<u64>,
    rung: Condvar,
    aborted: AtomicBool,
}

impl Mailbox {
    fn push(&self, key: Key, payload: Bytes) {
        self.slots.entry(key).or_default().push_back(payload);
        let mut bell = self.bell.lock();
        *bell = bell.wrapping_add(1);
        self.rung.notify_all();
    }

    fn pop(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }

    /// Block until a message is queued on `key`, or the universe aborts.
    fn wait_pop(&self, key: &Key) -> Option<Bytes> {
        loop {
            if let Some(b) = self.pop(key) {
                return Some(b);
            }
            let mut bell = self.bell.lock();
            // re-check under the bell so a concurrent push cannot be missed
            if let Some(b) = self.pop(key) {
                return Some(b);
            }
            if self.aborted.load(Ordering::Acquire) {
                return None;
            }
            self.rung.wait(&mut bell);
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        let _bell = self.bell.lock();
        self.rung.notify_all();
    }
}

/// Pending receive on a [`ThreadComm`] channel.
pub struct ThreadRecvHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let bytes = self.mailbox.wait_pop(&self.key)?;
        let n = self.len.min(bytes.len());
        Some(bytes[..n].to_vec())
    }
}

/// In-process communicator: each worker owns one handle of a universe and
/// runs on its own thread. Sends are buffered and complete immediately.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ThreadComm {
    /// Create `size` connected handles, one per rank, in rank order.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// True once any handle of this universe called [`Communicator::abort`].
    pub fn is_aborted(&self) -> bool {
        self.mailbox.aborted.load(Ordering::Acquire)
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .push((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        ThreadRecvHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn abort(&self, code: i32) {
        log::error!("rank {} aborting the run (code {code})", self.rank);
        self.mailbox.abort();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// One MPI process per worker.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        // finalizes MPI on drop, keep last
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialize MPI; `None` if it was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// A posted MPI request together with the buffer it pins.
    pub struct MpiHandle(Box<dyn FnOnce() -> Option<Vec<u8>>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            (self.0)()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let pinned: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = pinned as *const [u8] as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, pinned, i32::from(tag));
            MpiHandle(Box::new(move || {
                req.wait();
                // SAFETY: the request completed and was consumed, nothing else
                // refers to the leaked buffer any more.
                drop(unsafe { Box::from_raw(raw) });
                None
            }))
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let pinned: &'static mut [u8] = Box::leak(vec![0u8; buf.len()].into_boxed_slice());
            let raw = pinned as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, pinned, i32::from(tag));
            MpiHandle(Box::new(move || {
                req.wait();
                // SAFETY: as in `isend`, the request no longer borrows the buffer.
                let data = unsafe { Box::from_raw(raw) };
                Some(data.into_vec())
            }))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn processor_name(&self) -> String {
            mpi::environment::processor_name().unwrap_or_else(|_| host_name().to_string())
        }

        fn all_reduce_sum(&self, local: f64) -> Result<f64, JacobiError> {
            let mut global = 0.0f64;
            self.world
                .all_reduce_into(&local, &mut global, SystemOperation::sum());
            Ok(global)
        }

        fn barrier(&self) -> Result<(), JacobiError> {
            self.world.barrier();
            Ok(())
        }

        fn abort(&self, code: i32) {
            self.world.abort(code)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
