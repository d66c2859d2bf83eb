//! Halo exchange: ship each boundary row/column to the neighbour across it
//! and fill the matching ghost row/column from what the neighbour sends back.
//!
//! Exactly one message per active direction per exchange, carrying the whole
//! edge. A message sent *toward* `d` travels on tag `HALO_TAG_BASE + d` and
//! lands in the receiver's ghost edge `d.opposite()`.
//!
//! Two schedules:
//! - **Synchronous** ([`HaloExchanger::exchange_sync`]): direction by
//!   direction, post receive and send, wait on both, move on.
//! - **Overlapped** ([`HaloExchanger::post`] + [`HaloExchanger::complete`]):
//!   post everything, let the caller compute, then wait on every handle once.
//!
//! Either way the receive for a direction is posted before its send is
//! waited on, so two neighbours can never hold each other up.

use crate::algs::communicator::{Communicator, HALO_TAG_BASE, Wait};
use crate::algs::wire::{decode_halo, encode_halo, halo_message_len};
use crate::data::tile::LocalTile;
use crate::jacobi_error::JacobiError;
use crate::topology::{Direction, ProcessTopology};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How halo communication is scheduled against computation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    /// Send/receive pairs issued and completed per direction.
    Synchronous,
    /// All exchanges posted up front, completed after the interior sweep.
    #[default]
    Overlapped,
}

impl fmt::Display for ExchangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeMode::Synchronous => f.write_str("sync"),
            ExchangeMode::Overlapped => f.write_str("overlapped"),
        }
    }
}

impl FromStr for ExchangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" | "synchronous" | "blocking" => Ok(ExchangeMode::Synchronous),
            "overlapped" | "async" | "nonblocking" => Ok(ExchangeMode::Overlapped),
            other => Err(format!(
                "unknown exchange mode `{other}` (expected sync|overlapped)"
            )),
        }
    }
}

#[inline]
fn tag_toward(dir: Direction) -> u16 {
    HALO_TAG_BASE.offset(dir.index() as u16).as_u16()
}

/// One active edge of this worker.
#[derive(Copy, Clone, Debug)]
struct HaloLink {
    direction: Direction,
    peer: usize,
    len: usize,
}

/// A posted send/receive pair for one direction.
struct InFlight<C: Communicator> {
    link: HaloLink,
    send: C::SendHandle,
    recv: C::RecvHandle,
}

/// Per-worker exchanger; owns the in-flight handles between `post` and
/// `complete`.
pub struct HaloExchanger<C: Communicator> {
    rank: usize,
    links: Vec<HaloLink>,
    in_flight: Vec<InFlight<C>>,
    iteration: u64,
}

impl<C: Communicator> HaloExchanger<C> {
    pub fn new(topology: &ProcessTopology) -> Self {
        let links = topology
            .neighbors()
            .map(|(direction, peer)| HaloLink {
                direction,
                peer,
                len: topology.edge_len(direction),
            })
            .collect();
        Self {
            rank: topology.rank(),
            links,
            in_flight: Vec::new(),
            iteration: 0,
        }
    }

    /// True between `post` and `complete`.
    pub fn in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Number of neighbours this worker exchanges with.
    pub fn active_directions(&self) -> usize {
        self.links.len()
    }

    /// Exchange according to `mode`, returning with ghosts filled.
    pub fn exchange(
        &mut self,
        comm: &C,
        tile: &mut LocalTile,
        iteration: u64,
        mode: ExchangeMode,
    ) -> Result<(), JacobiError> {
        match mode {
            ExchangeMode::Synchronous => self.exchange_sync(comm, tile, iteration),
            ExchangeMode::Overlapped => {
                self.post(comm, tile, iteration)?;
                self.complete(tile)
            }
        }
    }

    /// Direction by direction: post the pair, wait on both, fill the ghost.
    pub fn exchange_sync(
        &mut self,
        comm: &C,
        tile: &mut LocalTile,
        iteration: u64,
    ) -> Result<(), JacobiError> {
        self.ensure_idle()?;
        for &link in &self.links {
            let op = post_link(comm, link, tile, iteration);
            finish_link::<C>(op, iteration, tile)?;
        }
        Ok(())
    }

    /// Post all receives and sends for `iteration` without waiting.
    ///
    /// The payload is copied out of `tile` here, so the caller may keep
    /// writing the tile's interior while the exchange is in flight. Posting
    /// again before [`complete`](Self::complete) is an error.
    pub fn post(&mut self, comm: &C, tile: &LocalTile, iteration: u64) -> Result<(), JacobiError> {
        self.ensure_idle()?;
        self.iteration = iteration;
        self.in_flight = self
            .links
            .iter()
            .map(|&link| post_link(comm, link, tile, iteration))
            .collect();
        log::debug!(
            "rank {} posted {} halo exchanges for iteration {iteration}",
            self.rank,
            self.in_flight.len()
        );
        Ok(())
    }

    /// Wait on every posted handle exactly once and fill the ghosts.
    ///
    /// All handles are drained even when one of them fails; the first
    /// error is returned. Does nothing when nothing is in flight.
    pub fn complete(&mut self, tile: &mut LocalTile) -> Result<(), JacobiError> {
        if self.in_flight.is_empty() {
            return Ok(());
        }
        let iteration = self.iteration;
        let mut first_err = None;
        for op in std::mem::take(&mut self.in_flight) {
            if let Err(e) = finish_link::<C>(op, iteration, tile) {
                first_err.get_or_insert(e);
            }
        }
        log::debug!("rank {} completed halo exchange for iteration {iteration}", self.rank);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn ensure_idle(&self) -> Result<(), JacobiError> {
        match self.in_flight.first() {
            Some(op) => Err(JacobiError::ExchangeInFlight {
                direction: op.link.direction,
            }),
            None => Ok(()),
        }
    }
}

fn post_link<C: Communicator>(
    comm: &C,
    link: HaloLink,
    tile: &LocalTile,
    iteration: u64,
) -> InFlight<C> {
    let d = link.direction;
    // ghost `d` is filled by the neighbour's message travelling toward d.opposite()
    let mut buf = vec![0u8; halo_message_len(link.len)];
    let recv = comm.irecv(link.peer, tag_toward(d.opposite()), &mut buf);
    let payload = encode_halo(d, iteration, &tile.boundary_edge(d));
    let send = comm.isend(link.peer, tag_toward(d), &payload);
    InFlight { link, send, recv }
}

fn finish_link<C: Communicator>(
    op: InFlight<C>,
    iteration: u64,
    tile: &mut LocalTile,
) -> Result<(), JacobiError> {
    let InFlight { link, send, recv } = op;
    let received = recv.wait();
    let _ = send.wait();
    let comm_err = |reason: String| JacobiError::CommError {
        neighbor: link.peer,
        reason,
    };
    let bytes = received.ok_or_else(|| {
        comm_err(format!(
            "no halo message for the {} edge of iteration {iteration}",
            link.direction
        ))
    })?;
    let (hdr, values) = decode_halo(&bytes).map_err(comm_err)?;
    let expected = link.direction.opposite();
    if hdr.direction() != Some(expected) || hdr.iteration() != iteration {
        return Err(comm_err(format!(
            "expected a message toward {expected} from iteration {iteration}, got {:?} from iteration {}",
            hdr.direction(),
            hdr.iteration()
        )));
    }
    tile.set_ghost_edge(link.direction, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::topology::Decomposition;

    fn filled(topo: &ProcessTopology) -> LocalTile {
        let mut t = LocalTile::new(topo.local_rows(), topo.local_cols());
        for i in 1..=t.rows() {
            for j in 1..=t.cols() {
                t.set(i, j, (topo.rank() * 100 + i * 10 + j) as f64).unwrap();
            }
        }
        t
    }

    #[test]
    fn single_worker_exchange_is_noop() {
        let topo = ProcessTopology::new(0, 1, 4, Decomposition::Grid).unwrap();
        let mut ex = HaloExchanger::<NoComm>::new(&topo);
        let mut tile = filled(&topo);
        let before = tile.clone();
        ex.exchange(&NoComm, &mut tile, 0, ExchangeMode::Overlapped).unwrap();
        ex.exchange(&NoComm, &mut tile, 1, ExchangeMode::Synchronous).unwrap();
        assert_eq!(tile, before);
        assert_eq!(ex.active_directions(), 0);
    }

    #[test]
    fn double_post_is_rejected() {
        let world = ThreadComm::universe(2);
        let topo = ProcessTopology::new(0, 2, 4, Decomposition::Strip).unwrap();
        let mut ex = HaloExchanger::<ThreadComm>::new(&topo);
        let tile = filled(&topo);
        ex.post(&world[0], &tile, 0).unwrap();
        assert!(ex.in_flight());
        assert_eq!(
            ex.post(&world[0], &tile, 1),
            Err(JacobiError::ExchangeInFlight {
                direction: Direction::East
            })
        );
        let mut scratch = tile.clone();
        assert!(ex.exchange_sync(&world[0], &mut scratch, 1).is_err());
    }

    #[test]
    fn strip_pair_swaps_columns() {
        let world = ThreadComm::universe(2);
        let tiles: Vec<LocalTile> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let topo =
                            ProcessTopology::new(comm.rank(), 2, 4, Decomposition::Strip).unwrap();
                        let mut ex = HaloExchanger::new(&topo);
                        let mut tile = filled(&topo);
                        ex.post(comm, &tile, 3).unwrap();
                        ex.complete(&mut tile).unwrap();
                        tile
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(
            tiles[0].ghost_edge(Direction::East),
            tiles[1].boundary_edge(Direction::West)
        );
        assert_eq!(
            tiles[1].ghost_edge(Direction::West),
            tiles[0].boundary_edge(Direction::East)
        );
        // outer ghosts stay at the Dirichlet value
        assert!(tiles[0].ghost_edge(Direction::West).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn iteration_mismatch_is_a_comm_error() {
        let world = ThreadComm::universe(2);
        let results: Vec<Result<(), JacobiError>> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let topo =
                            ProcessTopology::new(comm.rank(), 2, 2, Decomposition::Strip).unwrap();
                        let mut ex = HaloExchanger::new(&topo);
                        let mut tile = filled(&topo);
                        // ranks disagree on the iteration they are in
                        ex.exchange_sync(comm, &mut tile, comm.rank() as u64)
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(JacobiError::CommError { .. })))
        );
    }

    #[test]
    fn parse_mode() {
        assert_eq!("sync".parse::<ExchangeMode>(), Ok(ExchangeMode::Synchronous));
        assert_eq!("Overlapped".parse::<ExchangeMode>(), Ok(ExchangeMode::Overlapped));
        assert!("eventually".parse::<ExchangeMode>().is_err());
    }
}
