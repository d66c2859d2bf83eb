//! Iteration controller: `Init → Iterating → {Converged | MaxIterationsReached}`.
//!
//! One iteration:
//! 1. boundary cells `current → next`
//! 2. halo exchange of `next` (synchronous: done here; overlapped: posted)
//! 3. interior cells `current → next`
//! 4. complete any posted exchange
//! 5. swap `current`/`next`, bump the counter
//! 6. every `check_every` iterations, reduce the global residual
//!
//! Every worker runs the same loop with the same counter and the same check
//! cadence; the convergence decision uses the globally reduced residual, so
//! all workers leave the loop after the same iteration.

use super::config::SolverConfig;
use super::report::{Outcome, Progress, SolveReport, relative};
use crate::algs::communicator::Communicator;
use crate::algs::halo::{ExchangeMode, HaloExchanger};
use crate::algs::residual::{global_residual, local_squared_residual};
use crate::algs::stencil::{self, Region};
use crate::data::tile::LocalTile;
use crate::jacobi_error::JacobiError;
use crate::problem::GlobalProblem;
use crate::topology::ProcessTopology;

/// Per-worker mutable loop state.
#[derive(Debug)]
pub struct IterationState {
    iteration: usize,
    current: LocalTile,
    next: LocalTile,
    residual: f64,
    reference: f64,
    last_check: usize,
    history: Vec<Progress>,
}

impl IterationState {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            iteration: 0,
            current: LocalTile::new(rows, cols),
            next: LocalTile::new(rows, cols),
            residual: 0.0,
            reference: 0.0,
            last_check: 0,
            history: Vec::new(),
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn current(&self) -> &LocalTile {
        &self.current
    }

    pub fn residual(&self) -> f64 {
        self.residual
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn relative(&self) -> f64 {
        relative(self.residual, self.reference)
    }

    pub fn history(&self) -> &[Progress] {
        &self.history
    }

    /// Hand the freshly written tile over to the "current" role.
    fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

/// Distributed Jacobi solver for one worker.
pub struct JacobiSolver<'c, C: Communicator> {
    comm: &'c C,
    config: SolverConfig,
    problem: GlobalProblem,
    topology: ProcessTopology,
    exchanger: HaloExchanger<C>,
    state: IterationState,
}

impl<'c, C: Communicator> JacobiSolver<'c, C> {
    /// `Init`: validate, allocate both tiles, reduce the reference residual.
    ///
    /// Collective. Configuration errors are returned before any allocation
    /// and before any communication, identically on every worker.
    pub fn new(comm: &'c C, config: SolverConfig) -> Result<Self, JacobiError> {
        config.validate()?;
        let topology =
            ProcessTopology::new(comm.rank(), comm.size(), config.n, config.decomposition)?;
        let problem = GlobalProblem::new(config.n);
        let exchanger = HaloExchanger::new(&topology);
        let mut state = IterationState::new(topology.local_rows(), topology.local_cols());

        let local = local_squared_residual(&state.current, problem.inv_hsq());
        state.reference = global_residual(comm, local)?;
        state.residual = state.reference;
        log::debug!(
            "rank {} holds a {}x{} tile at {:?}, reference residual {}",
            topology.rank(),
            topology.local_rows(),
            topology.local_cols(),
            topology.coords(),
            state.reference
        );

        Ok(Self {
            comm,
            config,
            problem,
            topology,
            exchanger,
            state,
        })
    }

    pub fn topology(&self) -> &ProcessTopology {
        &self.topology
    }

    pub fn problem(&self) -> &GlobalProblem {
        &self.problem
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    fn converged(&self) -> bool {
        self.state.relative() <= self.config.tolerance
    }

    /// One Jacobi sweep including its halo exchange; no residual check.
    pub fn step(&mut self) -> Result<(), JacobiError> {
        let hsq = self.problem.hsq();
        let iteration = self.state.iteration as u64;
        let IterationState { current, next, .. } = &mut self.state;

        stencil::update(next, current, Region::Boundary, hsq);
        match self.config.mode {
            ExchangeMode::Synchronous => self.exchanger.exchange_sync(self.comm, next, iteration)?,
            ExchangeMode::Overlapped => self.exchanger.post(self.comm, next, iteration)?,
        }
        stencil::update(next, current, Region::Interior, hsq);
        self.exchanger.complete(next)?;

        self.state.swap();
        self.state.iteration += 1;
        Ok(())
    }

    /// Collective residual check at the current iteration.
    pub fn check(&mut self) -> Result<Progress, JacobiError> {
        let local = local_squared_residual(&self.state.current, self.problem.inv_hsq());
        self.state.residual = global_residual(self.comm, local)?;
        self.state.last_check = self.state.iteration;
        let progress = Progress {
            iteration: self.state.iteration,
            residual: self.state.residual,
            relative: self.state.relative(),
        };
        self.state.history.push(progress);
        if self.topology.rank() == 0 {
            log::info!("Iter {}: Residual: {:e}", progress.iteration, progress.residual);
        }
        Ok(progress)
    }

    /// Iterate to a terminal state.
    pub fn run(self) -> Result<SolveReport, JacobiError> {
        self.run_with(|_| {})
    }

    /// Iterate to a terminal state, calling `on_check` after every check.
    pub fn run_with<F>(mut self, mut on_check: F) -> Result<SolveReport, JacobiError>
    where
        F: FnMut(&Progress),
    {
        while self.state.iteration < self.config.max_iters && !self.converged() {
            self.step()?;
            if self.state.iteration % self.config.check_every == 0 {
                let p = self.check()?;
                on_check(&p);
            }
        }
        // stopped by the cap between two checks: report the actual residual
        if self.state.iteration != self.state.last_check {
            let p = self.check()?;
            on_check(&p);
        }

        let outcome = if self.converged() {
            Outcome::Converged
        } else {
            Outcome::MaxIterationsReached
        };
        if self.topology.rank() == 0 {
            match outcome {
                Outcome::Converged => log::info!(
                    "converged after {} iterations (relative residual {:e})",
                    self.state.iteration,
                    self.state.relative()
                ),
                Outcome::MaxIterationsReached => log::warn!(
                    "stopped at the cap of {} iterations (relative residual {:e})",
                    self.config.max_iters,
                    self.state.relative()
                ),
            }
        }

        let IterationState {
            iteration,
            current,
            residual,
            reference,
            history,
            ..
        } = self.state;
        Ok(SolveReport {
            outcome,
            iterations: iteration,
            residual,
            reference_residual: reference,
            history,
            topology: self.topology,
            tile: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn init_reduces_reference() {
        let solver = JacobiSolver::new(&NoComm, SolverConfig::new(8, 10)).unwrap();
        // zero guess: every defect is -1, so the norm is sqrt(N²) = N
        assert_eq!(solver.state().reference(), 8.0);
        assert_eq!(solver.state().iteration(), 0);
    }

    #[test]
    fn zero_cap_does_not_iterate() {
        let report = JacobiSolver::new(&NoComm, SolverConfig::new(4, 0))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.outcome, Outcome::MaxIterationsReached);
        assert!(report.history.is_empty());
        assert!(report.tile.interior().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn checks_follow_the_cadence() {
        let cfg = SolverConfig::new(8, 25).with_check_every(10);
        let report = JacobiSolver::new(&NoComm, cfg).unwrap().run().unwrap();
        let at: Vec<usize> = report.history.iter().map(|p| p.iteration).collect();
        // two regular checks plus the final one at the cap
        assert_eq!(at, vec![10, 20, 25]);
        assert_eq!(report.iterations, 25);
    }

    #[test]
    fn step_swaps_roles() {
        let mut s = JacobiSolver::new(&NoComm, SolverConfig::new(2, 5)).unwrap();
        s.step().unwrap();
        let h2 = s.problem().hsq();
        assert!(s.state().current().interior().iter().all(|&v| v == 0.25 * h2));
        assert_eq!(s.state().iteration(), 1);
    }
}
