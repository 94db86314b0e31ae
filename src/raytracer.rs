// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use rayon::prelude::*;

use crate::error::{RaytraceError, Result};
use crate::geometry::{Point3, Real};
use crate::mesh::Mesh;
use crate::narrow_band::NarrowBand;
use crate::node_state::SlotState;
use crate::pool::SlotPool;
use crate::propagation::{propagate, PropagationStats};
use crate::query::{trace_raypath, travel_time_at, Raypath, RaypathOptions};
use crate::source::{init_sources, Source};

/// One independent source group for [`Raytracer::raytrace_parallel`].
#[derive(Debug, Clone)]
pub struct Batch<T: Real> {
    /// Sources fired together in one propagation.
    pub sources: Vec<Source<T>>,
    /// Points at which travel times are wanted.
    pub receivers: Vec<Point3<T>>,
    /// Also backtrace a raypath to every receiver.
    pub raypaths: bool,
}

/// Result of one [`Batch`].
#[derive(Debug, Clone)]
pub struct BatchOutput<T: Real> {
    /// Interpolated travel time at each receiver.
    pub travel_times: Vec<T>,
    /// Raypaths, if requested.
    pub raypaths: Option<Vec<Raypath<T>>>,
    /// Counters from the propagation.
    pub stats: PropagationStats,
}

/// Fast-marching travel-time solver over a shared, read-only mesh.
///
/// Every call runs on its own [`SlotState`] taken from an internal pool, so a
/// `Raytracer` can be shared across threads (`&self` everywhere) as long as the
/// mesh is `Sync`.
///
/// # Example
///
/// ```
/// use eikonal_fmm::{Raytracer, Source, TetMesh};
///
/// let nodes: Vec<[f64; 3]> = vec![
///     [0.0, 0.0, 0.0],
///     [1.0, 0.0, 0.0],
///     [0.0, 1.0, 0.0],
///     [0.0, 0.0, 1.0],
/// ];
/// let mesh = TetMesh::new(nodes, vec![[0, 1, 2, 3]], vec![2.0]).unwrap();
/// let tracer = Raytracer::new(mesh);
///
/// let times = tracer
///     .raytrace(&[Source::new([0.0, 0.0, 0.0], 0.0)], &[[1.0, 0.0, 0.0]])
///     .unwrap();
/// assert!((times[0] - 2.0).abs() < 1e-12);
/// ```
pub struct Raytracer<T: Real, M: Mesh<T>> {
    mesh: M,
    num_threads: Option<usize>,
    one_ring: bool,
    raypath: RaypathOptions<T>,
    pool: SlotPool<T>,
}

impl<T: Real, M: Mesh<T>> Raytracer<T, M> {
    /// Create a raytracer over `mesh` with default settings.
    pub fn new(mesh: M) -> Self {
        Raytracer {
            mesh,
            num_threads: None,
            one_ring: true,
            raypath: RaypathOptions::default(),
            pool: SlotPool::new(),
        }
    }

    /// Set the number of worker threads for [`raytrace_parallel`](Self::raytrace_parallel)
    /// (builder method). Defaults to the number of available CPU cores.
    ///
    /// # Errors
    /// Returns an error if `threads` is zero.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(RaytraceError::InvalidOption {
                name: "threads",
                value: 0.0,
            });
        }
        self.num_threads = Some(threads);
        Ok(self)
    }

    /// Set the raypath step as a fraction of the local cell size (builder
    /// method). Default is 0.1.
    ///
    /// # Errors
    /// Returns an error unless `0 < fraction <= 1`.
    pub fn with_raypath_step(mut self, fraction: T) -> Result<Self> {
        if !fraction.is_finite() || fraction <= T::lit(0.0) || fraction > T::lit(1.0) {
            return Err(RaytraceError::InvalidOption {
                name: "raypath step",
                value: fraction.as_f64(),
            });
        }
        self.raypath.step_fraction = fraction;
        Ok(self)
    }

    /// Set the maximum number of raypath steps (builder method). Default is 100 000.
    ///
    /// # Errors
    /// Returns an error if `steps` is zero.
    pub fn with_max_raypath_steps(mut self, steps: usize) -> Result<Self> {
        if steps == 0 {
            return Err(RaytraceError::InvalidOption {
                name: "max raypath steps",
                value: 0.0,
            });
        }
        self.raypath.max_steps = steps;
        Ok(self)
    }

    /// Set the gradient magnitude below which a raypath walk stops (builder method).
    ///
    /// # Errors
    /// Returns an error if `eps` is negative or not finite.
    pub fn with_min_gradient(mut self, eps: T) -> Result<Self> {
        if !eps.is_finite() || eps < T::lit(0.0) {
            return Err(RaytraceError::InvalidOption {
                name: "min gradient",
                value: eps.as_f64(),
            });
        }
        self.raypath.min_gradient = eps;
        Ok(self)
    }

    /// Enable or disable direct edge estimates around a lone node source
    /// (builder method). Enabled by default.
    pub fn with_one_ring_seeding(mut self, enabled: bool) -> Self {
        self.one_ring = enabled;
        self
    }

    /// The mesh being traced.
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// Consume the raytracer and return its mesh.
    pub fn into_mesh(self) -> M {
        self.mesh
    }

    /// Current raypath settings.
    pub fn raypath_options(&self) -> &RaypathOptions<T> {
        &self.raypath
    }

    /// Pool of idle slot states.
    pub fn pool(&self) -> &SlotPool<T> {
        &self.pool
    }

    /// Allocate a fresh state sized for this mesh, outside the pool.
    pub fn new_slot(&self, slot: usize) -> SlotState<T> {
        SlotState::new(self.mesh.num_nodes(), slot)
    }

    /// Reset `state`, seed it from `sources`, and propagate to exhaustion.
    ///
    /// # Errors
    /// Returns an error if seeding fails (no sources, a source outside the
    /// mesh, or an invalid or empty capture radius).
    pub fn run(&self, state: &mut SlotState<T>, sources: &[Source<T>]) -> Result<PropagationStats> {
        state.reinit(self.mesh.num_nodes());
        let mut band = NarrowBand::with_capacity(self.mesh.num_nodes());
        let seeds = init_sources(&self.mesh, sources, state, &mut band, self.one_ring)?;
        tracing::debug!(
            slot = state.slot(),
            frozen = seeds.frozen,
            narrow = seeds.narrow,
            "sources seeded"
        );
        Ok(propagate(&self.mesh, state, &mut band))
    }

    /// Propagate from `sources` on a pooled slot and hand the slot back.
    ///
    /// Return it with [`recycle`](Self::recycle) when done to reuse its memory.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn solve(&self, sources: &[Source<T>]) -> Result<SlotState<T>> {
        let mut state = self.pool.checkout(self.mesh.num_nodes());
        match self.run(&mut state, sources) {
            Ok(_) => Ok(state),
            Err(e) => {
                self.pool.checkin(state);
                Err(e)
            }
        }
    }

    /// Return a slot obtained from [`solve`](Self::solve) to the pool.
    pub fn recycle(&self, state: SlotState<T>) {
        self.pool.checkin(state);
    }

    /// Interpolated travel times at `receivers` from a solved state.
    ///
    /// # Errors
    /// Returns an error if a receiver is outside the mesh or in an unreached cell.
    pub fn travel_times(&self, state: &SlotState<T>, receivers: &[Point3<T>]) -> Result<Vec<T>> {
        receivers
            .iter()
            .map(|&r| travel_time_at(&self.mesh, state, r))
            .collect()
    }

    /// Backtraced raypaths to `receivers` from a solved state.
    ///
    /// # Errors
    /// Returns an error if a receiver cannot be located or a walk does not converge.
    pub fn raypaths(
        &self,
        state: &SlotState<T>,
        sources: &[Source<T>],
        receivers: &[Point3<T>],
    ) -> Result<Vec<Raypath<T>>> {
        receivers
            .iter()
            .map(|&r| trace_raypath(&self.mesh, state, sources, r, &self.raypath))
            .collect()
    }

    fn with_solved<R>(&self, sources: &[Source<T>], f: impl FnOnce(&SlotState<T>) -> Result<R>) -> Result<R> {
        let state = self.solve(sources)?;
        let out = f(&state);
        self.recycle(state);
        out
    }

    /// Travel times at one receiver set.
    ///
    /// Build `sources` from parallel point and start-time lists with
    /// [`sources_from`](crate::source::sources_from).
    ///
    /// # Errors
    /// Returns an error on any fatal input condition (see [`RaytraceError`]).
    pub fn raytrace(&self, sources: &[Source<T>], receivers: &[Point3<T>]) -> Result<Vec<T>> {
        self.with_solved(sources, |state| self.travel_times(state, receivers))
    }

    /// Travel times at several receiver sets, from a single propagation.
    ///
    /// # Errors
    /// Returns an error on any fatal input condition.
    pub fn raytrace_groups<R: AsRef<[Point3<T>]>>(
        &self,
        sources: &[Source<T>],
        receiver_sets: &[R],
    ) -> Result<Vec<Vec<T>>> {
        self.with_solved(sources, |state| {
            receiver_sets
                .iter()
                .map(|set| self.travel_times(state, set.as_ref()))
                .collect()
        })
    }

    /// Travel times and raypaths at one receiver set.
    ///
    /// # Errors
    /// Returns an error on any fatal input condition or if a raypath walk fails.
    pub fn raytrace_with_paths(
        &self,
        sources: &[Source<T>],
        receivers: &[Point3<T>],
    ) -> Result<(Vec<T>, Vec<Raypath<T>>)> {
        self.with_solved(sources, |state| {
            let times = self.travel_times(state, receivers)?;
            let paths = self.raypaths(state, sources, receivers)?;
            Ok((times, paths))
        })
    }

    /// Travel times and raypaths at several receiver sets, from a single propagation.
    ///
    /// # Errors
    /// Returns an error on any fatal input condition or if a raypath walk fails.
    #[allow(clippy::type_complexity)]
    pub fn raytrace_groups_with_paths<R: AsRef<[Point3<T>]>>(
        &self,
        sources: &[Source<T>],
        receiver_sets: &[R],
    ) -> Result<(Vec<Vec<T>>, Vec<Vec<Raypath<T>>>)> {
        self.with_solved(sources, |state| {
            let mut times = Vec::with_capacity(receiver_sets.len());
            let mut paths = Vec::with_capacity(receiver_sets.len());
            for set in receiver_sets {
                times.push(self.travel_times(state, set.as_ref())?);
                paths.push(self.raypaths(state, sources, set.as_ref())?);
            }
            Ok((times, paths))
        })
    }

    fn run_batch(&self, batch: &Batch<T>) -> Result<BatchOutput<T>> {
        let mut state = self.pool.checkout(self.mesh.num_nodes());
        let result = self.run(&mut state, &batch.sources).and_then(|stats| {
            let travel_times = self.travel_times(&state, &batch.receivers)?;
            let raypaths = if batch.raypaths {
                Some(self.raypaths(&state, &batch.sources, &batch.receivers)?)
            } else {
                None
            };
            Ok(BatchOutput {
                travel_times,
                raypaths,
                stats,
            })
        });
        self.pool.checkin(state);
        result
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl<T: Real, M: Mesh<T> + Sync> Raytracer<T, M> {
    /// Run independent source groups concurrently, one slot per worker.
    ///
    /// Outputs are returned in batch order. The first failing batch aborts the
    /// whole call with its error.
    ///
    /// # Errors
    /// Returns an error if the thread pool cannot be built or any batch fails.
    pub fn raytrace_parallel(&self, batches: &[Batch<T>]) -> Result<Vec<BatchOutput<T>>> {
        let num_threads = self.get_num_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| RaytraceError::Other(e.to_string()))?;

        let outputs = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| self.run_batch(batch))
                .collect::<Result<Vec<_>>>()
        })?;

        tracing::info!(
            batches = batches.len(),
            threads = num_threads,
            slots = self.pool.allocated(),
            "parallel raytrace finished"
        );
        Ok(outputs)
    }
}
