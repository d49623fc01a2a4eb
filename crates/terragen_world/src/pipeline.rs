//! # Async Generation Pipeline
//!
//! One background worker builds tile meshes; the update loop submits a job
//! and later collects the result. At most one job is in flight.
//!
//! ## Data Flow
//!
//! ```text
//! update loop                         terragen-mesh worker
//! ───────────                         ────────────────────
//! submit(coord, lod) ──[job; 1]──►    builder.build(field, coord, lod)
//! poll() / wait()    ◄─[tile; 1]──    GeneratedTile
//! ```
//!
//! The worker owns an `Arc<HeightField>` and never sees world state.
//! There is no cancellation: a submitted tile is always delivered.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use terragen_procedural::{HeightField, TileMesh, TileMeshBuilder};
use terragen_shared::GridCoord;

use crate::error::{WorldError, WorldResult};
use crate::tile_cache::TileCache;

/// A finished generation job.
#[derive(Clone, Debug)]
pub struct GeneratedTile {
    /// Tile that was built.
    pub coord: GridCoord,
    /// LOD it was built at.
    pub lod: u32,
    /// Geometry.
    pub mesh: TileMesh,
    /// Time spent building.
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug)]
struct GenerationJob {
    coord: GridCoord,
    lod: u32,
}

/// Single-worker mesh generator.
pub struct GenerationPipeline {
    field: Arc<HeightField>,
    builder: TileMeshBuilder,
    job_tx: Option<Sender<GenerationJob>>,
    result_rx: Receiver<GeneratedTile>,
    worker: Option<JoinHandle<()>>,
    in_flight: Option<GridCoord>,
    completed: u64,
}

impl GenerationPipeline {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn new(field: Arc<HeightField>, builder: TileMeshBuilder) -> WorldResult<Self> {
        let (job_tx, job_rx) = bounded::<GenerationJob>(1);
        let (result_tx, result_rx) = bounded::<GeneratedTile>(1);

        let worker_field = Arc::clone(&field);
        let worker = thread::Builder::new()
            .name("terragen-mesh".to_string())
            .spawn(move || Self::worker_loop(&worker_field, builder, &job_rx, &result_tx))?;

        tracing::debug!("Mesh worker started");

        Ok(Self {
            field,
            builder,
            job_tx: Some(job_tx),
            result_rx,
            worker: Some(worker),
            in_flight: None,
            completed: 0,
        })
    }

    /// Worker thread main loop. Ends when the job sender is dropped.
    fn worker_loop(
        field: &HeightField,
        builder: TileMeshBuilder,
        jobs: &Receiver<GenerationJob>,
        results: &Sender<GeneratedTile>,
    ) {
        while let Ok(job) = jobs.recv() {
            let start = Instant::now();
            let mesh = builder.build(field, job.coord, job.lod);
            let tile = GeneratedTile {
                coord: job.coord,
                lod: job.lod,
                mesh,
                elapsed: start.elapsed(),
            };
            if results.send(tile).is_err() {
                break;
            }
        }
    }

    /// Height field the worker samples.
    #[must_use]
    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    /// Mesh builder the worker uses.
    #[must_use]
    pub fn builder(&self) -> &TileMeshBuilder {
        &self.builder
    }

    /// Whether a job is in flight.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Tile currently being generated.
    #[must_use]
    pub fn in_flight(&self) -> Option<GridCoord> {
        self.in_flight
    }

    /// Number of results handed back so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Submits `coord` for generation at `lod` (clamped to >= 1) and
    /// registers it as queued in `cache`.
    ///
    /// # Errors
    ///
    /// `GeneratorBusy` while another job is in flight; `WorkerDisconnected`
    /// if the worker has exited.
    pub fn submit(&mut self, coord: GridCoord, lod: u32, cache: &mut TileCache) -> WorldResult<()> {
        if let Some(busy) = self.in_flight {
            return Err(WorldError::GeneratorBusy { coord: busy });
        }
        let lod = lod.max(1);
        let sender = self.job_tx.as_ref().ok_or(WorldError::WorkerDisconnected)?;

        cache.enqueue(coord, lod);
        sender
            .send(GenerationJob { coord, lod })
            .map_err(|_| WorldError::WorkerDisconnected)?;
        self.in_flight = Some(coord);

        tracing::trace!("Generating tile ({}, {}) at lod {}", coord.x, coord.y, lod);
        Ok(())
    }

    /// Collects a finished tile without blocking.
    ///
    /// # Errors
    ///
    /// `WorkerDisconnected` if the worker died with a job in flight.
    pub fn poll(&mut self) -> WorldResult<Option<GeneratedTile>> {
        if self.in_flight.is_none() {
            return Ok(None);
        }
        match self.result_rx.try_recv() {
            Ok(tile) => Ok(Some(self.finish(tile))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                Err(WorldError::WorkerDisconnected)
            }
        }
    }

    /// Blocks until the in-flight tile is finished. `None` when idle.
    ///
    /// # Errors
    ///
    /// `WorkerDisconnected` if the worker died with a job in flight.
    pub fn wait(&mut self) -> WorldResult<Option<GeneratedTile>> {
        if self.in_flight.is_none() {
            return Ok(None);
        }
        match self.result_rx.recv() {
            Ok(tile) => Ok(Some(self.finish(tile))),
            Err(_) => {
                self.in_flight = None;
                Err(WorldError::WorkerDisconnected)
            }
        }
    }

    fn finish(&mut self, tile: GeneratedTile) -> GeneratedTile {
        self.in_flight = None;
        self.completed += 1;
        tracing::trace!(
            "Tile ({}, {}) generated in {:?}",
            tile.coord.x,
            tile.coord.y,
            tile.elapsed
        );
        tile
    }
}

impl Drop for GenerationPipeline {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.job_tx.take();
        // Unblock a worker stuck on a full result channel
        while self.result_rx.try_recv().is_ok() {}
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Mesh worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("builder", &self.builder)
            .field("in_flight", &self.in_flight)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
