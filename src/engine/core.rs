//! TrackerHandle: the seam tracking core shared by the CLI, the control
//! surface and the HTTP server.
//!
//! The handle owns the configuration, the managers, the pipeline and the
//! telemetry collector. Samples enter either synchronously through
//! [`TrackerHandle::process_sample`] or through a lock-free SPSC queue
//! drained by a dedicated ingress thread ([`TrackerHandle::start_ingress`]).
//! Every output is published on the seam broadcast channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::{Consumer, PopError, Producer, PushError};
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::error::{log_engine_error, EngineError, ErrorCode, RegistryError};
use crate::managers::{BroadcastChannelManager, OffsetManager, RegistryManager};
use crate::pipeline::{SeamOutput, SeamPipeline};
use crate::profile::ProfileSample;
use crate::registry::{TransformDefinition, TransformRegistry, TransformStore};
use crate::telemetry::{MetricEvent, TelemetryCollector};
use crate::transform::TransformProgram;

/// Sleep between polls of an empty ingress queue
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Everything one processing cycle needs, cheap to clone into the worker
#[derive(Clone)]
struct CycleContext {
    registry: RegistryManager,
    offsets: OffsetManager,
    pipeline: Arc<Mutex<SeamPipeline>>,
    telemetry: Arc<TelemetryCollector>,
    seam_tx: broadcast::Sender<SeamOutput>,
}

impl CycleContext {
    fn run(&self, sample: &ProfileSample) -> Result<SeamOutput, EngineError> {
        // One snapshot per cycle: updates land on the next sample
        let offsets = self.offsets.get().map_err(|_| EngineError::LockPoisoned {
            component: "OffsetConfig".to_string(),
        })?;

        let output = {
            let mut pipeline = self.lock_pipeline()?;
            pipeline.process(sample, &self.registry, offsets, Some(&self.telemetry))
        };

        let _ = self.seam_tx.send(output.clone());
        Ok(output)
    }

    fn lock_pipeline(&self) -> Result<MutexGuard<'_, SeamPipeline>, EngineError> {
        self.pipeline.lock().map_err(|_| EngineError::LockPoisoned {
            component: "SeamPipeline".to_string(),
        })
    }
}

/// Producer side of the ingress queue
///
/// `push` never blocks: when the queue is full the sample is dropped and
/// counted.
pub struct ProfileSender {
    producer: Producer<ProfileSample>,
    dropped: Arc<AtomicU64>,
    telemetry: Arc<TelemetryCollector>,
}

impl ProfileSender {
    /// Queue one sample
    ///
    /// # Returns
    /// `false` if the queue was full and the sample was dropped
    pub fn push(&mut self, sample: ProfileSample) -> bool {
        match self.producer.push(sample) {
            Ok(()) => true,
            Err(PushError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "[ProfileSender] Ingress queue full, sample dropped ({} total)",
                    total
                );
                self.telemetry.publish(MetricEvent::IngressDropped { total });
                false
            }
        }
    }

    /// Free queue slots
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

struct IngressWorker {
    running: Arc<AtomicBool>,
    thread: JoinHandle<u64>,
}

impl IngressWorker {
    /// Signal the worker, let it drain the queue and wait for it
    fn shutdown(self) -> u64 {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.join() {
            Ok(processed) => processed,
            Err(_) => {
                log::error!("[TrackerHandle] Ingress worker panicked");
                0
            }
        }
    }
}

/// TrackerHandle orchestrates the seam pipeline and its shared state.
pub struct TrackerHandle {
    config: AppConfig,
    ctx: CycleContext,
    broadcasts: BroadcastChannelManager,
    ingress: Mutex<Option<IngressWorker>>,
    dropped: Arc<AtomicU64>,
    start_instant: Instant,
}

impl TrackerHandle {
    /// Create a handle from `assets/seam_config.json` (or defaults)
    pub fn new() -> Self {
        Self::from_config(AppConfig::load())
    }

    /// Create a handle, load stored definitions and select the initial task
    ///
    /// Neither a missing/corrupt store nor an unusable initial task is
    /// fatal: both are logged and the tracker starts without an active
    /// transform (every output invalid until a task is selected).
    pub fn from_config(config: AppConfig) -> Self {
        let telemetry = Arc::new(TelemetryCollector::default());
        let budget = Duration::from_millis(config.pipeline.transform_budget_ms);
        let store = TransformStore::new(config.storage.definitions_path.clone());

        let mut registry = TransformRegistry::new(config.segmentation).with_budget(budget);
        match registry.load(&store) {
            Ok(count) => telemetry.publish(MetricEvent::DefinitionsLoaded { count }),
            Err(err) => {
                log::warn!(
                    "[TrackerHandle] Starting with an empty registry: {}",
                    err.message()
                );
                telemetry.record_error(&err, "startup_load");
            }
        }

        let broadcasts = BroadcastChannelManager::default();
        let ctx = CycleContext {
            registry: RegistryManager::new(registry, store),
            offsets: OffsetManager::new(config.offsets),
            pipeline: Arc::new(Mutex::new(SeamPipeline::new(
                config.continuity,
                config.pipeline.echo_profile,
            ))),
            telemetry,
            seam_tx: broadcasts.seam_sender(),
        };

        let handle = Self {
            config,
            ctx,
            broadcasts,
            ingress: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
            start_instant: Instant::now(),
        };

        let initial = handle.config.pipeline.initial_task;
        if handle.ctx.registry.len().unwrap_or(0) > 0 {
            if let Err(err) = handle.select_task(initial) {
                log::warn!(
                    "[TrackerHandle] Initial task {} not selected: {}",
                    initial,
                    err.message()
                );
            }
        }
        handle
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegistryManager {
        &self.ctx.registry
    }

    pub fn offsets(&self) -> &OffsetManager {
        &self.ctx.offsets
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.ctx.telemetry
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_instant.elapsed().as_millis() as u64
    }

    /// Samples dropped because the ingress queue was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn subscribe_seam(&self) -> broadcast::Receiver<SeamOutput> {
        self.broadcasts.subscribe_seam()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<MetricEvent> {
        self.ctx.telemetry.subscribe()
    }

    // ========================================================================
    // SAMPLE PROCESSING
    // ========================================================================

    /// Run one sample through the pipeline and publish the output
    pub fn process_sample(&self, sample: &ProfileSample) -> Result<SeamOutput, EngineError> {
        self.ctx
            .run(sample)
            .inspect_err(|err| log_engine_error(err, "process_sample"))
    }

    // ========================================================================
    // TASK CONTROL
    // ========================================================================

    /// Select task `id` as the active transform
    ///
    /// Switching to a different task restarts continuity confirmation, so
    /// no coordinate found by the old transform is confirmed by the new one.
    /// The pipeline stays locked across the swap and the reset: no cycle can
    /// run the new program against the old window.
    pub fn select_task(&self, id: u32) -> Result<Option<u32>, RegistryError> {
        let mut pipeline = self.pause_pipeline("select_task");
        let prior = self
            .ctx
            .registry
            .select(id)
            .inspect_err(|err| self.ctx.telemetry.record_error(err, "select_task"))?;

        if prior != Some(id) {
            if let Some(pipeline) = pipeline.as_mut() {
                pipeline.reset();
            }
        }
        drop(pipeline);

        self.ctx.telemetry.publish(MetricEvent::TaskSelected { id });
        Ok(prior)
    }

    /// Reload definitions from storage
    ///
    /// Restarts continuity confirmation when the reload swapped the active
    /// program.
    pub fn load_definitions(&self) -> Result<usize, RegistryError> {
        let count = self
            .swap_definitions("load", |registry| registry.load())
            .inspect_err(|err| self.ctx.telemetry.record_error(err, "load"))?;
        self.ctx
            .telemetry
            .publish(MetricEvent::DefinitionsLoaded { count });
        Ok(count)
    }

    /// Replace every definition, with the same reset rule as a reload
    pub fn replace_definitions(
        &self,
        definitions: Vec<TransformDefinition>,
    ) -> Result<usize, RegistryError> {
        let count = definitions.len();
        self.swap_definitions("replace_definitions", |registry| {
            registry.replace_all(definitions)
        })?;
        Ok(count)
    }

    /// Persist definitions to storage
    pub fn dump_definitions(&self) -> Result<usize, RegistryError> {
        let count = self
            .ctx
            .registry
            .dump()
            .inspect_err(|err| self.ctx.telemetry.record_error(err, "dump"))?;
        self.ctx
            .telemetry
            .publish(MetricEvent::DefinitionsDumped { count });
        Ok(count)
    }

    // ========================================================================
    // INGRESS
    // ========================================================================

    /// Spawn the ingress worker and hand out the queue's producer
    ///
    /// # Errors
    /// `AlreadyRunning` while a previous worker is still alive
    pub fn start_ingress(&self) -> Result<ProfileSender, EngineError> {
        let mut ingress = self.lock_ingress()?;

        if let Some(worker) = ingress.take() {
            if !worker.thread.is_finished() {
                *ingress = Some(worker);
                let err = EngineError::AlreadyRunning;
                log_engine_error(&err, "start_ingress");
                return Err(err);
            }
            // Producer was dropped and the worker exited on its own
            worker.shutdown();
        }

        let capacity = self.config.pipeline.ingress_capacity.max(1);
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        let running = Arc::new(AtomicBool::new(true));
        let thread = spawn_ingress_thread(consumer, self.ctx.clone(), Arc::clone(&running));

        *ingress = Some(IngressWorker { running, thread });
        log::info!(
            "[TrackerHandle] Ingress started (capacity {})",
            capacity
        );

        Ok(ProfileSender {
            producer,
            dropped: Arc::clone(&self.dropped),
            telemetry: Arc::clone(&self.ctx.telemetry),
        })
    }

    /// Stop the ingress worker after it drained the queue
    ///
    /// # Returns
    /// Number of samples the worker processed
    pub fn stop_ingress(&self) -> Result<u64, EngineError> {
        let worker = self.lock_ingress()?.take().ok_or_else(|| {
            let err = EngineError::NotRunning;
            log_engine_error(&err, "stop_ingress");
            err
        })?;
        let processed = worker.shutdown();
        log::info!(
            "[TrackerHandle] Ingress stopped after {} samples",
            processed
        );
        Ok(processed)
    }

    pub fn is_ingress_running(&self) -> bool {
        self.lock_ingress()
            .map(|ingress| {
                ingress
                    .as_ref()
                    .is_some_and(|worker| !worker.thread.is_finished())
            })
            .unwrap_or(false)
    }

    /// Hold the pipeline so no cycle runs while the active program changes
    ///
    /// A poisoned pipeline is logged and the change goes ahead unguarded.
    fn pause_pipeline(&self, context: &str) -> Option<MutexGuard<'_, SeamPipeline>> {
        self.ctx
            .lock_pipeline()
            .inspect_err(|err| log_engine_error(err, context))
            .ok()
    }

    fn swap_definitions<T>(
        &self,
        context: &str,
        swap: impl FnOnce(&RegistryManager) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut pipeline = self.pause_pipeline(context);
        let before = self.active_program();
        let result = swap(&self.ctx.registry)?;

        let swapped = match (&before, &self.active_program()) {
            (Some(old), Some(new)) => !Arc::ptr_eq(old, new),
            (old, new) => old.is_some() != new.is_some(),
        };
        if swapped {
            if let Some(pipeline) = pipeline.as_mut() {
                log::info!("[TrackerHandle] Active program swapped by {}, window reset", context);
                pipeline.reset();
            }
        }
        Ok(result)
    }

    fn active_program(&self) -> Option<Arc<TransformProgram>> {
        self.ctx
            .registry
            .active_program()
            .ok()
            .flatten()
            .map(|(program, _)| program)
    }

    fn lock_ingress(&self) -> Result<MutexGuard<'_, Option<IngressWorker>>, EngineError> {
        self.ingress.lock().map_err(|_| EngineError::LockPoisoned {
            component: "ingress".to_string(),
        })
    }
}

impl Default for TrackerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if let Ok(mut ingress) = self.ingress.lock() {
            if let Some(worker) = ingress.take() {
                worker.shutdown();
            }
        }
    }
}

/// Drain the queue until stopped (or the producer is gone) and the queue is
/// empty
fn spawn_ingress_thread(
    mut consumer: Consumer<ProfileSample>,
    ctx: CycleContext,
    running: Arc<AtomicBool>,
) -> JoinHandle<u64> {
    thread::spawn(move || {
        tracing::info!("[IngressThread] Starting ingress loop");
        let mut processed: u64 = 0;

        loop {
            let sample = match consumer.pop() {
                Ok(sample) => sample,
                Err(PopError::Empty) => {
                    // Check shutdown only when the queue is empty
                    let stopping = !running.load(Ordering::SeqCst) || consumer.is_abandoned();
                    if stopping && consumer.is_empty() {
                        tracing::info!(
                            "[IngressThread] Queue drained after {} samples, exiting",
                            processed
                        );
                        break;
                    }
                    thread::sleep(IDLE_POLL);
                    continue;
                }
            };

            processed += 1;
            if let Err(err) = ctx.run(&sample) {
                tracing::warn!("[IngressThread] Sample {} not processed: {}", processed, err);
            }
        }

        processed
    })
}
