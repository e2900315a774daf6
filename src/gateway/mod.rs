//! Asynchronous training on a bounded worker pool
//!
//! [`TrainingGateway`] moves a training request onto a rayon worker and
//! reports the outcome back through a completion channel. Callbacks never
//! run on a worker: they are invoked on the thread that owns the gateway,
//! exactly once per job, from [`TrainingGateway::dispatch_completions`],
//! [`TrainingGateway::wait_next`] or [`TrainingGateway::wait_all`].
//!
//! ```rust,no_run
//! use autosvm::gateway::{GatewayConfig, SharedSvm, TrainingGateway};
//! use autosvm::{CrossValidationConfig, LibSvmReader, Svm};
//! use std::sync::Arc;
//!
//! # fn main() -> autosvm::Result<()> {
//! let data = Arc::new(LibSvmReader::new().load_file("data.libsvm")?);
//! let model = SharedSvm::new(Svm::new());
//!
//! let mut gateway = TrainingGateway::new(GatewayConfig::default())?;
//! gateway.train_auto_async(&model, data, CrossValidationConfig::default(), |outcome| {
//!     println!("finished: {:?}", outcome);
//! })?;
//! gateway.wait_all();
//! # Ok(())
//! # }
//! ```

pub mod request;
pub mod shared;

pub use self::request::{TrainInput, TrainRequest};
pub use self::shared::SharedSvm;

use crate::autotune::CrossValidationConfig;
use crate::core::{Result, SVMError, SampleLayout, TrainFlags};
use crate::data::TrainData;
use log::{debug, info, warn};
use ndarray::Array2;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Upper bound of the default worker count
const MAX_DEFAULT_WORKERS: usize = 4;

/// Gateway configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Number of worker threads
    pub workers: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            workers: available.min(MAX_DEFAULT_WORKERS),
        }
    }
}

impl GatewayConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Identifier of a submitted job, unique per gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

type Completion = (JobId, Result<bool>);
type Callback = Box<dyn FnOnce(Result<bool>)>;

/// Runs training requests on a worker pool and delivers completions
///
/// Callbacks are not required to be `Send`, so the gateway stays on the
/// thread that created it.
pub struct TrainingGateway {
    pool: rayon::ThreadPool,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    callbacks: HashMap<JobId, Callback>,
    next_id: u64,
    closed: bool,
}

impl fmt::Debug for TrainingGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingGateway")
            .field("workers", &self.pool.current_num_threads())
            .field("pending", &self.callbacks.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl TrainingGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(SVMError::InvalidArgument(
                "gateway needs at least one worker".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("autosvm-worker-{i}"))
            .build()
            .map_err(|e| SVMError::InvalidArgument(format!("cannot start worker pool: {e}")))?;
        let (sender, receiver) = channel();

        info!("Training gateway started with {} workers", config.workers);
        Ok(Self {
            pool,
            sender,
            receiver,
            callbacks: HashMap::new(),
            next_id: 0,
            closed: false,
        })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Jobs whose callback has not run yet
    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting jobs; already submitted jobs still complete
    pub fn close(&mut self) {
        if !self.closed {
            info!("Training gateway closed with {} jobs pending", self.pending());
            self.closed = true;
        }
    }

    /// Queue `request` against `model` and return immediately
    pub fn submit<F>(
        &mut self,
        model: &SharedSvm,
        request: TrainRequest,
        on_complete: F,
    ) -> Result<JobId>
    where
        F: FnOnce(Result<bool>) + 'static,
    {
        let kind = request.kind();
        let model = model.clone();
        let id = self.spawn(
            kind,
            move || {
                let mut svm = model.lock();
                request.execute(&mut svm)
            },
            on_complete,
        )?;
        debug!("Submitted {} as {}", kind, id);
        Ok(id)
    }

    fn spawn<J, F>(&mut self, kind: &'static str, job: J, on_complete: F) -> Result<JobId>
    where
        J: FnOnce() -> Result<bool> + Send + 'static,
        F: FnOnce(Result<bool>) + 'static,
    {
        if self.closed {
            return Err(SVMError::GatewayClosed);
        }
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.callbacks.insert(id, Box::new(on_complete));

        let sender = self.sender.clone();
        self.pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                warn!("{} ({}) panicked: {}", id, kind, msg);
                Err(SVMError::WorkerPanicked(msg))
            });
            // The receiver only disappears with the gateway
            let _ = sender.send((id, outcome));
        });
        Ok(id)
    }

    /// Train on the train subset of a shared dataset
    pub fn train_async<F>(
        &mut self,
        model: &SharedSvm,
        data: Arc<TrainData>,
        flags: TrainFlags,
        on_complete: F,
    ) -> Result<JobId>
    where
        F: FnOnce(Result<bool>) + 'static,
    {
        self.submit(model, TrainRequest::dataset(data, flags), on_complete)
    }

    /// Train on matrices moved into the job
    pub fn train_matrices_async<F>(
        &mut self,
        model: &SharedSvm,
        samples: Array2<f64>,
        layout: SampleLayout,
        responses: Array2<f64>,
        on_complete: F,
    ) -> Result<JobId>
    where
        F: FnOnce(Result<bool>) + 'static,
    {
        self.submit(
            model,
            TrainRequest::matrices(samples, layout, responses),
            on_complete,
        )
    }

    /// Grid search and final training on a worker
    pub fn train_auto_async<F>(
        &mut self,
        model: &SharedSvm,
        data: Arc<TrainData>,
        config: CrossValidationConfig,
        on_complete: F,
    ) -> Result<JobId>
    where
        F: FnOnce(Result<bool>) + 'static,
    {
        self.submit(model, TrainRequest::auto(data, config), on_complete)
    }

    fn deliver(&mut self, (id, outcome): Completion) -> Option<JobId> {
        let callback = self.callbacks.remove(&id)?;
        match &outcome {
            Ok(converged) => debug!("{} finished (converged: {})", id, converged),
            Err(e) => debug!("{} failed: {}", id, e),
        }
        callback(outcome);
        Some(id)
    }

    /// Run callbacks of every job that has already finished; never blocks
    pub fn dispatch_completions(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            if self.deliver(completion).is_some() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Block until one job finishes and run its callback
    ///
    /// Returns `None` when nothing is pending.
    pub fn wait_next(&mut self) -> Option<JobId> {
        while !self.callbacks.is_empty() {
            let completion = self.receiver.recv().ok()?;
            if let Some(id) = self.deliver(completion) {
                return Some(id);
            }
        }
        None
    }

    /// Block until every submitted job has delivered its completion
    pub fn wait_all(&mut self) -> usize {
        let mut delivered = 0;
        while self.wait_next().is_some() {
            delivered += 1;
        }
        delivered
    }
}

impl Drop for TrainingGateway {
    fn drop(&mut self) {
        if self.callbacks.is_empty() {
            return;
        }
        info!(
            "Waiting for {} running jobs before shutting down the gateway",
            self.callbacks.len()
        );
        // Wait for the workers; undelivered callbacks are discarded
        while !self.callbacks.is_empty() {
            match self.receiver.recv() {
                Ok((id, _)) => {
                    self.callbacks.remove(&id);
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Svm;
    use crate::core::StatModel;
    use ndarray::array;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    fn gateway(workers: usize) -> TrainingGateway {
        TrainingGateway::new(GatewayConfig::default().with_workers(workers)).expect("pool starts")
    }

    fn tiny_data() -> Arc<TrainData> {
        Arc::new(
            TrainData::new(
                array![[0.0, 0.0], [0.2, 0.1], [2.0, 2.0], [2.2, 1.9]],
                SampleLayout::Row,
                array![0.0, 0.0, 1.0, 1.0],
            )
            .expect("valid dataset"),
        )
    }

    #[test]
    fn test_default_config_is_bounded() {
        let config = GatewayConfig::default();
        assert!(config.workers >= 1);
        assert!(config.workers <= MAX_DEFAULT_WORKERS);
        assert!(matches!(
            TrainingGateway::new(config.with_workers(0)),
            Err(SVMError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_callback_runs_on_owner_thread() {
        let mut gw = gateway(2);
        let model = SharedSvm::new(Svm::new());
        let owner = std::thread::current().id();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let id = gw
            .train_async(&model, tiny_data(), TrainFlags::NONE, move |outcome| {
                assert_eq!(std::thread::current().id(), owner);
                sink.borrow_mut().push(outcome.is_ok());
            })
            .expect("submitted");

        assert_eq!(gw.pending(), 1);
        assert_eq!(gw.wait_next(), Some(id));
        assert_eq!(gw.pending(), 0);
        assert_eq!(*seen.borrow(), vec![true]);
        assert!(model.with(|svm| svm.is_trained()));
        assert_eq!(gw.wait_next(), None);
    }

    #[test]
    fn test_errors_are_delivered() {
        let mut gw = gateway(1);
        let model = SharedSvm::new(Svm::new());
        let result = Rc::new(RefCell::new(None));

        let sink = Rc::clone(&result);
        gw.train_async(&model, tiny_data(), TrainFlags::UPDATE_MODEL, move |outcome| {
            *sink.borrow_mut() = Some(outcome);
        })
        .expect("submitted");
        gw.wait_all();

        assert!(matches!(
            result.borrow_mut().take(),
            Some(Err(SVMError::UnsupportedOperation(_)))
        ));
        assert!(!model.with(|svm| svm.is_trained()));
    }

    #[test]
    fn test_panics_become_worker_panicked() {
        let mut gw = gateway(1);
        let result = Rc::new(RefCell::new(None));

        let sink = Rc::clone(&result);
        gw.spawn("test", || panic!("boom"), move |outcome| {
            *sink.borrow_mut() = Some(outcome);
        })
        .expect("submitted");
        assert_eq!(gw.wait_all(), 1);

        let outcome = result.borrow_mut().take();
        match outcome {
            Some(Err(SVMError::WorkerPanicked(msg))) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome {:?}", other.map(|r| r.is_ok())),
        }
    }

    #[test]
    fn test_dispatch_completions_does_not_block() {
        let mut gw = gateway(1);
        let (release, gate) = mpsc::channel::<()>();
        let count = Rc::new(RefCell::new(0));

        let sink = Rc::clone(&count);
        gw.spawn(
            "test",
            move || {
                gate.recv().ok();
                Ok(true)
            },
            move |_| *sink.borrow_mut() += 1,
        )
        .expect("submitted");

        assert_eq!(gw.dispatch_completions(), 0);
        assert_eq!(*count.borrow(), 0);

        release.send(()).unwrap();
        gw.wait_all();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_closed_gateway_rejects_jobs() {
        let mut gw = gateway(1);
        let model = SharedSvm::new(Svm::new());
        gw.close();
        assert!(gw.is_closed());
        assert!(matches!(
            gw.train_async(&model, tiny_data(), TrainFlags::NONE, |_| {}),
            Err(SVMError::GatewayClosed)
        ));
        assert_eq!(gw.pending(), 0);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let mut gw = gateway(2);
        let a = SharedSvm::new(Svm::new());
        let b = SharedSvm::new(Svm::new());
        let first = gw
            .train_async(&a, tiny_data(), TrainFlags::NONE, |_| {})
            .unwrap();
        let second = gw
            .train_async(&b, tiny_data(), TrainFlags::NONE, |_| {})
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(gw.wait_all(), 2);
    }
}
