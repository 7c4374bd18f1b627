use crate::{
    error::CaptionError,
    model::{CaptionModel, RgbImage},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

/// Represents the current state of the inference engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineState {
    /// The engine is idle and ready to accept new inference requests.
    Idle,
    /// The engine is currently processing an inference request.
    Processing,
}

impl EngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Processing => "processing",
        }
    }
}

/// Caption produced by the engine together with its telemetry.
#[derive(Debug, Clone)]
pub struct CaptionOutput {
    /// Identifier assigned to the request when it was scheduled.
    pub id: u64,
    /// Timestamp when the inference started.
    pub start_time: Instant,
    /// Total time taken for the inference.
    pub duration: Duration,
    /// The generated caption, never empty.
    pub caption: String,
}

type EngineReply = oneshot::Sender<Result<CaptionOutput, String>>;

struct EngineRequest {
    id: u64,
    image: RgbImage,
    reply: EngineReply,
}

/// Runs a [`CaptionModel`] on a dedicated thread and hands out captions to
/// any number of async callers.
///
/// Requests are served one at a time in arrival order. The handle itself is
/// immutable once built, so it can be shared behind an `Arc`.
pub struct CaptionEngine {
    state: Arc<Mutex<EngineState>>,
    req_tx: Option<mpsc::Sender<EngineRequest>>,
    inference_handle: Option<JoinHandle<()>>,
    id_counter: AtomicU64,
}

impl CaptionEngine {
    /// Creates a new engine and moves `model` onto its inference thread.
    pub fn new<M>(mut model: M) -> Self
    where
        M: CaptionModel + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<EngineRequest>();
        let state = Arc::new(Mutex::new(EngineState::Idle));

        let inference_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!("Running inference {}", req.id);

                    *state.lock().unwrap() = EngineState::Processing;
                    let start_time = Instant::now();

                    // a panicking model only fails the request that triggered it
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| model.caption(&req.image)));

                    let result = match outcome {
                        Ok(Ok(caption)) if caption.trim().is_empty() => {
                            Err("model returned an empty caption".to_string())
                        }
                        Ok(Ok(caption)) => Ok(CaptionOutput {
                            id: req.id,
                            start_time,
                            duration: start_time.elapsed(),
                            caption,
                        }),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(payload) => {
                            let msg = panic_message(payload.as_ref());
                            log::error!("Model panicked during inference {}: {}", req.id, msg);
                            Err(format!("model panicked: {msg}"))
                        }
                    };

                    *state.lock().unwrap() = EngineState::Idle;

                    log::debug!(
                        "Inference {} completed in {:?}",
                        req.id,
                        start_time.elapsed()
                    );

                    if req.reply.send(result).is_err() {
                        log::warn!("Caller of inference {} went away before the reply", req.id);
                    }
                }
                log::debug!("Inference thread exiting");
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            inference_handle: Some(inference_handle),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns the current state of the inference engine.
    pub fn state(&self) -> EngineState {
        self.state.lock().unwrap().clone()
    }

    /// Queues `image` for captioning and waits for the model's answer.
    ///
    /// Every failure, including a stopped engine, is reported as
    /// [`CaptionError::Inference`].
    pub async fn caption(&self, image: RgbImage) -> Result<CaptionOutput, CaptionError> {
        let tx = self
            .req_tx
            .as_ref()
            .ok_or_else(|| CaptionError::Inference("inference engine is not running".to_string()))?;

        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        tx.send(EngineRequest {
            id,
            image,
            reply: reply_tx,
        })
        .map_err(|_| CaptionError::Inference("inference engine is not running".to_string()))?;

        reply_rx
            .await
            .map_err(|_| {
                CaptionError::Inference("inference engine stopped before replying".to_string())
            })?
            .map_err(CaptionError::Inference)
    }

    /// Stops the engine and waits for the inference thread to finish the
    /// requests already queued.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.inference_handle.take() {
            if handle.join().is_err() {
                log::error!("Inference thread panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Drop for CaptionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
