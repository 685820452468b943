//! ONNX Runtime session worker
//!
//! onnxruntime-rs sessions cannot leave the thread that created them, so
//! each model gets one owner thread. Requests reach it over a channel and
//! each carries its own reply channel; concurrent callers queue up.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use ndarray::Array2;
use onnxruntime::environment::Environment;
use onnxruntime::session::Session;
use onnxruntime::tensor::OrtOwnedTensor;
use onnxruntime::{GraphOptimizationLevel, LoggingLevel};
use crate::error::{EmoStressError, Result};

/// Intra-op threads per session. Requests already run in parallel.
const INTRA_OP_THREADS: i16 = 1;

struct Job {
    features: Vec<f32>,
    reply: Sender<Result<Vec<Vec<f32>>>>,
}

pub struct OnnxSession {
    model_path: PathBuf,
    input_dim: Option<usize>,
    tx: Sender<Option<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("model_path", &self.model_path)
            .field("input_dim", &self.input_dim)
            .finish()
    }
}

impl OnnxSession {
    /// Start the owner thread and wait until the model is loaded.
    pub fn open(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            return Err(EmoStressError::model_unavailable(format!(
                "ONNX model file does not exist: {}", model_path.display()
            )));
        }

        let (tx, rx) = channel::<Option<Job>>();
        let (ready_tx, ready_rx) = channel::<Result<Option<usize>>>();
        let path = model_path.to_path_buf();

        let handle = thread::Builder::new()
            .name("onnx-session".to_string())
            .spawn(move || serve(&path, ready_tx, rx))
            .map_err(|e| EmoStressError::model_unavailable(format!("Cannot start ONNX worker: {}", e)))?;

        let loaded = ready_rx.recv().unwrap_or_else(|_| {
            Err(EmoStressError::model_unavailable(format!(
                "ONNX worker for {} exited during load", model_path.display()
            )))
        });
        let input_dim = match loaded {
            Ok(input_dim) => input_dim,
            Err(e) => {
                let _ = handle.join();
                return Err(e);
            }
        };

        Ok(Self {
            model_path: model_path.to_path_buf(),
            input_dim,
            tx,
            handle: Some(handle),
        })
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    /// Run one `(1, n)` float row; every output is returned flattened.
    pub fn run(&self, features: &[f32]) -> Result<Vec<Vec<f32>>> {
        let (reply_tx, reply_rx) = channel();
        self.tx
            .send(Some(Job { features: features.to_vec(), reply: reply_tx }))
            .map_err(|_| EmoStressError::inference("ONNX worker has stopped"))?;
        reply_rx.recv()
            .map_err(|_| EmoStressError::inference("ONNX worker dropped the request"))?
    }
}

impl Drop for OnnxSession {
    fn drop(&mut self) {
        let _ = self.tx.send(None);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Owner thread body: load, report readiness, then answer jobs until told to stop.
fn serve(model_path: &Path, ready: Sender<Result<Option<usize>>>, rx: Receiver<Option<Job>>) {
    let environment = match Environment::builder()
        .with_name("emostress")
        .with_log_level(LoggingLevel::Warning)
        .build()
    {
        Ok(environment) => environment,
        Err(e) => {
            let _ = ready.send(Err(load_error(model_path, e)));
            return;
        }
    };

    let (mut session, input_dim) = match load(&environment, model_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(input_dim)).is_err() {
        return;
    }

    while let Ok(Some(job)) = rx.recv() {
        let start = Instant::now();
        let outcome = infer(&mut session, &job.features);
        log::debug!("ONNX run on {} in {:.2}ms", model_path.display(), start.elapsed().as_secs_f64() * 1000.0);
        let _ = job.reply.send(outcome);
    }
}

fn load_error(model_path: &Path, e: onnxruntime::OrtError) -> EmoStressError {
    EmoStressError::model_unavailable(format!("Cannot load ONNX model {}: {}", model_path.display(), e))
}

fn load<'e>(environment: &'e Environment, model_path: &Path) -> Result<(Session<'e>, Option<usize>)> {
    let session = environment.new_session_builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::All))
        .and_then(|b| b.with_number_threads(INTRA_OP_THREADS))
        .and_then(|b| b.with_model_from_file(model_path.to_path_buf()))
        .map_err(|e| load_error(model_path, e))?;

    if session.inputs.len() != 1 {
        return Err(EmoStressError::model_unavailable(format!(
            "ONNX model {} has {} inputs, expected 1", model_path.display(), session.inputs.len()
        )));
    }
    if session.outputs.is_empty() {
        return Err(EmoStressError::model_unavailable(format!(
            "ONNX model {} has no outputs", model_path.display()
        )));
    }

    let input_names: Vec<&str> = session.inputs.iter().map(|input| input.name.as_str()).collect();
    let output_names: Vec<&str> = session.outputs.iter().map(|output| output.name.as_str()).collect();
    let input_dim = session.inputs[0].dimensions.last().copied().flatten().map(|d| d as usize);

    log::info!("ONNX model loaded: {}", model_path.display());
    log::debug!("Inputs: {:?} (width {:?}), outputs: {:?}", input_names, input_dim, output_names);

    Ok((session, input_dim))
}

fn infer(session: &mut Session<'_>, features: &[f32]) -> Result<Vec<Vec<f32>>> {
    let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
        .map_err(|e| EmoStressError::inference(format!("Input tensor shape: {}", e)))?;
    let outputs: Vec<OrtOwnedTensor<f32, _>> = session.run(vec![input])?;
    Ok(outputs.iter().map(|tensor| tensor.iter().copied().collect()).collect())
}
