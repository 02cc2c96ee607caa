//! Driving a callback-style model API through both bridges
//!
//! The "remote" side lives on a tokio runtime and finishes every call
//! asynchronously, the way a browser-hosted inference library would.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_bridge::prelude::*;
use tokio::runtime::Handle;

/// Weights of loaded models, keyed by model id.
type ModelTable = Arc<Mutex<HashMap<String, Vec<f32>>>>;

#[derive(Clone)]
struct RemoteModelApi {
    rt: Handle,
    models: ModelTable,
}

impl RemoteModelApi {
    fn load(
        &self,
        model_id: String,
        weights: Vec<f32>,
        resume: CompletionSignal,
        status: StatusSlot,
    ) {
        let models = self.models.clone();
        self.rt.spawn(async move {
            // pretend to fetch and compile the graph
            tokio::time::sleep(Duration::from_millis(200)).await;
            models.lock().insert(model_id, weights);
            resume.resume(&status, StatusCode::Ok);
        });
    }

    fn predict(
        &self,
        model_id: String,
        input: Vec<f32>,
        output: Arc<Mutex<Vec<f32>>>,
        resume: CompletionSignal,
        status: StatusSlot,
    ) {
        let models = self.models.clone();
        self.rt.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;

            let code = match models.lock().get(&model_id) {
                Some(weights) if weights.len() == input.len() => {
                    let score: f32 = weights.iter().zip(&input).map(|(w, x)| w * x).sum();
                    *output.lock() = vec![score];
                    StatusCode::Ok
                }
                _ => StatusCode::Error,
            };
            resume.resume(&status, code);
        });
    }

    fn dispose(&self, model_id: String, resume: CompletionSignal, status: StatusSlot) {
        let code = match self.models.lock().remove(&model_id) {
            Some(_) => StatusCode::Ok,
            None => StatusCode::Error,
        };
        resume.resume(&status, code);
    }
}

fn run_session(name: &str, bridge: &dyn Bridge, api: &RemoteModelApi) {
    println!("=== {} ===\n", name);

    let t1 = Instant::now();
    let remote = api.clone();
    let status = invoke(bridge, move |resume: CompletionSignal, status: StatusSlot| {
        remote.load("linear".to_string(), vec![0.5, -1.0, 2.0], resume, status)
    });
    println!("load:    {} ({:?})", status, t1.elapsed());

    let output = Arc::new(Mutex::new(Vec::new()));
    let remote = api.clone();
    let out = output.clone();
    let status = invoke(bridge, move |resume: CompletionSignal, status: StatusSlot| {
        remote.predict("linear".to_string(), vec![2.0, 1.0, 0.5], out, resume, status)
    });
    println!("predict: {} -> {:?}", status, output.lock());

    let remote = api.clone();
    let status = invoke(bridge, move |resume: CompletionSignal, status: StatusSlot| {
        remote.predict("missing".to_string(), vec![1.0], Arc::default(), resume, status)
    });
    println!("predict (unknown model): {}", status);

    let remote = api.clone();
    let status = invoke(bridge, move |resume: CompletionSignal, status: StatusSlot| {
        remote.dispose("linear".to_string(), resume, status)
    });
    println!("dispose: {}\n", status);
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    let api = RemoteModelApi {
        rt: rt.handle().clone(),
        models: ModelTable::default(),
    };

    let dedicated = DedicatedWorkerBridge::new()?;
    run_session("Dedicated worker", &dedicated, &api);

    let shared = SharedQueueBridge::spawn()?;
    run_session("Shared queue", &shared, &api);

    println!("dedicated: {:?}", dedicated.metrics());
    println!("shared:    {:?}", shared.metrics());

    Ok(())
}
