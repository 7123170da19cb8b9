//! Mock providers for testing
//!
//! Scripted responses with per-call failure injection and call counters,
//! so every pipeline property is exercised without the network.

use crate::provider::{
    AnalyzeRequest, ImageGenRequest, ImageGenResponse, ImageGenerator, MeshReconstructor,
    VisionAnalyzer,
};
use loft_core::{LoftError, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Image generator that replays scripted responses
#[derive(Default)]
pub struct MockImageGenerator {
    calls: AtomicUsize,
    queue: Mutex<VecDeque<Result<ImageGenResponse>>>,
    last_request: Mutex<Option<ImageGenRequest>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a canned response for the next call
    pub fn push_ok(&self, response: ImageGenResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a failure for the next call
    pub fn push_err(&self, err: LoftError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, for asserting on derived prompts
    pub fn last_request(&self) -> Option<ImageGenRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(&self, request: &ImageGenRequest) -> Result<ImageGenResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(scripted) = self.queue.lock().unwrap().pop_front() {
            return scripted;
        }

        Ok(ImageGenResponse {
            image_url: format!("https://cdn.provider.example/generated-{}.png", n),
            structured_prompt: Some(Value::String("{\"scene\":\"mock\"}".to_string())),
            seed: Some(1234),
        })
    }
}

/// Vision analyzer that replays scripted text replies
#[derive(Default)]
pub struct MockVisionAnalyzer {
    calls: AtomicUsize,
    queue: Mutex<VecDeque<Result<String>>>,
    last_request: Mutex<Option<AnalyzeRequest>>,
}

impl MockVisionAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: &str) {
        self.queue.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, err: LoftError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AnalyzeRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl VisionAnalyzer for MockVisionAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    fn analyze(&self, request: &AnalyzeRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(scripted) = self.queue.lock().unwrap().pop_front() {
            return scripted;
        }

        Ok("1. mid-century sofa\n2. walnut coffee table".to_string())
    }
}

/// Mesh reconstructor that replays scripted payloads
#[derive(Default)]
pub struct MockMeshReconstructor {
    calls: AtomicUsize,
    queue: Mutex<VecDeque<Result<Value>>>,
}

impl MockMeshReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, payload: Value) {
        self.queue.lock().unwrap().push_back(Ok(payload));
    }

    pub fn push_err(&self, err: LoftError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MeshReconstructor for MockMeshReconstructor {
    fn name(&self) -> &str {
        "mock"
    }

    fn reconstruct(&self, image_url: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(scripted) = self.queue.lock().unwrap().pop_front() {
            return scripted;
        }

        Ok(serde_json::json!({
            "model_mesh": { "url": "https://cdn.provider.example/mock.glb" },
            "image_url": image_url
        }))
    }
}
