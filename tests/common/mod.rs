#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use recipe_extract::gemini::types::{
    Candidate, Content, GeminiFile, GenerateContentRequest, GenerateContentResponse, Part,
};
use recipe_extract::{ExtractError, GenerativeModel};

/// Build a normal-completion response carrying the given text
pub fn json_response(payload: &str) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts: vec![Part::text(payload)],
            }),
            finish_reason: Some("STOP".to_string()),
        }],
        prompt_feedback: None,
    }
}

/// Build a response that stopped for the given reason, with no usable text
pub fn finish_only(reason: &str) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: None,
            finish_reason: Some(reason.to_string()),
        }],
        prompt_feedback: None,
    }
}

pub fn file_in_state(name: &str, state: &str) -> GeminiFile {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "uri": format!("https://files.example/{name}"),
        "state": state,
    }))
    .unwrap()
}

/// Scripted stand-in for the model service.
///
/// `generate` pops queued outcomes in order; `get_file` pops queued file
/// states, repeating the last one so poll loops see a stable final state.
#[derive(Default)]
pub struct ScriptedModel {
    generates: Mutex<VecDeque<Result<GenerateContentResponse, ExtractError>>>,
    upload: Mutex<Option<GeminiFile>>,
    file_states: Mutex<VecDeque<GeminiFile>>,
    pub generate_calls: AtomicU32,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_json(&self, payload: &str) {
        self.queue_response(json_response(payload));
    }

    pub fn queue_response(&self, response: GenerateContentResponse) {
        self.generates.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: ExtractError) {
        self.generates.lock().unwrap().push_back(Err(error));
    }

    pub fn set_upload(&self, file: GeminiFile) {
        *self.upload.lock().unwrap() = Some(file);
    }

    pub fn queue_file_state(&self, file: GeminiFile) {
        self.file_states.lock().unwrap().push_back(file);
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ExtractError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.generates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ExtractError::EmptyResponse))
    }

    async fn upload_file(
        &self,
        _data: Vec<u8>,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<GeminiFile, ExtractError> {
        self.upload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ExtractError::FileProcessing("no scripted upload".to_string()))
    }

    async fn get_file(&self, _name: &str) -> Result<GeminiFile, ExtractError> {
        let mut states = self.file_states.lock().unwrap();
        match states.len() {
            0 => Err(ExtractError::FileProcessing(
                "no scripted file state".to_string(),
            )),
            // Last state is sticky so poll loops can keep asking
            1 => Ok(states.front().unwrap().clone()),
            _ => Ok(states.pop_front().unwrap()),
        }
    }
}
