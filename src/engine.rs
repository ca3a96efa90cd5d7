//! LLM inference engine
//!
//! Wraps llama.cpp model loading and chat completion behind the [`ChatModel`]
//! seam the HTTP layer depends on. The model is loaded once at boot; each
//! completion gets a fresh context and generations are serialized.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Mutex;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use thiserror::Error;

/// Errors from engine construction or generation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model could not be loaded from disk
    #[error("Failed to load model: {0}")]
    Load(String),
    /// A completion attempt failed
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl EngineError {
    /// Short machine-readable category for error responses
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Load(_) => "load",
            EngineError::Inference(_) => "inference",
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// System prompt
    System,
    /// Message from the user
    User,
    /// Message from the model
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The capability the HTTP layer needs from an inference engine: given an
/// ordered list of role-tagged messages, a sampling temperature, and a token
/// budget, produce generated text synchronously.
pub trait ChatModel: Send + Sync {
    fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, EngineError>;
}

/// llama.cpp-backed engine
pub struct LlamaEngine {
    backend: LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    n_threads: i32,
    /// llama contexts are not thread-safe; one generation at a time
    generation: Mutex<()>,
}

// Safety: the backend and model are only read after construction, and all
// context/decode work happens under the generation mutex.
unsafe impl Send for LlamaEngine {}
unsafe impl Sync for LlamaEngine {}

impl LlamaEngine {
    /// Load a GGUF model from disk.
    pub fn load(model_path: &Path, n_ctx: u32, n_threads: i32) -> Result<Self, EngineError> {
        tracing::info!(
            "Loading model {} (n_ctx={}, n_threads={})",
            model_path.display(),
            n_ctx,
            n_threads
        );

        let backend = LlamaBackend::init()
            .map_err(|e| EngineError::Load(format!("llama backend init failed: {}", e)))?;

        let model_params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| EngineError::Load(format!("{}: {}", model_path.display(), e)))?;

        tracing::info!(
            "Model loaded: {} params, vocab size {}",
            model.n_params(),
            model.n_vocab()
        );

        Ok(Self {
            backend,
            model,
            n_ctx,
            n_threads,
            generation: Mutex::new(()),
        })
    }
}

impl ChatModel for LlamaEngine {
    fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, EngineError> {
        let _guard = self
            .generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let prompt = format_chatml(messages);

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);

        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| EngineError::Inference(format!("Failed to create context: {}", e)))?;

        let tokens = self
            .model
            .str_to_token(&prompt, AddBos::Always)
            .map_err(|e| EngineError::Inference(format!("Tokenization failed: {}", e)))?;

        if tokens.len() as u32 >= self.n_ctx {
            return Err(EngineError::Inference(format!(
                "Prompt of {} tokens does not fit in a context of {}",
                tokens.len(),
                self.n_ctx
            )));
        }

        let mut batch = LlamaBatch::new(tokens.len().max(512), 1);
        for (i, &token) in tokens.iter().enumerate() {
            let is_last = i == tokens.len() - 1;
            batch
                .add(token, i as i32, &[0], is_last)
                .map_err(|e| EngineError::Inference(format!("Failed to add token: {}", e)))?;
        }

        ctx.decode(&mut batch)
            .map_err(|e| EngineError::Inference(format!("Decode failed: {}", e)))?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::temp(temperature),
            LlamaSampler::dist(1234),
        ]);

        let mut generated: Vec<LlamaToken> = Vec::new();
        let mut pos = tokens.len() as i32;

        for _ in 0..max_tokens {
            let token = sampler.sample(&ctx, -1);

            if self.model.is_eog_token(token) {
                break;
            }
            generated.push(token);

            batch.clear();
            batch
                .add(token, pos, &[0], true)
                .map_err(|e| EngineError::Inference(format!("Failed to add token: {}", e)))?;
            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Inference(format!("Decode failed: {}", e)))?;
            pos += 1;
        }

        self.model
            .tokens_to_str(&generated, Special::Tokenize)
            .map_err(|e| EngineError::Inference(format!("Token decoding failed: {}", e)))
    }
}

/// Assemble a ChatML prompt, the template family of the default artifact.
fn format_chatml(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        prompt.push_str("<|im_start|>");
        prompt.push_str(message.role.as_str());
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_chatml() {
        let messages = vec![
            ChatMessage::new(Role::System, "Eres un asistente."),
            ChatMessage::new(Role::User, r#"{"mensaje":"hola"}"#),
        ];
        let prompt = format_chatml(&messages);
        assert_eq!(
            prompt,
            "<|im_start|>system\nEres un asistente.<|im_end|>\n\
             <|im_start|>user\n{\"mensaje\":\"hola\"}<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_format_chatml_empty_system() {
        let messages = vec![ChatMessage::new(Role::System, "")];
        let prompt = format_chatml(&messages);
        assert!(prompt.starts_with("<|im_start|>system\n<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_engine_error_kinds() {
        assert_eq!(EngineError::Load("x".into()).kind(), "load");
        assert_eq!(EngineError::Inference("x".into()).kind(), "inference");
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let err = LlamaEngine::load(Path::new("/nonexistent/model.gguf"), 2048, 1);
        assert!(matches!(err, Err(EngineError::Load(_))));
    }
}
