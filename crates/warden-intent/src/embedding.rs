//! Embedding-based intent router.
//!
//! Classifies utterances by cosine similarity against pre-computed
//! per-intent phrase embeddings. The model behind [`EmbeddingBackend`] is
//! lazy-loaded behind an exclusive lock, RAM-guarded, and unloaded by a
//! detached timer after an idle window. Concurrent classifications
//! coalesce behind the lock during load; only one load is ever in flight.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Errors from the embedding model lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding model failed to load: {0}")]
    LoadFailed(String),

    #[error("embedding model is not loaded")]
    NotLoaded,

    #[error("encode failed: {0}")]
    EncodeFailed(String),
}

/// Contract for the sentence-encoder model.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Load model resources. Called at most once per loaded period,
    /// under the router's exclusive lock.
    async fn load(&self) -> Result<(), EmbeddingError>;

    /// Release model resources.
    fn unload(&self);

    /// Encode a batch of texts into vectors.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub model: String,
    pub lazy_load: bool,
    /// Scores at or above this accept without escalation.
    pub confidence_threshold: f64,
    /// Scores in `[mid, high)` accept but flag escalation.
    pub mid_confidence_threshold: f64,
    pub unload_after_seconds: u64,
    pub device: String,
    /// Minimum free RAM (GB) required to load the model.
    pub warn_threshold_gb: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".into(),
            lazy_load: true,
            confidence_threshold: 0.75,
            mid_confidence_threshold: 0.5,
            unload_after_seconds: 120,
            device: "cpu".into(),
            warn_threshold_gb: 3.5,
        }
    }
}

/// Structured classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingClassification {
    pub intent: String,
    pub confidence: f64,
    pub requires_escalation: bool,
    pub method: &'static str,
}

impl EmbeddingClassification {
    fn fallback() -> Self {
        Self {
            intent: "unknown".into(),
            confidence: 0.0,
            requires_escalation: true,
            method: "embedding_fallback",
        }
    }
}

/// Per-intent training phrases used to anchor the similarity space.
#[must_use]
pub fn default_intent_phrases() -> Vec<(String, Vec<String>)> {
    let table: &[(&str, &[&str])] = &[
        (
            "create_file",
            &["create a file", "make a new file", "new text file", "create file named notes"],
        ),
        (
            "write_file",
            &["write to a file", "save text into a file", "write content in the file"],
        ),
        (
            "read_file",
            &["read a file", "show file contents", "open the file and read it"],
        ),
        (
            "delete_file",
            &["delete a file", "remove the file", "get rid of this file"],
        ),
        (
            "open_url",
            &["open a website", "go to a url", "browse to a page", "open google"],
        ),
        (
            "launch_app",
            &["launch an application", "start a program", "open spotify", "run the app"],
        ),
        (
            "search_web",
            &["search the web", "look something up online", "find information about"],
        ),
        (
            "install_software",
            &["install a package", "install software", "add a program"],
        ),
        (
            "change_config",
            &["change a setting", "update configuration", "set an option"],
        ),
        (
            "conversation",
            &["how are you", "who are you", "tell me about yourself"],
        ),
        (
            "complex_goal",
            &["organize my files", "clean up my downloads folder", "sort everything out"],
        ),
    ];
    table
        .iter()
        .map(|(intent, phrases)| {
            (
                (*intent).to_string(),
                phrases.iter().map(|p| (*p).to_string()).collect(),
            )
        })
        .collect()
}

struct LoadedState {
    intent_embeddings: HashMap<String, Vec<Vec<f32>>>,
}

/// Lazy-loading embedding classifier with idle unload.
pub struct EmbeddingRouter {
    backend: Arc<dyn EmbeddingBackend>,
    config: RouterConfig,
    intent_phrases: Vec<(String, Vec<String>)>,
    state: Arc<Mutex<Option<LoadedState>>>,
    /// Serializes loads; concurrent classifications coalesce behind it.
    load_gate: tokio::sync::Mutex<()>,
    /// Unix millis of the last classify; consulted by the unload timer.
    last_used: Arc<AtomicI64>,
    /// Bumped on every load; stale unload timers see a newer generation
    /// and stand down.
    generation: Arc<AtomicU64>,
    memory_probe: fn() -> Option<f64>,
}

impl EmbeddingRouter {
    #[must_use]
    pub fn new(backend: Arc<dyn EmbeddingBackend>, config: RouterConfig) -> Self {
        Self {
            backend,
            config,
            intent_phrases: default_intent_phrases(),
            state: Arc::new(Mutex::new(None)),
            load_gate: tokio::sync::Mutex::new(()),
            last_used: Arc::new(AtomicI64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            memory_probe: available_memory_gb,
        }
    }

    #[must_use]
    pub fn with_intent_phrases(mut self, phrases: Vec<(String, Vec<String>)>) -> Self {
        self.intent_phrases = phrases;
        self
    }

    #[must_use]
    pub fn with_memory_probe(mut self, probe: fn() -> Option<f64>) -> Self {
        self.memory_probe = probe;
        self
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.lock().is_some()
    }

    #[must_use]
    pub fn supported_intents(&self) -> Vec<String> {
        self.intent_phrases.iter().map(|(i, _)| i.clone()).collect()
    }

    /// Classify `text` into an intent.
    ///
    /// Loads the model on first use. If the model cannot load (RAM floor,
    /// backend failure) the router degrades to an unknown result with
    /// escalation; it never blocks the cascade.
    pub async fn classify(&self, text: &str) -> EmbeddingClassification {
        if !self.ensure_loaded().await {
            return EmbeddingClassification::fallback();
        }
        self.touch();

        let input_embedding = match self.backend.encode(&[text.to_string()]) {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) | Err(_) => {
                tracing::error!("embedding encode failed; falling back to unknown");
                return EmbeddingClassification::fallback();
            }
        };

        let mut best_intent = "unknown".to_string();
        let mut best_score = 0.0f64;
        {
            let state = self.state.lock();
            let Some(loaded) = state.as_ref() else {
                return EmbeddingClassification::fallback();
            };
            for (intent, phrase_embeddings) in &loaded.intent_embeddings {
                for phrase_embedding in phrase_embeddings {
                    let score = f64::from(cosine_similarity(&input_embedding, phrase_embedding));
                    if score > best_score {
                        best_score = score;
                        best_intent = intent.clone();
                    }
                }
            }
        }

        self.schedule_unload();

        let (intent, requires_escalation) = if best_score >= self.config.confidence_threshold {
            (best_intent, false)
        } else if best_score >= self.config.mid_confidence_threshold {
            (best_intent, true)
        } else {
            ("unknown".to_string(), true)
        };

        EmbeddingClassification {
            intent,
            confidence: (best_score * 10_000.0).round() / 10_000.0,
            requires_escalation,
            method: "embedding",
        }
    }

    /// Load the model and precompute intent embeddings if needed. Only
    /// one load is ever in flight; late arrivals see the loaded state.
    async fn ensure_loaded(&self) -> bool {
        if self.state.lock().is_some() {
            return true;
        }
        let _load_guard = self.load_gate.lock().await;
        if self.state.lock().is_some() {
            return true;
        }

        if let Some(available) = (self.memory_probe)() {
            if available < self.config.warn_threshold_gb {
                tracing::warn!(
                    available_gb = available,
                    floor_gb = self.config.warn_threshold_gb,
                    "low RAM; skipping embedding model load"
                );
                return false;
            }
        }

        if let Err(error) = self.backend.load().await {
            tracing::error!(%error, "embedding model load failed");
            return false;
        }

        let mut intent_embeddings = HashMap::new();
        for (intent, phrases) in &self.intent_phrases {
            if intent == "unknown" || phrases.is_empty() {
                continue;
            }
            match self.backend.encode(phrases) {
                Ok(vectors) => {
                    intent_embeddings.insert(intent.clone(), vectors);
                }
                Err(error) => {
                    tracing::error!(%error, intent = %intent, "failed to precompute intent embeddings");
                    self.backend.unload();
                    return false;
                }
            }
        }

        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(LoadedState { intent_embeddings });
            self.generation.fetch_add(1, Ordering::SeqCst);
            tracing::info!(model = %self.config.model, device = %self.config.device, "embedding model loaded");
        }
        self.touch();
        true
    }

    fn touch(&self) {
        self.last_used
            .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    /// Arm the idle-unload timer for the current generation.
    fn schedule_unload(&self) {
        let state = Arc::clone(&self.state);
        let last_used = Arc::clone(&self.last_used);
        let generation = Arc::clone(&self.generation);
        let my_generation = generation.load(Ordering::SeqCst);
        let idle = Duration::from_secs(self.config.unload_after_seconds);
        let backend = Arc::clone(&self.backend);

        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if generation.load(Ordering::SeqCst) != my_generation {
                return;
            }
            let idle_ms = i64::try_from(idle.as_millis()).unwrap_or(i64::MAX);
            let elapsed =
                chrono::Utc::now().timestamp_millis() - last_used.load(Ordering::SeqCst);
            if elapsed >= idle_ms {
                let mut guard = state.lock();
                if guard.is_some() {
                    *guard = None;
                    backend.unload();
                    tracing::info!("embedding model unloaded after idle window");
                }
            }
        });
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + 1e-10)
}

/// Free system memory in GB, read from /proc/meminfo where available.
fn available_memory_gb() -> Option<f64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = contents
        .lines()
        .find(|l| l.starts_with("MemAvailable:"))?;
    let kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Deterministic bag-of-words embedding over a fixed vocabulary.
    struct FixtureBackend {
        loads: AtomicUsize,
        unloads: AtomicUsize,
        fail_load: bool,
    }

    impl FixtureBackend {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                unloads: AtomicUsize::new(0),
                fail_load: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail_load: true,
                ..Self::new()
            }
        }
    }

    const VOCAB: &[&str] = &[
        "create", "file", "delete", "remove", "open", "url", "website", "launch", "app",
        "application", "search", "web", "install", "organize", "read", "write", "google",
        "spotify", "new", "make",
    ];

    #[async_trait]
    impl EmbeddingBackend for FixtureBackend {
        async fn load(&self) -> Result<(), EmbeddingError> {
            if self.fail_load {
                return Err(EmbeddingError::LoadFailed("fixture".into()));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unload(&self) {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    let tokens: Vec<&str> = lower.split_whitespace().collect();
                    VOCAB
                        .iter()
                        .map(|word| {
                            if tokens.contains(word) {
                                1.0
                            } else {
                                0.0
                            }
                        })
                        .collect()
                })
                .collect())
        }
    }

    fn router(backend: Arc<FixtureBackend>) -> EmbeddingRouter {
        EmbeddingRouter::new(backend, RouterConfig::default()).with_memory_probe(|| Some(64.0))
    }

    #[tokio::test]
    async fn classifies_above_high_threshold_without_escalation() {
        let router = router(Arc::new(FixtureBackend::new()));
        let result = router.classify("create a file").await;
        assert_eq!(result.intent, "create_file");
        assert!(result.confidence >= 0.75);
        assert!(!result.requires_escalation);
        assert_eq!(result.method, "embedding");
    }

    #[tokio::test]
    async fn mid_band_accepts_with_escalation() {
        let router = router(Arc::new(FixtureBackend::new()));
        // Shares one token with delete phrases, diluted by noise words.
        let result = router.classify("delete something mysterious now").await;
        if result.intent != "unknown" {
            assert!(result.confidence < 0.75);
            assert!(result.requires_escalation);
        }
    }

    #[tokio::test]
    async fn low_scores_become_unknown_with_escalation() {
        let router = router(Arc::new(FixtureBackend::new()));
        let result = router.classify("zzz qqq xxx").await;
        assert_eq!(result.intent, "unknown");
        assert!(result.requires_escalation);
    }

    #[tokio::test]
    async fn model_loads_lazily_and_once() {
        let backend = Arc::new(FixtureBackend::new());
        let router = router(Arc::clone(&backend));
        assert!(!router.is_loaded());
        let _ = router.classify("create a file").await;
        assert!(router.is_loaded());
        let _ = router.classify("open a website").await;
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ram_floor_blocks_load_and_degrades_gracefully() {
        let router = EmbeddingRouter::new(
            Arc::new(FixtureBackend::new()),
            RouterConfig::default(),
        )
        .with_memory_probe(|| Some(0.5));
        let result = router.classify("create a file").await;
        assert_eq!(result.intent, "unknown");
        assert_eq!(result.method, "embedding_fallback");
        assert!(!router.is_loaded());
    }

    #[tokio::test]
    async fn load_failure_degrades_gracefully() {
        let router = router(Arc::new(FixtureBackend::failing()));
        let result = router.classify("create a file").await;
        assert_eq!(result.intent, "unknown");
        assert!(result.requires_escalation);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_window_unloads_the_model() {
        let config = RouterConfig {
            unload_after_seconds: 1,
            ..RouterConfig::default()
        };
        let backend = Arc::new(FixtureBackend::new());
        let router = EmbeddingRouter::new(Arc::clone(&backend) as Arc<dyn EmbeddingBackend>, config)
            .with_memory_probe(|| Some(64.0));
        let _ = router.classify("create a file").await;
        assert!(router.is_loaded());

        // The unload timer uses wall-clock last-use; force it stale.
        router.last_used.store(0, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!router.is_loaded());
        assert_eq!(backend.unloads.load(Ordering::SeqCst), 1);
    }
}
