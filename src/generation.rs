//! Generation with one fallback attempt.

use std::sync::Arc;

use hwp_host_core::GenerationService;
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};

/// Calls the primary service and, if it fails, the fallback exactly once.
///
/// A successful but empty response is `EmptyResponse` and is not retried.
pub struct FallbackGenerator {
    primary: Arc<dyn GenerationService>,
    fallback: Option<Arc<dyn GenerationService>>,
}

impl FallbackGenerator {
    pub fn new(primary: Arc<dyn GenerationService>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn GenerationService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[instrument(skip_all, fields(primary = self.primary.name(), prompt_chars = prompt.chars().count()))]
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let primary_failure = match attempt(self.primary.as_ref(), prompt) {
            Ok(text) => return non_empty(text),
            Err(reason) => reason,
        };

        let Some(fallback) = &self.fallback else {
            return Err(EngineError::Service(primary_failure));
        };
        warn!(
            fallback = fallback.name(),
            "Primary generation failed, retrying once: {}", primary_failure
        );
        match attempt(fallback.as_ref(), prompt) {
            Ok(text) => non_empty(text),
            Err(reason) => Err(EngineError::Service(format!(
                "{}; fallback: {}",
                primary_failure, reason
            ))),
        }
    }
}

fn attempt(service: &dyn GenerationService, prompt: &str) -> std::result::Result<String, String> {
    match service.generate(prompt) {
        Ok(output) if output.success => {
            debug!(service = service.name(), chars = output.text.len(), "Generation succeeded");
            Ok(output.text)
        }
        Ok(output) => {
            let status = output
                .status
                .map_or_else(|| "no status".to_string(), |code| format!("status {}", code));
            if output.diagnostics.is_empty() {
                Err(format!("{} exited with {}", service.name(), status))
            } else {
                Err(format!(
                    "{} exited with {}: {}",
                    service.name(),
                    status,
                    output.diagnostics
                ))
            }
        }
        Err(e) => Err(format!("{} failed: {}", service.name(), e)),
    }
}

fn non_empty(text: String) -> Result<String> {
    if text.trim().is_empty() {
        Err(EngineError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwp_host_core::{GenerationError, GenerationOutput};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        output: Option<GenerationOutput>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, output: Option<GenerationOutput>) -> Arc<Self> {
            Arc::new(Self {
                name,
                output,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl GenerationService for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn generate(&self, _prompt: &str) -> std::result::Result<GenerationOutput, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.clone().ok_or_else(|| GenerationError::Spawn {
                program: self.name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })
        }
    }

    #[test]
    fn test_primary_success_skips_fallback() {
        let primary = Fixed::new("flash", Some(GenerationOutput::succeeded("결과")));
        let fallback = Fixed::new("pro", Some(GenerationOutput::succeeded("다른 결과")));
        let generator = FallbackGenerator::new(primary.clone()).with_fallback(fallback.clone());
        assert_eq!(generator.generate("p").unwrap(), "결과");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fallback_runs_once_on_failure() {
        let primary = Fixed::new("flash", Some(GenerationOutput::failed(Some(1), "quota")));
        let fallback = Fixed::new("pro", Some(GenerationOutput::succeeded("대체 결과")));
        let generator = FallbackGenerator::new(primary).with_fallback(fallback.clone());
        assert_eq!(generator.generate("p").unwrap(), "대체 결과");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_both_failing_is_service_error() {
        let primary = Fixed::new("flash", None);
        let fallback = Fixed::new("pro", Some(GenerationOutput::failed(Some(2), "")));
        let generator = FallbackGenerator::new(primary.clone()).with_fallback(fallback.clone());
        match generator.generate("p") {
            Err(EngineError::Service(message)) => {
                assert!(message.contains("flash failed"));
                assert!(message.contains("pro exited with status 2"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_success_is_not_retried() {
        let primary = Fixed::new("flash", Some(GenerationOutput::succeeded("  ")));
        let fallback = Fixed::new("pro", Some(GenerationOutput::succeeded("x")));
        let generator = FallbackGenerator::new(primary).with_fallback(fallback.clone());
        assert!(matches!(generator.generate("p"), Err(EngineError::EmptyResponse)));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }
}
