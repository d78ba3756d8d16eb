//! "Explain the mix" text
//!
//! Builds a plain-language prompt from a mixer snapshot and hands it to a
//! pluggable [`MixExplainer`]. The result is cosmetic: [`explain_mix`]
//! never fails and never touches the engine, it only returns a string to
//! show next to the mixer.
//!
//! [`GeminiExplainer`] is the HTTP-backed implementation; build it with
//! [`explainer_from_config`].

mod gemini;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ExplainConfig;
use crate::state::{AppState, DeckState};

pub use gemini::GeminiExplainer;

/// Shown when no explainer is configured
pub const NO_SERVICE_MESSAGE: &str = "No explanation service configured.";
/// Shown when the explainer returns nothing
pub const EMPTY_MESSAGE: &str = "No explanation generated.";
/// Shown when the explainer fails
pub const UNAVAILABLE_MESSAGE: &str = "Unable to contact the DJ instructor at the moment.";

/// Upper bound on one explanation request
pub const EXPLAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Explanation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    /// The backing service could not be reached or is misconfigured
    #[error("Explanation service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an error
    #[error("Explanation request failed: {0}")]
    Request(String),

    /// No answer within [`EXPLAIN_TIMEOUT`]
    #[error("Explanation request timed out")]
    Timeout,
}

/// Text generator that describes a mix
///
/// Implementations may block (e.g. a synchronous HTTP client); they are
/// always called off the async runtime's worker threads.
pub trait MixExplainer: Send + Sync {
    /// Generate text for `prompt`; `Ok(None)` means no text was produced
    fn explain(&self, prompt: &str) -> Result<Option<String>, ExplainError>;
}

/// Explainer described by `config`, or `None` when no API key is available
pub fn explainer_from_config(config: &ExplainConfig) -> Option<Arc<dyn MixExplainer>> {
    let explainer = GeminiExplainer::from_env(config)?;
    log::info!("Mix explanations via {}", explainer.url());
    Some(Arc::new(explainer))
}

fn percent(value: f32) -> i32 {
    (value.clamp(0.0, 1.0) * 100.0).round() as i32
}

fn deck_line(label: &str, deck: &DeckState) -> String {
    let eq = deck.eq.clamped();
    format!(
        "{}: {}, Channel Fader: {}%, EQ(L/M/H): {}/{}/{}.",
        label,
        if deck.is_playing { "PLAYING" } else { "STOPPED" },
        percent(deck.volume),
        percent(eq.low),
        percent(eq.mid),
        percent(eq.high),
    )
}

/// Render the instructor prompt for a snapshot
pub fn build_prompt(state: &AppState) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a professional DJ instructor. Explain the current status of the DJ mixer \
         based on the following technical state to a beginner student.\n",
    );
    prompt.push_str(
        "Focus on signal flow: which track is audible, how the EQs and Faders are shaping \
         the sound, and what the audience is hearing.\n",
    );
    prompt.push_str("Keep it concise (max 3 sentences).\n\n");
    prompt.push_str("State:\n");
    prompt.push_str(&deck_line("Deck A (Left)", &state.deck_a));
    prompt.push('\n');
    prompt.push_str(&deck_line("Deck B (Right)", &state.deck_b));
    prompt.push('\n');
    prompt.push_str(&format!(
        "Crossfader: {:.2} (-1 is Left, 0 is Center, 1 is Right).\n\n",
        state.mixer.clamped_crossfader()
    ));
    prompt.push_str("Output format: Plain text.\n");
    prompt
}

/// Ask `explainer` to describe `state`, falling back to a placeholder
///
/// Runs the explainer on the blocking pool. Errors are logged and replaced
/// by [`UNAVAILABLE_MESSAGE`]; nothing is retried.
pub async fn explain_mix(explainer: Option<Arc<dyn MixExplainer>>, state: AppState) -> String {
    let Some(explainer) = explainer else {
        return NO_SERVICE_MESSAGE.to_string();
    };

    let prompt = build_prompt(&state);
    let task = tokio::task::spawn_blocking(move || explainer.explain(&prompt));

    let result = match tokio::time::timeout(EXPLAIN_TIMEOUT, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ExplainError::Request(e.to_string())),
        Err(_) => Err(ExplainError::Timeout),
    };

    match result {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => EMPTY_MESSAGE.to_string(),
        Err(e) => {
            log::error!("Error generating explanation: {}", e);
            UNAVAILABLE_MESSAGE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EqState;

    struct Fixed(Result<Option<String>, ExplainError>);

    impl MixExplainer for Fixed {
        fn explain(&self, _prompt: &str) -> Result<Option<String>, ExplainError> {
            self.0.clone()
        }
    }

    struct Echo;

    impl MixExplainer for Echo {
        fn explain(&self, prompt: &str) -> Result<Option<String>, ExplainError> {
            Ok(Some(prompt.to_string()))
        }
    }

    #[test]
    fn test_prompt_contents() {
        let mut state = AppState::default();
        state.deck_a.is_playing = true;
        state.deck_a.is_loaded = true;
        state.deck_b.eq = EqState { low: 0.0, mid: 0.26, high: 1.0 };

        let prompt = build_prompt(&state);
        assert!(prompt.contains("Deck A (Left): PLAYING, Channel Fader: 80%, EQ(L/M/H): 50/50/50."));
        assert!(prompt.contains("Deck B (Right): STOPPED, Channel Fader: 0%, EQ(L/M/H): 0/26/100."));
        assert!(prompt.contains("Crossfader: -0.50 (-1 is Left"));
        assert!(prompt.contains("max 3 sentences"));
        assert!(prompt.ends_with("Output format: Plain text.\n"));
    }

    #[tokio::test]
    async fn test_unconfigured_explainer() {
        let config = ExplainConfig {
            api_key_env: "MIXLOGIC_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ExplainConfig::default()
        };
        let explainer = explainer_from_config(&config);
        assert!(explainer.is_none());
        assert_eq!(explain_mix(explainer, AppState::default()).await, NO_SERVICE_MESSAGE);
    }

    #[tokio::test]
    async fn test_no_explainer() {
        let text = explain_mix(None, AppState::default()).await;
        assert_eq!(text, NO_SERVICE_MESSAGE);
    }

    #[tokio::test]
    async fn test_explainer_text_is_returned() {
        let explainer: Arc<dyn MixExplainer> = Arc::new(Echo);
        let text = explain_mix(Some(explainer), AppState::default()).await;
        assert!(text.starts_with("You are a professional DJ instructor."));
    }

    #[tokio::test]
    async fn test_empty_answer_placeholder() {
        for answer in [Ok(None), Ok(Some("   ".to_string()))] {
            let explainer: Arc<dyn MixExplainer> = Arc::new(Fixed(answer));
            let text = explain_mix(Some(explainer), AppState::default()).await;
            assert_eq!(text, EMPTY_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_error_placeholder() {
        let explainer: Arc<dyn MixExplainer> =
            Arc::new(Fixed(Err(ExplainError::Unavailable("no key".to_string()))));
        let text = explain_mix(Some(explainer), AppState::default()).await;
        assert_eq!(text, UNAVAILABLE_MESSAGE);
    }
}
