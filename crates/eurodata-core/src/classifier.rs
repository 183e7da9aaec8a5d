//! Closed-vocabulary indicator classification through an LLM

use crate::catalog::{self, CatalogEntry};
use eurodata_llm::{CompletionRequest, LLMProvider, Message};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Asks a language model to pick one catalog key for a question
///
/// Any transport failure or unrecognized answer is reported as `None`.
#[derive(Clone)]
pub struct IndicatorClassifier {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl IndicatorClassifier {
    /// Create a classifier using `model` on `provider`
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// System prompt listing the whole vocabulary
    pub fn system_prompt() -> String {
        let keys: Vec<&str> = catalog::keys().collect();
        format!(
            "You classify questions about European macroeconomic statistics. \
             Answer with exactly one of these indicator keys and nothing else: {}. \
             If none applies, answer \"none\".",
            keys.join(", ")
        )
    }

    /// Catalog entry chosen by the model for `text`
    pub async fn classify(&self, text: &str) -> Option<&'static CatalogEntry> {
        let request = CompletionRequest::builder(&self.model)
            .system(Self::system_prompt())
            .add_message(Message::user(text))
            .max_tokens(20)
            .temperature(0.0)
            .build();

        match self.provider.complete(request).await {
            Ok(response) => {
                let found = recognize(response.text());
                if found.is_none() {
                    tracing::debug!(answer = response.text(), "Classifier answer not in vocabulary");
                }
                found
            }
            Err(e) => {
                tracing::warn!(error = %e, "Indicator classification failed");
                None
            }
        }
    }
}

/// The single catalog key named in `answer`, if exactly one is
fn recognize(answer: &str) -> Option<&'static CatalogEntry> {
    let lower = answer.to_lowercase();
    let named: BTreeSet<&str> = lower
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| catalog::entry(token).is_some())
        .collect();

    if named.len() == 1 {
        named.into_iter().next().and_then(catalog::entry)
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! LLM test double

    use async_trait::async_trait;
    use eurodata_llm::{
        CompletionRequest, CompletionResponse, LLMProvider, Message, StopReason, TokenUsage,
    };

    mockall::mock! {
        pub Llm {}

        #[async_trait]
        impl LLMProvider for Llm {
            async fn complete(&self, request: CompletionRequest) -> eurodata_llm::Result<CompletionResponse>;
            fn name(&self) -> &str;
        }
    }

    pub(crate) fn reply(text: &str) -> eurodata_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockLlm, reply};
    use super::*;
    use eurodata_llm::LLMError;

    fn classifier(mock: MockLlm) -> IndicatorClassifier {
        IndicatorClassifier::new(Arc::new(mock), "test-model")
    }

    #[test]
    fn test_prompt_lists_every_key() {
        let prompt = IndicatorClassifier::system_prompt();
        for key in catalog::keys() {
            assert!(prompt.contains(key), "prompt is missing {key}");
        }
    }

    #[test]
    fn test_recognize() {
        assert_eq!(recognize("gdp").map(|e| e.key), Some("gdp"));
        assert_eq!(recognize("  Unemployment.\n").map(|e| e.key), Some("unemployment"));
        assert_eq!(
            recognize("youth_unemployment").map(|e| e.key),
            Some("youth_unemployment")
        );
        assert_eq!(recognize("gdp, gdp").map(|e| e.key), Some("gdp"));
        assert!(recognize("gdp or inflation").is_none());
        assert!(recognize("none").is_none());
        assert!(recognize("").is_none());
    }

    #[tokio::test]
    async fn test_classify_sends_vocabulary_and_accepts_key() {
        let mut mock = MockLlm::new();
        mock.expect_complete()
            .withf(|request| {
                request.model == "test-model"
                    && request.system.as_deref().is_some_and(|s| s.contains("house_prices"))
                    && request.messages[0].text() == "how much do flats cost"
            })
            .times(1)
            .returning(|_| reply("house_prices"));

        let entry = classifier(mock).classify("how much do flats cost").await;
        assert_eq!(entry.map(|e| e.key), Some("house_prices"));
    }

    #[tokio::test]
    async fn test_provider_error_is_no_classification() {
        let mut mock = MockLlm::new();
        mock.expect_complete()
            .returning(|_| Err(LLMError::RequestFailed("timeout".to_string())));

        assert!(classifier(mock).classify("anything").await.is_none());
    }

    #[tokio::test]
    async fn test_off_vocabulary_answer_is_rejected() {
        let mut mock = MockLlm::new();
        mock.expect_complete()
            .returning(|_| reply("Probably the price of tea"));

        assert!(classifier(mock).classify("tea prices").await.is_none());
    }
}
