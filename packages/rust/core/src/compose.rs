//! Answer composition: intent classification and cited synthesis.
//!
//! Two model calls per question. The classifier must return exactly one label
//! from the closed intent set; anything else fails the request. The
//! synthesizer only sees the numbered retrieved passages and is instructed to
//! cite them with `[n]` markers that map onto the returned source list.

use serde::Deserialize;
use tracing::{debug, instrument};

use lexibase_providers::{ChatClient, ChatRequest};
use lexibase_shared::{
    Answer, Intent, LexibaseError, OpenAiConfig, Result, RetrievedChunk, SourceRef,
};

const SYSTEM_PROMPT: &str = "You are an Australian immigration information assistant.\n\
Do NOT give personalised legal advice. Provide general information, cite sources with [n], \
and encourage users to verify on official sites.\n\
If asked for tailored advice, state you cannot provide legal advice and point to the OMARA register.\n\
When asked for process steps, use concise bullet points.\n";

const INTENT_PROMPT: &str = "Classify the user's intent into one of:\n\
[general_info, eligibility, process_steps, definitions, updates].\n\
Return JSON only: {\"intent\":\"...\"}.\n";

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// Model selection for the two composition stages.
#[derive(Debug, Clone)]
pub struct ComposerModels {
    /// Model used for intent classification.
    pub intent_model: String,
    /// Model used for answer synthesis.
    pub answer_model: String,
    /// Sampling temperature for synthesis.
    pub answer_temperature: f32,
}

impl From<&OpenAiConfig> for ComposerModels {
    fn from(config: &OpenAiConfig) -> Self {
        Self {
            intent_model: config.intent_model.clone(),
            answer_model: config.answer_model.clone(),
            answer_temperature: config.answer_temperature,
        }
    }
}

/// Classifies questions and synthesizes cited answers over retrieved context.
pub struct Composer<'a> {
    chat: &'a dyn ChatClient,
    models: ComposerModels,
}

#[derive(Deserialize)]
struct IntentEnvelope {
    intent: String,
}

impl<'a> Composer<'a> {
    pub fn new(chat: &'a dyn ChatClient, models: ComposerModels) -> Self {
        Self { chat, models }
    }

    /// Classify the question into the closed intent set.
    pub async fn classify(&self, question: &str) -> Result<Intent> {
        let raw = self
            .chat
            .complete(&ChatRequest {
                model: &self.models.intent_model,
                system: INTENT_PROMPT,
                user: question,
                temperature: 0.0,
                json_response: true,
            })
            .await?;

        let envelope: IntentEnvelope = serde_json::from_str(&raw)
            .map_err(|_| LexibaseError::IntentParse { raw: raw.clone() })?;
        let intent = envelope.intent.parse::<Intent>()?;

        debug!(%intent, "question classified");
        Ok(intent)
    }

    /// Synthesize an answer from the question and the numbered passages.
    ///
    /// An empty passage list is not an error: the model is instructed to say
    /// it lacks the information rather than invent facts.
    pub async fn synthesize(&self, question: &str, passages: &[RetrievedChunk]) -> Result<String> {
        let context = build_context(passages);
        let user = format!(
            "Question: {question}\n\nContext:\n{context}\n\nRules:\n\
             - Use only the context for facts.\n\
             - Add [n] markers mapping to the numbered context.\n\
             - If the context is empty or does not cover the question, say so plainly instead of guessing.\n\
             - End with a one-line disclaimer that this is general information, not legal advice."
        );

        self.chat
            .complete(&ChatRequest {
                model: &self.models.answer_model,
                system: SYSTEM_PROMPT,
                user: &user,
                temperature: self.models.answer_temperature,
                json_response: false,
            })
            .await
    }

    /// Run both stages and assemble the full response. Either everything
    /// succeeds or the caller gets an error — never a partial answer.
    #[instrument(skip_all)]
    pub async fn compose(&self, question: &str, passages: &[RetrievedChunk]) -> Result<Answer> {
        let intent = self.classify(question).await?;
        let answer = self.synthesize(question, passages).await?;

        let sources = passages
            .iter()
            .enumerate()
            .map(|(i, p)| SourceRef {
                n: i + 1,
                title: p.title.clone(),
                url: p.url.clone(),
            })
            .collect();

        Ok(Answer {
            intent,
            answer,
            sources,
        })
    }
}

/// Number the passages `[[n]]` with their source title and URL, the same
/// numbering the `[n]` citation markers refer back to.
fn build_context(passages: &[RetrievedChunk]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[[{}]] {}\nURL: {}\n{}", i + 1, p.title, p.url, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn models() -> ComposerModels {
        ComposerModels {
            intent_model: "intent-model".into(),
            answer_model: "answer-model".into(),
            answer_temperature: 0.2,
        }
    }

    fn chunk(title: &str, url: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            doc_id: "doc".into(),
            idx: 0,
            text: text.into(),
            title: title.into(),
            url: url.into(),
            score: 0.9,
        }
    }

    /// Scripted chat client: JSON-mode calls get the intent reply, everything
    /// else gets the answer reply. Records every user prompt it sees.
    struct ScriptedChat {
        intent_reply: String,
        answer_reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(intent_reply: &str, answer_reply: &str) -> Self {
            Self {
                intent_reply: intent_reply.into(),
                answer_reply: answer_reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
            self.prompts.lock().unwrap().push(request.user.to_string());
            if request.json_response {
                Ok(self.intent_reply.clone())
            } else {
                Ok(self.answer_reply.clone())
            }
        }
    }

    #[tokio::test]
    async fn classify_accepts_closed_set_labels() {
        let chat = ScriptedChat::new(r#"{"intent":"eligibility"}"#, "");
        let composer = Composer::new(&chat, models());

        let intent = composer
            .classify("Am I eligible for a student visa?")
            .await
            .unwrap();
        assert_eq!(intent, Intent::Eligibility);
    }

    #[tokio::test]
    async fn classify_rejects_malformed_json() {
        let chat = ScriptedChat::new("eligibility", "");
        let composer = Composer::new(&chat, models());

        let err = composer.classify("anything").await.unwrap_err();
        assert!(matches!(err, LexibaseError::IntentParse { .. }));
    }

    #[tokio::test]
    async fn classify_rejects_labels_outside_the_set() {
        let chat = ScriptedChat::new(r#"{"intent":"horoscope"}"#, "");
        let composer = Composer::new(&chat, models());

        let err = composer.classify("anything").await.unwrap_err();
        assert!(matches!(err, LexibaseError::IntentParse { .. }));
    }

    #[tokio::test]
    async fn compose_numbers_sources_to_match_citations() {
        let chat = ScriptedChat::new(
            r#"{"intent":"general_info"}"#,
            "Student visas allow study [1]. Work limits apply [2]. General information only, not legal advice.",
        );
        let composer = Composer::new(&chat, models());

        let passages = [
            chunk(
                "Student visa (subclass 500)",
                "https://immi.homeaffairs.gov.au/visas/student-500",
                "The Student visa allows full-time study.",
            ),
            chunk(
                "Visa conditions",
                "https://immi.homeaffairs.gov.au/visas/conditions",
                "Work is limited while a course is in session.",
            ),
        ];

        let answer = composer
            .compose("Can I study in Australia?", &passages)
            .await
            .unwrap();

        assert_eq!(answer.intent, Intent::GeneralInfo);
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].n, 1);
        assert_eq!(answer.sources[1].n, 2);
        assert_eq!(
            answer.sources[0].url,
            "https://immi.homeaffairs.gov.au/visas/student-500"
        );

        // Every [n] marker in the answer has a matching source entry.
        for n in 1..=2 {
            assert!(answer.answer.contains(&format!("[{n}]")));
            assert!(answer.sources.iter().any(|s| s.n == n));
        }
    }

    #[tokio::test]
    async fn synthesis_prompt_carries_the_numbered_context() {
        let chat = ScriptedChat::new(r#"{"intent":"general_info"}"#, "answer text");
        let composer = Composer::new(&chat, models());

        let passages = [
            chunk("First title", "https://a.example/1", "first passage"),
            chunk("Second title", "https://a.example/2", "second passage"),
        ];
        composer.compose("question?", &passages).await.unwrap();

        let prompts = chat.prompts.lock().unwrap();
        let synthesis_prompt = prompts.last().expect("two calls recorded");
        assert!(synthesis_prompt.contains("[[1]] First title"));
        assert!(synthesis_prompt.contains("URL: https://a.example/1"));
        assert!(synthesis_prompt.contains("[[2]] Second title"));
        assert!(synthesis_prompt.contains("second passage"));
    }

    #[tokio::test]
    async fn empty_retrieval_still_produces_an_answer() {
        let chat = ScriptedChat::new(
            r#"{"intent":"updates"}"#,
            "I don't have information on that in my sources. General information only, not legal advice.",
        );
        let composer = Composer::new(&chat, models());

        let answer = composer
            .compose("What changed last week?", &[])
            .await
            .unwrap();

        assert_eq!(answer.intent, Intent::Updates);
        assert!(answer.sources.is_empty());
        assert!(!answer.answer.is_empty());

        let prompts = chat.prompts.lock().unwrap();
        let synthesis_prompt = prompts.last().unwrap();
        assert!(synthesis_prompt.contains("Context:\n\n"));
    }
}
