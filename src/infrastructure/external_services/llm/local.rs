//! Self-contained extractive generator. It reads the numbered context blocks
//! out of the prompt, picks those overlapping the question, and answers with
//! their leading sentences plus `[i]` markers; with no overlap it refuses.
//! Deterministic, so it doubles as the development and test provider.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::application::ports::{
    ChatMessage, GenerationParams, LlmError, LlmProvider, LlmResponse,
};
use crate::application::services::token::count_tokens;

pub struct LocalLlmProvider {
    model: String,
}

impl LocalLlmProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    fn compose(&self, messages: &[ChatMessage], params: GenerationParams) -> String {
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let (blocks, question) = parse_prompt(user);
        let question_terms = significant_terms(&question);

        let mut ranked: Vec<(usize, usize)> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (i, overlap(&question_terms, block)))
            .filter(|(_, score)| *score > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        if ranked.is_empty() {
            return "I do not know based on the provided context.".to_string();
        }

        let mut answer = String::new();
        let budget = params.max_tokens.max(16) as usize;
        for (index, _) in ranked.iter().take(2) {
            let sentence = leading_sentences(&blocks[*index], budget / 2);
            if sentence.is_empty() {
                continue;
            }
            if !answer.is_empty() {
                answer.push(' ');
            }
            answer.push_str(&format!("{} [{}]", sentence, index + 1));
            if count_tokens(&answer) >= budget {
                break;
            }
        }

        if answer.is_empty() {
            "I do not know based on the provided context.".to_string()
        } else {
            answer
        }
    }
}

#[async_trait]
impl LlmProvider for LocalLlmProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<LlmResponse, LlmError> {
        let prompt_tokens: usize = messages.iter().map(|m| count_tokens(&m.content)).sum();
        let text = self.compose(messages, params);
        Ok(LlmResponse {
            in_tokens: Some(prompt_tokens as i32),
            out_tokens: Some(count_tokens(&text) as i32),
            text,
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let text = self.compose(messages, params);
        let words: Vec<String> = text
            .split_inclusive(' ')
            .map(|w| w.to_string())
            .collect();
        Ok(futures::stream::iter(words.into_iter().map(Ok)).boxed())
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Pull the `[i] ...` context blocks and the trailing question back out of
/// the rendered prompt.
fn parse_prompt(user: &str) -> (Vec<String>, String) {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut question = String::new();

    for line in user.lines() {
        if let Some(rest) = line.strip_prefix("Question:") {
            question = rest.trim().to_string();
            continue;
        }
        if is_block_start(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(String::new());
            continue; // the breadcrumb line itself is not content
        }
        if let Some(block) = current.as_mut() {
            if !block.is_empty() {
                block.push(' ');
            }
            block.push_str(line.trim());
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    (blocks, question)
}

fn is_block_start(line: &str) -> bool {
    let line = line.trim_start();
    if !line.starts_with('[') {
        return false;
    }
    let digits: String = line[1..].chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[1 + digits.len()..].starts_with(']')
}

const STOPWORDS: [&str; 24] = [
    "the", "and", "for", "are", "was", "this", "that", "with", "from", "what", "which", "who",
    "how", "does", "did", "not", "its", "has", "have", "about", "say", "tell", "you", "your",
];

fn significant_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn overlap(question_terms: &[String], block: &str) -> usize {
    let block_terms = significant_terms(block);
    question_terms
        .iter()
        .filter(|t| block_terms.contains(t))
        .count()
}

fn leading_sentences(block: &str, token_budget: usize) -> String {
    let mut out = String::new();
    for sentence in block.split_inclusive(['.', '!', '?']) {
        if !out.is_empty() && count_tokens(&out) + count_tokens(sentence) > token_budget {
            break;
        }
        out.push_str(sentence);
        if count_tokens(&out) >= token_budget {
            break;
        }
    }
    out.trim().to_string()
}
