//! Prompt templates with `{question}` and `{context}` slots.

use crate::error::{RagError, Result};
use crate::models::{Chunk, Prompt};

pub const QUESTION_SLOT: &str = "{question}";
pub const CONTEXT_SLOT: &str = "{context}";
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub const RAG_PROMPT_NAME: &str = "rlm/rag-prompt";
pub const RAG_PROMPT_BODY: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {question} \n\
Context: {context} \n\
Answer:";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Question,
    Context,
}

/// A named, versioned template. Both slots are checked when the template is built,
/// so rendering cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    version: u32,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, version: u32, body: &str) -> Result<Self> {
        let name = name.into();
        let segments = parse_segments(body);
        for (slot, segment) in [(QUESTION_SLOT, Segment::Question), (CONTEXT_SLOT, Segment::Context)] {
            if !segments.contains(&segment) {
                return Err(RagError::Template(format!(
                    "template '{name}' has no {slot} slot"
                )));
            }
        }
        Ok(Self {
            name,
            version,
            segments,
        })
    }

    pub fn rag_default() -> Self {
        Self {
            name: RAG_PROMPT_NAME.to_string(),
            version: 1,
            segments: parse_segments(RAG_PROMPT_BODY),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Fills both slots. Slot markers inside the values are left untouched.
    pub fn render(&self, question: &str, context: &str) -> Prompt {
        let mut text = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Question => text.push_str(question),
                Segment::Context => text.push_str(context),
            }
        }
        Prompt { text }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::rag_default()
    }
}

fn parse_segments(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = body;
    while let Some(pos) = rest.find('{') {
        literal.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let slot = if tail.starts_with(QUESTION_SLOT) {
            Some((Segment::Question, QUESTION_SLOT.len()))
        } else if tail.starts_with(CONTEXT_SLOT) {
            Some((Segment::Context, CONTEXT_SLOT.len()))
        } else {
            None
        };
        match slot {
            Some((segment, len)) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
                rest = &tail[len..];
            }
            None => {
                literal.push('{');
                rest = &tail[1..];
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Joins retrieved context in retrieval order and renders the template.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    template: PromptTemplate,
}

impl PromptAssembler {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn assemble(&self, question: &str, context: &[Chunk]) -> Prompt {
        let joined = context
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        self.template.render(question, &joined)
    }
}
