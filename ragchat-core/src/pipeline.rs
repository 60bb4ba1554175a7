//! One question/answer turn
//!
//! A turn moves the session through
//! `AwaitingQuestion -> BuildingContext -> Streaming -> Finalizing` and back
//! to `Idle`. Validation failures are returned before any event is produced;
//! later failures end the event stream with a single error. In both cases the
//! message log and the memory window keep whatever they held before the turn.

use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{RagError, Result};
use crate::memory::MemoryWindow;
use crate::model::ChatModel;
use crate::prompt::PromptTemplate;
use crate::retrieval::Retriever;
use crate::session::{ChatSession, TurnGuard, TurnPhase};
use crate::types::{Document, Message, source_basename};

/// Appended to partial answers while tokens are still arriving
pub const CURSOR: &str = "▌";

/// Something the UI should render during a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The accepted question, already appended to the log
    Question { content: String },
    /// Partial answer followed by the cursor
    Draft { content: String },
    /// Final answer with its sources footer
    Completed { content: String, sources: Vec<String> },
}

pub type TurnStream = Pin<Box<dyn Stream<Item = Result<TurnEvent>> + Send + 'static>>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Build the sources footer from the documents fed to the prompt instead
    /// of querying the retriever a second time
    pub reuse_context_for_sources: bool,
    /// Localized label heading the sources footer
    pub sources_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reuse_context_for_sources: false,
            sources_label: "Sources used".to_string(),
        }
    }
}

/// Retrieval-augmented answer generation for one session
#[derive(Clone)]
pub struct ConversationPipeline {
    retriever: Retriever,
    memory: Arc<MemoryWindow>,
    model: Arc<dyn ChatModel>,
    template: PromptTemplate,
    config: PipelineConfig,
}

impl ConversationPipeline {
    pub fn new(retriever: Retriever, memory: Arc<MemoryWindow>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            retriever,
            memory,
            model,
            template: PromptTemplate::default(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a turn for `question`
    ///
    /// Empty questions and concurrent turns are rejected up front. Otherwise
    /// the turn runs on its own task and the returned stream yields the
    /// question, drafts and the completed answer. Dropping the stream does not
    /// stop the turn: the answer is still committed to memory and the log.
    pub fn ask(&self, session: &Arc<ChatSession>, question: &str) -> Result<TurnStream> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let guard = session.begin_turn()?;
        session.push(Message::human(question.clone()));
        info!("Turn started for {}", session.session_key());

        let turn = Turn {
            pipeline: self.clone(),
            question,
        };
        let (tx, mut rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let outcome = turn.run(guard, &tx).await;
            if let Err(e) = &outcome {
                warn!("Turn failed: {}", e);
            }
            let _ = tx.send(outcome).await;
        });

        let events = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Ok(Box::pin(events))
    }
}

const TURN_CHANNEL_CAPACITY: usize = 100;

/// A running turn, owned by its task
struct Turn {
    pipeline: ConversationPipeline,
    question: String,
}

impl Turn {
    /// Drive the turn to its end and return the completion event
    ///
    /// Events are best effort: a consumer that went away no longer receives
    /// them but the turn still finalizes. `guard` is released before the
    /// completion is handed back.
    async fn run(
        self,
        guard: TurnGuard,
        events: &mpsc::Sender<Result<TurnEvent>>,
    ) -> Result<TurnEvent> {
        let Turn { pipeline, question } = self;
        let emit = |event: TurnEvent| async move {
            let _ = events.send(Ok(event)).await;
        };

        emit(TurnEvent::Question {
            content: question.clone(),
        })
        .await;

        guard.advance(TurnPhase::BuildingContext);
        let history = pipeline.memory.load();
        let context = pipeline.retriever.get_relevant_documents(&question).await?;
        let prompt = pipeline.template.render(&context, &history, &question);
        debug!(
            "Prompt built with {} documents and {} exchanges",
            context.len(),
            history.len()
        );

        guard.advance(TurnPhase::Streaming);
        let mut tokens = pipeline.model.stream(prompt).await?;
        let mut buffer = String::new();
        let mut received = 0usize;
        while let Some(token) = tokens.next().await {
            buffer.push_str(&token?);
            received += 1;
            emit(TurnEvent::Draft {
                content: format!("{buffer}{CURSOR}"),
            })
            .await;
        }
        if received == 0 {
            return Err(RagError::UnexpectedStreamEnd);
        }

        guard.advance(TurnPhase::Finalizing);
        let config = &pipeline.config;
        let source_documents = if config.reuse_context_for_sources {
            context
        } else {
            pipeline.retriever.get_relevant_documents(&question).await?
        };
        let sources = distinct_sources(&source_documents);
        let content = format!("{buffer}{}", sources_footer(&config.sources_label, &sources));

        pipeline.memory.save(&question, &content).await?;
        guard.session().push(Message::assistant(content.clone()));
        info!(
            "Turn completed for {} citing {} sources",
            guard.session().session_key(),
            sources.len()
        );

        drop(guard);
        Ok(TurnEvent::Completed { content, sources })
    }
}

/// Basenames of the distinct sources of `documents`, in first-seen order
pub fn distinct_sources(documents: &[Document]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for doc in documents {
        let name = source_basename(&doc.metadata.source);
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Markdown footer listing the sources under a localized label
pub fn sources_footer(label: &str, sources: &[String]) -> String {
    let mut footer = format!("\n\n*{label}:*  \n");
    for source in sources {
        footer.push_str(&format!("📙 {source}  \n"));
    }
    footer
}
