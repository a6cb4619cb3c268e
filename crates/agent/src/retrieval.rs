//! Retrieval and summarization over an owner's personal documents.
//!
//! # Flow
//!
//! 1. Check `<data_dir>/<owner>/` exists
//! 2. Load `basic_info.json` and every other `*.json` document (sorted by
//!    file name); any read or parse failure stops here
//! 3. Summarize the basic info
//! 4. Extract what each document says about this task and service agent
//! 5. Summarize the extracts into one preference paragraph

use std::path::{Path, PathBuf};
use std::sync::Arc;

use envoy_core::agent::AgentProfile;
use envoy_core::error::{Error, Result};
use envoy_core::event::EventBus;
use tracing::{debug, info};

use crate::llm::LanguageModel;
use crate::prompts;

/// File holding the owner's basic information.
pub const BASIC_INFO_FILE: &str = "basic_info.json";

/// What the agent knows about its owner for one counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerProfile {
    pub basic_info: String,
    pub preferences: String,
}

impl OwnerProfile {
    /// Basic info and preferences as one block for the generation prompt.
    pub fn owner_info(&self) -> String {
        format!("{}\n\n{}", self.basic_info, self.preferences)
    }
}

/// A parsed personal document.
#[derive(Debug)]
struct Document {
    /// File name without extension, shown in progress narration
    stem: String,
    body: String,
}

/// Runs the retrieval pipeline against a personal-data root.
#[derive(Clone)]
pub struct Retriever {
    llm: LanguageModel,
    events: Arc<EventBus>,
    data_dir: PathBuf,
}

impl Retriever {
    pub fn new(llm: LanguageModel, events: Arc<EventBus>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            events,
            data_dir: data_dir.into(),
        }
    }

    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        self.data_dir.join(owner)
    }

    /// Build `owner`'s profile as seen by `counterparty` for `intent`.
    pub async fn build_profile(
        &self,
        owner: &str,
        counterparty: &AgentProfile,
        intent: &str,
    ) -> Result<OwnerProfile> {
        let dir = self.owner_dir(owner);
        if !dir.is_dir() {
            return Err(Error::NotFound {
                owner: owner.to_string(),
                path: dir,
            });
        }

        info!(owner, counterparty = %counterparty.name, "Retrieving personal preferences");
        self.events
            .narrate(owner, format!("Retrieving personal preferences for {owner}"));

        let basic_raw = read_text(&dir.join(BASIC_INFO_FILE)).await?;
        let documents = load_documents(&dir).await?;
        debug!(owner, documents = documents.len(), "Personal documents loaded");

        let basic_info = self
            .llm
            .generate(&prompts::summarize_personal_preferences(&basic_raw))
            .await?;

        let mut extracts = Vec::with_capacity(documents.len());
        for document in &documents {
            self.events
                .narrate(owner, format!("Searching in **{}** ...", document.stem));
            let extract = self
                .llm
                .generate(&prompts::retrieve_personal_info(
                    owner,
                    counterparty,
                    intent,
                    &document.body,
                ))
                .await?;
            self.events.narrate(owner, extract.clone());
            extracts.push(extract);
        }

        self.events
            .narrate(owner, format!("Summarizing {owner}'s personal preferences"));
        let preferences = if extracts.is_empty() {
            String::new()
        } else {
            self.llm
                .generate(&prompts::summarize_personal_preferences(&extracts.join("\n\n")))
                .await?
        };
        self.events.narrate(owner, preferences.clone());

        info!(owner, counterparty = %counterparty.name, "Personal preferences ready");
        Ok(OwnerProfile {
            basic_info,
            preferences,
        })
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| Error::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Every `*.json` file except the basic info, sorted by file name.
async fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let io_err = |e: std::io::Error| Error::Io {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let is_basic = path.file_name().is_some_and(|name| name == BASIC_INFO_FILE);
        if is_json && !is_basic && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = read_text(&path).await?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| Error::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(Document {
            stem,
            body: serde_json::to_string_pretty(&value)?,
        });
    }
    Ok(documents)
}
