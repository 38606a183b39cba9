/// Artifact source
///
/// Produces the display payload for a new card from a concept string. The
/// deck never looks inside the payload; any generator that can answer
/// `generate(concept)` can back the app.

use thiserror::Error;
use tokio::task;

use crate::state::data::Artifact;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("concept is empty")]
    EmptyConcept,

    #[error("generator failed: {0}")]
    Failed(String),
}

pub trait ArtifactSource: Send + Sync + 'static {
    fn generate(&self, concept: &str) -> Result<Artifact, SourceError>;
}

/// Generator that drafts a card locally without any network access
#[derive(Debug, Clone, Default)]
pub struct OfflineSource;

impl ArtifactSource for OfflineSource {
    fn generate(&self, concept: &str) -> Result<Artifact, SourceError> {
        let concept = concept.trim();
        if concept.is_empty() {
            return Err(SourceError::EmptyConcept);
        }

        let title = capitalize(concept);
        Ok(Artifact {
            subtitle: concept.to_uppercase(),
            description: format!(
                "{title} is waiting to be explored.\n\n\
                 Write down what you already know about it, look for one \
                 example you can picture, and one question you cannot \
                 answer yet. Come back to this card tomorrow."
            ),
            title,
            image_url: None,
        })
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Run a generator off the UI thread
pub async fn generate_async<S: ArtifactSource + Clone>(
    source: S,
    concept: String,
) -> Result<Artifact, SourceError> {
    // Spawn blocking because real generators do slow I/O
    task::spawn_blocking(move || source.generate(&concept))
        .await
        .map_err(|e| SourceError::Failed(format!("task join error: {e}")))?
}
