use tracing::warn;

use keepsake_types::api::CapsuleResponse;
use keepsake_types::models::MediaKind;

use crate::client::Client;

/// A media reference resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    pub kind: MediaKind,
    pub url: String,
}

/// A capsule prepared for rendering on the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub text: String,
    pub tags: Vec<String>,
    pub unlock_at: Option<String>,
    pub media: Vec<MediaLink>,
}

/// Decode the JSON-encoded media list of a capsule. A missing or malformed
/// list yields no media rather than an error.
pub fn parse_media_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(refs) => refs,
        Err(e) => {
            warn!("Ignoring malformed media list {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

pub fn entry(client: &Client, capsule: &CapsuleResponse) -> TimelineEntry {
    let media = parse_media_list(&capsule.media)
        .iter()
        .map(|reference| MediaLink {
            kind: MediaKind::from_reference(reference),
            url: client.media_url(reference),
        })
        .collect();

    TimelineEntry {
        id: capsule.id,
        title: capsule.title.clone(),
        date: capsule.date.clone(),
        text: capsule.text.clone(),
        tags: capsule
            .tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        unlock_at: capsule.time_capsule.clone(),
        media,
    }
}

/// Server order (newest first) is preserved.
pub fn build(client: &Client, capsules: &[CapsuleResponse]) -> Vec<TimelineEntry> {
    capsules.iter().map(|c| entry(client, c)).collect()
}
