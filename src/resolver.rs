use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Placeholder used whenever a title cannot be resolved.
pub const SENTINEL_TITLE: &str = "unknown title";
const SENTINEL_PLAYLIST_TITLE: &str = "unknown playlist";

/// What a reference turned out to be. Never persisted; recomputed per probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Single { title: String },
    Collection { title: String, member_count: usize },
}

impl Classification {
    /// The form shown to the user and written to the catalog. Collections
    /// carry a `[playlist] ` prefix; the raw title stays available for
    /// filesystem naming.
    pub fn display_title(&self) -> String {
        match self {
            Classification::Single { title } => title.clone(),
            Classification::Collection { title, .. } => format!("[playlist] {}", title),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Classification::Collection { .. })
    }
}

/// One flat playlist member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub reference: String,
    pub title: String,
}

/// Seam over the external metadata tool so the catalog and the command loop
/// can be exercised without shelling out.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    /// Classify a reference. Infallible: every failure degrades to
    /// `Single` with the sentinel title.
    async fn probe(&self, reference: &str) -> Classification;

    /// The flat member list of a collection, in playback order.
    async fn members(&self, reference: &str) -> Result<Vec<Member>>;
}

/// Re-query a collection's member list and return the 1-based `child`-th
/// member's reference.
pub async fn resolve_child(
    resolver: &dyn TitleResolver,
    reference: &str,
    child: usize,
) -> Result<String> {
    let members = resolver.members(reference).await?;
    if child == 0 || child > members.len() {
        return Err(Error::NotFound(format!(
            "playlist has no track {}",
            child
        )));
    }
    Ok(members[child - 1].reference.clone())
}

static DATE_STAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}").unwrap());

/// Strip embedded `YYYY-MM-DD HH:MM` stamps and collapse the whitespace the
/// removal leaves behind. Applied once, at catalog write time.
pub fn sanitize_title(title: &str) -> String {
    let stripped = DATE_STAMP.replace_all(title, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        SENTINEL_TITLE.to_string()
    } else {
        collapsed
    }
}

/// `TitleResolver` backed by yt-dlp.
pub struct YtDlpResolver;

impl YtDlpResolver {
    pub fn new() -> Self {
        Self
    }

    /// One `--flat-playlist -J` call; `None` on missing tool, non-zero exit
    /// or unparsable output.
    async fn flat_payload(&self, reference: &str) -> Option<Value> {
        let output = Command::new("yt-dlp")
            .args(["--flat-playlist", "-J", "--no-warnings", reference])
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        serde_json::from_slice(&output.stdout).ok()
    }

    async fn single_title(&self, reference: &str) -> Option<String> {
        let output = Command::new("yt-dlp")
            .args(["--get-title", "--no-warnings", reference])
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8(output.stdout).ok()?;
        let title = stdout.lines().next()?.trim();
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }
}

#[async_trait]
impl TitleResolver for YtDlpResolver {
    async fn probe(&self, reference: &str) -> Classification {
        let Some(payload) = self.flat_payload(reference).await else {
            return Classification::Single {
                title: SENTINEL_TITLE.to_string(),
            };
        };

        if let Some(collection) = collection_from_payload(&payload) {
            return collection;
        }

        let title = self
            .single_title(reference)
            .await
            .unwrap_or_else(|| SENTINEL_TITLE.to_string());
        Classification::Single { title }
    }

    async fn members(&self, reference: &str) -> Result<Vec<Member>> {
        let payload = self
            .flat_payload(reference)
            .await
            .ok_or_else(|| Error::NotFound(format!("no playlist data for {}", reference)))?;

        members_from_payload(&payload)
            .ok_or_else(|| Error::NotFound(format!("{} is not a playlist", reference)))
    }
}

/// `Some(Collection)` when the payload carries a nested member list.
/// Downstream code never re-inspects raw payload shape.
fn collection_from_payload(payload: &Value) -> Option<Classification> {
    let entries = payload.get("entries")?.as_array()?;
    let title = payload
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or(SENTINEL_PLAYLIST_TITLE)
        .to_string();
    Some(Classification::Collection {
        title,
        member_count: entries.len(),
    })
}

/// Member list from a flat payload; entries carrying neither a url nor an
/// id are skipped.
fn members_from_payload(payload: &Value) -> Option<Vec<Member>> {
    let entries = payload.get("entries")?.as_array()?;
    let members = entries
        .iter()
        .filter_map(|entry| {
            let reference = entry
                .get("url")
                .or_else(|| entry.get("id"))
                .and_then(|v| v.as_str())?
                .to_string();
            let title = entry
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or(SENTINEL_TITLE)
                .to_string();
            Some(Member { reference, title })
        })
        .collect();
    Some(members)
}

/// Scripted resolver for tests; no test shells out.
#[cfg(test)]
pub struct StubResolver {
    pub classification: Classification,
    pub members: Option<Vec<Member>>,
}

#[cfg(test)]
impl StubResolver {
    pub fn single(title: &str) -> Self {
        Self {
            classification: Classification::Single {
                title: title.to_string(),
            },
            members: None,
        }
    }

    pub fn failing() -> Self {
        Self::single(SENTINEL_TITLE)
    }

    pub fn collection(title: &str, members: Vec<Member>) -> Self {
        Self {
            classification: Classification::Collection {
                title: title.to_string(),
                member_count: members.len(),
            },
            members: Some(members),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TitleResolver for StubResolver {
    async fn probe(&self, _reference: &str) -> Classification {
        self.classification.clone()
    }

    async fn members(&self, reference: &str) -> Result<Vec<Member>> {
        self.members
            .clone()
            .ok_or_else(|| Error::NotFound(format!("{} is not a playlist", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(reference: &str, title: &str) -> Member {
        Member {
            reference: reference.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_payload_with_entries_classifies_as_collection() {
        let payload = json!({
            "title": "road trip mix",
            "entries": [{"url": "a"}, {"url": "b"}, {"url": "c"}]
        });

        let classification = collection_from_payload(&payload).unwrap();
        assert_eq!(
            classification,
            Classification::Collection {
                title: "road trip mix".to_string(),
                member_count: 3
            }
        );
        assert_eq!(classification.display_title(), "[playlist] road trip mix");
    }

    #[test]
    fn test_collection_without_title_gets_playlist_sentinel() {
        let payload = json!({"entries": []});
        let classification = collection_from_payload(&payload).unwrap();
        assert_eq!(
            classification.display_title(),
            "[playlist] unknown playlist"
        );
    }

    #[test]
    fn test_payload_without_entries_is_not_a_collection() {
        assert!(collection_from_payload(&json!({"title": "one song"})).is_none());
        assert!(collection_from_payload(&json!("garbage")).is_none());
        assert!(collection_from_payload(&json!({"entries": "not a list"})).is_none());
    }

    #[test]
    fn test_members_prefer_url_and_fall_back_to_id() {
        let payload = json!({
            "entries": [
                {"url": "https://x/1", "title": "first"},
                {"id": "abc123"},
                {"title": "no locator at all"}
            ]
        });

        let members = members_from_payload(&payload).unwrap();
        assert_eq!(
            members,
            vec![
                member("https://x/1", "first"),
                member("abc123", SENTINEL_TITLE),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_child_is_one_based() {
        let resolver = StubResolver::collection(
            "mix",
            vec![member("a", "one"), member("b", "two"), member("c", "three")],
        );

        assert_eq!(resolve_child(&resolver, "ref", 2).await.unwrap(), "b");
        assert!(matches!(
            resolve_child(&resolver, "ref", 0).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            resolve_child(&resolver, "ref", 4).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_child_against_single_is_not_found() {
        let resolver = StubResolver::single("one song");
        assert!(matches!(
            resolve_child(&resolver, "ref", 1).await,
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_sanitize_strips_date_stamps() {
        assert_eq!(
            sanitize_title("live set 2024-03-01 18:30 at the docks"),
            "live set at the docks"
        );
        assert_eq!(sanitize_title("2023-12-31 23:59"), SENTINEL_TITLE);
        assert_eq!(sanitize_title("no stamp here"), "no stamp here");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_title("mix  2021-01-02 03:04  tape");
        assert_eq!(once, "mix tape");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn test_sanitize_empty_falls_back_to_sentinel() {
        assert_eq!(sanitize_title("   "), SENTINEL_TITLE);
        assert_eq!(sanitize_title(""), SENTINEL_TITLE);
    }
}
