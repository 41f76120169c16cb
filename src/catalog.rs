use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::resolver::{sanitize_title, TitleResolver, SENTINEL_TITLE};

/// Catalog seeded on first run when no file exists yet.
const DEFAULT_REFERENCES: &[&str] = &[
    "https://www.youtube.com/watch?v=WNsOxG0AqjA",
    "https://www.youtube.com/watch?v=qnStVGoIgBA",
    "https://www.youtube.com/watch?v=3U6exJIeGw4",
    "https://www.youtube.com/watch?v=hiGzdab8bsE",
    "https://www.youtube.com/watch?v=uYfxDF_QR94",
    "https://www.youtube.com/watch?v=UedTcufyrHc",
    "https://www.youtube.com/watch?v=Y9q6RYg2Pdg",
    "https://www.youtube.com/watch?v=5-anTj1QrWs",
    "https://www.youtube.com/watch?v=MGJWPha7rJw",
    "https://www.youtube.com/watch?v=1PkJmurhQfU",
];

/// One catalog line. The 1-based position in the file is the entry's
/// ordinal; all addressing goes through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub reference: String,
    pub title: String,
}

/// The ordered reference list, persisted one `reference<ws>title` line per
/// entry. Holds only the path; every operation re-opens the file so no
/// handle survives across commands.
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parse the catalog file. Absent file: seeded with the default list.
    /// Read failures degrade to an empty catalog; `load` never errors.
    pub fn load(&self) -> Vec<CatalogEntry> {
        if !self.path.exists() {
            let seed = DEFAULT_REFERENCES.join("\n") + "\n";
            if let Err(e) = fs::write(&self.path, seed) {
                tracing::warn!("could not seed catalog file: {}", e);
                return Vec::new();
            }
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => contents.lines().filter_map(parse_line).collect(),
            Err(e) => {
                tracing::warn!("could not read catalog file: {}", e);
                Vec::new()
            }
        }
    }

    /// Resolve a title for `reference` and append it as the last entry,
    /// returning the new entry with its ordinal. Nothing is written on any
    /// failure path.
    pub async fn append(
        &self,
        resolver: &dyn TitleResolver,
        reference: &str,
    ) -> Result<(usize, CatalogEntry)> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::InvalidInput("no reference provided".to_string()));
        }

        let before = self.load();

        // Duplicate policy: literal containment against the raw file
        // content. Intentionally loose; do not tighten to structural
        // equality.
        let raw = fs::read_to_string(&self.path).unwrap_or_default();
        if raw.contains(reference) {
            return Err(Error::DuplicateEntry(reference.to_string()));
        }

        let title = resolver.probe(reference).await.display_title();
        if title == SENTINEL_TITLE {
            return Err(Error::TitleResolutionFailed(reference.to_string()));
        }
        let title = sanitize_title(&title);

        let mut contents = raw;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&format!("{} {}\n", reference, title));
        fs::write(&self.path, contents)?;

        let entry = CatalogEntry {
            reference: reference.to_string(),
            title,
        };
        Ok((before.len() + 1, entry))
    }

    /// Remove a batch of ordinals, highest first, re-reading the file
    /// before each step. An out-of-range ordinal aborts the rest of the
    /// batch but removals already applied stay applied: the batch is
    /// deliberately not transactional.
    pub fn remove(&self, ordinals: &[usize]) -> (Vec<(usize, CatalogEntry)>, Option<Error>) {
        let mut ordered: Vec<usize> = ordinals.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        let mut removed = Vec::new();
        for ordinal in ordered {
            let mut entries = self.load();
            if ordinal == 0 || ordinal > entries.len() {
                return (removed, Some(Error::InvalidOrdinal(ordinal)));
            }

            let entry = entries.remove(ordinal - 1);
            if let Err(e) = self.write_all(&entries) {
                return (removed, Some(e));
            }
            removed.push((ordinal, entry));
        }
        (removed, None)
    }

    /// The ordered sequence; empty is a valid state, not an error.
    pub fn list(&self) -> Vec<CatalogEntry> {
        self.load()
    }

    fn write_all(&self, entries: &[CatalogEntry]) -> Result<()> {
        let mut contents = String::new();
        for entry in entries {
            contents.push_str(&format!("{} {}\n", entry.reference, entry.title));
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<CatalogEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.split_once(char::is_whitespace) {
        Some((reference, rest)) => {
            let title = rest.trim();
            Some(CatalogEntry {
                reference: reference.to_string(),
                title: if title.is_empty() {
                    SENTINEL_TITLE.to_string()
                } else {
                    title.to_string()
                },
            })
        }
        // No title segment on this line
        None => Some(CatalogEntry {
            reference: line.to_string(),
            title: SENTINEL_TITLE.to_string(),
        }),
    }
}
