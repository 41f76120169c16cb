use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::resolver::{Classification, TitleResolver};

/// Fallback name when a collection title cannot be used on the filesystem,
/// and the base name for flat combined outputs.
const PLACEHOLDER_NAME: &str = "playlist";

/// Audio container produced by extraction and combining.
const AUDIO_EXT: &str = "mp3";

/// Seam over the external extraction and concatenation tools so the
/// orchestration flows can be exercised without shelling out.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// One extraction into `template`; returns the paths actually written.
    async fn extract(&self, reference: &str, template: &Path) -> Result<Vec<PathBuf>>;

    /// Concatenate `inputs` in order into a single `output` file.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// `MediaTools` backed by yt-dlp and ffmpeg.
pub struct CliMediaTools;

#[async_trait]
impl MediaTools for CliMediaTools {
    async fn extract(&self, reference: &str, template: &Path) -> Result<Vec<PathBuf>> {
        let output = Command::new("yt-dlp")
            .args(["--extract-audio", "--audio-format", AUDIO_EXT, "--output"])
            .arg(template)
            .args([
                "--no-simulate",
                "--print",
                "after_move:filepath",
                "--no-warnings",
                reference,
            ])
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::from_spawn("yt-dlp", e))?;

        if !output.status.success() {
            return Err(Error::from_exit("yt-dlp", output.status));
        }

        let paths = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.exists())
            .collect();
        Ok(paths)
    }

    /// ffmpeg concat demuxer over an on-disk list file. The inputs must all
    /// exist; a missing-input failure is fatal to this merge only.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let list_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let mut listfile = tempfile::Builder::new()
            .prefix(".concat-")
            .suffix(".txt")
            .tempfile_in(list_dir)?;
        listfile.write_all(concat_list(inputs).as_bytes())?;
        listfile.flush()?;

        let status = Command::new("ffmpeg")
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(listfile.path())
            .args(["-c", "copy"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::from_spawn("ffmpeg", e))?;

        if !status.success() {
            return Err(Error::from_exit("ffmpeg", status));
        }
        Ok(())
    }
}

/// Runs the per-reference download pipeline: classify, extract, and for
/// combine mode merge into a single file. Owns every transient artifact it
/// creates; only final outputs survive under `downloads_dir`.
pub struct Downloader {
    downloads_dir: PathBuf,
    tools: Box<dyn MediaTools>,
}

impl Downloader {
    pub fn new(downloads_dir: PathBuf, tools: Box<dyn MediaTools>) -> Self {
        Self {
            downloads_dir,
            tools,
        }
    }

    /// One batch of requested references, processed strictly in request
    /// order. Per-reference failures are printed and skipped; the batch
    /// itself only fails on a merge with nothing to merge.
    pub async fn download_all(
        &self,
        resolver: &dyn TitleResolver,
        refs: &[String],
        combine: bool,
    ) -> Result<()> {
        fs::create_dir_all(&self.downloads_dir)?;

        if combine {
            // A single reference that is itself a playlist gets the
            // per-collection combine flow; everything else merges over
            // the flat downloads root.
            if let [only] = refs {
                if let Classification::Collection { title, .. } = resolver.probe(only).await {
                    return self.download_collection_combined(resolver, only, &title).await;
                }
            }
            return self.download_combined_flat(refs).await;
        }

        for reference in refs {
            let result = match resolver.probe(reference).await {
                Classification::Collection { title, .. } => {
                    self.download_collection(resolver, reference, &title).await
                }
                Classification::Single { .. } => self.download_single(reference).await,
            };
            // Non-fatal: report and move on to the next reference
            if let Err(e) = result {
                report(&e);
            }
        }
        Ok(())
    }

    /// Standalone track into the flat downloads root, named from its title.
    async fn download_single(&self, reference: &str) -> Result<()> {
        println!("[downloading]: {}", reference);
        let template = self.downloads_dir.join("%(title)s.%(ext)s");
        self.tools.extract(reference, &template).await?;
        println!("[completed]: saved to {}", self.downloads_dir.display());
        Ok(())
    }

    /// Every member of a collection into its own subfolder. The folder is
    /// a final output and is kept even when some members fail.
    async fn download_collection(
        &self,
        resolver: &dyn TitleResolver,
        reference: &str,
        title: &str,
    ) -> Result<()> {
        let members = resolver.members(reference).await?;
        let (folder, renamed) = self.collection_folder(title)?;
        if renamed {
            println!(
                "[note]: saving playlist as {}",
                folder.file_name().unwrap_or_default().to_string_lossy()
            );
        }

        println!(
            "[downloading]: playlist {} ({} tracks)",
            title,
            members.len()
        );
        let template = folder.join("%(title)s.%(ext)s");
        for member in &members {
            if let Err(e) = self.tools.extract(&member.reference, &template).await {
                report(&e);
            }
        }
        println!("[completed]: saved to {}", folder.display());
        Ok(())
    }

    /// Combine mode for one collection: members land in a scratch folder
    /// under zero-padded names so lexical order equals playback order, then
    /// get concatenated into a single file in the flat root. The scratch
    /// folder is removed on success and on the nothing-extracted path.
    async fn download_collection_combined(
        &self,
        resolver: &dyn TitleResolver,
        reference: &str,
        title: &str,
    ) -> Result<()> {
        let members = resolver.members(reference).await?;
        let scratch = tempfile::Builder::new()
            .prefix(".combine-")
            .tempdir_in(&self.downloads_dir)?;

        println!(
            "[downloading]: playlist {} ({} tracks)",
            title,
            members.len()
        );
        for (index, member) in members.iter().enumerate() {
            let template = scratch
                .path()
                .join(member_template_name(index + 1, members.len()));
            if let Err(e) = self.tools.extract(&member.reference, &template).await {
                report(&e);
            }
        }

        let mut produced = files_in(scratch.path())?;
        if produced.is_empty() {
            // Scratch dir dropped here; nothing else to clean
            return Err(Error::NotFound(
                "no tracks were downloaded, nothing to combine".to_string(),
            ));
        }
        produced.sort();

        let output = unique_file(&self.downloads_dir, &filesystem_name(title), AUDIO_EXT);
        self.tools.concat(&produced, &output).await?;
        println!("[completed]: saved to {}", output.display());
        Ok(())
    }

    /// Combine mode over the flat root: each requested reference extracted
    /// individually, then every produced file concatenated in request order
    /// and the intermediates deleted.
    async fn download_combined_flat(&self, refs: &[String]) -> Result<()> {
        let template = self.downloads_dir.join("%(title)s.%(ext)s");
        let mut produced: Vec<PathBuf> = Vec::new();

        for reference in refs {
            println!("[downloading]: {}", reference);
            match self.tools.extract(reference, &template).await {
                Ok(paths) => produced.extend(paths),
                Err(e) => report(&e),
            }
        }

        if produced.is_empty() {
            return Err(Error::NotFound(
                "no tracks were downloaded, nothing to combine".to_string(),
            ));
        }

        let output = unique_file(&self.downloads_dir, PLACEHOLDER_NAME, AUDIO_EXT);
        self.tools.concat(&produced, &output).await?;
        for path in &produced {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("could not remove intermediate {}: {}", path.display(), e);
            }
        }
        println!("[completed]: saved to {}", output.display());
        Ok(())
    }

    /// Create the per-collection output folder, dodging name collisions
    /// with a numeric suffix and falling back to the placeholder name if
    /// the title cannot be created at all. The bool reports whether the
    /// folder name differs from the raw title.
    fn collection_folder(&self, title: &str) -> Result<(PathBuf, bool)> {
        let base = filesystem_name(title);
        let folder = unique_dir(&self.downloads_dir, &base);
        match fs::create_dir_all(&folder) {
            Ok(()) => {
                let renamed = folder.file_name() != Some(std::ffi::OsStr::new(title));
                Ok((folder, renamed))
            }
            Err(_) => {
                let fallback = unique_dir(&self.downloads_dir, PLACEHOLDER_NAME);
                fs::create_dir_all(&fallback)?;
                Ok((fallback, true))
            }
        }
    }
}

fn report(err: &Error) {
    println!("{}: {}", err.prompt_tag(), err);
}

/// Zero-padded scratch name for the `ordinal`-th member. The pad width
/// grows with the member count so lexical order stays playback order past
/// three digits.
fn member_template_name(ordinal: usize, count: usize) -> String {
    let width = count.to_string().len().max(3);
    format!("{:0width$}.%(ext)s", ordinal, width = width)
}

/// Title reduced to something the filesystem will take; empty results fall
/// back to the placeholder.
fn filesystem_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned
    }
}

/// First of `base`, `base_1`, `base_2`, ... that does not exist yet.
fn unique_dir(root: &Path, base: &str) -> PathBuf {
    let candidate = root.join(base);
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| root.join(format!("{}_{}", base, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Like `unique_dir` for files, keeping the extension in place.
fn unique_file(root: &Path, base: &str, ext: &str) -> PathBuf {
    let candidate = root.join(format!("{}.{}", base, ext));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| root.join(format!("{}_{}.{}", base, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// The concat demuxer's list format: one quoted `file` line per input, with
/// embedded single quotes escaped.
fn concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::new();
    for input in inputs {
        let escaped = input.display().to_string().replace('\'', r"'\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    list
}

fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}
