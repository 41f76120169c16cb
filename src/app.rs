use std::future::Future;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::catalog::{Catalog, CatalogEntry};
use crate::command::{self, Address, Command};
use crate::config::VolumeStore;
use crate::downloader::{Downloader, MediaTools};
use crate::error::{Error, Result};
use crate::paths::Paths;
use crate::player::{self, PlaybackEnd};
use crate::resolver::{resolve_child, Classification, TitleResolver};

/// The interactive session: one synchronous read-eval loop over stdin.
/// Handler errors surface as a prompt message and the loop continues; only
/// `exit` or an interrupt at the prompt ends it.
pub struct App {
    catalog: Catalog,
    volume: VolumeStore,
    downloader: Downloader,
    resolver: Box<dyn TitleResolver>,
}

impl App {
    pub fn new(
        paths: &Paths,
        resolver: Box<dyn TitleResolver>,
        tools: Box<dyn MediaTools>,
    ) -> Self {
        Self {
            catalog: Catalog::new(paths.catalog_file.clone()),
            volume: VolumeStore::new(paths.volume_file.clone()),
            downloader: Downloader::new(paths.downloads_dir.clone(), tools),
            resolver,
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.print_catalog();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            println!("\n~ volume: {}% ~", self.volume.get());
            println!("~ ready to play? type help for commands ~");
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            // None is EOF or an interrupt at the idle prompt
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            let parsed = match command::parse_line(&line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    report(&e);
                    continue;
                }
            };
            for flag in &parsed.unknown_flags {
                println!("[error]: unknown flag: {}", flag);
            }

            match self.dispatch(parsed.command).await {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => report(&e),
            }
        }

        println!("[exit]: shutting down");
        Ok(())
    }

    async fn dispatch(&self, command: Command) -> Result<Flow> {
        match command {
            Command::Help => print_help(),
            Command::Exit => return Ok(Flow::Exit),

            Command::Play(address) => {
                let reference = self.resolve_address(address).await?;
                let volume = self.volume.get();
                println!("[playing]: streaming audio at {}% volume", volume);
                if player::stream(&reference, volume).await? == PlaybackEnd::Interrupted {
                    println!("[stopped]: playback interrupted");
                }
            }

            Command::Add(refs) => {
                let mut changed = false;
                for reference in &refs {
                    match self.catalog.append(self.resolver.as_ref(), reference).await {
                        Ok((ordinal, entry)) => {
                            println!("[added]: {}: {}", ordinal, entry.title);
                            changed = true;
                        }
                        Err(e) => report(&e),
                    }
                }
                if changed {
                    self.print_catalog();
                }
            }

            Command::Remove(ordinals) => {
                let (removed, err) = self.catalog.remove(&ordinals);
                for (ordinal, entry) in &removed {
                    println!("[removed]: track {} ({})", ordinal, entry.title);
                }
                if let Some(e) = err {
                    report(&e);
                }
                if !removed.is_empty() {
                    self.print_catalog();
                }
            }

            Command::Ls(None) => self.print_catalog(),
            Command::Ls(Some(address)) => self.ls_address(address).await?,

            Command::Volume(volume) => {
                self.volume.set(volume)?;
                println!("[updated]: volume is now {}%", volume);
            }

            Command::Download { refs, combine } => {
                return self
                    .download_with_interrupt(&refs, combine, async {
                        let _ = tokio::signal::ctrl_c().await;
                    })
                    .await;
            }
        }
        Ok(Flow::Continue)
    }

    /// Run one download batch raced against an interrupt. An interrupt
    /// abandons the batch and ends the session, like an interrupt at the
    /// idle prompt.
    async fn download_with_interrupt<F>(
        &self,
        refs: &[String],
        combine: bool,
        interrupt: F,
    ) -> Result<Flow>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.downloader.download_all(self.resolver.as_ref(), refs, combine) => {
                result?;
                Ok(Flow::Continue)
            }
            _ = interrupt => {
                println!("[stopped]: download interrupted");
                Ok(Flow::Exit)
            }
        }
    }

    /// Turn an address into a playable reference. Dotted addressing is only
    /// valid against an entry that classifies as a collection.
    async fn resolve_address(&self, address: Address) -> Result<String> {
        let entries = self.catalog.list();
        match address {
            Address::Entry(ordinal) => {
                Ok(entry_at(&entries, ordinal)?.reference.clone())
            }
            Address::Member(parent, child) => {
                let entry = entry_at(&entries, parent)?;
                let classification = self.resolver.probe(&entry.reference).await;
                if !classification.is_collection() {
                    return Err(Error::InvalidAddress(format!(
                        "track {} is not a playlist",
                        parent
                    )));
                }
                resolve_child(self.resolver.as_ref(), &entry.reference, child).await
            }
        }
    }

    async fn ls_address(&self, address: Address) -> Result<()> {
        let entries = self.catalog.list();
        match address {
            Address::Entry(ordinal) => {
                let entry = entry_at(&entries, ordinal)?;
                match self.resolver.probe(&entry.reference).await {
                    Classification::Collection { title, member_count } => {
                        println!("{}: [playlist] {} ({} tracks)", ordinal, title, member_count);
                        let members = self.resolver.members(&entry.reference).await?;
                        for (index, member) in members.iter().enumerate() {
                            println!(
                                "  {}.{}: {} ({})",
                                ordinal,
                                index + 1,
                                member.title,
                                member.reference
                            );
                        }
                    }
                    Classification::Single { .. } => {
                        println!("{}: {} ({})", ordinal, entry.title, entry.reference);
                    }
                }
            }
            Address::Member(parent, child) => {
                let entry = entry_at(&entries, parent)?;
                let classification = self.resolver.probe(&entry.reference).await;
                if !classification.is_collection() {
                    return Err(Error::InvalidAddress(format!(
                        "track {} is not a playlist",
                        parent
                    )));
                }
                let members = self.resolver.members(&entry.reference).await?;
                let member = members.get(child - 1).ok_or_else(|| {
                    Error::NotFound(format!("playlist has no track {}", child))
                })?;
                println!("{}.{}: {} ({})", parent, child, member.title, member.reference);
            }
        }
        Ok(())
    }

    fn print_catalog(&self) {
        let entries = self.catalog.list();
        if entries.is_empty() {
            println!("~ no tracks found ~");
            return;
        }
        println!("~ tracks loaded ~");
        for (index, entry) in entries.iter().enumerate() {
            println!("{}: {} ({})", index + 1, entry.title, entry.reference);
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

fn entry_at(entries: &[CatalogEntry], ordinal: usize) -> Result<&CatalogEntry> {
    if ordinal == 0 || ordinal > entries.len() {
        return Err(Error::InvalidOrdinal(ordinal));
    }
    Ok(&entries[ordinal - 1])
}

fn report(err: &Error) {
    println!("{}: {}", err.prompt_tag(), err);
}

fn print_help() {
    println!("\n[commands]");
    println!("help                             : see this menu");
    println!("play <n> | <n.m>                 : play a track, or one playlist member");
    println!("add <url>[,<url>...]             : add tracks to the catalog");
    println!("remove <n>[,<n>...]              : delete tracks by number");
    println!("ls [<n> | <n.m>]                 : show tracks, or look inside a playlist");
    println!("volume <0-200>                   : set audio volume");
    println!("download <url>[,...] [--combine] : download tracks as mp3");
    println!("exit                             : close the program");
    println!("CTRL + C                         : stop playback");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Member, StubResolver};
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Succeeds immediately without touching any external tool.
    struct NoopTools;

    #[async_trait]
    impl MediaTools for NoopTools {
        async fn extract(&self, _reference: &str, _template: &Path) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        async fn concat(&self, _inputs: &[PathBuf], _output: &Path) -> Result<()> {
            Ok(())
        }
    }

    /// Never completes an extraction; stands in for a hung external tool.
    struct HangingTools;

    #[async_trait]
    impl MediaTools for HangingTools {
        async fn extract(&self, _reference: &str, _template: &Path) -> Result<Vec<PathBuf>> {
            std::future::pending().await
        }

        async fn concat(&self, _inputs: &[PathBuf], _output: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn app_with(dir: &TempDir, catalog: &str, resolver: StubResolver) -> App {
        app_with_tools(dir, catalog, resolver, Box::new(NoopTools))
    }

    fn app_with_tools(
        dir: &TempDir,
        catalog: &str,
        resolver: StubResolver,
        tools: Box<dyn MediaTools>,
    ) -> App {
        let paths = Paths {
            catalog_file: dir.path().join("catalog.txt"),
            volume_file: dir.path().join("volume.txt"),
            downloads_dir: dir.path().join("downloads"),
        };
        fs::write(&paths.catalog_file, catalog).unwrap();
        App::new(&paths, Box::new(resolver), tools)
    }

    fn member(reference: &str) -> Member {
        Member {
            reference: reference.to_string(),
            title: "member".to_string(),
        }
    }

    #[tokio::test]
    async fn test_entry_address_resolves_to_reference() {
        let dir = TempDir::new().unwrap();
        let app = app_with(&dir, "A t1\nB t2\n", StubResolver::single("x"));

        let reference = app.resolve_address(Address::Entry(2)).await.unwrap();
        assert_eq!(reference, "B");
    }

    #[tokio::test]
    async fn test_entry_address_out_of_range() {
        let dir = TempDir::new().unwrap();
        let app = app_with(&dir, "A t1\n", StubResolver::single("x"));

        assert!(matches!(
            app.resolve_address(Address::Entry(2)).await,
            Err(Error::InvalidOrdinal(2))
        ));
        assert!(matches!(
            app.resolve_address(Address::Member(9, 1)).await,
            Err(Error::InvalidOrdinal(9))
        ));
    }

    #[tokio::test]
    async fn test_member_address_resolves_through_collection() {
        let dir = TempDir::new().unwrap();
        let resolver = StubResolver::collection(
            "mix",
            vec![member("m1"), member("m2"), member("m3")],
        );
        let app = app_with(&dir, "A t1\nP [playlist] mix\n", resolver);

        let reference = app.resolve_address(Address::Member(2, 3)).await.unwrap();
        assert_eq!(reference, "m3");
    }

    #[tokio::test]
    async fn test_member_address_against_single_is_invalid() {
        let dir = TempDir::new().unwrap();
        let app = app_with(&dir, "A t1\nB t2\n", StubResolver::single("just a song"));

        assert!(matches!(
            app.resolve_address(Address::Member(2, 3)).await,
            Err(Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_interrupt_during_download_ends_session() {
        let dir = TempDir::new().unwrap();
        let app = app_with_tools(
            &dir,
            "A t1\n",
            StubResolver::single("x"),
            Box::new(HangingTools),
        );

        let flow = app
            .download_with_interrupt(&["r1".to_string()], false, std::future::ready(()))
            .await
            .unwrap();
        assert!(matches!(flow, Flow::Exit));
    }

    #[tokio::test]
    async fn test_uninterrupted_download_returns_to_prompt() {
        let dir = TempDir::new().unwrap();
        let app = app_with(&dir, "A t1\n", StubResolver::single("x"));

        let flow = app
            .download_with_interrupt(&["r1".to_string()], false, std::future::pending())
            .await
            .unwrap();
        assert!(matches!(flow, Flow::Continue));
    }

    #[tokio::test]
    async fn test_member_address_out_of_range_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = StubResolver::collection("mix", vec![member("m1")]);
        let app = app_with(&dir, "P mix\n", resolver);

        assert!(matches!(
            app.resolve_address(Address::Member(1, 5)).await,
            Err(Error::NotFound(_))
        ));
    }
}
