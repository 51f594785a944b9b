//! Daemon shell
//!
//! The command interpreter behind `linkrelay-daemon`. Each line of a command
//! sequence is executed in order and its output appended to the response.
//!
//! ## Commands
//! - `modprobe <module>...` load download modules
//! - `rmmod <module>...`    unload them
//! - `lsmod`                list loaded modules
//! - `do <link>`            queue a download; the link's scheme must map to a loaded module
//! - `vd`                   list queued downloads
//! - `cancel <id>...`       drop downloads from the queue
//! - `pause <id>...`        pause downloads
//! - `resume <id>...`       resume paused downloads
//! - `help`                 list commands
//!
//! Module and queue state is shared by every connection.

use std::collections::BTreeSet;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use url::Url;

use crate::error::Result;
use crate::network::CommandHandler;
use crate::protocol::{Command, CommandLine, TERMINATOR};

/// Modules the daemon knows how to load, with descriptions
pub const KNOWN_MODULES: &[(&str, &str)] = &[
    ("http", "HTTP/HTTPS downloads"),
    ("ftp", "FTP downloads"),
];

const HELP: &[(&str, &str)] = &[
    ("modprobe", "Load a module."),
    ("rmmod", "Unload a module."),
    ("lsmod", "List loaded modules."),
    ("do", "Download a link."),
    ("vd", "View downloads."),
    ("cancel", "Cancel a download."),
    ("pause", "Pause a download."),
    ("resume", "Resume a download."),
    ("help", "Show this help."),
];

/// Module that handles links with the given URL scheme
pub fn module_for_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" | "https" => Some("http"),
        "ftp" => Some("ftp"),
        _ => None,
    }
}

// =============================================================================
// Module Registry
// =============================================================================

/// Set of loaded modules
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    loaded: RwLock<BTreeSet<&'static str>>,
}

impl ModuleRegistry {
    /// Load `name`; `Some(true)` if newly loaded, `Some(false)` if it already
    /// was, `None` if no such module exists
    pub fn load(&self, name: &str) -> Option<bool> {
        let (known, _) = KNOWN_MODULES.iter().find(|(known, _)| *known == name)?;
        Some(self.loaded.write().insert(*known))
    }

    /// Unload `name`; false if it wasn't loaded
    pub fn unload(&self, name: &str) -> bool {
        self.loaded.write().remove(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().contains(name)
    }

    /// Loaded module names, sorted
    pub fn loaded(&self) -> Vec<&'static str> {
        self.loaded.read().iter().copied().collect()
    }
}

// =============================================================================
// Download Queue
// =============================================================================

/// A download accepted by `do`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedDownload {
    pub id: u64,
    pub link: String,
    pub module: &'static str,
    pub paused: bool,
}

#[derive(Debug, Default)]
struct QueueInner {
    next_id: u64,
    entries: Vec<QueuedDownload>,
}

/// Downloads handed to the (external) download engine, in arrival order
#[derive(Debug, Default)]
pub struct DownloadQueue {
    inner: Mutex<QueueInner>,
}

impl DownloadQueue {
    /// Append a download; ids start at 1
    pub fn push(&self, link: impl Into<String>, module: &'static str) -> QueuedDownload {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let entry = QueuedDownload {
            id: inner.next_id,
            link: link.into(),
            module,
            paused: false,
        };
        inner.entries.push(entry.clone());
        entry
    }

    /// Remove download `id` from the queue
    pub fn cancel(&self, id: u64) -> Option<QueuedDownload> {
        let mut inner = self.inner.lock();
        let pos = inner.entries.iter().position(|entry| entry.id == id)?;
        Some(inner.entries.remove(pos))
    }

    /// Set the paused flag of download `id`; `Some(true)` if it changed,
    /// `None` if there is no such download
    pub fn set_paused(&self, id: u64, paused: bool) -> Option<bool> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.iter_mut().find(|entry| entry.id == id)?;
        let changed = entry.paused != paused;
        entry.paused = paused;
        Some(changed)
    }

    pub fn get(&self, id: u64) -> Option<QueuedDownload> {
        self.inner.lock().entries.iter().find(|entry| entry.id == id).cloned()
    }

    pub fn list(&self) -> Vec<QueuedDownload> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Shell
// =============================================================================

/// Executes command sequences against the daemon's modules and queue
#[derive(Debug, Default)]
pub struct Shell {
    modules: ModuleRegistry,
    downloads: DownloadQueue,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn downloads(&self) -> &DownloadQueue {
        &self.downloads
    }

    /// Run one line, appending its CRLF-terminated output to `out`
    pub fn execute(&self, line: &CommandLine, out: &mut BytesMut) {
        let Some(verb) = line.verb() else {
            return;
        };
        tracing::debug!("Executing: {}", line);

        match verb {
            "modprobe" => self.cmd_load_modules(line, out),
            "rmmod" => self.cmd_unload_modules(line, out),
            "lsmod" => self.cmd_list_modules(out),
            "do" => self.cmd_download(line, out),
            "vd" => self.cmd_list_downloads(out),
            "cancel" => self.cmd_cancel_downloads(line, out),
            "pause" => self.cmd_pause_downloads(line, out, true),
            "resume" => self.cmd_pause_downloads(line, out, false),
            "help" => cmd_help(out),
            other => emit(out, format!("{}: command not found.", other)),
        }
    }

    fn cmd_load_modules(&self, line: &CommandLine, out: &mut BytesMut) {
        let mut any = false;
        for name in line.args() {
            any = true;
            match self.modules.load(name) {
                Some(true) => {
                    tracing::info!("Module {} loaded", name);
                    emit(out, format!("Module '{}' loaded.", name));
                }
                Some(false) => emit(out, format!("Module '{}' already loaded.", name)),
                None => emit(out, format!("modprobe: unknown module '{}'", name)),
            }
        }
        if !any {
            emit(out, "Syntax: modprobe <module> [<module>...]");
        }
    }

    fn cmd_unload_modules(&self, line: &CommandLine, out: &mut BytesMut) {
        let mut any = false;
        for name in line.args() {
            any = true;
            if self.modules.unload(name) {
                tracing::info!("Module {} unloaded", name);
                emit(out, format!("Module '{}' unloaded.", name));
            } else {
                emit(out, format!("rmmod: module '{}' is not loaded", name));
            }
        }
        if !any {
            emit(out, "Syntax: rmmod <module> [<module>...]");
        }
    }

    fn cmd_list_modules(&self, out: &mut BytesMut) {
        let loaded = self.modules.loaded();
        if loaded.is_empty() {
            emit(out, "No modules loaded.");
            return;
        }
        for name in loaded {
            let desc = KNOWN_MODULES
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, desc)| *desc)
                .unwrap_or("");
            emit(out, format!("{:<8} {}", name, desc));
        }
    }

    fn cmd_download(&self, line: &CommandLine, out: &mut BytesMut) {
        let link = line.rest();
        if link.is_empty() {
            emit(out, "Syntax: do <link>");
            return;
        }

        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                emit(out, format!("do: invalid link '{}': {}", link, e));
                return;
            }
        };

        let Some(module) = module_for_scheme(url.scheme()) else {
            emit(out, format!("do: unsupported scheme '{}'", url.scheme()));
            return;
        };

        if !self.modules.is_loaded(module) {
            emit(
                out,
                format!("do: module '{}' is not loaded (try 'modprobe {}')", module, module),
            );
            return;
        }

        let entry = self.downloads.push(url.as_str(), module);
        tracing::info!("Queued download #{} via {}: {}", entry.id, module, entry.link);
        emit(out, format!("Download #{} queued: {}", entry.id, entry.link));
    }

    fn cmd_list_downloads(&self, out: &mut BytesMut) {
        let entries = self.downloads.list();
        if entries.is_empty() {
            emit(out, "No downloads queued.");
            return;
        }
        for entry in entries {
            let state = if entry.paused { " (paused)" } else { "" };
            emit(out, format!("#{} [{}] {}{}", entry.id, entry.module, entry.link, state));
        }
    }

    fn cmd_cancel_downloads(&self, line: &CommandLine, out: &mut BytesMut) {
        let Some(ids) = download_ids(line, out) else {
            return;
        };
        for id in ids {
            match self.downloads.cancel(id) {
                Some(entry) => {
                    tracing::info!("Cancelled download #{}: {}", entry.id, entry.link);
                    emit(out, format!("Download #{} cancelled.", entry.id));
                }
                None => emit(out, format!("cancel: no such download #{}", id)),
            }
        }
    }

    fn cmd_pause_downloads(&self, line: &CommandLine, out: &mut BytesMut, paused: bool) {
        let Some(ids) = download_ids(line, out) else {
            return;
        };
        let verb = if paused { "pause" } else { "resume" };
        for id in ids {
            match self.downloads.set_paused(id, paused) {
                Some(true) if paused => emit(out, format!("Download #{} paused.", id)),
                Some(true) => emit(out, format!("Download #{} resumed.", id)),
                Some(false) if paused => emit(out, format!("Download #{} already paused.", id)),
                Some(false) => emit(out, format!("Download #{} is not paused.", id)),
                None => emit(out, format!("{}: no such download #{}", verb, id)),
            }
        }
    }
}

/// Parse the download ids of a `cancel`/`pause`/`resume` line
///
/// Bad tokens are reported and skipped. Returns `None` (after printing the
/// syntax line) when no ids were given at all.
fn download_ids(line: &CommandLine, out: &mut BytesMut) -> Option<Vec<u64>> {
    let verb = line.verb().unwrap_or_default();
    let mut given = false;
    let mut ids = Vec::new();
    for arg in line.args() {
        given = true;
        match arg.trim_start_matches('#').parse::<u64>() {
            Ok(id) => ids.push(id),
            Err(_) => emit(out, format!("{}: invalid download id '{}'", verb, arg)),
        }
    }
    if !given {
        emit(out, format!("Syntax: {} <id> [<id>...]", verb));
        return None;
    }
    Some(ids)
}

impl CommandHandler for Shell {
    fn handle(&self, command: &Command) -> Result<Bytes> {
        let mut out = BytesMut::new();
        for line in command {
            self.execute(line, &mut out);
        }
        Ok(out.freeze())
    }
}

fn cmd_help(out: &mut BytesMut) {
    emit(out, "Available commands:");
    for (name, desc) in HELP {
        emit(out, format!("{:<13} {}", name, desc));
    }
}

fn emit(out: &mut BytesMut, text: impl AsRef<str>) {
    out.put_slice(text.as_ref().as_bytes());
    out.put_slice(TERMINATOR);
}
