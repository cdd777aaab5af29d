// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spool directory layout.
//!
//! Virtual hosts land in `<a>/<b>/<vhost>/`, account traffic on shared sites
//! in `users/<site>/<a>/<b>/<account>/`, and pages on a shared site outside
//! any account in `sites/<site>/`. Every returned path is relative to the
//! spool root and never contains `..` or an absolute component.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::entry::LogEntry;

/// Directory holding per-account logs of shared sites.
pub const USERS_DIR: &str = "users";

/// Directory holding logs of shared sites' own pages.
pub const SITES_DIR: &str = "sites";

/// Name used when a name is too short to hash.
const DEFAULT_NAME: &str = "default";

/// Prefix skipped when picking hash characters of long names.
const WWW_PREFIX: &str = "www.";

/// Maps entries to their log directory.
#[derive(Debug, Clone, Default)]
pub struct SpoolLayout {
    /// Lowercased names of shared sites whose traffic is split per account.
    account_sites: HashSet<String>,
}

impl SpoolLayout {
    pub fn new<I, S>(account_sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            account_sites: account_sites
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_account_site(&self, vhost: &str) -> bool {
        !self.account_sites.is_empty() && self.account_sites.contains(&vhost.to_ascii_lowercase())
    }

    /// Directory (relative to the spool root) for `entry`.
    pub fn directory(&self, entry: &LogEntry) -> PathBuf {
        let vhost = entry.vhost();
        if !self.is_account_site(vhost) {
            return hash_path(vhost);
        }

        let site = sanitize(vhost);
        match account(entry.uri()) {
            Some(user) => PathBuf::from(USERS_DIR).join(site).join(hash_path(user)),
            None => PathBuf::from(SITES_DIR).join(site),
        }
    }

    /// Full relative path of the log file for `entry`.
    pub fn file_path(&self, entry: &LogEntry, log_file: &str) -> PathBuf {
        self.directory(entry).join(sanitize(log_file))
    }
}

/// Two one-character levels followed by the name itself.
///
/// ```
/// # use hl_core::hash_path;
/// assert_eq!(hash_path("example.org"), std::path::Path::new("e/x/example.org"));
/// assert_eq!(hash_path("www.example.org"), std::path::Path::new("e/x/www.example.org"));
/// ```
pub fn hash_path(name: &str) -> PathBuf {
    let name = if name.chars().count() < 2 {
        DEFAULT_NAME
    } else {
        name
    };

    let key = match name.strip_prefix(WWW_PREFIX) {
        Some(rest) if name.len() > 10 => rest,
        _ => name,
    };
    let mut chars = key.chars();
    let a = level(chars.next());
    let b = level(chars.next());

    [a, b, sanitize(name)].iter().collect()
}

/// One hash level: a single safe character.
fn level(c: Option<char>) -> String {
    match c {
        None | Some('.' | '/' | '\\' | '\0') => "_".to_string(),
        Some(c) => c.to_string(),
    }
}

/// Make `name` a single, non-hidden path component.
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if out.is_empty() {
        out.push('_');
    } else if out.starts_with('.') {
        out.insert(0, '_');
    }
    out
}

/// First directory of a URI, with a leading `~` stripped.
///
/// `/~bob/pics/a.png` → `bob`; `/index.html` → none (no directory).
pub fn account(uri: &str) -> Option<&str> {
    let mut rest = uri.strip_prefix('/')?;
    loop {
        if let Some(r) = rest.strip_prefix('/') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else {
            break;
        }
    }
    let (dir, _) = rest.split_once('/')?;
    let dir = dir.strip_prefix('~').unwrap_or(dir);
    (!dir.is_empty()).then_some(dir)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
