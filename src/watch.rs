use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::platform::IncomingMessage;

/// Offset Telegram adds to channel and supergroup ids in their marked form.
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// A single configured source chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchEntry {
    /// Public handle, stored with its leading `@`
    Handle(String),
    /// Marked chat id (`-100…` for channels)
    ChatId(i64),
    /// Display title, matched exactly
    Title(String),
    /// Invite link hash, resolved to a `ChatId` once connected
    Invite(String),
}

impl std::fmt::Display for WatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchEntry::Handle(h) => write!(f, "handle {}", h),
            WatchEntry::ChatId(id) => write!(f, "chat id {}", id),
            WatchEntry::Title(t) => write!(f, "title \"{}\"", t),
            WatchEntry::Invite(hash) => write!(f, "invite link +{}", hash),
        }
    }
}

impl WatchEntry {
    /// Classify one configured value. Returns `None` for empty strings and
    /// malformed links.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(id) = raw.parse::<i64>() {
            return Some(WatchEntry::ChatId(id));
        }

        let link = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
            .unwrap_or(raw);

        if let Some(path) = link
            .strip_prefix("t.me/")
            .or_else(|| link.strip_prefix("telegram.me/"))
        {
            return parse_link_path(path);
        }

        if raw.starts_with('@') {
            if raw.len() == 1 {
                return None;
            }
            return Some(WatchEntry::Handle(raw.to_string()));
        }

        Some(WatchEntry::Title(raw.to_string()))
    }
}

fn parse_link_path(path: &str) -> Option<WatchEntry> {
    let segment = |rest: &str| -> Option<String> {
        let value = rest.split(['/', '?']).next().unwrap_or_default();
        (!value.is_empty()).then(|| value.to_string())
    };

    if let Some(rest) = path
        .strip_prefix('+')
        .or_else(|| path.strip_prefix("joinchat/"))
    {
        return segment(rest).map(WatchEntry::Invite);
    }

    // Private message link: t.me/c/<id>/<message>
    if let Some(rest) = path.strip_prefix("c/") {
        return match segment(rest)?.parse::<i64>() {
            Ok(bare) if bare > 0 => Some(WatchEntry::ChatId(marked_channel_id(bare))),
            _ => None,
        };
    }

    let name = segment(path)?;
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(WatchEntry::Handle(format!("@{}", name)))
}

/// Convert a bare channel id into its marked `-100…` form.
pub fn marked_channel_id(bare: i64) -> i64 {
    -(CHANNEL_ID_OFFSET + bare)
}

/// Recover the bare id used in `t.me/c/` links from a marked channel id.
pub fn bare_channel_id(marked: i64) -> Option<i64> {
    let bare = -marked - CHANNEL_ID_OFFSET;
    (bare > 0).then_some(bare)
}

/// Immutable set of chats whose messages are relayed.
#[derive(Debug, Clone)]
pub struct WatchSet {
    entries: Vec<WatchEntry>,
    handles: HashSet<String>,
    titles: HashSet<String>,
    chat_ids: HashSet<i64>,
}

impl WatchSet {
    /// Parse a comma-separated list. Unusable entries are dropped with a
    /// warning; the result may be empty, which callers must reject.
    /// Invite entries stay pending until [`WatchSet::resolve_invites`].
    pub fn parse(list: &str) -> Self {
        let mut entries: Vec<WatchEntry> = Vec::new();
        for raw in list.split(',') {
            if raw.trim().is_empty() {
                continue;
            }
            match WatchEntry::parse(raw) {
                Some(entry) if !entries.contains(&entry) => entries.push(entry),
                Some(_) => {}
                None => warn!("Could not parse channel identifier: {}", raw.trim()),
            }
        }
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<WatchEntry>) -> Self {
        let mut handles = HashSet::new();
        let mut titles = HashSet::new();
        let mut chat_ids = HashSet::new();
        for entry in &entries {
            match entry {
                WatchEntry::Handle(h) => {
                    handles.insert(h.clone());
                }
                WatchEntry::Title(t) => {
                    titles.insert(t.clone());
                }
                WatchEntry::ChatId(id) => {
                    chat_ids.insert(*id);
                }
                WatchEntry::Invite(_) => {}
            }
        }
        Self {
            entries,
            handles,
            titles,
            chat_ids,
        }
    }

    /// Hashes of invite links still waiting to be resolved.
    pub fn pending_invites(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                WatchEntry::Invite(hash) => Some(hash.clone()),
                _ => None,
            })
            .collect()
    }

    /// Replace each invite entry with the chat id it resolved to. Invites
    /// missing from `resolved` are dropped.
    pub fn resolve_invites(self, resolved: &HashMap<String, i64>) -> Self {
        let mut entries: Vec<WatchEntry> = Vec::new();
        for entry in self.entries {
            let entry = match entry {
                WatchEntry::Invite(hash) => match resolved.get(&hash) {
                    Some(id) => WatchEntry::ChatId(*id),
                    None => continue,
                },
                other => other,
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff the message's chat handle, title or id is watched.
    /// Exact comparisons only: no case folding or whitespace normalization.
    pub fn matches(&self, msg: &IncomingMessage) -> bool {
        if self.chat_ids.contains(&msg.chat_id) {
            return true;
        }
        if let Some(handle) = msg.handle.as_deref() {
            if self.handles.contains(&format!("@{}", handle)) {
                return true;
            }
        }
        self.titles.contains(&msg.title)
    }
}
