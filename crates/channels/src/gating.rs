use serde::{Deserialize, Serialize};

/// Sender allow-list.
///
/// An empty list admits everyone. Entries are compared case-insensitively and
/// may contain `*` wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    pub fn new(entries: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            list.push(entry.as_ref());
        }
        list
    }

    /// Add an entry; blanks and duplicates are ignored.
    pub fn push(&mut self, entry: &str) {
        let entry = entry.trim().to_uppercase();
        if !entry.is_empty() && !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn permits(&self, sender: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let sender = sender.trim().to_uppercase();
        self.entries.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, &sender)
            } else {
                *pattern == sender
            }
        })
    }
}

/// `*` matches any run of characters, including none.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle.iter().filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
