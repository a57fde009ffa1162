// Selection rules for remote listings

/// Drops every entry whose file name contains `needle` (case-sensitive substring),
/// keeping the rest in order. A rollover directory segment is not matched.
pub fn exclude_matching<T: AsRef<str>>(entries: Vec<T>, needle: &str) -> Vec<T> {
    entries
        .into_iter()
        .filter(|entry| !file_name(entry.as_ref()).contains(needle))
        .collect()
}

fn file_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

/// Keeps the `limit` lexicographically greatest entries, greatest first.
///
/// Rollover directories are named so that later runs sort higher, so this
/// picks the most recent archives and leaves older ones for later runs.
pub fn newest_history<T: Ord>(mut entries: Vec<T>, limit: usize) -> Vec<T> {
    entries.sort_by(|a, b| b.cmp(a));
    entries.truncate(limit);
    entries
}
