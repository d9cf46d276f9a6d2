//! The long-term memory record and its merge rules

use crate::extract::ExtractedMemory;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One list-valued section of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryField {
    Preferences,
    WorkInProgress,
    OpenLoops,
}

impl MemoryField {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryField::Preferences => "preference",
            MemoryField::WorkInProgress => "work item",
            MemoryField::OpenLoops => "open loop",
        }
    }
}

/// Durable cross-session memory. Unknown fields are ignored and missing
/// fields default, so older and newer files both load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRecord {
    /// Set explicitly by the user, never by extraction.
    pub user_profile: String,
    pub preferences: Vec<String>,
    pub work_in_progress: Vec<String>,
    pub open_loops: Vec<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Items added by a merge, per section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub preferences: usize,
    pub work_in_progress: usize,
    pub open_loops: usize,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.preferences + self.work_in_progress + self.open_loops
    }
}

impl MemoryRecord {
    pub fn is_empty(&self) -> bool {
        self.user_profile.trim().is_empty()
            && self.preferences.is_empty()
            && self.work_in_progress.is_empty()
            && self.open_loops.is_empty()
    }

    pub fn items(&self, field: MemoryField) -> &[String] {
        match field {
            MemoryField::Preferences => &self.preferences,
            MemoryField::WorkInProgress => &self.work_in_progress,
            MemoryField::OpenLoops => &self.open_loops,
        }
    }

    fn items_mut(&mut self, field: MemoryField) -> &mut Vec<String> {
        match field {
            MemoryField::Preferences => &mut self.preferences,
            MemoryField::WorkInProgress => &mut self.work_in_progress,
            MemoryField::OpenLoops => &mut self.open_loops,
        }
    }

    /// Append `item` unless blank or already present. Returns whether the
    /// record changed.
    pub fn add_item(&mut self, field: MemoryField, item: &str) -> bool {
        let item = item.trim();
        if item.is_empty() {
            return false;
        }
        let items = self.items_mut(field);
        if items.iter().any(|existing| existing == item) {
            return false;
        }
        items.push(item.to_string());
        true
    }

    /// Remove every item in `field`, returning how many were dropped.
    pub fn clear(&mut self, field: MemoryField) -> usize {
        let items = self.items_mut(field);
        let n = items.len();
        items.clear();
        n
    }

    /// Drop exact duplicates, keeping first occurrences in order.
    pub fn normalize(&mut self) {
        for field in [
            MemoryField::Preferences,
            MemoryField::WorkInProgress,
            MemoryField::OpenLoops,
        ] {
            let items = self.items_mut(field);
            let mut seen = std::collections::HashSet::new();
            items.retain(|item| seen.insert(item.clone()));
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }

    /// Render the record as a system-prompt section, or `None` when there
    /// is nothing worth telling the model.
    pub fn context_block(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        fn section(out: &mut String, title: &str, items: &[String]) {
            out.push_str(&format!("\n\n{}:", title));
            if items.is_empty() {
                out.push_str("\n- None");
            }
            for item in items {
                out.push_str(&format!("\n- {}", item));
            }
        }

        let updated = self
            .last_updated
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".into());
        let profile = if self.user_profile.trim().is_empty() {
            "Not specified"
        } else {
            self.user_profile.trim()
        };

        let mut out = format!(
            "LONG-TERM MEMORY (last updated: {})\n\nUser profile: {}",
            updated, profile
        );
        section(&mut out, "Preferences", &self.preferences);
        section(&mut out, "Work in progress", &self.work_in_progress);
        section(&mut out, "Open loops", &self.open_loops);
        Some(out)
    }
}

/// Fold extracted items into `existing`. Preferences are a union with
/// exact-string dedup; work and open loops append unseen items. The
/// profile and timestamp are left alone. Idempotent.
pub fn merge(existing: &MemoryRecord, extracted: &ExtractedMemory) -> (MemoryRecord, MergeSummary) {
    let mut merged = existing.clone();
    let mut summary = MergeSummary::default();

    for item in &extracted.preferences {
        if merged.add_item(MemoryField::Preferences, item) {
            summary.preferences += 1;
        }
    }
    for item in &extracted.work_in_progress {
        if merged.add_item(MemoryField::WorkInProgress, item) {
            summary.work_in_progress += 1;
        }
    }
    for item in &extracted.open_loops {
        if merged.add_item(MemoryField::OpenLoops, item) {
            summary.open_loops += 1;
        }
    }

    (merged, summary)
}

/// Accept RFC 3339, naive ISO 8601 (local time, as older files wrote it),
/// empty strings and null. Anything else loads as unknown.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        if let Some(local) = Local.from_local_datetime(&naive).earliest() {
            return Ok(Some(local.with_timezone(&Utc)));
        }
    }

    tracing::warn!("Unrecognized last_updated value {:?}, treating as unknown", raw);
    Ok(None)
}
