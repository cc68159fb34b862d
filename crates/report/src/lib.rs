use std::fmt;
use std::io::Read;

use anyhow::{Context, Result};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// Ordered feedback messages attached to one source line.
///
/// Two lists are equal only when they hold the same messages in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FeedbackList {
    messages: Vec<String>,
}

impl FeedbackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FeedbackList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FeedbackList {
            messages: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Feedback for one file, keyed by line number in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    lines: Vec<(u32, FeedbackList)>,
}

impl FileReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the end, keeping whatever order the caller uses.
    pub fn push(&mut self, line: u32, feedback: FeedbackList) {
        self.lines.push((line, feedback));
    }

    /// Adds one message to `line`, creating the entry at the end if the line is new.
    pub fn add(&mut self, line: u32, message: impl Into<String>) {
        match self.lines.iter_mut().find(|(no, _)| *no == line) {
            Some((_, feedback)) => feedback.push(message),
            None => {
                let mut feedback = FeedbackList::new();
                feedback.push(message);
                self.lines.push((line, feedback));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &FeedbackList)> {
        self.lines.iter().map(|(line, feedback)| (*line, feedback))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl FromIterator<(u32, FeedbackList)> for FileReport {
    fn from_iter<I: IntoIterator<Item = (u32, FeedbackList)>>(iter: I) -> Self {
        FileReport {
            lines: iter.into_iter().collect(),
        }
    }
}

/// Reports for every checked file, keyed by path in insertion order.
///
/// A path may map to no report at all, which printers treat like an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSet {
    files: Vec<(String, Option<FileReport>)>,
}

impl ReportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, report: FileReport) {
        self.files.push((path.into(), Some(report)));
    }

    pub fn insert_absent(&mut self, path: impl Into<String>) {
        self.files.push((path.into(), None));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FileReport>)> {
        self.files
            .iter()
            .map(|(path, report)| (path.as_str(), report.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Parses `{ "<path>": { "<line>": ["message", ...] } | null }`, keeping key order.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid feedback report")
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("Invalid feedback report")
    }
}

impl<P: Into<String>> FromIterator<(P, FileReport)> for ReportSet {
    fn from_iter<I: IntoIterator<Item = (P, FileReport)>>(iter: I) -> Self {
        ReportSet {
            files: iter
                .into_iter()
                .map(|(path, report)| (path.into(), Some(report)))
                .collect(),
        }
    }
}

// serde_json's own Map sorts keys, so both maps are walked by hand to keep document order.

struct FileReportVisitor;

impl<'de> Visitor<'de> for FileReportVisitor {
    type Value = FileReport;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of line numbers to feedback lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FileReport, A::Error> {
        let mut report = FileReport::new();
        while let Some((key, feedback)) = map.next_entry::<String, FeedbackList>()? {
            let line = key
                .trim()
                .parse::<u32>()
                .map_err(|_| <A::Error as de::Error>::custom(format!("invalid line number `{}`", key)))?;
            report.push(line, feedback);
        }
        Ok(report)
    }
}

impl<'de> Deserialize<'de> for FileReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FileReportVisitor)
    }
}

struct ReportSetVisitor;

impl<'de> Visitor<'de> for ReportSetVisitor {
    type Value = ReportSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of file paths to feedback reports")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ReportSet, A::Error> {
        let mut set = ReportSet::new();
        while let Some((path, report)) = map.next_entry::<String, Option<FileReport>>()? {
            set.files.push((path, report));
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for ReportSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ReportSetVisitor)
    }
}
