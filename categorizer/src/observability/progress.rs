use std::sync::{Arc, RwLock};
use std::time::Instant;

use itertools::Itertools;
use strum::{AsRefStr, Display};
use tokio::sync::mpsc::UnboundedSender;

/// Pipeline stage a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ProgressPhase {
    Normalizing,
    #[strum(serialize = "Building Features")]
    BuildingFeatures,
    Clustering,
    Naming,
    #[strum(serialize = "Post-processing")]
    PostProcessing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(phase: ProgressPhase, percent: u8, message: impl Into<String>) -> Self {
        ProgressUpdate {
            phase,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates to a channel; a closed receiver is ignored
impl ProgressReporter for UnboundedSender<ProgressUpdate> {
    fn report(&self, update: ProgressUpdate) {
        if self.send(update).is_err() {
            tracing::debug!("Progress receiver dropped");
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedUpdate {
    at: Instant,
    update: ProgressUpdate,
}

/// Keeps every update of a run so it can be printed as a table afterwards
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    history: Arc<RwLock<Vec<TrackedUpdate>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history.iter().map(|t| t.update.clone()).collect()
    }

    pub fn latest(&self) -> Option<ProgressUpdate> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        history.last().map(|t| t.update.clone())
    }

    pub fn is_done(&self) -> bool {
        self.latest().is_some_and(|u| u.phase == ProgressPhase::Done)
    }

    /// Formatted table of all updates so far
    pub fn get_table(&self) -> Option<String> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        if history.is_empty() {
            return None;
        }

        let headers = ["Elapsed", "Phase", "Progress", "Message"];
        let rows: Vec<Vec<String>> = history
            .iter()
            .map(|t| {
                vec![
                    format!("{:.2}s", t.at.duration_since(self.started).as_secs_f64()),
                    t.update.phase.to_string(),
                    format!("{}%", t.update.percent),
                    t.update.message.clone(),
                ]
            })
            .collect();

        Some(format!(
            "Categorization Progress ({} updates):\n{}",
            rows.len(),
            format_table(&headers, &rows)
        ))
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressTracker {
    fn report(&self, update: ProgressUpdate) {
        tracing::debug!("[{}] {}% {}", update.phase, update.percent, update.message);
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        history.push(TrackedUpdate {
            at: Instant::now(),
            update,
        });
    }
}

/// Plain text table. Rows are cut or padded to the header count, numeric
/// cells are right aligned, and widths count chars rather than bytes.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    fn cell(row: &Vec<String>, i: usize) -> &str {
        row.get(i).map_or("", String::as_str)
    }
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|row| cell(row, i).chars().count())
                .fold(h.chars().count(), usize::max)
        })
        .collect();

    let line = |cells: Vec<&str>| {
        let padded = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| {
                if is_numeric(c) {
                    format!("{:>w$}", c, w = *w)
                } else {
                    format!("{:<w$}", c, w = *w)
                }
            })
            .join(" | ");
        format!("| {} |\n", padded)
    };

    let mut output = line(headers.to_vec());
    output.push_str(&format!(
        "|-{}-|\n",
        widths.iter().map(|w| "-".repeat(*w)).join("-|-")
    ));
    for row in rows {
        output.push_str(&line((0..headers.len()).map(|i| cell(row, i)).collect()));
    }
    output
}

/// Counts, percentages and durations like `12`, `40%`, `0.25s`
fn is_numeric(cell: &str) -> bool {
    cell.starts_with(|c: char| c.is_ascii_digit())
        && cell.trim_end_matches(['%', 's']).parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        let table = format_table(
            &["Name", "Size"],
            &[
                vec!["GitHub Development".to_string(), "3".to_string()],
                vec!["Misc".to_string(), "12".to_string()],
            ],
        );
        assert_eq!(
            table,
            "| Name               | Size |\n\
             |--------------------|------|\n\
             | GitHub Development |    3 |\n\
             | Misc               |   12 |\n"
        );
        assert_eq!(format_table(&["A"], &[]), "");
    }

    #[test]
    fn test_format_table_counts_chars_and_pads_short_rows() {
        let table = format_table(
            &["Name", "Emails"],
            &[
                vec!["Café Ünïcode".to_string(), "2".to_string()],
                vec!["Short".to_string()],
            ],
        );
        assert_eq!(
            table,
            "| Name         | Emails |\n\
             |--------------|--------|\n\
             | Café Ünïcode |      2 |\n\
             | Short        |        |\n"
        );
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("12"));
        assert!(is_numeric("40%"));
        assert!(is_numeric("0.25s"));
        assert!(!is_numeric("s"));
        assert!(!is_numeric("3 emails"));
        assert!(!is_numeric(""));
    }

    #[test]
    fn test_tracker_records_history() {
        let tracker = ProgressTracker::new();
        assert!(tracker.get_table().is_none());

        tracker.report(ProgressUpdate::new(ProgressPhase::Clustering, 50, "KMeans(k=3)"));
        tracker.report(ProgressUpdate::new(ProgressPhase::Done, 150, "3 categories"));

        let updates = tracker.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].percent, 100);
        assert!(tracker.is_done());

        let table = tracker.get_table().unwrap();
        assert!(table.starts_with("Categorization Progress (2 updates):"));
        assert!(table.contains("| Clustering |"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ProgressPhase::BuildingFeatures.to_string(), "Building Features");
        assert_eq!(ProgressPhase::Naming.as_ref(), "Naming");
    }

    #[tokio::test]
    async fn test_channel_reporter() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.report(ProgressUpdate::new(ProgressPhase::Normalizing, 0, "8 emails"));
        let update = rx.recv().await.unwrap();
        assert_eq!(update.phase, ProgressPhase::Normalizing);

        drop(rx);
        tx.report(ProgressUpdate::new(ProgressPhase::Done, 100, "ignored"));
    }
}
