use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::monitor::{FrameOutcome, FrameReport};
use crate::tracker::TransitionEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal status panel for the live loop.
///
/// Pretty mode keeps one spinner line updated every frame. Plain mode prints
/// a line only for frames worth reading: transitions, leaving, skips.
pub struct StatusDisplay {
    spinner: Option<ProgressBar>,
}

impl StatusDisplay {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty && matches!(mode, UiMode::Pretty | UiMode::Auto);
        let spinner = use_pretty.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner
        });
        Self { spinner }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    pub fn is_pretty(&self) -> bool {
        self.spinner.is_some()
    }

    pub fn show(&self, outcome: &FrameOutcome) {
        match &self.spinner {
            Some(spinner) => {
                if let Some(line) = status_line(outcome) {
                    spinner.set_message(line);
                }
            }
            None => {
                if is_noteworthy(outcome) {
                    if let Some(line) = status_line(outcome) {
                        eprintln!("{line}");
                    }
                }
            }
        }
    }

    pub fn finish(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message.to_string()),
            None => eprintln!("{message}"),
        }
    }
}

fn is_noteworthy(outcome: &FrameOutcome) -> bool {
    match outcome {
        FrameOutcome::Processed(report) => report.leaving || !report.transitions().is_empty(),
        FrameOutcome::Skipped { .. } => true,
        FrameOutcome::NoFrame => false,
    }
}

/// One-line summary of a tick, or `None` when there was no frame.
pub fn status_line(outcome: &FrameOutcome) -> Option<String> {
    match outcome {
        FrameOutcome::Processed(report) => Some(report_line(report)),
        FrameOutcome::Skipped { sequence, reason } => {
            Some(format!("frame {sequence} | skipped: {reason}"))
        }
        FrameOutcome::NoFrame => None,
    }
}

fn report_line(report: &FrameReport) -> String {
    let persons = report
        .persons
        .iter()
        .map(|p| match p.transition {
            TransitionEvent::StandingUp => format!("{}:{} (stood up)", p.slot, p.label),
            TransitionEvent::SittingDown => format!("{}:{} (sat down)", p.slot, p.label),
            TransitionEvent::None => format!("{}:{}", p.slot, p.label),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let mut line = format!(
        "frame {} | [{}] | {}",
        report.sequence,
        persons,
        report.inference_text()
    );
    if report.leaving {
        line.push_str(" | LEAVING DESK");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::posture::PostureLabel;
    use crate::tracker::TrackedPerson;

    #[test]
    fn status_line_lists_slots_and_alerts() {
        let report = FrameReport {
            sequence: 4,
            persons: vec![TrackedPerson {
                slot: 0,
                bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                label: PostureLabel::Sitting,
                transition: TransitionEvent::SittingDown,
            }],
            leaving: true,
            inference: Duration::from_millis(120),
        };
        let outcome = FrameOutcome::Processed(report);
        assert_eq!(
            status_line(&outcome).unwrap(),
            "frame 4 | [0:sitting (sat down)] | Inference time 0.12 seconds | LEAVING DESK"
        );
        assert!(is_noteworthy(&outcome));
        assert!(status_line(&FrameOutcome::NoFrame).is_none());
    }

    #[test]
    fn non_tty_never_uses_spinner() {
        assert!(!StatusDisplay::from_args(Some("pretty"), false).is_pretty());
        assert!(!StatusDisplay::from_args(Some("plain"), true).is_pretty());
    }
}
