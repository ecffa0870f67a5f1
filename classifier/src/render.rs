//! Presentation of prediction outcomes.
//!
//! Renderers receive exactly one value per request: the prediction, or
//! `None` when anything along the way failed.

use std::io::{self, Write};

use nu_ansi_term::{Color, Style};
use serde::Serialize;

use crate::labels::ClassLabels;
use crate::postprocess::{Prediction, percent};

pub const ERROR_MESSAGE: &str = "Error in prediction.";

pub trait Render {
    fn render(&mut self, labels: &ClassLabels, outcome: Option<&Prediction>) -> io::Result<()>;
}

impl<R: Render + ?Sized> Render for Box<R> {
    fn render(&mut self, labels: &ClassLabels, outcome: Option<&Prediction>) -> io::Result<()> {
        (**self).render(labels, outcome)
    }
}

fn label_of(labels: &ClassLabels, ix: usize) -> &str {
    labels.get(ix).unwrap_or("<unknown>")
}

/// Human friendly output: the predicted label, then one bar per class.
#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    pub color: bool,
    pub bar_width: usize,
    pub top: Option<usize>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> TerminalRenderer<W> {
        TerminalRenderer { out, color: true, bar_width: 30, top: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color { style.paint(text).to_string() } else { text.to_string() }
    }

    fn bar(&self, pct: u32) -> String {
        let filled = ((pct as usize * self.bar_width) + 50) / 100;
        format!("{}{}", "█".repeat(filled), "░".repeat(self.bar_width - filled))
    }
}

impl<W: Write> Render for TerminalRenderer<W> {
    fn render(&mut self, labels: &ClassLabels, outcome: Option<&Prediction>) -> io::Result<()> {
        let Some(prediction) = outcome else {
            let message = self.paint(Color::Red.bold(), ERROR_MESSAGE);
            return writeln!(self.out, "{message}");
        };
        let highlight = Color::Blue.bold();
        let winner = self.paint(highlight, label_of(labels, prediction.predicted_class));
        writeln!(self.out, "Predicted Class: {winner}")?;

        let rows: Vec<(usize, f32)> = match self.top {
            Some(top) => prediction.ranked().into_iter().take(top).collect(),
            None => prediction.probabilities.iter().copied().enumerate().collect(),
        };
        let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        for (ix, probability) in rows {
            let pct = percent(probability);
            let name = format!("{:width$}", label_of(labels, ix).to_uppercase());
            let line = format!("{name} {} {pct:>3}%", self.bar(pct));
            let line = if ix == prediction.predicted_class {
                self.paint(highlight, &line)
            } else {
                line
            };
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonClass<'a> {
    label: &'a str,
    probability: f32,
    percent: u32,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonOutcome<'a> {
    Prediction { label: &'a str, predicted_class: usize, probabilities: Vec<JsonClass<'a>> },
    Error { error: &'static str },
}

/// Machine friendly output: one JSON object per line.
#[derive(Debug)]
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> JsonRenderer<W> {
        JsonRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Render for JsonRenderer<W> {
    fn render(&mut self, labels: &ClassLabels, outcome: Option<&Prediction>) -> io::Result<()> {
        let json = match outcome {
            Some(prediction) => JsonOutcome::Prediction {
                label: label_of(labels, prediction.predicted_class),
                predicted_class: prediction.predicted_class,
                probabilities: prediction
                    .probabilities
                    .iter()
                    .enumerate()
                    .map(|(ix, &probability)| JsonClass {
                        label: label_of(labels, ix),
                        probability,
                        percent: percent(probability),
                    })
                    .collect(),
            },
            None => JsonOutcome::Error { error: ERROR_MESSAGE },
        };
        serde_json::to_writer(&mut self.out, &json)?;
        writeln!(self.out)
    }
}
