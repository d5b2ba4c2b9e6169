//! Transcript management
//!
//! Append-only log of the run: instructions first, then the reasoning text and
//! observation of every iteration. Its rendering is the backend's whole input.

use std::fmt;

use crate::core::{PatientId, ToolResult};

/// What a transcript segment holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Instructions,
    Reasoning,
    Observation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    kind: SegmentKind,
    text: String,
}

/// Owned by exactly one run; never rewritten
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    segments: Vec<Segment>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript holding the instructions and the patient to analyse
    pub fn seeded(instructions: &str, patient_id: PatientId) -> Self {
        let mut transcript = Self::new();
        transcript.append(
            SegmentKind::Instructions,
            format!(
                "{}\n\nBegin analysis for patient_id: {}",
                instructions.trim_end(),
                patient_id
            ),
        );
        transcript
    }

    /// Add a segment at the end
    pub fn append(&mut self, kind: SegmentKind, text: impl Into<String>) {
        self.segments.push(Segment {
            kind,
            text: text.into(),
        });
    }

    /// Record one reasoning step and what its action produced
    pub fn record_step(&mut self, reasoning: impl Into<String>, result: &ToolResult) {
        self.append(SegmentKind::Reasoning, reasoning);
        self.append(SegmentKind::Observation, result.observation());
    }

    /// Full text, in insertion order
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Observation segments, oldest first
    pub fn observations(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Observation)
            .map(|s| s.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
