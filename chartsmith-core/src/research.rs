//! Shape check for the research text handed to the chart-code stage.
//!
//! The research prompt asks for four sections. Nothing forces the model to
//! comply, so the outline records which sections are recognisable. The
//! pipeline either logs the result or, when configured, refuses to generate
//! code from research that lacks a section.

use serde::Serialize;

/// One of the four sections the research prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchSection {
    Summary,
    KeyNumbers,
    ChartType,
    DataStructure,
}

impl ResearchSection {
    pub const ALL: [ResearchSection; 4] = [
        ResearchSection::Summary,
        ResearchSection::KeyNumbers,
        ResearchSection::ChartType,
        ResearchSection::DataStructure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResearchSection::Summary => "Data Summary",
            ResearchSection::KeyNumbers => "Key Numbers/Statistics",
            ResearchSection::ChartType => "Recommended Chart Type",
            ResearchSection::DataStructure => "Data Structure for Visualization",
        }
    }

    /// Lowercase phrases any one of which marks the section as present.
    fn markers(self) -> &'static [&'static str] {
        match self {
            ResearchSection::Summary => &["data summary", "summary"],
            ResearchSection::KeyNumbers => &["key numbers", "statistics", "key figures"],
            ResearchSection::ChartType => &["chart type", "recommended chart"],
            ResearchSection::DataStructure => &["data structure", "data layout"],
        }
    }
}

/// Which requested sections a research text contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResearchOutline {
    pub present: Vec<ResearchSection>,
}

impl ResearchOutline {
    pub fn inspect(text: &str) -> Self {
        let lower = text.to_lowercase();
        let present = ResearchSection::ALL
            .into_iter()
            .filter(|section| section.markers().iter().any(|m| lower.contains(m)))
            .collect();
        Self { present }
    }

    pub fn missing(&self) -> Vec<ResearchSection> {
        ResearchSection::ALL
            .into_iter()
            .filter(|s| !self.present.contains(s))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.present.len() == ResearchSection::ALL.len()
    }

    /// Comma-separated labels of the missing sections.
    pub fn missing_labels(&self) -> String {
        self.missing()
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
