//! The fixed, ordered list of analysis stages.
//!
//! Order is significant: the sequence runs stages by ordinal and the report
//! lists sections by ordinal, whatever order they completed in. The last
//! stage, `final-report`, is written to synthesize the other nine.

use crate::error::SidekickError;
use crate::prompts;
use serde::Serialize;

/// Static descriptor for one analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisStage {
    /// Unique key, also the `type` sent to the analysis relay.
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// Zero-based position in the sequence.
    pub ordinal: usize,
    #[serde(skip)]
    pub prompt: &'static str,
}

/// All ten stages in sequence order.
pub static STAGES: [AnalysisStage; 10] = [
    AnalysisStage {
        id: "jtbd-analysis",
        label: "JTBD Goal Analysis",
        description: "Analyzes the transcript to identify and extract Jobs-to-be-Done (JTBD) goals mentioned by the interviewee",
        ordinal: 0,
        prompt: prompts::JTBD_GOALS,
    },
    AnalysisStage {
        id: "gain-extractor",
        label: "JTBD Gains Analysis",
        description: "Identifies and analyzes potential gains or positive outcomes that the interviewee hopes to achieve, aligning with the Jobs-to-be-Done framework",
        ordinal: 1,
        prompt: prompts::JTBD_GAINS,
    },
    AnalysisStage {
        id: "needs",
        label: "Needs Analysis Agent",
        description: "Analyzes discovery call transcripts to identify both immediate and latent needs, examining indicators like urgency, metrics, stakeholder requirements, and potential future risks.",
        ordinal: 2,
        prompt: prompts::NEEDS_ANALYSIS,
    },
    AnalysisStage {
        id: "pain-extractor",
        label: "JTBD Pains Analysis",
        description: "Identifies and analyzes the pains, challenges, or frustrations mentioned by the interviewee, aligning with the Jobs-to-be-Done framework",
        ordinal: 3,
        prompt: prompts::JTBD_PAINS,
    },
    AnalysisStage {
        id: "friction",
        label: "Preventions of Progress Analysis",
        description: "Identifies and analyzes the obstacles or frictions that prevent the interviewee from making progress towards their goals, aligning with the Jobs-to-be-Done framework",
        ordinal: 4,
        prompt: prompts::FRICTION,
    },
    AnalysisStage {
        id: "pain-assessment",
        label: "Problem Severity Scoring Agent",
        description: "Systematically evaluates and compares how an individual perceives and expresses the pain level of their problems using a Pain Level Scoring Rubric.",
        ordinal: 5,
        prompt: prompts::PAIN_ASSESSMENT,
    },
    AnalysisStage {
        id: "curse",
        label: "CURSE Problem Analyst",
        description: "Evaluates customer pain points using a comprehensive 5-level scoring system to determine problem severity, urgency, and readiness to purchase. Analyzes if problems are Crucial, Ubiquitous, Recurring, Specific, and Extreme.",
        ordinal: 6,
        prompt: prompts::CURSE,
    },
    AnalysisStage {
        id: "demand",
        label: "Demand Analyst",
        description: "Analyzes sales conversation transcripts to determine customer position in the buying cycle, evaluating Learning Demand (6-24mo), Solution Demand (3-6mo), or Vendor Demand (1-3mo) levels with supporting evidence and confidence scoring.",
        ordinal: 7,
        prompt: prompts::DEMAND,
    },
    AnalysisStage {
        id: "opportunity",
        label: "Opportunity Qualification Agent",
        description: "Evaluates if the interviewee represents a qualified opportunity based on problem experience, active search, and problem fit",
        ordinal: 8,
        prompt: prompts::OPPORTUNITY,
    },
    AnalysisStage {
        id: "final-report",
        label: "Final Report",
        description: "Comprehensive summary of all analyses",
        ordinal: 9,
        prompt: prompts::FINAL_REPORT,
    },
];

/// Find a stage by id.
pub fn find(id: &str) -> Option<&'static AnalysisStage> {
    STAGES.iter().find(|s| s.id == id)
}

/// Find a stage by id, failing with a contract error for unknown ids.
pub fn lookup(id: &str) -> Result<&'static AnalysisStage, SidekickError> {
    find(id).ok_or_else(|| SidekickError::UnknownStage { id: id.to_string() })
}

/// The stage shown when a session opens.
pub fn first() -> &'static AnalysisStage {
    &STAGES[0]
}
