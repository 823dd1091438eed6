//! Deterministic keyword fallback for when the generative path is
//! unavailable or rejected.
//!
//! Ordered rules extract body-location and pathology signals from normalized
//! text and compose candidate codes from the code table. Given the same text
//! and table this engine always produces the same answer, which is what makes
//! it a safe terminal fallback.

use std::sync::Arc;

use fysiocode_schema::Suggestion;
use fysiocode_taxonomy::CodeTable;

/// Location rules, most specific keywords first.
const LOCATION_RULES: &[(&[&str], &str)] = &[
    (&["knie", "patella", "knieschijf"], "79"),
    (&["schouder"], "21"),
    (&["nek", "cervica"], "30"),
    (&["onderrug", "lage rug", "lumba"], "34"),
    (&["bekken", "si-gewricht", "stuit"], "36"),
    (&["rug", "thoraca"], "32"),
    (&["elleboog"], "23"),
    (&["pols"], "25"),
    (&["hand", "vinger", "duim"], "26"),
    (&["heup", "lies"], "70"),
    (&["hamstring", "bovenbeen", "dij"], "71"),
    (&["kuit", "scheen", "onderbeen"], "73"),
    (&["enkel"], "74"),
    (&["voet", "teen", "hiel"], "75"),
    (&["bovenarm"], "22"),
    (&["onderarm"], "24"),
    (&["rib", "borstkas"], "33"),
    (&["hoofd"], "10"),
    (&["kaak"], "11"),
];

/// Pathology and mechanism rules.
const PATHOLOGY_RULES: &[(&[&str], &str)] = &[
    (
        &["pees", "tendin", "traplopen", "overbelast", "opstarten"],
        "20",
    ),
    (&["artrose", "slijtage"], "01"),
    (&["artritis", "ontstoken", "ontsteking"], "02"),
    (&["slijmbeurs", "bursitis"], "21"),
    (&["verzwikt", "verstuikt", "omgeslagen", "distorsie"], "31"),
    (&["uit de kom", "luxatie"], "32"),
    (&["breuk", "gebroken", "fractuur", "gips"], "36"),
    (&["kneuzing", "gestoten", "gevallen", "contusie"], "38"),
    (&["gescheurd", "scheur", "ruptuur", "zweepslag"], "27"),
    (&["uitstraling", "uitstralend", "ischias", "hernia"], "70"),
    (&["tinteling", "doof gevoel", "slapend gevoel"], "71"),
    (&["spierpijn", "verkramp", "hypertonie", "spierspanning"], "26"),
];

/// Words that indicate the text describes a complaint at all.
const COMPLAINT_KEYWORDS: &[&str] = &[
    "pijn",
    "klacht",
    "zeer",
    "last",
    "stijf",
    "zwelling",
    "gezwollen",
    "instabiel",
    "tinteling",
    "krachtsverlies",
    "beperkt",
];

/// Pathology segments tried when the text names a location but no pathology.
const DEFAULT_PATHOLOGIES: &[(&str, f64)] = &[("90", 0.55), ("20", 0.5)];

const COMBINED_MATCH_CONFIDENCE: f64 = 0.75;
const MAX_SUGGESTIONS: usize = 3;

const QUESTION_MORE_DETAIL: &str = "Kunt u uw klacht iets uitgebreider beschrijven? \
Bijvoorbeeld waar de klacht zit, hoe die is ontstaan en wanneer u er last van heeft.";
const QUESTION_LOCATION: &str = "Waar in het lichaam zit de klacht precies? \
Bijvoorbeeld knie, schouder of onderrug.";

#[derive(Debug, Clone)]
pub struct PatternAnalysis {
    pub suggestions: Vec<Suggestion>,
    pub needs_clarification: bool,
    pub clarifying_question: Option<String>,
}

impl PatternAnalysis {
    fn clarify(question: &str) -> Self {
        Self {
            suggestions: Vec::new(),
            needs_clarification: true,
            clarifying_question: Some(question.to_string()),
        }
    }
}

pub struct PatternEngine {
    table: Arc<CodeTable>,
}

impl PatternEngine {
    pub fn new(table: Arc<CodeTable>) -> Self {
        Self { table }
    }

    pub fn analyze(&self, text: &str) -> PatternAnalysis {
        let normalized = text.to_lowercase();

        if normalized.split_whitespace().count() < 3 {
            return PatternAnalysis::clarify(QUESTION_MORE_DETAIL);
        }
        if !COMPLAINT_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            return PatternAnalysis::clarify(QUESTION_MORE_DETAIL);
        }

        let locations = match_rules(LOCATION_RULES, &normalized);
        let pathologies = match_rules(PATHOLOGY_RULES, &normalized);

        if locations.is_empty() {
            if pathologies.is_empty() {
                return PatternAnalysis::clarify(QUESTION_MORE_DETAIL);
            }
            return PatternAnalysis::clarify(QUESTION_LOCATION);
        }

        let mut suggestions = Vec::new();
        if pathologies.is_empty() {
            // Location without pathology: fall back to the default set at
            // reduced confidence.
            for (loc_seg, loc_kw) in &locations {
                for (pat_seg, confidence) in DEFAULT_PATHOLOGIES {
                    if let Some(entry) = self.table.compose(loc_seg, pat_seg) {
                        suggestions.push(Suggestion::new(
                            entry.code.clone(),
                            entry.display_name(),
                            format!(
                                "Patroonherkenning: '{loc_kw}' wijst op de regio {}; \
zonder duidelijk letselmechanisme is {} een voor de hand liggende klasse.",
                                entry.location,
                                entry.pathology.to_lowercase()
                            ),
                            *confidence,
                        ));
                    }
                }
            }
        } else {
            for (loc_seg, loc_kw) in &locations {
                for (pat_seg, pat_kw) in &pathologies {
                    if let Some(entry) = self.table.compose(loc_seg, pat_seg) {
                        suggestions.push(Suggestion::new(
                            entry.code.clone(),
                            entry.display_name(),
                            format!(
                                "Patroonherkenning: '{loc_kw}' wijst op de regio {}; \
'{pat_kw}' past bij {}.",
                                entry.location,
                                entry.pathology.to_lowercase()
                            ),
                            COMBINED_MATCH_CONFIDENCE,
                        ));
                    }
                }
            }
        }

        if suggestions.is_empty() {
            // Signals found but no composable code, ask rather than guess.
            return PatternAnalysis::clarify(QUESTION_LOCATION);
        }

        suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(MAX_SUGGESTIONS);

        PatternAnalysis {
            suggestions,
            needs_clarification: false,
            clarifying_question: None,
        }
    }
}

/// Apply rules in order; each segment matches at most once, keyed by the
/// first keyword that hit.
fn match_rules<'a>(
    rules: &'a [(&'a [&'a str], &'a str)],
    normalized: &str,
) -> Vec<(&'a str, &'a str)> {
    let mut matches = Vec::new();
    for (keywords, segment) in rules {
        if matches.iter().any(|(seg, _)| seg == segment) {
            continue;
        }
        if let Some(kw) = keywords.iter().find(|kw| normalized.contains(*kw)) {
            matches.push((*segment, *kw));
        }
    }
    matches
}
