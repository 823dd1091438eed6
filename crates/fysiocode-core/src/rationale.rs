//! Builds structured clinical rationales for accepted candidate codes.
//!
//! Fixed template tables keyed by the two code segments produce the
//! anatomical and pathophysiological sentences; a keyword scan over the
//! original query adds clinical reasoning; adjacency tables supply
//! alternative codes worth considering.

use std::sync::Arc;

use fysiocode_schema::DetailedRationale;
use fysiocode_taxonomy::CodeTable;

use crate::validator::CLINICAL_TERMS;

/// Anatomical-basis sentences per location segment.
const LOCATION_TEMPLATES: &[(&str, &str)] = &[
    (
        "21",
        "Het schoudergewricht ontleent zijn stabiliteit grotendeels aan de rotator cuff en het kapsel.",
    ),
    (
        "23",
        "De elleboog combineert een scharniergewricht met de aanhechting van de pols- en vingerstrekkers.",
    ),
    (
        "25",
        "De pols bundelt veel pezen en de nervus medianus in een klein anatomisch compartiment.",
    ),
    (
        "30",
        "De cervicale wervelkolom draagt het hoofd en geeft de zenuwwortels voor de arm af.",
    ),
    (
        "34",
        "De lumbale wervelkolom vangt de grootste axiale belasting van de romp op.",
    ),
    (
        "36",
        "Het bekken en SI-gewricht vormen de krachtoverdracht tussen romp en benen.",
    ),
    (
        "70",
        "De heupregio verbindt romp en been via een kogelgewricht met sterke spieraanhechtingen.",
    ),
    (
        "74",
        "De enkel stabiliseert het lichaam op een klein steunvlak via banden en peesplaten.",
    ),
    (
        "79",
        "De knie is een scharniergewricht waarin het strekapparaat en de banden de belasting opvangen.",
    ),
];

/// Pathophysiology sentences per pathology segment.
const PATHOLOGY_TEMPLATES: &[(&str, &str)] = &[
    (
        "01",
        "Artrose berust op kraakbeenverlies met reactieve botvorming en startstijfheid.",
    ),
    (
        "02",
        "Artritis is een ontsteking van het gewricht met zwelling, warmte en rustpijn.",
    ),
    (
        "20",
        "Tendinopathie ontstaat door degeneratie van peesweefsel bij herhaalde overbelasting.",
    ),
    (
        "21",
        "Bursitis is een prikkeling van de slijmbeurs die drukpijn en bewegingsbeperking geeft.",
    ),
    (
        "26",
        "Myalgie en spierhypertonie passen bij aanhoudende spierspanning zonder structureel letsel.",
    ),
    (
        "27",
        "Een spier- of peesruptuur geeft acuut krachtsverlies na een duidelijk scheurmoment.",
    ),
    (
        "31",
        "Een distorsie rekt het kapsel en de banden op met zwelling en belastingspijn als gevolg.",
    ),
    (
        "36",
        "Na een fractuur richt de nabehandeling zich op belastingopbouw en mobiliteit.",
    ),
    (
        "38",
        "Een contusie is een kneuzing van weke delen na direct inwerkend geweld.",
    ),
    (
        "70",
        "Een radiculair syndroom ontstaat door prikkeling van een zenuwwortel met uitstralende pijn.",
    ),
    (
        "90",
        "Aspecifieke klachten missen een aanwijsbaar substraat en worden functioneel benaderd.",
    ),
];

/// Location segments that are commonly confused with each other.
const LOCATION_NEIGHBORS: &[(&str, &[&str])] = &[
    ("21", &["20", "22"]),
    ("23", &["22", "24"]),
    ("25", &["24", "26"]),
    ("30", &["31"]),
    ("34", &["35", "36"]),
    ("70", &["71", "36"]),
    ("74", &["73", "75"]),
    ("79", &["71", "73"]),
];

/// Pathology classes that present similarly.
const PATHOLOGY_NEIGHBORS: &[(&str, &[&str])] = &[
    ("01", &["02", "22"]),
    ("20", &["21", "26"]),
    ("26", &["20"]),
    ("31", &["38", "27"]),
    ("38", &["31"]),
    ("70", &["71"]),
    ("90", &["26", "20"]),
];

struct QuerySignal {
    label: &'static str,
    keywords: &'static [&'static str],
    reasoning: &'static str,
}

const QUERY_SIGNALS: &[QuerySignal] = &[
    QuerySignal {
        label: "pijnkwaliteit",
        keywords: &["zeurend", "stekend", "brandend", "dof", "scherp", "kloppend"],
        reasoning: "De beschreven pijnkwaliteit past bij een lokaal musculoskeletaal probleem.",
    },
    QuerySignal {
        label: "mechanisme",
        keywords: &[
            "traplopen",
            "sporten",
            "tillen",
            "lopen",
            "hardlopen",
            "val",
            "gevallen",
            "werk",
            "fietsen",
        ],
        reasoning:
            "De klacht is gekoppeld aan een duidelijk belastingsmoment, wat een mechanische oorzaak ondersteunt.",
    },
    QuerySignal {
        label: "beloop",
        keywords: &[
            "acuut", "plots", "sinds", "weken", "maanden", "jaren", "chronisch", "langzaam",
        ],
        reasoning:
            "Het beschreven beloop helpt bij het onderscheid tussen acute en degeneratieve pathologie.",
    },
];

const SUMMARY_LIMIT: usize = 150;

/// Context a rationale is generated against.
#[derive(Debug, Clone, Default)]
pub struct RationaleContext {
    /// The complete query text accumulated over the conversation.
    pub query_text: String,
    /// Structured patient facts, typically clarification answers.
    pub patient_notes: Vec<String>,
}

/// Internal quality gate result; logged, never surfaced to callers.
#[derive(Debug, Clone)]
pub struct RationaleQuality {
    pub complete: bool,
    pub issues: Vec<String>,
}

pub struct RationaleGenerator {
    table: Arc<CodeTable>,
}

impl RationaleGenerator {
    pub fn new(table: Arc<CodeTable>) -> Self {
        Self { table }
    }

    pub fn generate(&self, code: &str, context: &RationaleContext) -> DetailedRationale {
        let entry = self.table.lookup(code);
        let (location, pathology) = match &entry {
            Some(e) => (e.location.clone(), e.pathology.clone()),
            None => ("de aangegeven regio".to_string(), "de klacht".to_string()),
        };
        let segments = CodeTable::split(code);

        let anatomy = segments
            .and_then(|(loc, _)| table_get(LOCATION_TEMPLATES, loc))
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("De regio {location} omvat de betrokken gewrichts- en wekedelenstructuren.")
            });
        let pathophysiology = segments
            .and_then(|(_, pat)| table_get(PATHOLOGY_TEMPLATES, pat))
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("Het beeld van {} past bij de beschreven klacht.", pathology.to_lowercase())
            });

        let normalized = context.query_text.to_lowercase();
        let mut reasoning_sentences = Vec::new();
        let mut confidence_factors =
            vec![format!("Beide segmenten van code {code} bestaan in de codetabel.")];
        let mut reasoning_steps = vec![
            format!("Locatie herkend: {location}."),
            format!("Pathologieklasse herkend: {}.", pathology.to_lowercase()),
        ];

        for signal in QUERY_SIGNALS {
            if let Some(kw) = signal.keywords.iter().find(|kw| normalized.contains(*kw)) {
                reasoning_sentences.push(signal.reasoning.to_string());
                reasoning_steps.push(format!(
                    "Signaal in de klacht ({}): '{kw}'.",
                    signal.label
                ));
                confidence_factors.push(format!(
                    "Klachtbeschrijving bevat een {}-signaal ('{kw}').",
                    signal.label
                ));
            }
        }
        if reasoning_sentences.is_empty() {
            reasoning_sentences.push(format!(
                "De combinatie van locatie en pathologie sluit aan bij de beschreven klacht, passend bij {}.",
                pathology.to_lowercase()
            ));
        }

        let summary = sentence_safe(
            &format!("{pathophysiology} {anatomy}"),
            SUMMARY_LIMIT,
        )
        .unwrap_or_else(|| {
            let name = entry
                .as_ref()
                .map(|e| e.display_name())
                .unwrap_or_else(|| code.to_string());
            format!("Past bij {name}.")
        });

        let mut extended = format!(
            "Anatomische basis: {anatomy}\nPathofysiologie: {pathophysiology}\nKlinische redenering: {}",
            reasoning_sentences.join(" ")
        );
        if !context.patient_notes.is_empty() {
            extended.push_str(&format!(
                "\nPatiëntcontext: {}",
                context.patient_notes.join(" ")
            ));
        }

        DetailedRationale {
            summary,
            extended,
            reasoning_steps,
            confidence_factors,
            alternatives: self.alternatives(code),
        }
    }

    /// Neighbouring codes from the adjacency tables, filtered to codes that
    /// actually exist.
    fn alternatives(&self, code: &str) -> Vec<String> {
        let Some((loc, pat)) = CodeTable::split(code) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if let Some(neighbors) = table_get_slice(PATHOLOGY_NEIGHBORS, pat) {
            for alt_pat in neighbors {
                if let Some(entry) = self.table.compose(loc, alt_pat) {
                    out.push(entry.code);
                }
            }
        }
        if let Some(neighbors) = table_get_slice(LOCATION_NEIGHBORS, loc) {
            for alt_loc in neighbors {
                if let Some(entry) = self.table.compose(alt_loc, pat) {
                    out.push(entry.code);
                }
            }
        }
        out.dedup();
        out.truncate(4);
        out
    }
}

/// Completeness gate used for internal quality logging.
pub fn validate_rationale(rationale: &DetailedRationale) -> RationaleQuality {
    let mut issues = Vec::new();
    if rationale.summary.chars().count() < 20 {
        issues.push("summary too short".to_string());
    }
    let haystack = format!("{} {}", rationale.summary, rationale.extended).to_lowercase();
    if !CLINICAL_TERMS.iter().any(|term| haystack.contains(term)) {
        issues.push("no clinical terminology".to_string());
    }
    if rationale.reasoning_steps.len() < 2 {
        issues.push("fewer than two reasoning steps".to_string());
    }
    if rationale.confidence_factors.is_empty() {
        issues.push("no confidence factors".to_string());
    }
    RationaleQuality {
        complete: issues.is_empty(),
        issues,
    }
}

/// Keep whole sentences while the total stays within `limit` characters.
/// Returns `None` when not even the first sentence fits.
fn sentence_safe(text: &str, limit: usize) -> Option<String> {
    let mut out = String::new();
    let mut out_chars = 0;
    for sentence in split_sentences(text) {
        let sep = usize::from(!out.is_empty());
        let len = sentence.chars().count();
        if out_chars + sep + len > limit {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(sentence);
        out_chars += sep + len;
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn table_get(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn table_get_slice(
    table: &'static [(&'static str, &'static [&'static str])],
    key: &str,
) -> Option<&'static [&'static str]> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
