//! Scores and filters candidate codes before they may reach a caller.

use std::sync::Arc;

use fysiocode_schema::Suggestion;
use fysiocode_taxonomy::CodeTable;

/// Fixed clinical vocabulary; one hit in a rationale earns a score bonus.
pub const CLINICAL_TERMS: &[&str] = &[
    "pees",
    "gewricht",
    "spier",
    "kapsel",
    "zenuw",
    "slijmbeurs",
    "kraakbeen",
    "ontsteking",
    "overbelasting",
    "belasting",
    "degeneratie",
    "tendinopathie",
    "artrose",
    "ruptuur",
    "radiculair",
];

/// The justificatory phrase the generative service is instructed to use.
const JUSTIFICATION_PHRASE: &str = "passend bij";

#[derive(Debug, Clone)]
pub struct CandidateCheck {
    pub code: String,
    pub valid: bool,
    pub score: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub checks: Vec<CandidateCheck>,
    pub invalid_codes: Vec<String>,
    pub warnings: Vec<String>,
    pub mean_score: f64,
    pub accepted: bool,
}

pub struct ResponseValidator {
    table: Arc<CodeTable>,
}

impl ResponseValidator {
    pub fn new(table: Arc<CodeTable>) -> Self {
        Self { table }
    }

    pub fn validate(&self, candidates: &[Suggestion]) -> ValidationOutcome {
        let mut checks = Vec::with_capacity(candidates.len());
        let mut invalid_codes = Vec::new();
        let mut warnings = Vec::new();

        for candidate in candidates {
            let check = self.check_candidate(candidate);
            if !check.valid {
                invalid_codes.push(check.code.clone());
            }
            checks.push(check);
        }

        if candidates.is_empty() {
            warnings.push("no valid suggestions".to_string());
        }

        let valid_scores: Vec<f64> = checks
            .iter()
            .filter(|c| c.valid)
            .map(|c| c.score)
            .collect();
        let mean_score = if valid_scores.is_empty() {
            0.0
        } else {
            valid_scores.iter().sum::<f64>() / valid_scores.len() as f64
        };

        let accepted = !checks.is_empty() && invalid_codes.is_empty() && mean_score > 0.5;
        if !accepted && !candidates.is_empty() {
            tracing::debug!(
                invalid = invalid_codes.len(),
                mean_score,
                "candidate set rejected by validation"
            );
        }

        ValidationOutcome {
            checks,
            invalid_codes,
            warnings,
            mean_score,
            accepted,
        }
    }

    fn check_candidate(&self, candidate: &Suggestion) -> CandidateCheck {
        if !CodeTable::is_wellformed(&candidate.code) {
            return CandidateCheck {
                code: candidate.code.clone(),
                valid: false,
                score: 0.0,
                reason: Some("not a 4-digit code".to_string()),
            };
        }
        if !self.table.exists(&candidate.code) {
            return CandidateCheck {
                code: candidate.code.clone(),
                valid: false,
                score: 0.0,
                reason: Some("code not present in the code table".to_string()),
            };
        }

        let rationale = candidate.rationale.to_lowercase();
        let rationale_len = candidate.rationale.chars().count();

        let mut score: f64 = 0.5;
        score += 0.1; // format check passed
        if rationale_len > 50 {
            score += 0.1;
        }
        if rationale_len > 100 {
            score += 0.1;
        }
        if rationale.contains(JUSTIFICATION_PHRASE) {
            score += 0.05;
        }
        if candidate.name.contains(&candidate.code) {
            score += 0.05;
        }
        if CLINICAL_TERMS.iter().any(|term| rationale.contains(term)) {
            score += 0.1;
        }

        CandidateCheck {
            code: candidate.code.clone(),
            valid: true,
            score: score.min(1.0),
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ResponseValidator {
        ResponseValidator::new(Arc::new(CodeTable::new()))
    }

    fn candidate(code: &str, name: &str, rationale: &str) -> Suggestion {
        Suggestion::new(code, name, rationale, 0.8)
    }

    #[test]
    fn bare_valid_candidate_scores_point_six() {
        // 0.5 base + 0.1 format; the short rationale earns nothing extra.
        let outcome = validator().validate(&[candidate("7920", "X", "sluit aan")]);
        assert!(outcome.accepted);
        assert!(outcome.invalid_codes.is_empty());
        assert!((outcome.checks[0].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn malformed_code_is_invalid() {
        let outcome = validator().validate(&[candidate("79a0", "X", "r")]);
        assert!(!outcome.accepted);
        assert_eq!(outcome.invalid_codes, vec!["79a0".to_string()]);
        assert_eq!(
            outcome.checks[0].reason.as_deref(),
            Some("not a 4-digit code")
        );
    }

    #[test]
    fn unknown_code_is_invalid() {
        let outcome = validator().validate(&[candidate("9999", "X", "r")]);
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.checks[0].reason.as_deref(),
            Some("code not present in the code table")
        );
    }

    #[test]
    fn one_invalid_code_rejects_the_whole_set() {
        let outcome = validator().validate(&[
            candidate("7920", "Knie - tendinopathie", "sluit aan"),
            candidate("9999", "X", "r"),
        ]);
        assert!(!outcome.accepted);
        assert_eq!(outcome.invalid_codes.len(), 1);
    }

    #[test]
    fn score_is_monotonic_across_length_thresholds() {
        // Neutral filler avoids the clinical vocabulary and the
        // justification phrase so only length varies.
        let short = "a".repeat(40);
        let medium = "a".repeat(60);
        let long = "a".repeat(120);

        let v = validator();
        let s_short = v.validate(&[candidate("7920", "X", &short)]).checks[0].score;
        let s_medium = v.validate(&[candidate("7920", "X", &medium)]).checks[0].score;
        let s_long = v.validate(&[candidate("7920", "X", &long)]).checks[0].score;

        assert!((s_short - 0.6).abs() < 1e-9);
        assert!((s_medium - 0.7).abs() < 1e-9);
        assert!((s_long - 0.8).abs() < 1e-9);
        assert!(s_short <= s_medium && s_medium <= s_long);
    }

    #[test]
    fn justification_phrase_and_clinical_term_earn_bonuses() {
        let v = validator();
        let plain = v.validate(&[candidate("7920", "X", "korte uitleg")]).checks[0].score;
        let phrased = v
            .validate(&[candidate("7920", "X", "passend bij de klacht")])
            .checks[0]
            .score;
        let clinical = v
            .validate(&[candidate("7920", "X", "de pees is overbelast")])
            .checks[0]
            .score;

        assert!((phrased - plain - 0.05).abs() < 1e-9);
        assert!((clinical - plain - 0.1).abs() < 1e-9);
    }

    #[test]
    fn name_containing_code_earns_bonus() {
        let v = validator();
        let without = v.validate(&[candidate("7920", "Knie", "uitleg")]).checks[0].score;
        let with = v
            .validate(&[candidate("7920", "Knie (7920)", "uitleg")])
            .checks[0]
            .score;
        assert!((with - without - 0.05).abs() < 1e-9);
    }

    #[test]
    fn score_is_capped_at_one() {
        let rationale = format!(
            "{} passend bij een tendinopathie van de pees door overbelasting van het gewricht",
            "x".repeat(80)
        );
        let outcome = validator().validate(&[candidate("7920", "Knie 7920", &rationale)]);
        assert!(outcome.checks[0].score <= 1.0);
    }

    #[test]
    fn empty_candidate_set_warns_and_rejects() {
        let outcome = validator().validate(&[]);
        assert!(!outcome.accepted);
        assert_eq!(outcome.warnings, vec!["no valid suggestions".to_string()]);
        assert_eq!(outcome.mean_score, 0.0);
    }

    #[test]
    fn mean_score_gates_acceptance() {
        // Two bare candidates score 0.6 each; mean 0.6 > 0.5 accepts.
        let outcome = validator().validate(&[
            candidate("7920", "X", "kort"),
            candidate("3470", "Y", "kort"),
        ]);
        assert!(outcome.accepted);
        assert!((outcome.mean_score - 0.6).abs() < 1e-9);
    }
}
