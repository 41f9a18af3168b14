//! Predicate chain.
//!
//! A chain is an ordered list of steps applied to each record's
//! content. The first failing step decides the record's counter tag
//! and aborts it; masking steps rewrite the content and never reject.
use crate::error::Error;
use crate::filtering::gopher::{GopherQuality, Reason};
use crate::filtering::pii;
use crate::identifiers::{PredictorKind, Registry};

/// Confidence a classifier must clear before its verdict counts.
pub const CLASSIFIER_THRESHOLD: f32 = 0.8;

pub enum Step {
    /// Keep records identified as the wanted language with enough
    /// confidence.
    Language { lang: String, threshold: f32 },
    /// Gopher quality heuristics.
    Quality(GopherQuality),
    /// Rewrite emails, phone numbers and IP addresses. Never rejects.
    MaskPii,
    /// Drop records the nsfw classifier is confident about.
    Nsfw { threshold: f32 },
    /// Drop records the toxicity classifier is confident about.
    Toxic { threshold: f32 },
    /// Keep records the quality classifier scores positive.
    ModelQuality { kind: PredictorKind },
}

impl Step {
    /// Apply to a record's content. `Ok(None)` means pass; a label
    /// names the failing predicate for counter reporting.
    pub fn apply(&self, registry: &Registry, content: &mut String) -> Result<Option<String>, Error> {
        match self {
            Step::Language { lang, threshold } => {
                match registry.predict(PredictorKind::Lang, content)? {
                    Some(p) if p.label == *lang && p.prob >= *threshold => Ok(None),
                    _ => Ok(Some("language".to_string())),
                }
            }
            Step::Quality(quality) => match quality.check(content) {
                Reason::Ok => Ok(None),
                reason => Ok(Some(format!("quality_{}", reason.tag()))),
            },
            Step::MaskPii => {
                let (masked, _) = pii::mask_email(content);
                let (masked, _) = pii::mask_phone_numbers(&masked);
                let (masked, _) = pii::mask_ip_addresses(&masked);
                *content = masked;
                Ok(None)
            }
            Step::Nsfw { threshold } => {
                match registry.predict(PredictorKind::Nsfw, content)? {
                    Some(p) if p.label == "nsfw" && p.prob > *threshold => {
                        Ok(Some("nsfw".to_string()))
                    }
                    _ => Ok(None),
                }
            }
            Step::Toxic { threshold } => {
                match registry.predict(PredictorKind::Toxic, content)? {
                    Some(p) if p.label == "toxic" && p.prob > *threshold => {
                        Ok(Some("toxic".to_string()))
                    }
                    _ => Ok(None),
                }
            }
            Step::ModelQuality { kind } => {
                // quality classifiers are trained on flattened
                // lowercased text
                let prepared = content.to_lowercase();
                match registry.predict(*kind, &prepared)? {
                    Some(p) if p.label == "positive" => Ok(None),
                    _ => Ok(Some("quality_model".to_string())),
                }
            }
        }
    }
}

pub struct Chain {
    steps: Vec<Step>,
}

impl Chain {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The default chain: English identification, then Gopher quality.
    pub fn with_min_words(min_words: usize) -> Self {
        Self::new(vec![
            Step::Language {
                lang: "en".to_string(),
                threshold: CLASSIFIER_THRESHOLD,
            },
            Step::Quality(GopherQuality::with_min_words(min_words)),
        ])
    }

    /// Run the chain in order, short-circuiting on the first failure.
    /// Returns the prefixed counter tag of the failing step, or `None`
    /// if every step passed.
    pub fn apply(&self, registry: &Registry, content: &mut String) -> Result<Option<String>, Error> {
        for (position, step) in self.steps.iter().enumerate() {
            if let Some(label) = step.apply(registry, content)? {
                return Ok(Some(format!("{:02}_{}", position + 2, label)));
            }
        }
        Ok(None)
    }

    /// Tag accounting records that survived every step.
    pub fn passed_tag(&self) -> String {
        format!("{:02}_passed", self.steps.len() + 2)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::with_min_words(50)
    }
}

#[cfg(test)]
mod tests {
    use super::{Chain, Step};
    use crate::filtering::gopher::GopherQuality;
    use crate::identifiers::{with_registry, ModelPaths};

    #[test]
    fn test_first_failure_wins() {
        // no models needed: quality fails before anything else runs
        let chain = Chain::new(vec![
            Step::Quality(GopherQuality::with_min_words(50)),
            Step::MaskPii,
        ]);
        let mut content = "way too short".to_string();

        let tag = with_registry(&ModelPaths::default(), |registry| {
            chain.apply(registry, &mut content)
        })
        .unwrap();

        assert_eq!(tag.as_deref(), Some("02_quality_too_short"));
        // the record was aborted before masking could rewrite it
        assert_eq!(content, "way too short");
    }

    #[test]
    fn test_mask_step_rewrites_and_passes() {
        let chain = Chain::new(vec![Step::MaskPii]);
        let mut content = "mail a.b@c.io now".to_string();

        let tag = with_registry(&ModelPaths::default(), |registry| {
            chain.apply(registry, &mut content)
        })
        .unwrap();

        assert_eq!(tag, None);
        assert_eq!(content, "mail |||EMAIL_ADDRESS||| now");
        assert_eq!(chain.passed_tag(), "03_passed");
    }
}
