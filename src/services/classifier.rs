use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts::{CONSULT_NOTICE, EMERGENCY_NOTICE};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("escalation phrases must not be empty")]
    EmptyPhrase,

    #[error("phrase '{0}' appears in both the emergency and professional sets")]
    OverlappingPhrase(String),

    #[error("failed to read escalation phrases: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid escalation phrases file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of classifying one user message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub is_emergency: bool,
    pub needs_professional_consult: bool,
}

impl Escalation {
    pub const NONE: Escalation = Escalation {
        is_emergency: false,
        needs_professional_consult: false,
    };

    pub fn is_none(&self) -> bool {
        !self.is_emergency && !self.needs_professional_consult
    }

    /// Notice to show the user. The emergency notice wins when both flags are set.
    pub fn notice(&self) -> Option<&'static str> {
        if self.is_emergency {
            Some(EMERGENCY_NOTICE)
        } else if self.needs_professional_consult {
            Some(CONSULT_NOTICE)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_emergency {
            "emergency"
        } else if self.needs_professional_consult {
            "professional_consult"
        } else {
            "none"
        }
    }
}

/// The two phrase sets, as loaded from configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationPhrases {
    #[serde(default)]
    pub emergency: Vec<String>,
    #[serde(default)]
    pub professional: Vec<String>,
}

impl Default for EscalationPhrases {
    fn default() -> Self {
        Self {
            emergency: to_owned(DEFAULT_EMERGENCY_PHRASES),
            professional: to_owned(DEFAULT_PROFESSIONAL_PHRASES),
        }
    }
}

impl EscalationPhrases {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

const DEFAULT_EMERGENCY_PHRASES: &[&str] = &[
    "can't breathe",
    "cannot breathe",
    "not breathing",
    "stopped breathing",
    "choking",
    "turning blue",
    "unconscious",
    "unresponsive",
    "won't wake up",
    "seizure",
    "severe bleeding",
    "heavy bleeding",
    "chest pain",
    "call 911",
    "emergency",
    "overdose",
    "suicidal",
    "hurt myself",
    "hurt my baby",
];

const DEFAULT_PROFESSIONAL_PHRASES: &[&str] = &[
    "chronic",
    "infection",
    "mastitis",
    "abscess",
    "thrush",
    "fever",
    "jaundice",
    "dehydrated",
    "not gaining weight",
    "weight loss",
    "tongue tie",
    "tongue-tie",
    "lactation consultant",
    "prescription",
    "medication",
    "antibiotic",
    "rash",
    "postpartum depression",
    "doctor",
    "pediatrician",
];

fn to_owned(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|p| p.to_string()).collect()
}

/// Keyword classifier run on every user message before the model call.
///
/// Matching is plain substring containment on the lower-cased text, so a
/// phrase also matches inside longer words.
#[derive(Clone, Debug)]
pub struct EscalationClassifier {
    emergency: Vec<String>,
    professional: Vec<String>,
}

impl Default for EscalationClassifier {
    fn default() -> Self {
        Self {
            emergency: normalize(&to_owned(DEFAULT_EMERGENCY_PHRASES)),
            professional: normalize(&to_owned(DEFAULT_PROFESSIONAL_PHRASES)),
        }
    }
}

impl EscalationClassifier {
    pub fn new(phrases: EscalationPhrases) -> Result<Self, ClassifierError> {
        let emergency = normalize(&phrases.emergency);
        let professional = normalize(&phrases.professional);

        if emergency.iter().chain(professional.iter()).any(|p| p.is_empty()) {
            return Err(ClassifierError::EmptyPhrase);
        }

        let emergency_set: HashSet<&str> = emergency.iter().map(String::as_str).collect();
        if let Some(shared) = professional.iter().find(|p| emergency_set.contains(p.as_str())) {
            return Err(ClassifierError::OverlappingPhrase(shared.clone()));
        }

        Ok(Self {
            emergency,
            professional,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        Self::new(EscalationPhrases::load_from_file(path)?)
    }

    pub fn classify(&self, text: &str) -> Escalation {
        let text_lower = text.to_lowercase();

        Escalation {
            is_emergency: self.emergency.iter().any(|p| text_lower.contains(p.as_str())),
            needs_professional_consult: self
                .professional
                .iter()
                .any(|p| text_lower.contains(p.as_str())),
        }
    }

    pub fn phrases(&self) -> EscalationPhrases {
        EscalationPhrases {
            emergency: self.emergency.clone(),
            professional: self.professional.clone(),
        }
    }
}

fn normalize(phrases: &[String]) -> Vec<String> {
    phrases.iter().map(|p| p.trim().to_lowercase()).collect()
}
