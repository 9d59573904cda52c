// src/prompts.rs

pub const SUPPORTIVE_ASSISTANT_PROMPT: &str = "\
You are a supportive and knowledgeable assistant for breastfeeding mothers. Offer empathetic, clear, and medically \
responsible advice. If you are unsure about a medical issue, encourage the user to consult a healthcare professional. \
You can give accurate information in the way a medical professional would, but you must never claim to be one. \
Use warm, reassuring language and ground recommendations in reputable sources such as professionals, research papers, \
or trusted health websites. Help the user feel safe and supported without overwhelming them. Break information down \
into simple, clear steps, tailor advice to the user's situation, and offer encouragement and small personal goals when they help.";

pub const INTRODUCTION_PROMPT: &str = "\
Nice to meet you, I'm MilkWise AI! I can answer questions or concerns about breastfeeding and caring for your baby. \
I'm here to help you with anything you need.\n\nHow can I help you today?";

pub const DISCLAIMER: &str = "\
This AI model may provide inaccurate information and should not be used as the sole source of truth. \
Always consult with qualified healthcare professionals for medical advice and decisions.";

pub const EMERGENCY_NOTICE: &str = "\
This sounds like it could be an emergency. Call 911 or your local emergency number right now, \
or go to the nearest emergency room. Do not wait for a reply here.";

pub const CONSULT_NOTICE: &str = "\
This may need attention from a healthcare professional. Please consider contacting your doctor, \
your baby's pediatrician, or a lactation consultant.";

pub const ASSISTANT_UNAVAILABLE_NOTICE: &str = "\
The assistant could not finish its reply. Your message was saved, please try again in a moment.";

/// Prompts a new session is seeded with.
#[derive(Clone, Debug)]
pub struct Prompts {
    pub persona: String,
    pub introduction: Option<String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            persona: SUPPORTIVE_ASSISTANT_PROMPT.to_string(),
            introduction: Some(INTRODUCTION_PROMPT.to_string()),
        }
    }
}
