//! Supported interview languages and candidate seniority levels.
//!
//! Every language carries its own fixed strings: the greeting, the start and
//! continue user prompts, the apology used whenever a turn degrades, and the
//! phrases that count as an "I don't know" answer during calibration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Tr,
    #[default]
    En,
    Es,
    Fr,
    De,
}

/// Fixed per-language strings.
#[derive(Debug)]
pub struct Locale {
    /// Greeting template; `{role}` is replaced with the job role.
    pub greeting: &'static str,
    /// User prompt for the opening question; `{role}` and `{level}` are replaced.
    pub start_prompt: &'static str,
    /// User prompt for every follow-up question.
    pub continue_prompt: &'static str,
    /// Spoken whenever a turn cannot produce a real question.
    pub apology: &'static str,
    /// Shown in the prompt when there is no conversation yet.
    pub empty_conversation: &'static str,
    /// Lower-case phrases that mark an answer as "I don't know".
    pub negative_phrases: &'static [&'static str],
    /// BCP-47 tag handed to speech output.
    pub speech_tag: &'static str,
}

const TR: Locale = Locale {
    greeting: "Merhaba! {role} pozisyonu için mülakatınıza hoş geldiniz. Size bazı teknik sorular soracağım. Başlamaya hazır mısınız?",
    start_prompt: "Mülakata bir açılış sorusuyla başla. {level} seviyesindeki bir {role} için uygun bir teknik soru sor.",
    continue_prompt: "Yukarıdaki konuşmadan devam et. Adayın son cevabına göre bir sonraki teknik soruyu sor.",
    apology: "Özür dilerim, bir sorun yaşadım. Cevabınızı tekrar edebilir misiniz?",
    empty_conversation: "Önceki konuşma yok.",
    negative_phrases: &["bilmiyorum", "hatırlamıyorum", "emin değilim"],
    speech_tag: "tr-TR",
};

const EN: Locale = Locale {
    greeting: "Hello! Welcome to your {role} interview. I'll be asking you some technical questions. Are you ready to begin?",
    start_prompt: "Open the interview with a first technical question suitable for a {level} {role}.",
    continue_prompt: "Continue the interview from the conversation above. Ask the next technical question based on the candidate's last answer.",
    apology: "I apologize, but I'm having trouble processing that. Could you repeat your answer?",
    empty_conversation: "No previous conversation.",
    negative_phrases: &["i don't know", "don't remember", "not sure"],
    speech_tag: "en-US",
};

const ES: Locale = Locale {
    greeting: "¡Hola! Bienvenido a tu entrevista para {role}. Te haré algunas preguntas técnicas. ¿Estás listo para comenzar?",
    start_prompt: "Abre la entrevista con una primera pregunta técnica adecuada para un puesto de {role} de nivel {level}.",
    continue_prompt: "Continúa la entrevista a partir de la conversación anterior. Haz la siguiente pregunta técnica según la última respuesta del candidato.",
    apology: "Lo siento, pero estoy teniendo problemas para procesar eso. ¿Podrías repetir tu respuesta?",
    empty_conversation: "No hay conversación previa.",
    negative_phrases: &["no sé", "no lo sé", "no recuerdo"],
    speech_tag: "es-ES",
};

const FR: Locale = Locale {
    greeting: "Bonjour! Bienvenue à votre entretien pour {role}. Je vais vous poser quelques questions techniques. Êtes-vous prêt à commencer?",
    start_prompt: "Ouvrez l'entretien avec une première question technique adaptée à un poste de {role} de niveau {level}.",
    continue_prompt: "Poursuivez l'entretien à partir de la conversation ci-dessus. Posez la prochaine question technique selon la dernière réponse du candidat.",
    apology: "Je m'excuse, mais j'ai du mal à traiter cela. Pourriez-vous répéter votre réponse?",
    empty_conversation: "Aucune conversation précédente.",
    negative_phrases: &["je ne sais pas", "je ne me souviens pas"],
    speech_tag: "fr-FR",
};

const DE: Locale = Locale {
    greeting: "Hallo! Willkommen zu Ihrem {role}-Vorstellungsgespräch. Ich werde Ihnen einige technische Fragen stellen. Sind Sie bereit zu beginnen?",
    start_prompt: "Beginnen Sie das Gespräch mit einer ersten technischen Frage für eine {role}-Position auf {level}-Niveau.",
    continue_prompt: "Setzen Sie das Gespräch anhand des obigen Verlaufs fort. Stellen Sie die nächste technische Frage basierend auf der letzten Antwort des Kandidaten.",
    apology: "Es tut mir leid, aber ich habe Schwierigkeiten, das zu verarbeiten. Könnten Sie Ihre Antwort wiederholen?",
    empty_conversation: "Kein vorheriges Gespräch.",
    negative_phrases: &["ich weiß nicht", "weiß ich nicht", "keine ahnung"],
    speech_tag: "de-DE",
};

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Tr,
        Language::En,
        Language::Es,
        Language::Fr,
        Language::De,
    ];

    /// Resolves a language code. Region suffixes are ignored and unknown
    /// codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "tr" => Language::Tr,
            "es" => Language::Es,
            "fr" => Language::Fr,
            "de" => Language::De,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Tr => "tr",
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
        }
    }

    pub fn locale(&self) -> &'static Locale {
        match self {
            Language::Tr => &TR,
            Language::En => &EN,
            Language::Es => &ES,
            Language::Fr => &FR,
            Language::De => &DE,
        }
    }

    pub fn greeting(&self, role: &str) -> String {
        self.locale().greeting.replace("{role}", role)
    }

    pub fn apology(&self) -> &'static str {
        self.locale().apology
    }

    pub fn speech_tag(&self) -> &'static str {
        self.locale().speech_tag
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returns true if the answer contains an "I don't know" phrase in any
/// supported language. Candidates do not always answer in the interview
/// language, so every list is consulted.
pub fn is_negative_answer(answer: &str) -> bool {
    let normalized = answer.to_lowercase().replace('’', "'");
    Language::ALL.iter().any(|language| {
        language
            .locale()
            .negative_phrases
            .iter()
            .any(|phrase| normalized.contains(phrase))
    })
}

/// Seniority of the position being interviewed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Junior,
    Mid,
    Senior,
    Lead,
    Architect,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown level '{0}', expected one of junior, mid, senior, lead, architect")]
pub struct ParseLevelError(pub String);

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Junior => "junior",
            Level::Mid => "mid",
            Level::Senior => "senior",
            Level::Lead => "lead",
            Level::Architect => "architect",
        }
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Ok(Level::Junior),
            "mid" => Ok(Level::Mid),
            "senior" => Ok(Level::Senior),
            "lead" => Ok(Level::Lead),
            "architect" => Ok(Level::Architect),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(Language::from_code("it"), Language::En);
        assert_eq!(Language::from_code(""), Language::En);
        assert_eq!(Language::from_code("DE-at"), Language::De);
        assert_eq!(Language::from_code("tr_TR"), Language::Tr);
    }

    #[test]
    fn test_greeting_is_localized_and_templated() {
        let greeting = Language::Fr.greeting("Backend Engineer");
        assert!(greeting.starts_with("Bonjour"));
        assert!(greeting.contains("Backend Engineer"));
        assert!(!greeting.contains("{role}"));
    }

    #[test]
    fn test_every_language_has_a_non_empty_apology_and_phrases() {
        for language in Language::ALL {
            assert!(!language.apology().is_empty());
            assert!(!language.locale().negative_phrases.is_empty());
        }
    }

    #[test]
    fn test_negative_answer_detection_is_multilingual() {
        assert!(is_negative_answer("Honestly, I don't know."));
        assert!(is_negative_answer("I DON’T KNOW"));
        assert!(is_negative_answer("Bunu bilmiyorum"));
        assert!(is_negative_answer("Je ne sais pas du tout"));
        assert!(is_negative_answer("Ich weiß nicht genau"));
        assert!(!is_negative_answer("A mutex guards shared state."));
    }

    #[test]
    fn test_level_parsing_is_strict() {
        assert_eq!("Senior".parse::<Level>().unwrap(), Level::Senior);
        let err = "intern".parse::<Level>().unwrap_err();
        assert_eq!(err, ParseLevelError("intern".to_string()));
        assert!(err.to_string().contains("intern"));
    }

    #[test]
    fn test_language_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&Language::Es).unwrap(), "\"es\"");
        let parsed: Language = serde_json::from_str("\"de\"").unwrap();
        assert_eq!(parsed, Language::De);
    }
}
