//! Prompt templates for the interviewer and the post-session assessment.
//!
//! Templates are plain strings with `{role}`, `{level}`, `{conversation}` and
//! `{emotional_context}` placeholders, keyed as `interviewer_<lang>` and
//! `feedback_<lang>`. Built-in templates can be replaced from a directory of
//! Markdown files whose stem is the template key.

use crate::language::{Language, Level};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

const INTERVIEWER_TR: &str = r#"Sen {level} seviyesinde bir {role} adayıyla mülakat yapan bir CTO'sun.
Sert ama adil ol. Teknik derinliği, problem çözme yeteneğini ve iletişimi değerlendir.

Yönergeler:
- Şimdiye kadarki konuşmaya dayanarak 1 kısa teknik soru sor
- İlk soruysa {role} temelleriyle başla
- İyi bir cevaptan sonra daha derine in, zayıf bir cevaptan sonra netleştirici bir soru sor
- Sorular sohbet tarzında ve gerçekçi olsun
- 6-8 sorudan sonra "Teşekkürler. Teknik görüşmemiz burada sona eriyor." de ve isComplete: true döndür{emotional_context}

Mevcut konuşma:
{conversation}

SADECE geçerli bir JSON objesi döndür, başka hiçbir metin ekleme:
{"question":"Sorunuz burada","isComplete":false}"#;

const INTERVIEWER_EN: &str = r#"You are a CTO interviewing a {role} candidate at the {level} level.
Be tough but fair. Assess technical depth, problem-solving ability and communication.

Guidelines:
- Ask 1 concise technical question based on the conversation so far; it will be spoken aloud
- If this is the first question, start with {role} fundamentals
- After a strong answer go deeper; after a weak one ask a clarifying question or pivot
- Keep questions conversational and realistic, not trivia
- After 6-8 questions say "Thank you. That concludes our technical discussion." and return isComplete: true{emotional_context}

Current conversation:
{conversation}

Return ONLY a valid JSON object, no markdown and no other text:
{"question":"Your question here","isComplete":false}"#;

const INTERVIEWER_ES: &str = r#"Eres un CTO entrevistando a un candidato {role} de nivel {level}.
Sé exigente pero justo. Evalúa la profundidad técnica, la resolución de problemas y la comunicación.

Pautas:
- Haz 1 pregunta técnica concisa basada en la conversación hasta ahora
- Si es la primera pregunta, empieza por los fundamentos de {role}
- Tras una buena respuesta profundiza; tras una débil aclara o cambia de tema
- Mantén las preguntas conversacionales y realistas
- Tras 6-8 preguntas di "Gracias. Eso concluye nuestra discusión técnica." y devuelve isComplete: true{emotional_context}

Conversación actual:
{conversation}

Devuelve SOLO un objeto JSON válido, sin markdown ni explicaciones:
{"question":"Tu pregunta aquí","feedback":"Nota interna breve (opcional)","isComplete":false}"#;

const INTERVIEWER_FR: &str = r#"Vous êtes un CTO qui interviewe un candidat {role} de niveau {level}.
Soyez exigeant mais juste. Évaluez la profondeur technique, la résolution de problèmes et la communication.

Directives:
- Posez 1 question technique concise basée sur la conversation jusqu'ici
- Si c'est la première question, commencez par les fondamentaux de {role}
- Après une bonne réponse approfondissez; après une réponse faible clarifiez ou changez de sujet
- Gardez des questions conversationnelles et réalistes
- Après 6-8 questions dites "Merci. Cela conclut notre discussion technique." et renvoyez isComplete: true{emotional_context}

Conversation actuelle:
{conversation}

Répondez UNIQUEMENT avec un objet JSON valide, sans markdown ni explications:
{"question":"Votre question ici","feedback":"Note interne brève (optionnel)","isComplete":false}"#;

const INTERVIEWER_DE: &str = r#"Sie sind ein CTO und interviewen einen {role}-Kandidaten auf {level}-Niveau.
Seien Sie streng, aber fair. Bewerten Sie technische Tiefe, Problemlösung und Kommunikation.

Richtlinien:
- Stellen Sie 1 prägnante technische Frage basierend auf dem bisherigen Gespräch
- Wenn dies die erste Frage ist, beginnen Sie mit {role}-Grundlagen
- Nach einer starken Antwort gehen Sie tiefer; nach einer schwachen klären Sie nach oder wechseln das Thema
- Halten Sie die Fragen gesprächig und realistisch
- Nach 6-8 Fragen sagen Sie "Danke. Das beendet unsere technische Diskussion." und geben isComplete: true zurück{emotional_context}

Aktuelles Gespräch:
{conversation}

Antworten Sie NUR mit einem gültigen JSON-Objekt, ohne Markdown oder Erklärungen:
{"question":"Ihre Frage hier","feedback":"Kurze interne Notiz (optional)","isComplete":false}"#;

const FEEDBACK_SCHEMA: &str = r#"{
  "overall_score": 0,
  "technical_score": 0,
  "communication_score": 0,
  "problem_solving_score": 0,
  "strengths": ["..."],
  "weaknesses": ["..."],
  "opportunities": ["..."],
  "threats": ["..."],
  "recommendations": ["..."],
  "overall_assessment": "...",
  "swot_analysis": "..."
}"#;

const FEEDBACK_TR: &str = r#"Sen {level} seviyesinde bir {role} adayıyla mülakatı yeni bitirmiş bir CTO'sun.
Performansı ACIMASIZ ve GERÇEKÇİ biçimde değerlendir:
- "Bilmiyorum", "Hatırlamıyorum", "Emin değilim" gibi cevaplar düşük puan demektir (20-40)
- Yanlış teknik cevaplar düşük puan (30-50), kısmen doğru cevaplar orta puan (50-70)
- Yalnızca mükemmel cevaplar yüksek puan alır (80-100)
- Puanı doğru cevap sayısı / toplam soru sayısı oranına dayandır

Görev: her cevabı analiz et, 0-100 arası genel puan ver, SWOT analizi yap
(3-5 güçlü yön, 3-5 zayıf yön, 2-3 fırsat, 2-3 tehdit), 3-5 uygulanabilir öneri sun
ve 2-3 cümlelik bir SWOT özeti yaz.

Mülakat transkripti:
{conversation}

SADECE şu formatta geçerli JSON döndür:
{schema}"#;

const FEEDBACK_EN: &str = r#"You are a CTO who just interviewed a {role} candidate at the {level} level.
Score the performance HARSHLY and REALISTICALLY:
- Answers like "I don't know", "I don't remember", "I'm not sure" mean a low score (20-40)
- Incorrect technical answers score low (30-50), partially correct answers score medium (50-70)
- Only excellent answers score high (80-100)
- Base the score on correct answers divided by total questions

Task: analyze every answer, give an overall score from 0 to 100, perform a SWOT analysis
(3-5 strengths, 3-5 weaknesses, 2-3 opportunities, 2-3 threats), give 3-5 actionable
recommendations and write a 2-3 sentence SWOT summary.

Interview transcript:
{conversation}

Return ONLY valid JSON in this format:
{schema}"#;

const FEEDBACK_ES: &str = r#"Eres un CTO que acaba de entrevistar a un candidato {role} de nivel {level}.
Puntúa con DUREZA y REALISMO: respuestas como "no sé" puntúan bajo (20-40), respuestas
incorrectas 30-50, parcialmente correctas 50-70 y solo las excelentes 80-100.
Basa la puntuación en respuestas correctas / preguntas totales.

Tarea: analiza cada respuesta, da una puntuación global de 0 a 100, haz un análisis SWOT
(3-5 fortalezas, 3-5 debilidades, 2-3 oportunidades, 2-3 amenazas), da 3-5 recomendaciones
y escribe un resumen SWOT de 2-3 frases.

Transcripción de la entrevista:
{conversation}

Devuelve SOLO JSON válido con este formato:
{schema}"#;

const FEEDBACK_FR: &str = r#"Vous êtes un CTO qui vient d'interviewer un candidat {role} de niveau {level}.
Notez SÉVÈREMENT et RÉALISTEMENT: des réponses comme "je ne sais pas" valent peu (20-40),
les réponses incorrectes 30-50, partiellement correctes 50-70 et seules les excellentes 80-100.
Basez la note sur réponses correctes / questions totales.

Tâche: analysez chaque réponse, donnez une note globale de 0 à 100, faites une analyse SWOT
(3-5 forces, 3-5 faiblesses, 2-3 opportunités, 2-3 menaces), donnez 3-5 recommandations
et rédigez un résumé SWOT de 2-3 phrases.

Transcription de l'entretien:
{conversation}

Répondez UNIQUEMENT avec du JSON valide au format:
{schema}"#;

const FEEDBACK_DE: &str = r#"Sie sind ein CTO und haben gerade einen {role}-Kandidaten auf {level}-Niveau interviewt.
Bewerten Sie STRENG und REALISTISCH: Antworten wie "ich weiß nicht" ergeben wenig Punkte (20-40),
falsche Antworten 30-50, teilweise richtige 50-70 und nur exzellente 80-100.
Stützen Sie die Bewertung auf richtige Antworten / Gesamtzahl der Fragen.

Aufgabe: analysieren Sie jede Antwort, vergeben Sie eine Gesamtpunktzahl von 0 bis 100, erstellen
Sie eine SWOT-Analyse (3-5 Stärken, 3-5 Schwächen, 2-3 Chancen, 2-3 Risiken), geben Sie 3-5
Empfehlungen und schreiben Sie eine SWOT-Zusammenfassung in 2-3 Sätzen.

Interview-Transkript:
{conversation}

Antworten Sie NUR mit gültigem JSON in diesem Format:
{schema}"#;

/// The user prompt sent alongside the assessment system prompt.
pub const FEEDBACK_USER_PROMPT: &str =
    "Evaluate this interview and provide comprehensive feedback with a SWOT analysis.";

fn interviewer_key(language: Language) -> String {
    format!("interviewer_{}", language.code())
}

fn feedback_key(language: Language) -> String {
    format!("feedback_{}", language.code())
}

fn demeanor_guideline(language: Language, context: &str) -> String {
    match language {
        Language::Tr => format!(
            "\n- Adayın durumu: {context} Sorunun başında veya sonunda buna kısaca değin."
        ),
        Language::En => format!(
            "\n- Candidate demeanor: {context} Acknowledge it briefly at the start or end of your question."
        ),
        Language::Es => format!(
            "\n- Estado del candidato: {context} Menciónalo brevemente al inicio o al final de tu pregunta."
        ),
        Language::Fr => format!(
            "\n- État du candidat: {context} Mentionnez-le brièvement au début ou à la fin de votre question."
        ),
        Language::De => format!(
            "\n- Zustand des Kandidaten: {context} Gehen Sie am Anfang oder Ende Ihrer Frage kurz darauf ein."
        ),
    }
}

/// A keyed set of prompt templates.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    /// The templates shipped with the crate, one pair per supported language.
    pub fn builtin() -> Self {
        let pairs = [
            (Language::Tr, INTERVIEWER_TR, FEEDBACK_TR),
            (Language::En, INTERVIEWER_EN, FEEDBACK_EN),
            (Language::Es, INTERVIEWER_ES, FEEDBACK_ES),
            (Language::Fr, INTERVIEWER_FR, FEEDBACK_FR),
            (Language::De, INTERVIEWER_DE, FEEDBACK_DE),
        ];
        let mut templates = HashMap::new();
        for (language, interviewer, feedback) in pairs {
            templates.insert(interviewer_key(language), interviewer.to_string());
            templates.insert(feedback_key(language), feedback.to_string());
        }
        Self { templates }
    }

    /// Replaces built-in templates with the given ones. Unknown keys are kept
    /// but never looked up.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.templates.extend(overrides);
        self
    }

    fn template(&self, key: &str, fallback_key: &str) -> &str {
        self.templates
            .get(key)
            .or_else(|| self.templates.get(fallback_key))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Builds the interviewer system prompt for one turn.
    pub fn interviewer_prompt(
        &self,
        language: Language,
        role: &str,
        level: Level,
        conversation: &str,
        emotional_context: Option<&str>,
    ) -> String {
        let conversation = if conversation.trim().is_empty() {
            language.locale().empty_conversation
        } else {
            conversation
        };
        let demeanor = emotional_context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| demeanor_guideline(language, c))
            .unwrap_or_default();
        self.template(&interviewer_key(language), &interviewer_key(Language::En))
            .replace("{role}", role)
            .replace("{level}", level.as_str())
            .replace("{emotional_context}", &demeanor)
            .replace("{conversation}", conversation)
    }

    /// Builds the user prompt for one turn: the opening prompt when nothing
    /// has been said yet, the follow-up prompt otherwise.
    pub fn turn_user_prompt(
        &self,
        language: Language,
        role: &str,
        level: Level,
        has_conversation: bool,
    ) -> String {
        let locale = language.locale();
        if has_conversation {
            locale.continue_prompt.to_string()
        } else {
            locale
                .start_prompt
                .replace("{role}", role)
                .replace("{level}", level.as_str())
        }
    }

    /// Builds the assessment system prompt over the full transcript.
    pub fn feedback_prompt(
        &self,
        language: Language,
        role: &str,
        level: Level,
        transcript: &str,
    ) -> String {
        self.template(&feedback_key(language), &feedback_key(Language::En))
            .replace("{role}", role)
            .replace("{level}", level.as_str())
            .replace("{schema}", FEEDBACK_SCHEMA)
            .replace("{conversation}", transcript)
    }
}

/// Loads every `*.md` file in a directory as a template keyed by file stem.
pub fn load_prompt_dir(path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read prompts directory {}", path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = std::fs::read_to_string(&path)?;
            prompts.insert(key, content);
        }
    }
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interviewer_prompt_fills_every_placeholder() {
        let library = PromptLibrary::builtin();
        for language in Language::ALL {
            let prompt = library.interviewer_prompt(
                language,
                "Data Engineer",
                Level::Senior,
                "Candidate: hi",
                Some("Candidate appears nervous."),
            );
            assert!(prompt.contains("Data Engineer"));
            assert!(prompt.contains("senior"));
            assert!(prompt.contains("Candidate: hi"));
            assert!(prompt.contains("Candidate appears nervous."));
            for placeholder in ["{role}", "{level}", "{conversation}", "{emotional_context}"] {
                assert!(!prompt.contains(placeholder), "{placeholder} left in {language}");
            }
        }
    }

    #[test]
    fn test_empty_conversation_uses_localized_placeholder() {
        let prompt = PromptLibrary::builtin().interviewer_prompt(
            Language::De,
            "SRE",
            Level::Mid,
            "",
            None,
        );
        assert!(prompt.contains("Kein vorheriges Gespräch."));
    }

    #[test]
    fn test_turn_user_prompt_switches_on_history() {
        let library = PromptLibrary::builtin();
        let start = library.turn_user_prompt(Language::En, "QA", Level::Junior, false);
        assert!(start.contains("junior QA"));
        let follow_up = library.turn_user_prompt(Language::En, "QA", Level::Junior, true);
        assert!(follow_up.starts_with("Continue"));
    }

    #[test]
    fn test_feedback_prompt_embeds_schema_and_transcript() {
        let prompt = PromptLibrary::builtin().feedback_prompt(
            Language::Tr,
            "Backend",
            Level::Lead,
            "Interviewer: q\n\nCandidate: a",
        );
        assert!(prompt.contains("\"overall_score\""));
        assert!(prompt.contains("Candidate: a"));
        assert!(!prompt.contains("{schema}"));
    }

    #[test]
    fn test_overrides_replace_builtin_templates() {
        let overrides =
            HashMap::from([("interviewer_en".to_string(), "Ask {role} anything.".to_string())]);
        let library = PromptLibrary::builtin().with_overrides(overrides);
        let prompt = library.interviewer_prompt(Language::En, "PM", Level::Mid, "", None);
        assert_eq!(prompt, "Ask PM anything.");
    }
}
