//! Lightweight language detection and system-message mirroring.
//!
//! Detection is a stop-word heuristic over a small language set; system
//! phrases are mirrored through a fixed dictionary rather than a
//! translation model.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const SUPPORTED_LANGS: &[&str] = &["en", "es", "fr", "de"];

/// High-frequency marker words per language.
static STOP_WORDS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "es",
            vec!["el", "la", "los", "las", "una", "por", "con", "para", "que", "crear", "abrir", "archivo", "gracias"],
        ),
        (
            "fr",
            vec!["le", "les", "une", "des", "avec", "pour", "que", "vous", "fichier", "ouvrir", "merci", "sil"],
        ),
        (
            "de",
            vec!["der", "die", "das", "und", "mit", "eine", "bitte", "datei", "erstellen", "danke", "nicht"],
        ),
    ]
});

/// System phrases mirrored into supported languages.
static SYSTEM_PHRASES: Lazy<HashMap<&'static str, HashMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        HashMap::from([
            (
                "Which file would you like me to delete?",
                HashMap::from([
                    ("es", "¿Qué archivo le gustaría que elimine?"),
                    ("fr", "Quel fichier voudriez-vous que je supprime ?"),
                    ("de", "Welche Datei möchten Sie löschen?"),
                ]),
            ),
            (
                "Are you sure?",
                HashMap::from([
                    ("es", "¿Está seguro?"),
                    ("fr", "Êtes-vous sûr ?"),
                    ("de", "Sind Sie sicher?"),
                ]),
            ),
            (
                "I couldn't understand that.",
                HashMap::from([
                    ("es", "No pude entender eso."),
                    ("fr", "Je n'ai pas pu comprendre cela."),
                    ("de", "Das konnte ich nicht verstehen."),
                ]),
            ),
            (
                "Operation completed successfully.",
                HashMap::from([
                    ("es", "Operación completada con éxito."),
                    ("fr", "Opération terminée avec succès."),
                    ("de", "Vorgang erfolgreich abgeschlossen."),
                ]),
            ),
            (
                "Please confirm.",
                HashMap::from([
                    ("es", "Por favor confirme."),
                    ("fr", "Veuillez confirmer."),
                    ("de", "Bitte bestätigen."),
                ]),
            ),
            (
                "Could not understand command",
                HashMap::from([
                    ("es", "No se pudo entender el comando"),
                    ("fr", "Impossible de comprendre la commande"),
                    ("de", "Befehl konnte nicht verstanden werden"),
                ]),
            ),
        ])
    });

/// Language detection and response mirroring.
pub struct LanguageMirror;

impl LanguageMirror {
    /// Detect the language of `text`. Defaults to English for short or
    /// inconclusive input.
    #[must_use]
    pub fn detect_language(text: &str) -> &'static str {
        let trimmed = text.trim();
        if trimmed.len() < 3 {
            return "en";
        }
        let tokens: Vec<String> = trimmed
            .to_lowercase()
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tokens.is_empty() {
            return "en";
        }

        let mut best = ("en", 0usize);
        for (lang, words) in STOP_WORDS.iter() {
            let hits = tokens.iter().filter(|t| words.contains(&t.as_str())).count();
            if hits > best.1 {
                best = (lang, hits);
            }
        }
        // Require at least two marker hits before leaving English.
        if best.1 >= 2 {
            best.0
        } else {
            "en"
        }
    }

    /// Mirror known system phrases into `target_language`; unknown text
    /// and English targets pass through unchanged.
    #[must_use]
    pub fn mirror_response(text: &str, target_language: &str) -> String {
        if target_language == "en" || text.is_empty() {
            return text.to_string();
        }
        for (phrase, translations) in SYSTEM_PHRASES.iter() {
            if text.contains(phrase) {
                if let Some(translated) = translations.get(target_language) {
                    return text.replace(phrase, translated);
                }
            }
        }
        text.to_string()
    }

    #[must_use]
    pub fn is_supported(lang: &str) -> bool {
        SUPPORTED_LANGS.contains(&lang)
    }
}
