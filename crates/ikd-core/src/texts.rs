//! Shared language-keyed text catalogs.
//!
//! The original class hierarchy aggregated text entries across parent
//! classes (a subclass's entries override or extend its parents'). Here
//! that becomes a flat per-kind table built once at registration — there
//! is no runtime class walk, just a lookup by `(SourceKind, Language)`.

use crate::model::Language;

/// The localized "an anonymous visitor" title, used when `person.title` is
/// empty.
pub fn alien(lang: Language) -> &'static str {
    match lang {
        Language::En => "An illegal alien",
        Language::Nl => "Een illegale indringer",
    }
}

/// `template % answer.title` default for the vote formatter.
pub fn voted_template(lang: Language) -> &'static str {
    match lang {
        Language::En => "voted for %s",
        Language::Nl => "stemde op %s",
    }
}

pub fn present(lang: Language) -> &'static str {
    match lang {
        Language::En => "is present",
        Language::Nl => "is aanwezig",
    }
}

pub fn alien_present(lang: Language) -> &'static str {
    match lang {
        Language::En => "An illegal alien is present",
        Language::Nl => "Een illegale indringer is aanwezig",
    }
}

pub fn registered(lang: Language) -> &'static str {
    match lang {
        Language::En => "checked in at the registration desk",
        Language::Nl => "checkte in bij de registratiebalie",
    }
}

/// IkMic's subtitle is chosen at random from one of these.
pub fn interrupt_lines(lang: Language) -> &'static [&'static str] {
    match lang {
        Language::En => &["interrupts", "wants to say something", "grabs the mic"],
        Language::Nl => &["onderbreekt", "wil iets zeggen", "grijpt de microfoon"],
    }
}

/// Activity-stream verb -> localized template, `None` meaning "drop".
/// `%object%`/`%target%` are filled by the formatter.
pub fn activity_verb_template(verb: &str, lang: Language) -> Option<&'static str> {
    match (verb, lang) {
        ("post", Language::En) => Some("posted %object%"),
        ("post", Language::Nl) => Some("plaatste %object%"),
        ("like", Language::En) => Some("liked %object%"),
        ("like", Language::Nl) => Some("vond %object% leuk"),
        ("tag", Language::En) => Some("tagged %object% in %target%"),
        ("tag", Language::Nl) => Some("tagde %object% in %target%"),
        ("checkin", Language::En) => Some("checked in at %object%"),
        ("checkin", Language::Nl) => Some("checkte in bij %object%"),
        ("commit", Language::En) => Some("committed %object%"),
        ("commit", Language::Nl) => Some("committete %object%"),
        ("ikcam_one", Language::En) => Some("took a photo"),
        ("ikcam_one", Language::Nl) => Some("maakte een foto"),
        ("ikcam_many", Language::En) => Some("took photos"),
        ("ikcam_many", Language::Nl) => Some("maakte foto's"),
        _ => None,
    }
}

/// Default per-kind `via` literal, used when a source has no override and
/// its site has no title either.
pub fn default_via(kind: &str) -> Option<&'static str> {
    match kind {
        "vote" | "presence" => Some("ikPoll"),
        "ikmic" => Some("ikMic"),
        "ikcam" => Some("ikCam"),
        "race" => Some("ikRace"),
        "regdesk" => Some("RegDesk"),
        "commits" => Some("GitHub"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alien_is_language_specific() {
        assert_eq!(alien(Language::En), "An illegal alien");
        assert_ne!(alien(Language::En), alien(Language::Nl));
    }

    #[test]
    fn unknown_verb_has_no_template() {
        assert_eq!(activity_verb_template("frobnicate", Language::En), None);
    }
}
