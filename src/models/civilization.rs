//! Civilization name to upstream civilization number.

/// Upstream civilization numbers, keyed by display name.
pub const CIVILIZATIONS: &[(&str, u32)] = &[
    ("Armenians", 45),
    ("Aztecs", 0),
    ("Bengalis", 42),
    ("Berbers", 1),
    ("Bohemians", 39),
    ("Britons", 2),
    ("Bulgarians", 3),
    ("Burgundians", 35),
    ("Burmese", 4),
    ("Byzantines", 5),
    ("Celts", 6),
    ("Chinese", 7),
    ("Cumans", 8),
    ("Dravidians", 41),
    ("Ethiopians", 9),
    ("Franks", 10),
    ("Georgians", 46),
    ("Goths", 11),
    ("Gurjaras", 43),
    ("Hindustanis", 40),
    ("Huns", 12),
    ("Incas", 13),
    ("Indians", 14),
    ("Italians", 15),
    ("Japanese", 16),
    ("Jurchens", 53),
    ("Khitans", 54),
    ("Khmer", 17),
    ("Koreans", 18),
    ("Lithuanians", 19),
    ("Magyars", 20),
    ("Malay", 21),
    ("Malians", 22),
    ("Mayans", 23),
    ("Mongols", 24),
    ("Persians", 25),
    ("Poles", 38),
    ("Portuguese", 26),
    ("Romans", 44),
    ("Saracens", 27),
    ("Shu", 50),
    ("Sicilians", 36),
    ("Slavs", 28),
    ("Spanish", 29),
    ("Tatars", 30),
    ("Teutons", 31),
    ("Turks", 32),
    ("Vietnamese", 33),
    ("Vikings", 34),
    ("Wei", 52),
    ("Wu", 51),
];

/// Trim and lower-case a civilization name; blank input becomes `None`.
pub fn normalize_civ_name(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

/// Resolve a civilization name (any case) or a numeric id to its number.
pub fn resolve_civ_number(name: &str) -> Option<u32> {
    let needle = name.trim();
    if needle.is_empty() {
        return None;
    }
    if let Ok(number) = needle.parse::<u32>() {
        return Some(number);
    }
    CIVILIZATIONS
        .iter()
        .find(|(civ, _)| civ.eq_ignore_ascii_case(needle))
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_civ_any_case() {
        assert_eq!(resolve_civ_number("Franks"), Some(10));
        assert_eq!(resolve_civ_number("  mongols "), Some(24));
        assert_eq!(resolve_civ_number("AZTECS"), Some(0));
    }

    #[test]
    fn test_resolve_numeric_input() {
        assert_eq!(resolve_civ_number("31"), Some(31));
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(resolve_civ_number("Atlanteans"), None);
        assert_eq!(resolve_civ_number(""), None);
    }

    #[test]
    fn test_normalize_civ_name() {
        assert_eq!(normalize_civ_name(Some(" Britons ")), Some("britons".to_string()));
        assert_eq!(normalize_civ_name(Some("   ")), None);
        assert_eq!(normalize_civ_name(None), None);
    }

    #[test]
    fn test_numbers_are_unique() {
        let mut numbers: Vec<u32> = CIVILIZATIONS.iter().map(|(_, n)| *n).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), CIVILIZATIONS.len());
    }
}
