pub const DEFAULT_CATEGORY: &str = "other";

pub fn canonical_categories() -> Vec<&'static str> {
    vec![
        "health",
        "fitness",
        "productivity",
        "learning",
        "finance",
        "mindfulness",
        "social",
        "creativity",
        "other",
    ]
}

pub fn normalize_category(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "health" | "wellness" => "health".to_string(),
        "fitness" | "exercise" | "sport" | "sports" => "fitness".to_string(),
        "productivity" | "work" => "productivity".to_string(),
        "learning" | "study" | "education" => "learning".to_string(),
        "finance" | "money" => "finance".to_string(),
        "mindfulness" | "meditation" => "mindfulness".to_string(),
        "social" => "social".to_string(),
        "creativity" | "creative" => "creativity".to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical_categories, normalize_category};

    #[test]
    fn aliases_map_to_canonical_names() {
        assert_eq!(normalize_category(" Exercise "), "fitness");
        assert_eq!(normalize_category("STUDY"), "learning");
        assert_eq!(normalize_category("meditation"), "mindfulness");
    }

    #[test]
    fn unknown_or_empty_category_falls_back_to_other() {
        assert_eq!(normalize_category("gardening"), "other");
        assert_eq!(normalize_category(""), "other");
    }

    #[test]
    fn canonical_names_are_stable() {
        canonical_categories()
            .into_iter()
            .for_each(|category| assert_eq!(normalize_category(category), category));
    }
}
