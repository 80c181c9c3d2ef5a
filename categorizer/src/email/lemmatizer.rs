use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

lazy_static! {
    static ref IRREGULAR: HashMap<&'static str, &'static str> = HashMap::from([
        ("children", "child"),
        ("people", "person"),
        ("women", "woman"),
        ("men", "man"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("analyses", "analysis"),
        ("crises", "crisis"),
        ("movies", "movie"),
        ("cookies", "cookie"),
        ("calories", "calorie"),
        ("lives", "life"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("leaves", "leaf"),
        ("halves", "half"),
        ("criteria", "criterion"),
    ]);
    /// Words ending in `s` that are already their own lemma
    static ref INVARIANT: HashSet<&'static str> = HashSet::from([
        "news", "series", "species", "status", "access", "business", "address", "process",
        "success", "analysis", "basis", "crisis", "thesis", "bonus", "campus", "census",
        "virus", "focus", "versus", "previous", "various", "famous", "serious", "always",
        "perhaps", "thus", "bus", "gas", "plus", "minus", "lens", "class", "glass", "pass",
        "express", "progress", "wireless", "congress", "alias", "canvas", "atlas", "chaos",
        "ethics", "physics", "mathematics", "economics", "politics", "analytics", "sales",
    ]);
}

/// Rule-based noun lemmatizer: reduces regular English plurals to their
/// singular form and leaves everything else untouched, so "alerts" becomes
/// "alert" while "failed" stays "failed".
pub fn lemmatize(token: &str) -> String {
    if let Some(lemma) = IRREGULAR.get(token) {
        return lemma.to_string();
    }
    if INVARIANT.contains(token) || token.len() <= 3 || !token.ends_with('s') {
        return token.to_string();
    }
    if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return token.to_string();
    }
    if let Some(stem) = token.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = token.strip_suffix("sses") {
        return format!("{stem}ss");
    }
    for suffix in ["xes", "ches", "shes", "zzes"] {
        if token.ends_with(suffix) {
            return token[..token.len() - 2].to_string();
        }
    }
    token[..token.len() - 1].to_string()
}
