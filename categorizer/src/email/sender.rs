use crate::categorizer_config::ServiceDomain;

const DOMAIN_SUFFIXES: &[&str] = &[".co.uk", ".com", ".org", ".net", ".io", ".us", ".ai"];

/// Tokens describing who sent an email. Well-known services map to a curated
/// phrase, anything else is split into its domain name fragments.
pub fn sender_features(domain: Option<&str>, services: &[ServiceDomain]) -> Vec<String> {
    let Some(domain) = domain else {
        return vec![];
    };

    if let Some(service) = services
        .iter()
        .find(|s| domain == s.domain || domain.ends_with(&format!(".{}", s.domain)))
    {
        return service
            .features
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
    }

    domain_fragments(domain)
}

/// `mail.acme-corp.com` -> `["mail", "acme", "corp"]`
pub fn domain_fragments(domain: &str) -> Vec<String> {
    let mut trimmed = domain.to_lowercase();
    for suffix in DOMAIN_SUFFIXES {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            trimmed = stripped.to_string();
            break;
        }
    }

    trimmed
        .split(['.', '-', '_'])
        .filter(|part| part.len() > 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
        .map(str::to_string)
        .collect()
}
