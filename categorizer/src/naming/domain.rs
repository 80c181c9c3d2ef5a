use indexmap::IndexMap;

use super::{NamingContext, NamingStrategy};
use crate::categorizer_config::DomainCategory;

/// Names a cluster after the category of its most frequent sender domain
pub struct DomainStrategy {
    categories: Vec<DomainCategory>,
}

impl DomainStrategy {
    pub fn new(categories: &[DomainCategory]) -> Self {
        DomainStrategy {
            categories: categories
                .iter()
                .map(|c| DomainCategory {
                    domain: c.domain.to_lowercase(),
                    category: c.category.clone(),
                })
                .collect(),
        }
    }

    /// Exact match first, then a substring match in either direction
    pub fn lookup(&self, domain: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.domain == domain)
            .or_else(|| {
                self.categories
                    .iter()
                    .find(|c| domain.contains(&c.domain) || c.domain.contains(domain))
            })
            .map(|c| c.category.as_str())
    }
}

/// Most frequent sender domain; ties go to the domain seen first
fn most_common_domain(ctx: &NamingContext) -> Option<String> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for domain in ctx.cluster_emails().filter_map(|e| e.sender_domain()) {
        *counts.entry(domain).or_default() += 1;
    }

    let mut best: Option<(String, usize)> = None;
    for (domain, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((domain, count));
        }
    }
    best.map(|(domain, _)| domain)
}

impl NamingStrategy for DomainStrategy {
    fn name(&self) -> &str {
        "domain"
    }

    fn suggest(&self, ctx: &NamingContext) -> Option<String> {
        let domain = most_common_domain(ctx)?;
        self.lookup(&domain).map(str::to_string)
    }
}
