//! Category Post-Processor
//!
//! Merges synonymous categories, collects emails no category claimed into an
//! `Uncategorized` bucket and keeps the result a partition of the input ids.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    categorizer_config::{CategorizerConfig, MergeGroup},
    cluster::ClusterMethod,
    email::EmailRecord,
    error::{CategorizerError, CategorizerResult},
    naming::ClusterName,
};

const UNCATEGORIZED_LABEL: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    /// Email ids, in input order within each source cluster
    pub members: Vec<String>,
    pub is_outlier_bucket: bool,
}

impl Category {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub categories: Vec<Category>,
    pub method: ClusterMethod,
    /// Emails the clusterer labelled as noise
    pub outliers: usize,
}

impl Categorization {
    pub fn empty() -> Self {
        Categorization {
            categories: vec![],
            method: ClusterMethod::Single,
            outliers: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn email_count(&self) -> usize {
        self.categories.iter().map(Category::len).sum()
    }

    /// Category name to member ids, largest category first, then by name
    pub fn as_map(&self) -> IndexMap<String, Vec<String>> {
        self.categories
            .iter()
            .sorted_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.name.cmp(&b.name)))
            .map(|c| (c.name.clone(), c.members.clone()))
            .collect()
    }

    pub fn category_of(&self, email_id: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.members.iter().any(|m| m == email_id))
    }
}

/// A category before its display name is fixed
struct Draft<'a> {
    base: String,
    members: Vec<&'a str>,
    is_outlier_bucket: bool,
}

#[derive(Debug, Clone)]
pub struct PostProcessor {
    merge_groups: Vec<MergeGroup>,
}

impl PostProcessor {
    pub fn new(config: &CategorizerConfig) -> Self {
        PostProcessor {
            merge_groups: config.merge_groups.clone(),
        }
    }

    fn merge_group_for(&self, name: &ClusterName) -> Option<usize> {
        if name.is_outlier {
            return None;
        }
        self.merge_groups
            .iter()
            .position(|g| g.patterns.iter().any(|p| name.base.contains(p.as_str())))
    }

    /// Turn named clusters into the final categories. `groups` maps each
    /// cluster id to rows of `emails`.
    pub fn process(
        &self,
        names: &[ClusterName],
        groups: &BTreeMap<i32, Vec<usize>>,
        emails: &[EmailRecord],
    ) -> Vec<Category> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(emails.len());
        let mut drafts: Vec<Draft> = Vec::with_capacity(names.len() + 1);

        for (index, group) in self.merge_groups.iter().enumerate() {
            let mut members = vec![];
            let mut sources = 0;
            for name in names.iter().filter(|n| self.merge_group_for(n) == Some(index)) {
                sources += 1;
                members.extend(
                    cluster_members(groups, emails, name.cluster_id)
                        .into_iter()
                        .filter(|id| seen.insert(*id)),
                );
            }
            if !members.is_empty() {
                if sources > 1 {
                    tracing::info!("Merged {} categories into '{}'", sources, group.target);
                }
                drafts.push(Draft {
                    base: group.target.clone(),
                    members,
                    is_outlier_bucket: false,
                });
            }
        }

        for name in names.iter().filter(|n| self.merge_group_for(n).is_none()) {
            let members: Vec<&str> = cluster_members(groups, emails, name.cluster_id)
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect();
            if !members.is_empty() {
                drafts.push(Draft {
                    base: name.base.clone(),
                    members,
                    is_outlier_bucket: name.is_outlier,
                });
            }
        }

        let uncategorized: Vec<&str> = emails
            .iter()
            .map(|e| e.id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        if !uncategorized.is_empty() {
            tracing::warn!("{} emails were not claimed by any cluster", uncategorized.len());
            drafts.push(Draft {
                base: UNCATEGORIZED_LABEL.to_string(),
                members: uncategorized,
                is_outlier_bucket: true,
            });
        }

        finalize(drafts)
    }
}

fn cluster_members<'e>(
    groups: &BTreeMap<i32, Vec<usize>>,
    emails: &'e [EmailRecord],
    cluster_id: i32,
) -> Vec<&'e str> {
    groups
        .get(&cluster_id)
        .map(|rows| {
            rows.iter()
                .filter_map(|r| emails.get(*r))
                .map(|e| e.id.as_str())
                .collect()
        })
        .unwrap_or_default()
}

/// Display names with member counts, made unique with ` #2`, ` #3` suffixes
fn finalize(drafts: Vec<Draft>) -> Vec<Category> {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    drafts
        .into_iter()
        .map(|draft| {
            let count = occurrences.entry(draft.base.clone()).or_default();
            *count += 1;
            let base = if *count > 1 {
                format!("{} #{}", draft.base, count)
            } else {
                draft.base
            };
            let name = if draft.is_outlier_bucket && base != UNCATEGORIZED_LABEL {
                base
            } else {
                format!("{} ({} emails)", base, draft.members.len())
            };
            Category {
                name,
                members: draft.members.into_iter().map(str::to_string).collect(),
                is_outlier_bucket: draft.is_outlier_bucket,
            }
        })
        .collect()
}

/// Every input id in exactly one non-empty category, every name unique
pub fn verify_partition(categorization: &Categorization, emails: &[EmailRecord]) -> CategorizerResult<()> {
    let expected: HashSet<&str> = emails.iter().map(|e| e.id.as_str()).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for category in &categorization.categories {
        if category.is_empty() {
            return Err(anyhow::anyhow!("category '{}' has no members", category.name).into());
        }
        for id in &category.members {
            *counts.entry(id.as_str()).or_default() += 1;
        }
    }

    let duplicated: Vec<&str> = counts
        .iter()
        .filter(|(_, c)| **c > 1)
        .map(|(id, _)| *id)
        .sorted()
        .collect();
    let missing: Vec<&str> = expected
        .iter()
        .filter(|id| !counts.contains_key(*id))
        .copied()
        .sorted()
        .collect();
    let unknown: Vec<&str> = counts
        .keys()
        .filter(|id| !expected.contains(*id))
        .copied()
        .sorted()
        .collect();
    let names: HashSet<&str> = categorization.categories.iter().map(|c| c.name.as_str()).collect();

    if !duplicated.is_empty() || !missing.is_empty() || !unknown.is_empty() {
        return Err(CategorizerError::Internal(anyhow::anyhow!(
            "categories do not partition the input: duplicated {:?}, missing {:?}, unknown {:?}",
            duplicated,
            missing,
            unknown
        )));
    }
    if names.len() != categorization.categories.len() {
        return Err(anyhow::anyhow!("category names are not unique").into());
    }
    Ok(())
}
