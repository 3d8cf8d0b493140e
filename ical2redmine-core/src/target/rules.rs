use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::target::{Target, TargetResolver};

/// One entry of the `mappings` setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub issue_id: u64,
    pub activity_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub comment_prefix: String,
}

#[derive(Debug)]
struct CompiledRule {
    summary: Option<Regex>,
    description: Option<Regex>,
    location: Option<Regex>,
    target: Target,
}

impl CompiledRule {
    fn matches(&self, event: &Event) -> bool {
        full_match(&self.summary, &event.summary)
            && full_match(&self.description, &event.description)
            && full_match(&self.location, &event.location)
    }
}

fn full_match(predicate: &Option<Regex>, value: &str) -> bool {
    predicate.as_ref().is_none_or(|re| re.is_match(value))
}

fn compile_full(pattern: &Option<String>) -> SyncResult<Option<Regex>> {
    pattern
        .as_deref()
        .map(|p| Regex::new(&format!("^(?:{p})$")).map_err(|e| SyncError::pattern(p, e.to_string())))
        .transpose()
}

/// Ordered mapping rules; the first rule whose predicates all match wins.
#[derive(Debug)]
pub struct RuleSetResolver {
    rules: Vec<CompiledRule>,
}

impl RuleSetResolver {
    pub fn compile(rules: &[MappingRule]) -> SyncResult<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    summary: compile_full(&rule.summary)?,
                    description: compile_full(&rule.description)?,
                    location: compile_full(&rule.location)?,
                    target: Target {
                        issue_id: rule.issue_id,
                        activity_id: Some(rule.activity_id),
                        user_id: Some(rule.user_id),
                        comment_prefix: rule.comment_prefix.clone(),
                        explicit_activity: true,
                    },
                })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(RuleSetResolver { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TargetResolver for RuleSetResolver {
    fn resolve(&self, event: &Event) -> SyncResult<Option<Target>> {
        Ok(self
            .rules
            .iter()
            .find(|rule| rule.matches(event))
            .map(|rule| rule.target.clone()))
    }
}
