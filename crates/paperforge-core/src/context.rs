//! Parent/child question families.
//!
//! A parent question is shared context (a passage, a diagram) and is never
//! placed in a paper. Its children are. [`ContextResolver::enrich`] copies the
//! parent's text and image onto every selected child so a paper can be
//! rendered without further lookups.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use anyhow::{Context, Result};

use crate::model::{Family, ParentContext, Question, SelectedQuestion};
use crate::traits::QuestionRepository;

/// A parent and its children, in the parent's listed order.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionFamily {
    pub parent: Question,
    pub children: Vec<Question>,
}

impl QuestionFamily {
    pub fn image_url(&self) -> Option<&str> {
        self.parent.image_url.as_deref()
    }

    pub fn total_marks(&self) -> u32 {
        self.children.iter().map(Question::mark_value).sum()
    }
}

pub struct ContextResolver<'a> {
    repository: &'a dyn QuestionRepository,
}

impl<'a> ContextResolver<'a> {
    pub fn new(repository: &'a dyn QuestionRepository) -> Self {
        Self { repository }
    }

    /// Fetch the family rooted at `parent_id`. Returns `None` when the id is
    /// unknown or names a question that is not a parent.
    pub async fn family(&self, parent_id: &str) -> Result<Option<QuestionFamily>> {
        let mut found = self
            .repository
            .get_questions_by_id(&[parent_id.to_string()])
            .await
            .with_context(|| format!("fetching parent {parent_id}"))?;
        let Some(parent) = found.pop().filter(|q| q.id == parent_id) else {
            tracing::warn!(parent = parent_id, "parent question not found");
            return Ok(None);
        };
        let Family::Parent { children: child_ids } = &parent.family else {
            return Ok(None);
        };

        let mut children = if child_ids.is_empty() {
            Vec::new()
        } else {
            self.repository
                .get_questions_by_id(child_ids)
                .await
                .with_context(|| format!("fetching children of {parent_id}"))?
        };
        children.sort_by_key(|c| {
            child_ids
                .iter()
                .position(|id| *id == c.id)
                .unwrap_or(usize::MAX)
        });

        Ok(Some(QuestionFamily { parent, children }))
    }

    /// Attach parent context to every child in `selection`.
    ///
    /// Children whose parent cannot be fetched are left as they are.
    pub async fn enrich(&self, mut selection: Vec<SelectedQuestion>) -> Vec<SelectedQuestion> {
        let parent_ids: Vec<String> = selection
            .iter()
            .filter_map(|s| s.question.parent_id())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if parent_ids.is_empty() {
            return selection;
        }

        let parents = match self.repository.get_questions_by_id(&parent_ids).await {
            Ok(parents) => parents,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch parents, skipping enrichment");
                return selection;
            }
        };
        let by_id: HashMap<&str, &Question> = parents.iter().map(|p| (p.id.as_str(), p)).collect();

        for selected in &mut selection {
            let question = &mut selected.question;
            let Family::Child {
                parent_id,
                uses_parent_image,
            } = &question.family
            else {
                continue;
            };
            let Some(parent) = by_id.get(parent_id.as_str()) else {
                tracing::warn!(child = %question.id, parent = %parent_id, "parent missing");
                continue;
            };
            if *uses_parent_image {
                question.image_url = parent.image_url.clone();
            }
            question.parent_context = Some(ParentContext {
                question_text: parent.question_text.clone(),
                image_url: parent.image_url.clone(),
                pqp_number: parent.pqp_number.clone(),
            });
        }

        selection
    }
}

/// A broken parent/child link in a question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyIssue {
    /// A child names a parent that does not exist.
    MissingParent { child: String, parent: String },
    /// A child names a question that is not marked as a parent.
    NotAParent { child: String, parent: String },
    /// A parent lists a child id that does not exist.
    UnknownChild { parent: String, child: String },
    /// A parent lists another parent as its child.
    ChildIsParent { parent: String, child: String },
}

impl fmt::Display for FamilyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyIssue::MissingParent { child, parent } => {
                write!(f, "{child}: parent {parent} does not exist")
            }
            FamilyIssue::NotAParent { child, parent } => {
                write!(f, "{child}: parent {parent} is not marked as a parent")
            }
            FamilyIssue::UnknownChild { parent, child } => {
                write!(f, "{parent}: lists unknown child {child}")
            }
            FamilyIssue::ChildIsParent { parent, child } => {
                write!(f, "{parent}: child {child} is itself a parent")
            }
        }
    }
}

/// Check every family link in `questions`.
pub fn check_family_links(questions: &[Question]) -> Vec<FamilyIssue> {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for question in questions {
        if !seen.insert(question.id.as_str()) {
            continue;
        }
        match &question.family {
            Family::Standalone => {}
            Family::Child { parent_id, .. } => match by_id.get(parent_id.as_str()) {
                None => issues.push(FamilyIssue::MissingParent {
                    child: question.id.clone(),
                    parent: parent_id.clone(),
                }),
                Some(parent) if !parent.is_parent() => issues.push(FamilyIssue::NotAParent {
                    child: question.id.clone(),
                    parent: parent_id.clone(),
                }),
                Some(_) => {}
            },
            Family::Parent { children } => {
                for child_id in children {
                    match by_id.get(child_id.as_str()) {
                        None => issues.push(FamilyIssue::UnknownChild {
                            parent: question.id.clone(),
                            child: child_id.clone(),
                        }),
                        Some(child) if child.is_parent() => issues.push(FamilyIssue::ChildIsParent {
                            parent: question.id.clone(),
                            child: child_id.clone(),
                        }),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{child, parent, question, FakeRepository};

    fn bank() -> Vec<Question> {
        let mut p = parent("p1", "Functions", &["c2", "c1"]);
        p.question_text = Some("Consider f(x) = x^2".into());
        p.image_url = Some("graph.png".into());
        p.pqp_number = Some("3".into());

        let c1 = child("c1", "Functions", 2, "p1");
        let mut c2 = child("c2", "Functions", 3, "p1");
        c2.family = Family::Child {
            parent_id: "p1".into(),
            uses_parent_image: true,
        };
        vec![p, c1, c2, question("s1", "Functions", 4, "Level 1")]
    }

    #[tokio::test]
    async fn family_keeps_listed_child_order() {
        let repo = FakeRepository::new(bank());
        let resolver = ContextResolver::new(&repo);
        let family = resolver.family("p1").await.unwrap().unwrap();
        let ids: Vec<&str> = family.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(family.total_marks(), 5);
        assert_eq!(family.image_url(), Some("graph.png"));

        assert!(resolver.family("s1").await.unwrap().is_none());
        assert!(resolver.family("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrich_attaches_parent_context() {
        let repo = FakeRepository::new(bank());
        let questions = bank();
        let selection: Vec<SelectedQuestion> = questions[1..]
            .iter()
            .map(|q| SelectedQuestion::new(q.clone(), "Functions", 5))
            .collect();

        let enriched = ContextResolver::new(&repo).enrich(selection).await;

        let c1 = &enriched[0].question;
        let context = c1.parent_context.as_ref().unwrap();
        assert_eq!(context.question_text.as_deref(), Some("Consider f(x) = x^2"));
        assert_eq!(context.pqp_number.as_deref(), Some("3"));
        assert_eq!(c1.image_url, None);

        let c2 = &enriched[1].question;
        assert_eq!(c2.image_url.as_deref(), Some("graph.png"));

        assert!(enriched[2].question.parent_context.is_none());
        assert_eq!(repo.id_calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn enrich_without_parent_leaves_child() {
        let repo = FakeRepository::new(vec![]);
        let selection = vec![SelectedQuestion::new(child("c9", "Functions", 2, "gone"), "Functions", 2)];
        let enriched = ContextResolver::new(&repo).enrich(selection.clone()).await;
        assert_eq!(enriched, selection);
    }

    #[test]
    fn family_link_checks() {
        let mut questions = bank();
        questions.push(child("orphan", "Functions", 1, "nowhere"));
        questions.push(child("wrong", "Functions", 1, "s1"));
        questions.push(parent("p2", "Functions", &["p1", "ghost"]));

        let issues = check_family_links(&questions);
        assert_eq!(
            issues,
            vec![
                FamilyIssue::MissingParent {
                    child: "orphan".into(),
                    parent: "nowhere".into()
                },
                FamilyIssue::NotAParent {
                    child: "wrong".into(),
                    parent: "s1".into()
                },
                FamilyIssue::ChildIsParent {
                    parent: "p2".into(),
                    child: "p1".into()
                },
                FamilyIssue::UnknownChild {
                    parent: "p2".into(),
                    child: "ghost".into()
                },
            ]
        );
        assert_eq!(issues[0].to_string(), "orphan: parent nowhere does not exist");
        assert!(check_family_links(&bank()).is_empty());
    }
}
