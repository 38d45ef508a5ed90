//! Revision chain and migration targets.
//!
//! A revision names one schema step and the step it follows. The chain is
//! strictly linear: one base, no branches. Positions on the chain are
//! `Option<usize>` where `None` means "nothing applied" (below the base).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RevisionError;

/// One schema step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Revision {
    pub id: &'static str,
    pub down_revision: Option<&'static str>,
    pub description: &'static str,
}

/// Direction a run moves along the chain.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
        })
    }
}

/// Where a run should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Newest revision.
    Head,
    /// Nothing applied.
    Base,
    /// Full revision id or a unique prefix of one.
    Revision(String),
    /// Steps relative to the current revision (`+1`, `-2`).
    Relative(i64),
}

impl FromStr for Target {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err(RevisionError::InvalidTarget(s.to_owned())),
            "head" | "heads" => Ok(Self::Head),
            "base" => Ok(Self::Base),
            _ if s.starts_with(['+', '-']) => s
                .parse::<i64>()
                .map(Self::Relative)
                .map_err(|_| RevisionError::InvalidTarget(s.to_owned())),
            _ if s.chars().all(|c| c.is_ascii_hexdigit()) => Ok(Self::Revision(s.to_lowercase())),
            _ => Err(RevisionError::InvalidTarget(s.to_owned())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str("head"),
            Self::Base => f.write_str("base"),
            Self::Revision(id) => f.write_str(id),
            Self::Relative(steps) => write!(f, "{steps:+}"),
        }
    }
}

/// Validated, linear list of revisions ordered base to head.
#[derive(Debug, Clone)]
pub struct RevisionChain {
    revisions: Vec<&'static Revision>,
}

impl RevisionChain {
    /// Order `revisions` by their parent links, rejecting anything non-linear.
    pub fn new(revisions: &[&'static Revision]) -> Result<Self, RevisionError> {
        let mut seen = HashSet::new();
        for revision in revisions {
            if !seen.insert(revision.id) {
                return Err(RevisionError::Duplicate(revision.id.to_owned()));
            }
        }

        let mut bases = Vec::new();
        let mut children: HashMap<&str, Vec<&'static Revision>> = HashMap::new();
        for revision in revisions {
            match revision.down_revision {
                None => bases.push(*revision),
                Some(parent) if !seen.contains(parent) => {
                    return Err(RevisionError::UnknownParent {
                        revision: revision.id.to_owned(),
                        parent: parent.to_owned(),
                    });
                },
                Some(parent) => children.entry(parent).or_default().push(*revision),
            }
        }

        let base = match bases.as_slice() {
            [] => return Err(RevisionError::NoBase),
            [base] => *base,
            many => {
                return Err(RevisionError::MultipleBases(
                    many.iter().map(|r| r.id.to_owned()).collect(),
                ));
            },
        };

        if let Some((parent, kids)) = children.iter().find(|(_, kids)| kids.len() > 1) {
            let mut kids: Vec<String> = kids.iter().map(|r| r.id.to_owned()).collect();
            kids.sort();
            return Err(RevisionError::Branched { parent: (*parent).to_owned(), children: kids });
        }

        let mut ordered = vec![base];
        let mut cursor = base;
        while let Some([next]) = children.get(cursor.id).map(Vec::as_slice) {
            ordered.push(*next);
            cursor = *next;
        }

        if ordered.len() != revisions.len() {
            let reachable: HashSet<&str> = ordered.iter().map(|r| r.id).collect();
            let stray = revisions
                .iter()
                .find(|r| !reachable.contains(r.id))
                .map_or_else(String::new, |r| r.id.to_owned());
            return Err(RevisionError::Unreachable(stray));
        }

        Ok(Self { revisions: ordered })
    }

    #[must_use]
    pub fn base(&self) -> &'static Revision {
        self.revisions[0]
    }

    #[must_use]
    pub fn head(&self) -> &'static Revision {
        self.revisions[self.revisions.len() - 1]
    }

    /// Revisions from base to head.
    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = &'static Revision> + ExactSizeIterator + '_ {
        self.revisions.iter().copied()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&'static Revision> {
        self.revisions.get(position).copied()
    }

    /// Position of an exact revision id.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.revisions.iter().position(|r| r.id == id)
    }

    /// Resolve `target` to a chain position, given the current one.
    pub fn resolve(
        &self,
        target: &Target,
        current: Option<usize>,
    ) -> Result<Option<usize>, RevisionError> {
        match target {
            Target::Head => Ok(Some(self.revisions.len() - 1)),
            Target::Base => Ok(None),
            Target::Revision(prefix) => {
                if let Some(exact) = self.position(prefix) {
                    return Ok(Some(exact));
                }
                let matches: Vec<usize> = self
                    .revisions
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.id.starts_with(prefix.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                match matches.as_slice() {
                    [] => Err(RevisionError::UnknownRevision(prefix.clone())),
                    [only] => Ok(Some(*only)),
                    many => Err(RevisionError::AmbiguousRevision {
                        prefix: prefix.clone(),
                        matches: many.iter().map(|i| self.revisions[*i].id.to_owned()).collect(),
                    }),
                }
            },
            Target::Relative(steps) => {
                let len = i64::try_from(self.revisions.len())
                    .map_err(|_| RevisionError::RelativeOutOfRange(*steps))?;
                let from = current.and_then(|p| i64::try_from(p).ok()).unwrap_or(-1);
                let to = from
                    .checked_add(*steps)
                    .filter(|to| (-1..len).contains(to))
                    .ok_or(RevisionError::RelativeOutOfRange(*steps))?;
                Ok(usize::try_from(to).ok())
            },
        }
    }

    /// Revisions to apply, in order, to move up from `current` to `target`.
    pub fn plan_upgrade(
        &self,
        current: Option<usize>,
        target: Option<usize>,
    ) -> Result<Vec<&'static Revision>, RevisionError> {
        if target < current {
            return Err(self.wrong_direction(Direction::Upgrade, current, target));
        }
        let start = current.map_or(0, |p| p + 1);
        let end = target.map_or(0, |p| p + 1);
        Ok(self.revisions[start..end].to_vec())
    }

    /// Revisions to revert, newest first, to move down from `current` to `target`.
    pub fn plan_downgrade(
        &self,
        current: Option<usize>,
        target: Option<usize>,
    ) -> Result<Vec<&'static Revision>, RevisionError> {
        if target > current {
            return Err(self.wrong_direction(Direction::Downgrade, current, target));
        }
        let start = target.map_or(0, |p| p + 1);
        let end = current.map_or(0, |p| p + 1);
        Ok(self.revisions[start..end].iter().rev().copied().collect())
    }

    /// Human-readable label for a position.
    #[must_use]
    pub fn label(&self, position: Option<usize>) -> &'static str {
        position.and_then(|p| self.get(p)).map_or("base", |r| r.id)
    }

    fn wrong_direction(
        &self,
        direction: Direction,
        from: Option<usize>,
        to: Option<usize>,
    ) -> RevisionError {
        RevisionError::WrongDirection {
            direction,
            from: self.label(from).to_owned(),
            to: self.label(to).to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static A: Revision = Revision { id: "a36ffbb6580e", down_revision: None, description: "a" };
    static B: Revision =
        Revision { id: "47e45e505e22", down_revision: Some("a36ffbb6580e"), description: "b" };
    static C: Revision =
        Revision { id: "4a1d3f0c9b11", down_revision: Some("47e45e505e22"), description: "c" };

    fn chain() -> RevisionChain {
        RevisionChain::new(&[&C, &A, &B]).unwrap()
    }

    #[test]
    fn test_chain_orders_by_parent_links() {
        let chain = chain();
        let ids: Vec<&str> = chain.iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a36ffbb6580e", "47e45e505e22", "4a1d3f0c9b11"]);
        assert_eq!(chain.base().id, "a36ffbb6580e");
        assert_eq!(chain.head().id, "4a1d3f0c9b11");
    }

    #[test]
    fn test_chain_rejects_duplicates() {
        let err = RevisionChain::new(&[&A, &A]).unwrap_err();
        assert_eq!(err, RevisionError::Duplicate("a36ffbb6580e".to_owned()));
    }

    #[test]
    fn test_chain_rejects_unknown_parent() {
        let err = RevisionChain::new(&[&B]).unwrap_err();
        assert!(matches!(err, RevisionError::UnknownParent { .. }));
    }

    #[test]
    fn test_chain_rejects_empty_and_multiple_bases() {
        assert_eq!(RevisionChain::new(&[]).unwrap_err(), RevisionError::NoBase);

        static OTHER_BASE: Revision = Revision { id: "ffff", down_revision: None, description: "" };
        let err = RevisionChain::new(&[&A, &OTHER_BASE]).unwrap_err();
        assert!(matches!(err, RevisionError::MultipleBases(ids) if ids.len() == 2));
    }

    #[test]
    fn test_chain_rejects_branches() {
        static SIBLING: Revision =
            Revision { id: "bbbb", down_revision: Some("a36ffbb6580e"), description: "" };
        let err = RevisionChain::new(&[&A, &B, &SIBLING]).unwrap_err();
        assert!(
            matches!(err, RevisionError::Branched { ref parent, .. } if parent == "a36ffbb6580e")
        );
    }

    #[test]
    fn test_chain_rejects_unreachable_cycle() {
        static X: Revision = Revision { id: "aaaa", down_revision: Some("bbbb"), description: "" };
        static Y: Revision = Revision { id: "bbbb", down_revision: Some("aaaa"), description: "" };
        let err = RevisionChain::new(&[&A, &X, &Y]).unwrap_err();
        assert!(matches!(err, RevisionError::Unreachable(_)));
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("head".parse::<Target>().unwrap(), Target::Head);
        assert_eq!("base".parse::<Target>().unwrap(), Target::Base);
        assert_eq!("-1".parse::<Target>().unwrap(), Target::Relative(-1));
        assert_eq!("+2".parse::<Target>().unwrap(), Target::Relative(2));
        assert_eq!("47E4".parse::<Target>().unwrap(), Target::Revision("47e4".to_owned()));
        assert!("".parse::<Target>().is_err());
        assert!("not-a-revision".parse::<Target>().is_err());
        assert!("-x".parse::<Target>().is_err());
    }

    #[test]
    fn test_resolve_prefix_and_ambiguity() {
        static D: Revision =
            Revision { id: "4a1d000000ff", down_revision: Some("4a1d3f0c9b11"), description: "" };
        let chain = RevisionChain::new(&[&A, &B, &C, &D]).unwrap();

        let target = Target::Revision("47e".to_owned());
        assert_eq!(chain.resolve(&target, None).unwrap(), Some(1));

        let ambiguous = Target::Revision("4".to_owned());
        assert!(matches!(
            chain.resolve(&ambiguous, None).unwrap_err(),
            RevisionError::AmbiguousRevision { matches, .. } if matches.len() == 3
        ));

        let unknown = Target::Revision("dead".to_owned());
        assert_eq!(
            chain.resolve(&unknown, None).unwrap_err(),
            RevisionError::UnknownRevision("dead".to_owned())
        );
    }

    #[test]
    fn test_resolve_relative_bounds() {
        let chain = chain();
        assert_eq!(chain.resolve(&Target::Relative(1), None).unwrap(), Some(0));
        assert_eq!(chain.resolve(&Target::Relative(-1), Some(0)).unwrap(), None);
        assert_eq!(chain.resolve(&Target::Relative(-1), Some(2)).unwrap(), Some(1));
        assert_eq!(
            chain.resolve(&Target::Relative(-1), None).unwrap_err(),
            RevisionError::RelativeOutOfRange(-1)
        );
        assert_eq!(
            chain.resolve(&Target::Relative(2), Some(1)).unwrap_err(),
            RevisionError::RelativeOutOfRange(2)
        );
    }

    #[test]
    fn test_plan_upgrade_from_nothing() {
        let chain = chain();
        let plan = chain.plan_upgrade(None, Some(2)).unwrap();
        let ids: Vec<&str> = plan.iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a36ffbb6580e", "47e45e505e22", "4a1d3f0c9b11"]);
        assert!(chain.plan_upgrade(Some(2), Some(2)).unwrap().is_empty());
    }

    #[test]
    fn test_plan_downgrade_is_newest_first() {
        let chain = chain();
        let plan = chain.plan_downgrade(Some(2), Some(0)).unwrap();
        let ids: Vec<&str> = plan.iter().map(|r| r.id).collect();
        assert_eq!(ids, ["4a1d3f0c9b11", "47e45e505e22"]);

        let all = chain.plan_downgrade(Some(1), None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_plan_rejects_wrong_direction() {
        let chain = chain();
        let err = chain.plan_upgrade(Some(1), Some(0)).unwrap_err();
        assert_eq!(err.to_string(), "cannot upgrade from 47e45e505e22 to a36ffbb6580e");
        let err = chain.plan_downgrade(None, Some(0)).unwrap_err();
        assert_eq!(err.to_string(), "cannot downgrade from base to a36ffbb6580e");
    }
}
