//! Gem-style version requirement parsing: `"~> 2.2, >= 2.2.8"`. Each
//! comma-separated clause is one [`Clause`]; a [`Constraint`] is the
//! conjunction of every clause that has accumulated against one name
//! across the dependency graph (every edge narrows the set further).

use std::fmt;

use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Pessimistic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    op: Op,
    version: Version,
}

impl Clause {
    fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Op::Eq => candidate == &self.version,
            Op::Neq => candidate != &self.version,
            Op::Gt => candidate > &self.version,
            Op::Gte => candidate >= &self.version,
            Op::Lt => candidate < &self.version,
            Op::Lte => candidate <= &self.version,
            Op::Pessimistic => candidate >= &self.version && candidate < &self.version.pessimistic_upper(),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Eq => "=",
            Op::Neq => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Pessimistic => "~>",
        };
        write!(f, "{op} {}", self.version)
    }
}

/// The conjunction of every requirement string seen for one gem name so
/// far in the resolve; empty means "any version".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint(Vec<Clause>);

impl Constraint {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse_one(requirement: &str) -> Self {
        Self(requirement.split(',').map(str::trim).filter(|c| !c.is_empty()).map(parse_clause).collect())
    }

    /// Folds another requirement string into this one (every top-level
    /// and transitive edge narrows the candidate set further).
    pub fn and(&self, requirement: &str) -> Self {
        let mut clauses = self.0.clone();
        clauses.extend(Self::parse_one(requirement).0);
        Self(clauses)
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        self.0.iter().all(|clause| clause.matches(candidate))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(any)");
        }
        let parts: Vec<String> = self.0.iter().map(Clause::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

fn parse_clause(clause: &str) -> Clause {
    let (op, rest) = if let Some(rest) = clause.strip_prefix("~>") {
        (Op::Pessimistic, rest)
    } else if let Some(rest) = clause.strip_prefix(">=") {
        (Op::Gte, rest)
    } else if let Some(rest) = clause.strip_prefix("<=") {
        (Op::Lte, rest)
    } else if let Some(rest) = clause.strip_prefix("!=") {
        (Op::Neq, rest)
    } else if let Some(rest) = clause.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = clause.strip_prefix('<') {
        (Op::Lt, rest)
    } else if let Some(rest) = clause.strip_prefix('=') {
        (Op::Eq, rest)
    } else {
        (Op::Eq, clause)
    };
    Clause {
        op,
        version: Version::parse(rest.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_version_is_exact_match() {
        let c = Constraint::parse_one("2.2.8");
        assert!(c.matches(&Version::parse("2.2.8")));
        assert!(!c.matches(&Version::parse("2.2.9")));
    }

    #[test]
    fn pessimistic_clause_excludes_the_next_minor() {
        let c = Constraint::parse_one("~> 2.2");
        assert!(c.matches(&Version::parse("2.9.9")));
        assert!(!c.matches(&Version::parse("3.0.0")));
    }

    #[test]
    fn multiple_comma_clauses_all_must_hold() {
        let c = Constraint::parse_one("~> 2.2, >= 2.2.8");
        assert!(!c.matches(&Version::parse("2.2.7")));
        assert!(c.matches(&Version::parse("2.2.8")));
    }

    #[test]
    fn and_narrows_an_existing_constraint() {
        let c = Constraint::any().and(">= 1.0").and("< 2.0");
        assert!(c.matches(&Version::parse("1.5.0")));
        assert!(!c.matches(&Version::parse("2.0.0")));
    }
}
