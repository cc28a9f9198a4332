use std::fmt;

/// The lane a scheduled unit of work runs in. Each tag has its own
/// concurrency cap and FIFO ready queue in the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    FetchIndex,
    GitClone,
    Download,
    Extract,
    Link,
    BuildExt,
    Binstub,
    Resolve,
}

impl TypeTag {
    pub const ALL: [TypeTag; 8] = [
        TypeTag::FetchIndex,
        TypeTag::GitClone,
        TypeTag::Download,
        TypeTag::Extract,
        TypeTag::Link,
        TypeTag::BuildExt,
        TypeTag::Binstub,
        TypeTag::Resolve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::FetchIndex => "fetch_index",
            TypeTag::GitClone => "git_clone",
            TypeTag::Download => "download",
            TypeTag::Extract => "extract",
            TypeTag::Link => "link",
            TypeTag::BuildExt => "build_ext",
            TypeTag::Binstub => "binstub",
            TypeTag::Resolve => "resolve",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_has_a_distinct_name() {
        let names: std::collections::HashSet<_> = TypeTag::ALL.iter().map(TypeTag::as_str).collect();
        assert_eq!(names.len(), TypeTag::ALL.len());
    }
}
