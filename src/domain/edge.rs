use serde::{Deserialize, Serialize};

/// Edge kind - typed dependency from a consumer to what it depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeKind {
    // ============ Class → Class ============
    TypeReference, // signature or body mentions the target type
    Inheritance,   // extends / implements (also implies a type reference)
    /// Consumer inlines `target.constant`
    ConstantUsage { constant: String },
    /// Consumer is annotated with the target, or folds one of its constants in an annotation argument
    AnnotationUsage,

    // ============ Class → Pseudo-node ============
    PackageMembership,
    ModuleMembership,
}

impl EdgeKind {
    /// Edges that mean "recompile me if the target's ABI changes".
    pub fn is_abi_sensitive(&self) -> bool {
        matches!(
            self,
            EdgeKind::TypeReference | EdgeKind::Inheritance | EdgeKind::AnnotationUsage
        )
    }

    /// Edges that pull a consumer into the unconditional first hop.
    pub fn is_dependency(&self) -> bool {
        !self.is_membership()
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, EdgeKind::PackageMembership | EdgeKind::ModuleMembership)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::TypeReference => "type-reference",
            EdgeKind::Inheritance => "inheritance",
            EdgeKind::ConstantUsage { .. } => "constant-usage",
            EdgeKind::AnnotationUsage => "annotation-usage",
            EdgeKind::PackageMembership => "package-membership",
            EdgeKind::ModuleMembership => "module-membership",
        }
    }
}
