use crate::domain::analysis::{BinaryName, ClassKind, UnitPath};
use crate::domain::descriptor::{TypeDescriptor, UnitDescriptor};
use crate::domain::ports::{
    CompileOutcome, CompilerDiagnostic, CompilerInvocation, DiagnosticKind, UnitSource,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Predicts what a real compiler would write for each unit, without running one.
///
/// Every declared type produces a class; `package-info` produces one only when it carries a
/// retained annotation. Units the front end could not parse fail the invocation.
pub struct DryRunCompiler {
    source: Arc<dyn UnitSource>,
}

impl DryRunCompiler {
    pub fn new(source: Arc<dyn UnitSource>) -> Self {
        Self { source }
    }
}

impl CompilerInvocation for DryRunCompiler {
    fn compile(&self, units: &[UnitPath]) -> Result<CompileOutcome> {
        let mut outcome = CompileOutcome {
            success: true,
            ..CompileOutcome::default()
        };
        for unit in units {
            let descriptor = self.source.describe(unit)?;
            if let Some(message) = &descriptor.parse_error {
                outcome.success = false;
                outcome.diagnostics.push(CompilerDiagnostic {
                    unit: unit.clone(),
                    kind: DiagnosticKind::Error,
                    message: message.clone(),
                });
                continue;
            }
            let produced = produced_classes(&descriptor);
            debug!(unit = %unit, classes = produced.len(), "dry-run compiled");
            outcome.produced.insert(unit.clone(), produced);
        }
        Ok(outcome)
    }
}

fn produced_classes(unit: &UnitDescriptor) -> Vec<BinaryName> {
    let mut produced = Vec::new();
    let mut stack: Vec<&TypeDescriptor> = unit.types.iter().collect();
    while let Some(descriptor) = stack.pop() {
        let emits = match descriptor.kind {
            ClassKind::PackageInfo => descriptor
                .annotations
                .iter()
                .any(|a| a.retention.is_retained()),
            ClassKind::Class
            | ClassKind::Interface
            | ClassKind::Record
            | ClassKind::AnnotationType
            | ClassKind::ModuleInfo => true,
        };
        if emits {
            produced.push(descriptor.binary_name.clone());
        }
        stack.extend(descriptor.nested_types.iter());
    }
    produced.sort();
    produced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::json::JsonUnitSource;
    use crate::domain::analysis::Retention;
    use crate::domain::descriptor::AnnotationDescriptor;

    fn unit(path: &str, types: Vec<TypeDescriptor>) -> UnitDescriptor {
        UnitDescriptor {
            path: path.to_string(),
            content_hash: "1".into(),
            package: "p".into(),
            module: None,
            parse_error: None,
            types,
        }
    }

    #[test]
    fn test_nested_types_are_produced() {
        let mut outer = TypeDescriptor::new("p.Outer", ClassKind::Class);
        outer
            .nested_types
            .push(TypeDescriptor::new("p.Outer$Inner", ClassKind::Class));
        let source = Arc::new(JsonUnitSource::new(vec![unit("p/Outer.java", vec![outer])]));
        let outcome = DryRunCompiler::new(source)
            .compile(&["p/Outer.java".to_string()])
            .unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.produced["p/Outer.java"],
            vec!["p.Outer".to_string(), "p.Outer$Inner".to_string()]
        );
    }

    #[test]
    fn test_package_info_without_retained_annotations_produces_nothing() {
        let mut info = TypeDescriptor::new("p.package-info", ClassKind::PackageInfo);
        info.annotations.push(AnnotationDescriptor {
            annotation_type: "p.Lint".into(),
            retention: Retention::Source,
            arguments: Vec::new(),
        });
        let source = Arc::new(JsonUnitSource::new(vec![unit(
            "p/package-info.java",
            vec![info],
        )]));
        let outcome = DryRunCompiler::new(source)
            .compile(&["p/package-info.java".to_string()])
            .unwrap();
        assert!(outcome.produced["p/package-info.java"].is_empty());
    }

    #[test]
    fn test_parse_error_fails_invocation() {
        let mut broken = unit("p/A.java", vec![TypeDescriptor::new("p.A", ClassKind::Class)]);
        broken.parse_error = Some("reached end of file while parsing".into());
        let source = Arc::new(JsonUnitSource::new(vec![broken]));
        let outcome = DryRunCompiler::new(source)
            .compile(&["p/A.java".to_string()])
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Error);
    }
}
