use crate::domain::analysis::{
    BinaryName, ClassAnalysis, ClassKind, ConstValue, ConstantRef, ModuleDirective, Retention,
    module_info_name, package_info_name,
};
use crate::domain::descriptor::{
    AnnotationDescriptor, ConstExpr, FieldDescriptor, TypeDescriptor, UnitDescriptor,
};
use crate::domain::error::AnalysisError;
use crate::domain::fold::{self, ConstantResolver, Resolved};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Read access to analyses that are not part of the batch being analyzed: classes re-analyzed
/// earlier in this build, then the persisted baseline.
pub trait ConstantLookup: Sync {
    fn analysis(&self, binary_name: &str) -> Option<&ClassAnalysis>;
}

impl ConstantLookup for BTreeMap<BinaryName, ClassAnalysis> {
    fn analysis(&self, binary_name: &str) -> Option<&ClassAnalysis> {
        self.get(binary_name)
    }
}

impl ConstantLookup for HashMap<BinaryName, ClassAnalysis> {
    fn analysis(&self, binary_name: &str) -> Option<&ClassAnalysis> {
        self.get(binary_name)
    }
}

/// Outcome of analyzing one unit.
#[derive(Debug, Clone)]
pub struct UnitAnalysis {
    pub unit: String,
    pub result: Result<Vec<ClassAnalysis>, AnalysisError>,
}

/// Class analyzer - turns front-end unit descriptors into [`ClassAnalysis`] records
pub struct ClassAnalyzer {
    parallel_threshold: usize,
}

impl Default for ClassAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassAnalyzer {
    pub fn new() -> Self {
        Self {
            parallel_threshold: 32,
        }
    }

    /// Batches of at least `threshold` units are analyzed on the rayon pool.
    pub fn with_parallel_threshold(threshold: usize) -> Self {
        Self {
            parallel_threshold: threshold.max(1),
        }
    }

    pub fn analyze_unit(
        &self,
        unit: &UnitDescriptor,
        lookup: &dyn ConstantLookup,
    ) -> Result<Vec<ClassAnalysis>, AnalysisError> {
        let mut results = self.analyze_batch(std::slice::from_ref(unit), lookup);
        results
            .pop()
            .map(|r| r.result)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Analyze a batch of units. Constants declared anywhere in the batch are folded from the
    /// batch's own sources, so chains across units settle in one pass. Results come back in
    /// input order.
    pub fn analyze_batch(
        &self,
        units: &[UnitDescriptor],
        lookup: &dyn ConstantLookup,
    ) -> Vec<UnitAnalysis> {
        let index = BatchIndex::new(units);

        if units.len() >= self.parallel_threshold {
            units
                .par_iter()
                .map(|unit| UnitAnalysis {
                    unit: unit.path.clone(),
                    result: analyze_in_batch(unit, &index, lookup),
                })
                .collect()
        } else {
            units
                .iter()
                .map(|unit| UnitAnalysis {
                    unit: unit.path.clone(),
                    result: analyze_in_batch(unit, &index, lookup),
                })
                .collect()
        }
    }
}

// -----------------------------------------------------------------------------
// Batch index and constant resolution
// -----------------------------------------------------------------------------

struct IndexedType<'a> {
    descriptor: &'a TypeDescriptor,
}

impl IndexedType<'_> {
    fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.descriptor.fields.iter().find(|f| f.name == name)
    }
}

/// Every type declared by the batch, flattened (nested types included).
struct BatchIndex<'a> {
    types: HashMap<&'a str, IndexedType<'a>>,
    /// Binary names declared by more than one unit of the batch.
    duplicates: HashSet<&'a str>,
}

impl<'a> BatchIndex<'a> {
    fn new(units: &'a [UnitDescriptor]) -> Self {
        let mut types = HashMap::new();
        let mut owners: HashMap<&'a str, &'a str> = HashMap::new();
        let mut duplicates = HashSet::new();
        for unit in units {
            let mut stack: Vec<&'a TypeDescriptor> = unit.types.iter().collect();
            while let Some(descriptor) = stack.pop() {
                let name = descriptor.binary_name.as_str();
                if let Some(previous) = owners.insert(name, unit.path.as_str())
                    && previous != unit.path
                {
                    duplicates.insert(name);
                }
                types.insert(name, IndexedType { descriptor });
                stack.extend(descriptor.nested_types.iter());
            }
        }
        Self { types, duplicates }
    }
}

/// Folds constants on demand: batch sources first, then already-analyzed classes.
struct BatchResolver<'a> {
    index: &'a BatchIndex<'a>,
    lookup: &'a dyn ConstantLookup,
    memo: HashMap<ConstantRef, Option<Resolved>>,
    in_progress: HashSet<ConstantRef>,
}

impl<'a> BatchResolver<'a> {
    fn new(index: &'a BatchIndex<'a>, lookup: &'a dyn ConstantLookup) -> Self {
        Self {
            index,
            lookup,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Fold the field's own initializer, applying assignment conversion.
    fn fold_field(
        &mut self,
        owner: &TypeDescriptor,
        field: &FieldDescriptor,
    ) -> Result<Option<ConstValue>, AnalysisError> {
        if !is_constant_candidate(owner, field) {
            return Ok(None);
        }
        let Some(initializer) = &field.initializer else {
            return Ok(None);
        };
        let folded = fold::fold(initializer, &owner.binary_name, self)?;
        Ok(folded
            .value
            .and_then(|value| fold::assign(&field.field_type, value)))
    }

    fn resolve_in_lookup(&self, owner: &str, name: &str) -> Option<Resolved> {
        // Walk the supertype chain: a constant may be inherited from an interface.
        let mut visited = HashSet::new();
        let mut pending = vec![owner.to_string()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(analysis) = self.lookup.analysis(&current) else {
                continue;
            };
            if let Some(value) = analysis.declared_constants.get(name) {
                return Some(Resolved {
                    declaring: current,
                    value: value.clone(),
                });
            }
            pending.extend(analysis.supertypes.iter().rev().cloned());
        }
        None
    }
}

impl BatchResolver<'_> {
    /// Supertypes are searched in declaration order.
    fn resolve_inherited(
        &mut self,
        supertypes: &[BinaryName],
        name: &str,
    ) -> Result<Option<Resolved>, AnalysisError> {
        for supertype in supertypes {
            if let Some(resolved) = self.resolve(supertype, name)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }
}

impl ConstantResolver for BatchResolver<'_> {
    fn resolve(&mut self, owner: &str, name: &str) -> Result<Option<Resolved>, AnalysisError> {
        let key = ConstantRef::new(owner, name);
        if let Some(cached) = self.memo.get(&key) {
            return Ok(cached.clone());
        }

        let index = self.index;
        let Some(indexed) = index.types.get(owner) else {
            let resolved = self.resolve_in_lookup(owner, name);
            self.memo.insert(key, resolved.clone());
            return Ok(resolved);
        };

        let field = indexed.field(name);
        if !self.in_progress.insert(key.clone()) {
            return match field {
                Some(_) => Err(AnalysisError::ConstantCycle(key)),
                // Cyclic hierarchy; the front end reports that one.
                None => Ok(None),
            };
        }
        let resolved = match field {
            Some(field) => self
                .fold_field(indexed.descriptor, field)
                .map(|value| {
                    value.map(|value| Resolved {
                        declaring: owner.to_string(),
                        value,
                    })
                }),
            None => self.resolve_inherited(&indexed.descriptor.supertypes, name),
        };
        self.in_progress.remove(&key);
        let resolved = resolved?;
        self.memo.insert(key, resolved.clone());
        Ok(resolved)
    }
}

/// Interface and annotation fields are implicitly `public static final`.
fn is_constant_candidate(owner: &TypeDescriptor, field: &FieldDescriptor) -> bool {
    let implicit = matches!(owner.kind, ClassKind::Interface | ClassKind::AnnotationType);
    (implicit || (field.is_static && field.is_final)) && field.field_type.is_constant_eligible()
}

// -----------------------------------------------------------------------------
// Per-unit extraction
// -----------------------------------------------------------------------------

fn analyze_in_batch(
    unit: &UnitDescriptor,
    index: &BatchIndex<'_>,
    lookup: &dyn ConstantLookup,
) -> Result<Vec<ClassAnalysis>, AnalysisError> {
    if let Some(message) = &unit.parse_error {
        return Err(AnalysisError::Unparseable {
            unit: unit.path.clone(),
            message: message.clone(),
        });
    }
    validate_unit(unit, index)?;

    let mut resolver = BatchResolver::new(index, lookup);
    let mut analyses = Vec::new();
    for descriptor in &unit.types {
        extract_type(unit, descriptor, None, &mut resolver, &mut analyses)?;
    }
    Ok(analyses)
}

fn validate_unit(unit: &UnitDescriptor, index: &BatchIndex<'_>) -> Result<(), AnalysisError> {
    if unit.types.is_empty() {
        return Err(AnalysisError::malformed(&unit.path, "unit declares no types"));
    }
    let mut seen = HashSet::new();
    let mut stack: Vec<(&TypeDescriptor, Option<&str>)> =
        unit.types.iter().map(|t| (t, None)).collect();
    while let Some((descriptor, outer)) = stack.pop() {
        let name = descriptor.binary_name.as_str();
        if name.is_empty() {
            return Err(AnalysisError::malformed(&unit.path, "empty binary name"));
        }
        if !seen.insert(name) || index.duplicates.contains(name) {
            return Err(AnalysisError::malformed(
                &unit.path,
                format!("duplicate class {name}"),
            ));
        }
        if let Some(outer) = outer
            && !name
                .strip_prefix(outer)
                .is_some_and(|rest| rest.starts_with('$') && rest.len() > 1)
        {
            return Err(AnalysisError::malformed(
                &unit.path,
                format!("nested type {name} is not named {outer}$..."),
            ));
        }
        validate_kind(unit, descriptor, outer.is_some())?;
        stack.extend(
            descriptor
                .nested_types
                .iter()
                .map(|nested| (nested, Some(name))),
        );
    }
    Ok(())
}

fn validate_kind(
    unit: &UnitDescriptor,
    descriptor: &TypeDescriptor,
    nested: bool,
) -> Result<(), AnalysisError> {
    let expected = match descriptor.kind {
        ClassKind::Class | ClassKind::Interface | ClassKind::Record | ClassKind::AnnotationType => {
            return Ok(());
        }
        ClassKind::PackageInfo => package_info_name(&unit.package),
        ClassKind::ModuleInfo => match &unit.module {
            Some(module) => module_info_name(module),
            None => {
                return Err(AnalysisError::malformed(
                    &unit.path,
                    "module-info outside of a module",
                ));
            }
        },
    };
    if nested || unit.types.len() != 1 || descriptor.binary_name != expected {
        return Err(AnalysisError::malformed(
            &unit.path,
            format!(
                "{} unit must declare exactly `{expected}`",
                descriptor.kind.as_str()
            ),
        ));
    }
    Ok(())
}

/// Accumulates one class's references while its members are walked.
#[derive(Default)]
struct Extraction {
    used_constants: BTreeSet<ConstantRef>,
    annotation_constants: BTreeSet<ConstantRef>,
    annotation_types_used: BTreeMap<BinaryName, Retention>,
    type_references: BTreeSet<BinaryName>,
}

impl Extraction {
    fn absorb(&mut self, folded: fold::Folded, in_annotation: bool) {
        if in_annotation {
            self.annotation_constants
                .extend(folded.constants.iter().cloned());
        }
        self.used_constants.extend(folded.constants);
        self.type_references.extend(folded.field_owners);
    }

    /// Fold annotation arguments and return the annotation's surface line when retained.
    fn annotation(
        &mut self,
        context: &str,
        annotation: &AnnotationDescriptor,
        resolver: &mut BatchResolver<'_>,
    ) -> Result<Option<String>, AnalysisError> {
        let retention = self
            .annotation_types_used
            .entry(annotation.annotation_type.clone())
            .or_insert(annotation.retention);
        *retention = (*retention).max(annotation.retention);

        let mut arguments = Vec::with_capacity(annotation.arguments.len());
        for (name, expr) in &annotation.arguments {
            let folded = fold::fold(expr, context, resolver)?;
            let rendered = match &folded.value {
                Some(value) => format!("{name}={}:{value}", value.type_name()),
                None => format!("{name}={}", render_expr(expr)),
            };
            self.absorb(folded, true);
            arguments.push(rendered);
        }

        if !annotation.retention.is_retained() {
            return Ok(None);
        }
        arguments.sort();
        Ok(Some(format!(
            "@{}({})",
            annotation.annotation_type,
            arguments.join(",")
        )))
    }

    fn annotations(
        &mut self,
        context: &str,
        annotations: &[AnnotationDescriptor],
        resolver: &mut BatchResolver<'_>,
    ) -> Result<Vec<String>, AnalysisError> {
        let mut retained = Vec::new();
        for annotation in annotations {
            if let Some(line) = self.annotation(context, annotation, resolver)? {
                retained.push(line);
            }
        }
        retained.sort();
        Ok(retained)
    }
}

/// Non-constant annotation arguments (class literals, enum constants) are hashed by their
/// canonical serialized form.
fn render_expr(expr: &ConstExpr) -> String {
    serde_json::to_string(expr).unwrap_or_else(|_| format!("{expr:?}"))
}

fn extract_type(
    unit: &UnitDescriptor,
    descriptor: &TypeDescriptor,
    outer: Option<&str>,
    resolver: &mut BatchResolver<'_>,
    out: &mut Vec<ClassAnalysis>,
) -> Result<(), AnalysisError> {
    let name = descriptor.binary_name.as_str();
    let mut extraction = Extraction::default();
    let mut surface: Vec<String> = Vec::new();
    let mut members: Vec<String> = Vec::new();

    surface.push(format!(
        "kind {} {:?} abstract={} final={}",
        descriptor.kind.as_str(),
        descriptor.visibility,
        descriptor.is_abstract,
        descriptor.is_final
    ));
    surface.push(format!("extends {}", descriptor.supertypes.join(",")));
    for line in extraction.annotations(name, &descriptor.annotations, resolver)? {
        surface.push(format!("type {line}"));
    }

    // Fields
    let mut declared_constants = BTreeMap::new();
    for field in &descriptor.fields {
        if let Some(referenced) = field.field_type.referenced_type() {
            extraction.type_references.insert(referenced.to_string());
        }
        if let Some(initializer) = &field.initializer {
            let folded = fold::fold(initializer, name, resolver)?;
            extraction.absorb(folded, false);
        }
        if let Some(value) = resolver.fold_field(descriptor, field)? {
            declared_constants.insert(field.name.clone(), value);
        }
        let annotations = extraction.annotations(name, &field.annotations, resolver)?;
        if field.visibility.is_observable() {
            members.push(format!(
                "field {} {:?} {:?} static={} final={} {}",
                field.name,
                field.field_type,
                field.visibility,
                field.is_static,
                field.is_final,
                annotations.join(" ")
            ));
        }
    }

    // Methods
    for method in &descriptor.methods {
        extraction
            .type_references
            .extend(method.signature_types.iter().cloned());
        if let Some(body) = &method.body {
            extraction
                .type_references
                .extend(body.type_references.iter().cloned());
            for expr in &body.expressions {
                let folded = fold::fold(expr, name, resolver)?;
                extraction.absorb(folded, false);
            }
        }
        let annotations = extraction.annotations(name, &method.annotations, resolver)?;
        if method.visibility.is_observable() {
            members.push(format!(
                "method {}{} {:?} static={} abstract={} {}",
                method.name,
                method.descriptor,
                method.visibility,
                method.is_static,
                method.is_abstract,
                annotations.join(" ")
            ));
        }
    }

    // Record components: the component list is ordered, the accessor is public.
    for (position, component) in descriptor.record_components.iter().enumerate() {
        if let Some(referenced) = component.component_type.referenced_type() {
            extraction.type_references.insert(referenced.to_string());
        }
        let annotations = extraction.annotations(name, &component.annotations, resolver)?;
        surface.push(format!(
            "component#{position} {} {:?} {}",
            component.name,
            component.component_type,
            annotations.join(" ")
        ));
        members.push(format!("accessor {}()", component.name));
    }

    // Module directives
    let mut directives = descriptor.directives.clone();
    for directive in &directives {
        match directive {
            ModuleDirective::Uses { service } => {
                extraction.type_references.insert(service.clone());
            }
            ModuleDirective::Provides { service, with } => {
                extraction.type_references.insert(service.clone());
                extraction.type_references.extend(with.iter().cloned());
            }
            _ => {}
        }
    }
    let mut directive_lines: Vec<String> = directives
        .iter()
        .map(|d| serde_json::to_string(d).unwrap_or_else(|_| format!("{d:?}")))
        .collect();
    directive_lines.sort();
    surface.extend(directive_lines.into_iter().map(|d| format!("directive {d}")));
    directives.sort_by_cached_key(|d| serde_json::to_string(d).unwrap_or_default());

    // Nested types: visible member types are part of the outer surface.
    for nested in &descriptor.nested_types {
        if nested.visibility.is_observable() {
            members.push(format!(
                "member-type {} {}",
                nested.binary_name,
                nested.kind.as_str()
            ));
        }
        extraction.type_references.insert(nested.binary_name.clone());
    }
    if let Some(outer) = outer {
        extraction.type_references.insert(outer.to_string());
    }

    members.sort();
    surface.extend(members);

    extraction.type_references.remove(name);
    for supertype in &descriptor.supertypes {
        extraction.type_references.remove(supertype);
    }
    extraction.used_constants.retain(|c| c.owner != name);
    extraction.annotation_constants.retain(|c| c.owner != name);

    out.push(ClassAnalysis {
        binary_name: name.to_string(),
        source_unit: unit.path.clone(),
        kind: descriptor.kind,
        supertypes: descriptor.supertypes.clone(),
        public_surface_hash: surface_hash(&surface),
        declared_constants,
        used_constants: extraction.used_constants,
        annotation_constants: extraction.annotation_constants,
        annotation_types_used: extraction.annotation_types_used,
        type_references: extraction.type_references,
        package_name: unit.package.clone(),
        module_name: unit.module.clone(),
        outer_class: outer.map(str::to_string),
        module_directives: directives,
    });

    for nested in &descriptor.nested_types {
        extract_type(unit, nested, Some(name), resolver, out)?;
    }
    Ok(())
}

/// Hex SHA-256 over the canonical surface lines.
pub fn surface_hash(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
