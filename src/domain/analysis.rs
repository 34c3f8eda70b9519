//! The per-class structural fingerprint the whole engine reasons about.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary name of a class or pseudo-class (`com.acme.Outer$Inner`, `com.acme.package-info`).
pub type BinaryName = String;

/// Source-root relative path of a compilation unit.
pub type UnitPath = String;

pub const PACKAGE_INFO: &str = "package-info";
pub const MODULE_INFO: &str = "module-info";

/// Closed set of JVM constructs the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    Interface,
    Record,
    AnnotationType,
    PackageInfo,
    ModuleInfo,
}

impl ClassKind {
    pub fn is_pseudo(self) -> bool {
        matches!(self, ClassKind::PackageInfo | ClassKind::ModuleInfo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Record => "record",
            ClassKind::AnnotationType => "annotation",
            ClassKind::PackageInfo => PACKAGE_INFO,
            ClassKind::ModuleInfo => MODULE_INFO,
        }
    }
}

/// Annotation retention policy. Anything but `Source` survives into the class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    Source,
    Class,
    Runtime,
}

impl Retention {
    pub fn is_retained(self) -> bool {
        !matches!(self, Retention::Source)
    }
}

/// A folded compile-time constant. Floating point values are kept as raw IEEE bits so that
/// equality, hashing and persistence are exact (`-0.0 != 0.0`, `NaN == NaN`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    #[serde(rename = "string")]
    Str(String),
}

impl ConstValue {
    pub fn float(value: f32) -> Self {
        ConstValue::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        ConstValue::Double(value.to_bits())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConstValue::Boolean(_) => "boolean",
            ConstValue::Byte(_) => "byte",
            ConstValue::Short(_) => "short",
            ConstValue::Char(_) => "char",
            ConstValue::Int(_) => "int",
            ConstValue::Long(_) => "long",
            ConstValue::Float(_) => "float",
            ConstValue::Double(_) => "double",
            ConstValue::Str(_) => "String",
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Boolean(v) => write!(f, "{v}"),
            ConstValue::Byte(v) => write!(f, "{v}"),
            ConstValue::Short(v) => write!(f, "{v}"),
            ConstValue::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{v:04x}"),
            },
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Long(v) => write!(f, "{v}"),
            ConstValue::Float(bits) => write_java_floating(f, f64::from(f32::from_bits(*bits))),
            ConstValue::Double(bits) => write_java_floating(f, f64::from_bits(*bits)),
            ConstValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Approximates `Double.toString` closely enough for string concatenation of constants:
/// integral values keep a trailing `.0`, specials use Java's spelling.
fn write_java_floating(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        write!(f, "NaN")
    } else if value.is_infinite() {
        write!(f, "{}Infinity", if value < 0.0 { "-" } else { "" })
    } else if value.fract() == 0.0 && value.abs() < 1e7 {
        write!(f, "{value:.1}")
    } else {
        write!(f, "{value}")
    }
}

/// `(owner, name)` of an inlined constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstantRef {
    pub owner: BinaryName,
    pub name: String,
}

impl ConstantRef {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ConstantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// A `module-info` directive. The directive list is part of a module's public surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum ModuleDirective {
    Requires {
        module: String,
        #[serde(default)]
        transitive: bool,
        #[serde(default)]
        is_static: bool,
    },
    Exports {
        package: String,
        #[serde(default)]
        to: Vec<String>,
    },
    Opens {
        package: String,
        #[serde(default)]
        to: Vec<String>,
    },
    Uses {
        service: String,
    },
    Provides {
        service: String,
        with: Vec<String>,
    },
}

impl ModuleDirective {
    pub fn requires(module: &str) -> Self {
        ModuleDirective::Requires {
            module: module.to_string(),
            transitive: false,
            is_static: false,
        }
    }

    pub fn required_module(&self) -> Option<&str> {
        match self {
            ModuleDirective::Requires { module, .. } => Some(module),
            _ => None,
        }
    }
}

/// Structural fingerprint of one class or pseudo-class, replaced wholesale whenever its unit
/// is recompiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAnalysis {
    pub binary_name: BinaryName,
    pub source_unit: UnitPath,
    pub kind: ClassKind,
    pub supertypes: Vec<BinaryName>,
    /// Hex SHA-256 over the externally observable shape; constant values excluded.
    pub public_surface_hash: String,
    pub declared_constants: BTreeMap<String, ConstValue>,
    pub used_constants: BTreeSet<ConstantRef>,
    /// Subset of `used_constants` folded inside annotation arguments.
    pub annotation_constants: BTreeSet<ConstantRef>,
    pub annotation_types_used: BTreeMap<BinaryName, Retention>,
    pub type_references: BTreeSet<BinaryName>,
    pub package_name: String,
    pub module_name: Option<String>,
    pub outer_class: Option<BinaryName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_directives: Vec<ModuleDirective>,
}

impl ClassAnalysis {
    pub fn is_pseudo(&self) -> bool {
        self.kind.is_pseudo()
    }

    /// Modules named by `requires` directives (module-info only).
    pub fn required_modules(&self) -> BTreeSet<&str> {
        self.module_directives
            .iter()
            .filter_map(ModuleDirective::required_module)
            .collect()
    }
}

/// Binary name of a package's `package-info` pseudo-class.
pub fn package_info_name(package: &str) -> BinaryName {
    if package.is_empty() {
        PACKAGE_INFO.to_string()
    } else {
        format!("{package}.{PACKAGE_INFO}")
    }
}

/// Binary name of a module's `module-info` pseudo-class. Qualified by module name so that
/// several modules can share one build universe.
pub fn module_info_name(module: &str) -> BinaryName {
    format!("{module}/{MODULE_INFO}")
}

/// Package of a dotted binary name (`a.b.C$D` → `a.b`).
pub fn package_of(binary_name: &str) -> &str {
    binary_name
        .rsplit_once('.')
        .map(|(pkg, _)| pkg)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_names() {
        assert_eq!(package_info_name("com.acme"), "com.acme.package-info");
        assert_eq!(package_info_name(""), "package-info");
        assert_eq!(module_info_name("acme.core"), "acme.core/module-info");
    }

    #[test]
    fn test_package_of_nested_name() {
        assert_eq!(package_of("com.acme.Outer$Inner"), "com.acme");
        assert_eq!(package_of("Top"), "");
    }

    #[test]
    fn test_float_constants_compare_by_bits() {
        assert_ne!(ConstValue::float(0.0), ConstValue::float(-0.0));
        assert_eq!(ConstValue::double(f64::NAN), ConstValue::double(f64::NAN));
    }

    #[test]
    fn test_display_matches_java_concatenation() {
        assert_eq!(ConstValue::double(1.0).to_string(), "1.0");
        assert_eq!(ConstValue::double(0.5).to_string(), "0.5");
        assert_eq!(ConstValue::Char(u16::from(b'x')).to_string(), "x");
        assert_eq!(ConstValue::float(f32::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn test_retention() {
        assert!(!Retention::Source.is_retained());
        assert!(Retention::Class.is_retained());
        assert!(Retention::Runtime.is_retained());
    }
}
