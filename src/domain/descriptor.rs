//! Structural description of a compilation unit: the contract between the compiler front end
//! (an external collaborator) and the class analyzer.
//!
//! The front end parses or loads a unit and reports what it declares. Nothing here is
//! interpreted yet: constant initializers are expressions, annotations carry raw argument
//! expressions, and references are plain binary names. Folding, hashing and edge extraction
//! happen in [`crate::domain::analyzer`].

use serde::{Deserialize, Serialize};

use crate::domain::analysis::{ClassKind, ConstValue, ModuleDirective, Retention};

/// One source file (`Foo.java`, `package-info.java`, `module-info.java`) as seen by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Source-root relative path; the unit identifier used throughout the engine.
    pub path: String,
    /// Content hash as delivered by the file snapshotting collaborator.
    pub content_hash: String,
    /// Dotted package name; empty for the unnamed package.
    #[serde(default)]
    pub package: String,
    /// Module this unit is compiled into, if the build is module-aware.
    #[serde(default)]
    pub module: Option<String>,
    /// Set when the front end could not parse the unit.
    #[serde(default)]
    pub parse_error: Option<String>,
    /// Top-level types declared by the unit. Names need not match the file name.
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

impl Visibility {
    /// Everything but `private` is observable from another class.
    pub fn is_observable(self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

/// Declared type of a field or record component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Primitive(PrimitiveType),
    String,
    /// Any other reference type, by binary name (arrays use their element type).
    Reference(String),
}

impl FieldType {
    /// Only primitives and `java.lang.String` can hold compile-time constants.
    pub fn is_constant_eligible(&self) -> bool {
        matches!(self, FieldType::Primitive(_) | FieldType::String)
    }

    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            FieldType::Reference(name) => Some(name),
            FieldType::Primitive(_) | FieldType::String => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An expression as written in a field initializer, annotation argument or method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstExpr {
    Literal(ConstValue),
    /// `Owner.NAME`, or a simple `NAME` within the declaring class when `owner` is absent.
    FieldRef {
        #[serde(default)]
        owner: Option<String>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ConstExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ConstExpr>,
        rhs: Box<ConstExpr>,
    },
    Conditional {
        condition: Box<ConstExpr>,
        then: Box<ConstExpr>,
        otherwise: Box<ConstExpr>,
    },
    Cast {
        target: FieldType,
        operand: Box<ConstExpr>,
    },
    /// Method calls, `new`, array creation and anything else javac never folds.
    NonConstant {
        #[serde(default)]
        references: Vec<ConstExpr>,
    },
}

impl ConstExpr {
    pub fn field(owner: &str, name: &str) -> Self {
        ConstExpr::FieldRef {
            owner: Some(owner.to_string()),
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> Self {
        ConstExpr::FieldRef {
            owner: None,
            name: name.to_string(),
        }
    }

    pub fn int(value: i32) -> Self {
        ConstExpr::Literal(ConstValue::Int(value))
    }

    pub fn string(value: &str) -> Self {
        ConstExpr::Literal(ConstValue::Str(value.to_string()))
    }

    pub fn binary(op: BinaryOp, lhs: ConstExpr, rhs: ConstExpr) -> Self {
        ConstExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// An annotation application: `@Ann(name = expr, ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDescriptor {
    pub annotation_type: String,
    pub retention: Retention,
    #[serde(default)]
    pub arguments: Vec<(String, ConstExpr)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_final: bool,
    pub field_type: FieldType,
    #[serde(default)]
    pub initializer: Option<ConstExpr>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// What a method body touches. Only the references matter to the engine; the hash lets the
/// front end report body edits without exposing the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub type_references: Vec<String>,
    #[serde(default)]
    pub expressions: Vec<ConstExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// JVM method descriptor, e.g. `(ILjava/lang/String;)V`.
    pub descriptor: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    /// Binary names appearing in the signature (parameters, return, throws, generics).
    #[serde(default)]
    pub signature_types: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
    #[serde(default)]
    pub body: Option<MethodBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordComponent {
    pub name: String,
    pub component_type: FieldType,
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

/// One declared type. Nested types are listed under their enclosing type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub binary_name: String,
    pub kind: ClassKind,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    /// Superclass first, then interfaces in declaration order.
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub record_components: Vec<RecordComponent>,
    #[serde(default)]
    pub nested_types: Vec<TypeDescriptor>,
    /// Only meaningful for `module-info`.
    #[serde(default)]
    pub directives: Vec<ModuleDirective>,
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

impl TypeDescriptor {
    pub fn new(binary_name: &str, kind: ClassKind) -> Self {
        Self {
            binary_name: binary_name.to_string(),
            kind,
            visibility: Visibility::Public,
            is_abstract: false,
            is_final: false,
            supertypes: Vec::new(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            record_components: Vec::new(),
            nested_types: Vec::new(),
            directives: Vec::new(),
        }
    }
}
