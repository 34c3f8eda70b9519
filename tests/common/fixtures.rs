//! Descriptor builders for integration tests.
#![allow(dead_code)]

use jvm_recompile::domain::analysis::{
    ClassKind, ModuleDirective, Retention, module_info_name, package_info_name,
};
use jvm_recompile::domain::descriptor::{
    AnnotationDescriptor, ConstExpr, FieldDescriptor, FieldType, MethodBody, MethodDescriptor,
    PrimitiveType, TypeDescriptor, UnitDescriptor, Visibility,
};

/// Fluent builder over [`TypeDescriptor`].
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    descriptor: TypeDescriptor,
    helpers: usize,
}

impl TypeBuilder {
    fn new(name: &str, kind: ClassKind) -> Self {
        Self {
            descriptor: TypeDescriptor::new(name, kind),
            helpers: 0,
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, ClassKind::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name, ClassKind::Interface)
    }

    pub fn package_info(package: &str) -> Self {
        Self::new(&package_info_name(package), ClassKind::PackageInfo)
    }

    pub fn module_info(module: &str) -> Self {
        Self::new(&module_info_name(module), ClassKind::ModuleInfo)
    }

    pub fn package_private(mut self) -> Self {
        self.descriptor.visibility = Visibility::Package;
        self
    }

    pub fn extends(mut self, supertype: &str) -> Self {
        self.descriptor.supertypes.push(supertype.to_string());
        self
    }

    /// `public static final int name = init;`
    pub fn int_constant(mut self, name: &str, init: ConstExpr) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            visibility: Visibility::Public,
            is_static: true,
            is_final: true,
            field_type: FieldType::Primitive(PrimitiveType::Int),
            initializer: Some(init),
            annotations: Vec::new(),
        });
        self
    }

    /// `public static final String name = init;`
    pub fn string_constant(mut self, name: &str, init: ConstExpr) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            visibility: Visibility::Public,
            is_static: true,
            is_final: true,
            field_type: FieldType::String,
            initializer: Some(init),
            annotations: Vec::new(),
        });
        self
    }

    pub fn public_method(mut self, name: &str, descriptor: &str) -> Self {
        self.descriptor.methods.push(method(name, descriptor, Visibility::Public));
        self
    }

    /// A body-only change: the public surface is untouched.
    pub fn body(mut self, hash: &str) -> Self {
        let mut run = method("run", "()V", Visibility::Public);
        run.body = Some(MethodBody {
            hash: hash.to_string(),
            ..MethodBody::default()
        });
        self.descriptor.methods.retain(|m| m.name != "run");
        self.descriptor.methods.push(run);
        self
    }

    /// A private helper whose body mentions `target`.
    pub fn references(mut self, target: &str) -> Self {
        let mut helper = self.helper();
        if let Some(body) = helper.body.as_mut() {
            body.type_references.push(target.to_string());
        }
        self.descriptor.methods.push(helper);
        self
    }

    /// A private helper whose body inlines `owner.name`.
    pub fn reads_constant(mut self, owner: &str, name: &str) -> Self {
        let mut helper = self.helper();
        if let Some(body) = helper.body.as_mut() {
            body.expressions.push(ConstExpr::field(owner, name));
        }
        self.descriptor.methods.push(helper);
        self
    }

    pub fn annotated(mut self, annotation: &str, retention: Retention) -> Self {
        self.descriptor.annotations.push(AnnotationDescriptor {
            annotation_type: annotation.to_string(),
            retention,
            arguments: Vec::new(),
        });
        self
    }

    pub fn annotated_with(
        mut self,
        annotation: &str,
        retention: Retention,
        arguments: Vec<(&str, ConstExpr)>,
    ) -> Self {
        self.descriptor.annotations.push(AnnotationDescriptor {
            annotation_type: annotation.to_string(),
            retention,
            arguments: arguments
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        });
        self
    }

    pub fn requires(mut self, module: &str) -> Self {
        self.descriptor
            .directives
            .push(ModuleDirective::requires(module));
        self
    }

    pub fn nested(mut self, nested: TypeBuilder) -> Self {
        self.descriptor.nested_types.push(nested.build());
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }

    fn helper(&mut self) -> MethodDescriptor {
        self.helpers += 1;
        let mut helper = method(
            &format!("helper{}", self.helpers),
            "()V",
            Visibility::Private,
        );
        helper.body = Some(MethodBody::default());
        helper
    }
}

fn method(name: &str, descriptor: &str, visibility: Visibility) -> MethodDescriptor {
    MethodDescriptor {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        visibility,
        is_static: false,
        is_abstract: false,
        signature_types: Vec::new(),
        annotations: Vec::new(),
        body: None,
    }
}

/// A unit in `package` declaring `types`; the content hash starts at `"1"`.
pub fn unit(path: &str, package: &str, types: Vec<TypeBuilder>) -> UnitDescriptor {
    UnitDescriptor {
        path: path.to_string(),
        content_hash: "1".to_string(),
        package: package.to_string(),
        module: None,
        parse_error: None,
        types: types.into_iter().map(TypeBuilder::build).collect(),
    }
}

/// A unit with a single top-level type, path derived from the binary name.
pub fn single(package: &str, builder: TypeBuilder) -> UnitDescriptor {
    let path = format!("{}.java", builder.descriptor.binary_name.replace('.', "/"));
    unit(&path, package, vec![builder])
}

pub fn in_module(mut unit: UnitDescriptor, module: &str) -> UnitDescriptor {
    unit.module = Some(module.to_string());
    unit
}

pub fn package_info_unit(package: &str, builder: TypeBuilder) -> UnitDescriptor {
    let path = if package.is_empty() {
        "package-info.java".to_string()
    } else {
        format!("{}/package-info.java", package.replace('.', "/"))
    };
    unit(&path, package, vec![builder])
}

pub fn module_info_unit(module: &str, builder: TypeBuilder) -> UnitDescriptor {
    in_module(
        unit(&format!("{module}/module-info.java"), "", vec![builder]),
        module,
    )
}

/// Same unit with a new content hash.
pub fn edited(mut unit: UnitDescriptor, hash: &str) -> UnitDescriptor {
    unit.content_hash = hash.to_string();
    unit
}

pub fn int(value: i32) -> ConstExpr {
    ConstExpr::int(value)
}

pub fn field(owner: &str, name: &str) -> ConstExpr {
    ConstExpr::field(owner, name)
}

pub fn plus(lhs: ConstExpr, rhs: ConstExpr) -> ConstExpr {
    ConstExpr::binary(
        jvm_recompile::domain::descriptor::BinaryOp::Add,
        lhs,
        rhs,
    )
}
