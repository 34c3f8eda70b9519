//! Compile-time constant folding (JLS §15.29).
//!
//! Folding walks the whole expression even when the result is not constant: javac inlines a
//! constant sub-expression such as `A.X` inside `A.X + compute()`, so the consumer still
//! depends on `A.X`'s value.

use std::collections::BTreeSet;

use crate::domain::analysis::{ConstValue, ConstantRef};
use crate::domain::descriptor::{BinaryOp, ConstExpr, FieldType, PrimitiveType, UnaryOp};
use crate::domain::error::AnalysisError;

/// A constant found by a [`ConstantResolver`]. `declaring` differs from the owner named in the
/// expression when the constant is inherited (`Impl.X` where `X` lives in an interface).
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub declaring: String,
    pub value: ConstValue,
}

/// Looks up the folded value of `owner.name`.
///
/// `Ok(None)` means the field exists but is not a constant, or is unknown; either way the
/// reference is a plain field access and only a type reference to `owner`.
pub trait ConstantResolver {
    fn resolve(&mut self, owner: &str, name: &str) -> Result<Option<Resolved>, AnalysisError>;
}

/// Result of folding one expression.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Folded {
    pub value: Option<ConstValue>,
    /// Constants the compiled form inlines.
    pub constants: BTreeSet<ConstantRef>,
    /// Owners of referenced fields that are not constants (accessed at run time).
    pub field_owners: BTreeSet<String>,
}

/// Fold `expr` as written inside class `context`.
pub fn fold(
    expr: &ConstExpr,
    context: &str,
    resolver: &mut dyn ConstantResolver,
) -> Result<Folded, AnalysisError> {
    let mut folded = Folded::default();
    let value = eval(expr, context, resolver, &mut folded)?;
    folded.value = value;
    Ok(folded)
}

fn eval(
    expr: &ConstExpr,
    context: &str,
    resolver: &mut dyn ConstantResolver,
    out: &mut Folded,
) -> Result<Option<ConstValue>, AnalysisError> {
    match expr {
        ConstExpr::Literal(value) => Ok(Some(value.clone())),
        ConstExpr::FieldRef { owner, name } => {
            let owner = owner.as_deref().unwrap_or(context);
            match resolver.resolve(owner, name)? {
                Some(resolved) => {
                    if resolved.declaring != owner && owner != context {
                        out.field_owners.insert(owner.to_string());
                    }
                    out.constants
                        .insert(ConstantRef::new(&resolved.declaring, name));
                    Ok(Some(resolved.value))
                }
                None => {
                    if owner != context {
                        out.field_owners.insert(owner.to_string());
                    }
                    Ok(None)
                }
            }
        }
        ConstExpr::Unary { op, operand } => {
            let value = eval(operand, context, resolver, out)?;
            Ok(value.and_then(|v| unary(*op, v)))
        }
        ConstExpr::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, context, resolver, out)?;
            let rhs = eval(rhs, context, resolver, out)?;
            match (lhs, rhs) {
                (Some(l), Some(r)) => Ok(binary(*op, l, r)),
                _ => Ok(None),
            }
        }
        ConstExpr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let condition = eval(condition, context, resolver, out)?;
            let then = eval(then, context, resolver, out)?;
            let otherwise = eval(otherwise, context, resolver, out)?;
            match (condition, then, otherwise) {
                (Some(ConstValue::Boolean(c)), Some(t), Some(o)) => Ok(conditional(c, t, o)),
                _ => Ok(None),
            }
        }
        ConstExpr::Cast { target, operand } => {
            let value = eval(operand, context, resolver, out)?;
            Ok(value.and_then(|v| cast(target, v)))
        }
        ConstExpr::NonConstant { references } => {
            for reference in references {
                eval(reference, context, resolver, out)?;
            }
            Ok(None)
        }
    }
}

/// Numeric operand after unary/binary promotion.
#[derive(Debug, Clone, Copy)]
enum Num {
    I(i32),
    L(i64),
    F(f32),
    D(f64),
}

impl Num {
    fn of(value: &ConstValue) -> Option<Num> {
        match *value {
            ConstValue::Byte(v) => Some(Num::I(i32::from(v))),
            ConstValue::Short(v) => Some(Num::I(i32::from(v))),
            ConstValue::Char(v) => Some(Num::I(i32::from(v))),
            ConstValue::Int(v) => Some(Num::I(v)),
            ConstValue::Long(v) => Some(Num::L(v)),
            ConstValue::Float(bits) => Some(Num::F(f32::from_bits(bits))),
            ConstValue::Double(bits) => Some(Num::D(f64::from_bits(bits))),
            ConstValue::Boolean(_) | ConstValue::Str(_) => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Num::I(_) => 0,
            Num::L(_) => 1,
            Num::F(_) => 2,
            Num::D(_) => 3,
        }
    }

    fn widen_to(self, rank: u8) -> Num {
        match (self, rank) {
            (Num::I(v), 1) => Num::L(i64::from(v)),
            (Num::I(v), 2) => Num::F(v as f32),
            (Num::I(v), 3) => Num::D(f64::from(v)),
            (Num::L(v), 2) => Num::F(v as f32),
            (Num::L(v), 3) => Num::D(v as f64),
            (Num::F(v), 3) => Num::D(f64::from(v)),
            (n, _) => n,
        }
    }

    fn into_value(self) -> ConstValue {
        match self {
            Num::I(v) => ConstValue::Int(v),
            Num::L(v) => ConstValue::Long(v),
            Num::F(v) => ConstValue::float(v),
            Num::D(v) => ConstValue::double(v),
        }
    }
}

fn promote(lhs: &ConstValue, rhs: &ConstValue) -> Option<(Num, Num)> {
    let l = Num::of(lhs)?;
    let r = Num::of(rhs)?;
    let rank = l.rank().max(r.rank());
    Some((l.widen_to(rank), r.widen_to(rank)))
}

fn unary(op: UnaryOp, value: ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Not => match value {
            ConstValue::Boolean(b) => Some(ConstValue::Boolean(!b)),
            _ => None,
        },
        UnaryOp::Plus => Num::of(&value).map(Num::into_value),
        UnaryOp::Neg => Some(
            match Num::of(&value)? {
                Num::I(v) => Num::I(v.wrapping_neg()),
                Num::L(v) => Num::L(v.wrapping_neg()),
                Num::F(v) => Num::F(-v),
                Num::D(v) => Num::D(-v),
            }
            .into_value(),
        ),
        UnaryOp::BitNot => match Num::of(&value)? {
            Num::I(v) => Some(ConstValue::Int(!v)),
            Num::L(v) => Some(ConstValue::Long(!v)),
            Num::F(_) | Num::D(_) => None,
        },
    }
}

fn binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    if op == BinaryOp::Add
        && (matches!(lhs, ConstValue::Str(_)) || matches!(rhs, ConstValue::Str(_)))
    {
        return Some(ConstValue::Str(format!("{lhs}{rhs}")));
    }

    match op {
        BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
            (ConstValue::Boolean(l), ConstValue::Boolean(r)) => Some(ConstValue::Boolean(
                if op == BinaryOp::And { l && r } else { l || r },
            )),
            _ => None,
        },
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            if let (ConstValue::Boolean(l), ConstValue::Boolean(r)) = (&lhs, &rhs) {
                return Some(ConstValue::Boolean(match op {
                    BinaryOp::BitAnd => l & r,
                    BinaryOp::BitOr => l | r,
                    _ => l ^ r,
                }));
            }
            match promote(&lhs, &rhs)? {
                (Num::I(l), Num::I(r)) => Some(ConstValue::Int(bitwise(op, l, r))),
                (Num::L(l), Num::L(r)) => Some(ConstValue::Long(bitwise(op, l, r))),
                _ => None,
            }
        }
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
            let distance = match Num::of(&rhs)? {
                Num::I(v) => i64::from(v),
                Num::L(v) => v,
                Num::F(_) | Num::D(_) => return None,
            };
            match Num::of(&lhs)? {
                Num::I(v) => {
                    let d = (distance & 0x1f) as u32;
                    Some(ConstValue::Int(match op {
                        BinaryOp::Shl => v.wrapping_shl(d),
                        BinaryOp::Shr => v.wrapping_shr(d),
                        _ => ((v as u32) >> d) as i32,
                    }))
                }
                Num::L(v) => {
                    let d = (distance & 0x3f) as u32;
                    Some(ConstValue::Long(match op {
                        BinaryOp::Shl => v.wrapping_shl(d),
                        BinaryOp::Shr => v.wrapping_shr(d),
                        _ => ((v as u64) >> d) as i64,
                    }))
                }
                Num::F(_) | Num::D(_) => None,
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (&lhs, &rhs) {
                (ConstValue::Boolean(l), ConstValue::Boolean(r)) => l == r,
                (ConstValue::Str(_), _) | (_, ConstValue::Str(_)) => return None,
                _ => match promote(&lhs, &rhs)? {
                    (Num::I(l), Num::I(r)) => l == r,
                    (Num::L(l), Num::L(r)) => l == r,
                    (Num::F(l), Num::F(r)) => l == r,
                    (Num::D(l), Num::D(r)) => l == r,
                    _ => return None,
                },
            };
            Some(ConstValue::Boolean(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match promote(&lhs, &rhs)? {
                (Num::I(l), Num::I(r)) => l.partial_cmp(&r),
                (Num::L(l), Num::L(r)) => l.partial_cmp(&r),
                (Num::F(l), Num::F(r)) => l.partial_cmp(&r),
                (Num::D(l), Num::D(r)) => l.partial_cmp(&r),
                _ => return None,
            };
            // NaN compares false for every relational operator.
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            });
            Some(ConstValue::Boolean(result))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, promote(&lhs, &rhs)?)
        }
    }
}

fn bitwise<T>(op: BinaryOp, l: T, r: T) -> T
where
    T: std::ops::BitAnd<Output = T> + std::ops::BitOr<Output = T> + std::ops::BitXor<Output = T>,
{
    match op {
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        _ => l ^ r,
    }
}

fn arithmetic(op: BinaryOp, operands: (Num, Num)) -> Option<ConstValue> {
    let result = match operands {
        (Num::I(l), Num::I(r)) => Num::I(match op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            // Integral division by zero is not a constant expression; javac emits the division.
            BinaryOp::Div => l.checked_div(r).or_else(|| (r == -1).then(|| l.wrapping_div(r)))?,
            _ => l.checked_rem(r).or_else(|| (r == -1).then_some(0))?,
        }),
        (Num::L(l), Num::L(r)) => Num::L(match op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            BinaryOp::Div => l.checked_div(r).or_else(|| (r == -1).then(|| l.wrapping_div(r)))?,
            _ => l.checked_rem(r).or_else(|| (r == -1).then_some(0))?,
        }),
        (Num::F(l), Num::F(r)) => Num::F(match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => l / r,
            _ => l % r,
        }),
        (Num::D(l), Num::D(r)) => Num::D(match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => l / r,
            _ => l % r,
        }),
        _ => return None,
    };
    Some(result.into_value())
}

fn conditional(condition: bool, then: ConstValue, otherwise: ConstValue) -> Option<ConstValue> {
    if std::mem::discriminant(&then) == std::mem::discriminant(&otherwise) {
        return Some(if condition { then } else { otherwise });
    }
    let (t, o) = promote(&then, &otherwise)?;
    let chosen = if condition { t } else { o };
    Some(chosen.into_value())
}

/// Explicit cast. Rust's `as` conversions saturate and truncate exactly like the JVM's
/// `d2i`/`l2i`/`i2b` family.
fn cast(target: &FieldType, value: ConstValue) -> Option<ConstValue> {
    let primitive = match target {
        FieldType::String => {
            return matches!(value, ConstValue::Str(_)).then_some(value);
        }
        FieldType::Reference(_) => return None,
        FieldType::Primitive(p) => *p,
    };
    if primitive == PrimitiveType::Boolean {
        return matches!(value, ConstValue::Boolean(_)).then_some(value);
    }
    let num = Num::of(&value)?;
    let (as_i64, as_f64) = match num {
        Num::I(v) => (i64::from(v), f64::from(v)),
        Num::L(v) => (v, v as f64),
        Num::F(v) => (v as i64, f64::from(v)),
        Num::D(v) => (v as i64, v),
    };
    // Floating → sub-int types go through int first (JLS §5.1.3).
    let as_i32 = match num {
        Num::I(v) => v,
        Num::L(v) => v as i32,
        Num::F(v) => v as i32,
        Num::D(v) => v as i32,
    };
    Some(match primitive {
        PrimitiveType::Byte => ConstValue::Byte(as_i32 as i8),
        PrimitiveType::Short => ConstValue::Short(as_i32 as i16),
        PrimitiveType::Char => ConstValue::Char(as_i32 as u16),
        PrimitiveType::Int => ConstValue::Int(as_i32),
        PrimitiveType::Long => ConstValue::Long(as_i64),
        PrimitiveType::Float => match num {
            Num::I(v) => ConstValue::float(v as f32),
            Num::L(v) => ConstValue::float(v as f32),
            Num::F(v) => ConstValue::float(v),
            Num::D(v) => ConstValue::float(v as f32),
        },
        PrimitiveType::Double => ConstValue::double(as_f64),
        PrimitiveType::Boolean => return None,
    })
}

/// Assignment conversion of a folded initializer to the declared field type (JLS §5.2):
/// widening, plus narrowing of an `int` constant into `byte`/`short`/`char` when it fits.
pub fn assign(target: &FieldType, value: ConstValue) -> Option<ConstValue> {
    let primitive = match target {
        FieldType::String => return matches!(value, ConstValue::Str(_)).then_some(value),
        FieldType::Reference(_) => return None,
        FieldType::Primitive(p) => *p,
    };
    match (primitive, &value) {
        (PrimitiveType::Boolean, ConstValue::Boolean(_)) => Some(value),
        (PrimitiveType::Boolean, _) | (_, ConstValue::Boolean(_)) | (_, ConstValue::Str(_)) => None,
        (PrimitiveType::Byte, ConstValue::Byte(_))
        | (PrimitiveType::Short, ConstValue::Short(_))
        | (PrimitiveType::Char, ConstValue::Char(_)) => Some(value),
        (PrimitiveType::Byte, ConstValue::Short(v)) => i8::try_from(*v).ok().map(ConstValue::Byte),
        (PrimitiveType::Byte, ConstValue::Char(v)) => i8::try_from(*v).ok().map(ConstValue::Byte),
        (PrimitiveType::Byte, ConstValue::Int(v)) => i8::try_from(*v).ok().map(ConstValue::Byte),
        (PrimitiveType::Short, ConstValue::Byte(v)) => Some(ConstValue::Short(i16::from(*v))),
        (PrimitiveType::Short, ConstValue::Char(v)) => i16::try_from(*v).ok().map(ConstValue::Short),
        (PrimitiveType::Short, ConstValue::Int(v)) => i16::try_from(*v).ok().map(ConstValue::Short),
        (PrimitiveType::Char, ConstValue::Byte(v)) => u16::try_from(*v).ok().map(ConstValue::Char),
        (PrimitiveType::Char, ConstValue::Short(v)) => u16::try_from(*v).ok().map(ConstValue::Char),
        (PrimitiveType::Char, ConstValue::Int(v)) => u16::try_from(*v).ok().map(ConstValue::Char),
        (PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Char, _) => None,
        (PrimitiveType::Int, _) => match Num::of(&value)? {
            Num::I(v) => Some(ConstValue::Int(v)),
            _ => None,
        },
        (PrimitiveType::Long, _) => match Num::of(&value)? {
            n @ (Num::I(_) | Num::L(_)) => Some(n.widen_to(1).into_value()),
            _ => None,
        },
        (PrimitiveType::Float, _) => match Num::of(&value)? {
            Num::D(_) => None,
            n => Some(n.widen_to(2).into_value()),
        },
        (PrimitiveType::Double, _) => Some(Num::of(&value)?.widen_to(3).into_value()),
    }
}
