//! Structural matching of swc expressions against [`ExpressionPattern`]s.
//!
//! Dispatch is on the node kind, which has to equal the pattern kind before
//! any sub-pattern is looked at. Absent sub-patterns match anything.

use std::borrow::Cow;

use swc_ecma_ast::{
    AssignTarget, Callee, Expr, ExprOrSpread, Ident, Lit, MemberExpr, MemberProp, Prop, PropName,
    PropOrSpread, SimpleAssignTarget,
};

use super::{CalleePattern, ExpressionPattern, NodeKind, PatternRegex, PropertyPattern};

/// Whether `expr` has the shape described by `pattern`. Pure, never panics.
pub fn matches(expr: &Expr, pattern: &ExpressionPattern) -> bool {
    if NodeKind::of(expr) != Some(pattern.kind()) {
        return false;
    }

    match (expr, pattern) {
        (Expr::Ident(ident), ExpressionPattern::Identifier { name, regex }) => {
            identifier_matches(ident, name.as_deref(), regex.as_ref())
        }
        (Expr::Lit(lit), ExpressionPattern::Literal { value, regex }) => {
            literal_matches(lit, value.as_ref(), regex.as_ref())
        }
        (Expr::Tpl(tpl), ExpressionPattern::TemplateLiteral { regex }) => match regex {
            Some(regex) => {
                let text: String = tpl.quasis.iter().map(|q| &*q.raw).collect();
                regex.is_match(&text)
            }
            None => true,
        },
        (Expr::Object(object), ExpressionPattern::ObjectExpression { properties }) => {
            let Some(properties) = properties else {
                return true;
            };
            // Existential: one satisfied pair is enough.
            properties.is_empty()
                || properties.iter().any(|wanted| {
                    object
                        .props
                        .iter()
                        .any(|prop| property_matches(prop, wanted))
                })
        }
        (Expr::Array(array), ExpressionPattern::ArrayExpression { elements }) => {
            let Some(elements) = elements else {
                return true;
            };
            // Universal: same length, every element matches positionally.
            array.elems.len() == elements.len()
                && array
                    .elems
                    .iter()
                    .zip(elements)
                    .all(|(elem, wanted)| match elem {
                        Some(elem) => argument_matches(elem, wanted),
                        None => false,
                    })
        }
        (Expr::Member(member), ExpressionPattern::MemberExpression { object, property }) => {
            member_matches(member, object.as_deref(), property.as_deref())
        }
        (
            Expr::Assign(assign),
            ExpressionPattern::AssignmentExpression {
                operator,
                left,
                right,
            },
        ) => {
            if operator
                .as_deref()
                .is_some_and(|op| op != assign.op.as_str())
            {
                return false;
            }
            if left
                .as_deref()
                .is_some_and(|left| !target_matches(&assign.left, left))
            {
                return false;
            }
            right
                .as_deref()
                .is_none_or(|right| matches(&assign.right, right))
        }
        (Expr::Call(call), ExpressionPattern::CallExpression { callee, arguments }) => {
            if let Some(callee) = callee {
                let Callee::Expr(callee_expr) = &call.callee else {
                    return false;
                };
                let callee_ok = match callee {
                    CalleePattern::Name(name) => match callee_expr.as_ref() {
                        Expr::Ident(ident) => &*ident.sym == name.as_str(),
                        _ => false,
                    },
                    CalleePattern::Pattern(pattern) => matches(callee_expr, pattern),
                };
                if !callee_ok {
                    return false;
                }
            }

            arguments.as_ref().is_none_or(|arguments| {
                call.args.len() == arguments.len()
                    && call
                        .args
                        .iter()
                        .zip(arguments)
                        .all(|(arg, wanted)| argument_matches(arg, wanted))
            })
        }
        _ => false,
    }
}

fn identifier_matches(ident: &Ident, name: Option<&str>, regex: Option<&PatternRegex>) -> bool {
    let sym: &str = &ident.sym;
    name.is_none_or(|name| name == sym) && regex.is_none_or(|regex| regex.is_match(sym))
}

fn literal_matches(
    lit: &Lit,
    value: Option<&serde_json::Value>,
    regex: Option<&PatternRegex>,
) -> bool {
    if let Some(value) = value {
        return literal_equals(lit, value);
    }
    match regex {
        Some(regex) => regex.is_match(&literal_text(lit)),
        None => true,
    }
}

fn literal_equals(lit: &Lit, value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (lit, value) {
        (Lit::Str(s), Value::String(expected)) => &*s.value == expected.as_str(),
        (Lit::Num(n), Value::Number(expected)) => expected.as_f64() == Some(n.value),
        (Lit::Bool(b), Value::Bool(expected)) => b.value == *expected,
        (Lit::Null(_), Value::Null) => true,
        _ => false,
    }
}

fn literal_text(lit: &Lit) -> Cow<'_, str> {
    match lit {
        Lit::Str(s) => Cow::Borrowed(&*s.value),
        Lit::Num(n) => Cow::Owned(n.value.to_string()),
        Lit::Bool(b) => Cow::Borrowed(if b.value { "true" } else { "false" }),
        Lit::Null(_) => Cow::Borrowed("null"),
        Lit::BigInt(b) => Cow::Owned(b.value.to_string()),
        Lit::Regex(r) => Cow::Owned(format!("/{}/{}", r.exp, r.flags)),
        Lit::JSXText(text) => Cow::Borrowed(&*text.value),
    }
}

fn member_matches(member: &MemberExpr, object: Option<&str>, property: Option<&str>) -> bool {
    let object_ok = object.is_none_or(|object| match member.obj.as_ref() {
        Expr::Ident(ident) => &*ident.sym == object,
        Expr::This(_) => object == "this",
        _ => false,
    });

    let property_ok = property.is_none_or(|property| match &member.prop {
        MemberProp::Ident(ident) => &*ident.sym == property,
        MemberProp::Computed(computed) => {
            matches!(computed.expr.as_ref(), Expr::Lit(Lit::Str(s)) if &*s.value == property)
        }
        MemberProp::PrivateName(_) => false,
    });

    object_ok && property_ok
}

/// Left side of an assignment. Only identifier and member targets can satisfy a pattern.
fn target_matches(target: &AssignTarget, pattern: &ExpressionPattern) -> bool {
    match (target, pattern) {
        (
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)),
            ExpressionPattern::Identifier { name, regex },
        ) => identifier_matches(&binding.id, name.as_deref(), regex.as_ref()),
        (
            AssignTarget::Simple(SimpleAssignTarget::Member(member)),
            ExpressionPattern::MemberExpression { object, property },
        ) => member_matches(member, object.as_deref(), property.as_deref()),
        _ => false,
    }
}

/// Spread arguments and elements match against their inner expression.
fn argument_matches(arg: &ExprOrSpread, pattern: &ExpressionPattern) -> bool {
    matches(&arg.expr, pattern)
}

fn property_matches(prop: &PropOrSpread, wanted: &PropertyPattern) -> bool {
    let PropOrSpread::Prop(prop) = prop else {
        return false;
    };

    match prop.as_ref() {
        Prop::KeyValue(kv) => {
            let key_ok = wanted
                .key
                .as_deref()
                .is_none_or(|key| prop_name_text(&kv.key).as_deref() == Some(key));
            key_ok
                && wanted
                    .value
                    .as_ref()
                    .is_none_or(|value| matches(&kv.value, value))
        }
        Prop::Shorthand(ident) => {
            let key_ok = wanted.key.as_deref().is_none_or(|key| &*ident.sym == key);
            key_ok
                && wanted.value.as_ref().is_none_or(|value| match value {
                    ExpressionPattern::Identifier { name, regex } => {
                        identifier_matches(ident, name.as_deref(), regex.as_ref())
                    }
                    _ => false,
                })
        }
        _ => false,
    }
}

fn prop_name_text(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string()),
        PropName::Num(n) => Some(n.value.to_string()),
        PropName::BigInt(b) => Some(b.value.to_string()),
        PropName::Computed(_) => None,
    }
}
