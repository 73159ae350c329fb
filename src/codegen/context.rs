//! Per-class state shared by the emitters, and the expressions for member access and
//! calls that both body emitters need.

use crate::{
    classfile::flags::AccessFlags,
    config::TranspilerConfig,
    hierarchy::find_method_owner,
    ir::{FieldRef, InvokeKind, MethodRef},
    model::{
        naming::{field_symbol, method_suffix, method_symbol, qualified_name, static_field_symbol},
        types::JavaType,
        Class, ClassMap, Method, OBJECT,
    },
    Error, Result,
};

/// The class being generated and the model it is generated against.
pub struct ClassContext<'a> {
    /// Every class of the run
    pub classes: &'a ClassMap,
    /// The class being generated
    pub class: &'a Class,
    /// `class.qualified_name()`
    pub qualified: String,
    /// Run configuration
    pub config: &'a TranspilerConfig,
}

impl<'a> ClassContext<'a> {
    /// Context for generating `class`.
    #[must_use]
    pub fn new(classes: &'a ClassMap, class: &'a Class, config: &'a TranspilerConfig) -> Self {
        ClassContext {
            classes,
            class,
            qualified: class.qualified_name(),
            config,
        }
    }

    /// A generation error attributed to this class.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Codegen {
            class: self.class.original_name.clone(),
            message: message.into(),
        }
    }

    /// `CLINIT(Q);` for `owner`, `None` when `owner` is the class being generated.
    #[must_use]
    pub fn clinit_guard(&self, owner: &str) -> Option<String> {
        (owner != self.class.name).then(|| format!("CLINIT({});", qualified_name(owner)))
    }

    /// Class declaring a referenced field.
    #[must_use]
    pub fn field_owner<'f>(field: &'f FieldRef, resolved: Option<&'f str>) -> &'f str {
        resolved.unwrap_or(&field.owner)
    }

    /// Storage symbol of a static field.
    #[must_use]
    pub fn static_field(field: &FieldRef, resolved: Option<&str>) -> String {
        static_field_symbol(&qualified_name(Self::field_owner(field, resolved)), &field.name)
    }

    /// Lvalue of an instance field of `object`, null checked.
    #[must_use]
    pub fn instance_field(field: &FieldRef, resolved: Option<&str>, object: &str) -> String {
        format!(
            "(({} *) NULL_CHECK({}))->{}",
            qualified_name(Self::field_owner(field, resolved)),
            object,
            field_symbol(&field.name)
        )
    }

    /// The declared method a call site binds to, if it is part of the run.
    fn declared(&self, owner: &str, method: &MethodRef) -> Option<&'a Method> {
        self.classes.by_name(owner)?.find_method(&method.name, &method.desc)
    }

    /// Whether a call can bypass dispatch because no override can exist.
    fn is_exact(&self, owner: &str, method: &MethodRef) -> bool {
        let class_final = self
            .classes
            .by_name(owner)
            .is_some_and(|class| class.access.contains(AccessFlags::FINAL));
        self.declared(owner, method).is_some_and(|declared| {
            !declared.is_abstract()
                && (class_final
                    || declared.is_private()
                    || declared.access.contains(AccessFlags::FINAL))
        })
    }

    /// Expression calling `method`.
    ///
    /// `args` holds the receiver first for instance calls, then the parameters. `resolved`
    /// is the class declaring the method as found by hierarchy resolution.
    ///
    /// # Errors
    /// Returns [`Error::Codegen`] if a virtual call targets a class without a matching slot.
    pub fn call(
        &self,
        kind: InvokeKind,
        method: &MethodRef,
        resolved: Option<&str>,
        args: &[String],
    ) -> Result<String> {
        let owner = resolved.unwrap_or(&method.owner);
        let direct = |is_static: bool| {
            let symbol = method_symbol(&qualified_name(owner), &method.name, &method.sig, is_static);
            format!("{}({})", symbol, with_context(args))
        };

        match kind {
            InvokeKind::Static => Ok(direct(true)),
            InvokeKind::Special => Ok(direct(false)),
            InvokeKind::Virtual | InvokeKind::Interface if self.is_exact(owner, method) => {
                Ok(direct(false))
            }
            InvokeKind::Virtual => self.virtual_call(&method.owner, method, args),
            InvokeKind::Interface => {
                match self.classes.by_name(owner) {
                    Some(interface) if interface.is_interface() => {
                        let qualified = interface.qualified_name();
                        let symbol = method_symbol(&qualified, &method.name, &method.sig, false);
                        let suffix = method_suffix(&symbol);
                        let tail = suffix.get(qualified.len() + 1..).unwrap_or(suffix);
                        Ok(format!(
                            "INVOKE_INTERFACE({}, {}, {})",
                            qualified,
                            tail,
                            args.join(", ")
                        ))
                    }
                    // Object methods called through an interface type
                    _ => self.virtual_call(OBJECT, method, args),
                }
            }
        }
    }

    fn virtual_call(&self, owner: &str, method: &MethodRef, args: &[String]) -> Result<String> {
        let receiver = match self.classes.by_name(owner) {
            Some(class) if class.has_vtable() => {
                if class.vtable_index(&method.name, &method.desc).is_none() {
                    return Err(self.error(format!(
                        "No vtable slot for {}.{}{}",
                        owner, method.name, method.desc
                    )));
                }
                class.qualified_name()
            }
            Some(_) => {
                return self.call(InvokeKind::Interface, method, Some(owner), args);
            }
            None => qualified_name(owner),
        };
        let symbol = method_symbol(&receiver, &method.name, &method.sig, false);
        Ok(format!(
            "INVOKE_VIRTUAL({}, {})",
            method_suffix(&symbol),
            args.join(", ")
        ))
    }

    /// The class declaring the implementation method of a lambda target.
    #[must_use]
    pub fn lambda_owner(&self, method: &MethodRef) -> String {
        find_method_owner(self.classes, &method.owner, &method.name, &method.desc)
            .unwrap_or_else(|| method.owner.clone())
    }
}

/// `ctx` followed by `args`.
fn with_context(args: &[String]) -> String {
    if args.is_empty() {
        "ctx".to_string()
    } else {
        format!("ctx, {}", args.join(", "))
    }
}

/// `value` converted from a stack or parameter value of type `from` to `to`, boxing and
/// unboxing across the primitive/reference boundary.
#[must_use]
pub fn adapt(value: &str, from: &JavaType, to: &JavaType) -> String {
    match (from.box_name(), to.box_name()) {
        (Some(name), None) => format!("box{name}(ctx, {value})"),
        (None, Some(name)) => format!("unbox{name}(ctx, {value})"),
        (Some(_), Some(_)) if from != to => format!("({}) {}", to.cpp_type(), value),
        _ => value.to_string(),
    }
}

/// `value` of type `ty` as a `jobject` argument for string concatenation.
#[must_use]
pub fn boxed(value: &str, ty: &JavaType) -> String {
    match ty.box_name() {
        Some(name) => format!("box{}(ctx, ({}) {})", name, ty.cpp_type(), value),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::MethodSignature;

    fn method_ref(owner: &str, name: &str, desc: &str) -> MethodRef {
        MethodRef {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            sig: MethodSignature::parse(desc).unwrap(),
            interface: false,
        }
    }

    fn classes() -> ClassMap {
        let mut classes = ClassMap::new();
        let mut base = Class::new("a/Base", None, &[], AccessFlags::PUBLIC);
        base.methods
            .push(Method::new("run", "(I)I", AccessFlags::PUBLIC).unwrap());
        base.methods
            .push(Method::new("secret", "()V", AccessFlags::PRIVATE).unwrap());
        base.vtable = crate::hierarchy::vtable::object_vtable();
        base.vtable.push(crate::model::VtableSlot::of("a/Base", &base.methods[0]));
        base.vtable.push(crate::model::VtableSlot::of("a/Base", &base.methods[1]));
        classes.insert(base);

        let mut runnable = Class::new(
            "a/Task",
            None,
            &[],
            AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        );
        runnable.methods.push(
            Method::new("go", "()V", AccessFlags::PUBLIC | AccessFlags::ABSTRACT).unwrap(),
        );
        classes.insert(runnable);
        classes
    }

    #[test]
    fn test_virtual_dispatch() {
        let classes = classes();
        let config = TranspilerConfig::default();
        let class = classes.by_name("a/Base").unwrap();
        let cx = ClassContext::new(&classes, class, &config);
        let call = cx
            .call(
                InvokeKind::Virtual,
                &method_ref("a/Base", "run", "(I)I"),
                Some("a/Base"),
                &["sp[0].o".to_string(), "sp[1].i".to_string()],
            )
            .unwrap();
        assert_eq!(call, "INVOKE_VIRTUAL(a_Base_run_int_R_int, sp[0].o, sp[1].i)");
    }

    #[test]
    fn test_private_call_is_direct() {
        let classes = classes();
        let config = TranspilerConfig::default();
        let class = classes.by_name("a/Base").unwrap();
        let cx = ClassContext::new(&classes, class, &config);
        let call = cx
            .call(
                InvokeKind::Virtual,
                &method_ref("a/Base", "secret", "()V"),
                Some("a/Base"),
                &["self".to_string()],
            )
            .unwrap();
        assert_eq!(call, "M_a_Base_secret(ctx, self)");
    }

    #[test]
    fn test_interface_dispatch() {
        let classes = classes();
        let config = TranspilerConfig::default();
        let class = classes.by_name("a/Base").unwrap();
        let cx = ClassContext::new(&classes, class, &config);
        let call = cx
            .call(
                InvokeKind::Interface,
                &method_ref("a/Task", "go", "()V"),
                Some("a/Task"),
                &["sp[0].o".to_string()],
            )
            .unwrap();
        assert_eq!(call, "INVOKE_INTERFACE(a_Task, go, sp[0].o)");
    }

    #[test]
    fn test_missing_slot_is_error() {
        let classes = classes();
        let config = TranspilerConfig::default();
        let class = classes.by_name("a/Base").unwrap();
        let cx = ClassContext::new(&classes, class, &config);
        let result = cx.call(
            InvokeKind::Virtual,
            &method_ref("a/Base", "absent", "()V"),
            None,
            &["sp[0].o".to_string()],
        );
        assert!(matches!(result, Err(Error::Codegen { .. })));
    }

    #[test]
    fn test_adapt() {
        let object = JavaType::Object("java/lang/Object".to_string());
        assert_eq!(adapt("x", &JavaType::Int, &object), "boxInteger(ctx, x)");
        assert_eq!(adapt("x", &object, &JavaType::Long), "unboxLong(ctx, x)");
        assert_eq!(adapt("x", &JavaType::Int, &JavaType::Int), "x");
        assert_eq!(boxed("sp[0].i", &JavaType::Char), "boxCharacter(ctx, (jchar) sp[0].i)");
    }
}
