//! Lowering of `invokedynamic` call sites.
//!
//! Two bootstrap shapes are understood. `StringConcatFactory` call sites become a single
//! [`Instruction::StringConcat`] carrying a recipe. `LambdaMetafactory` call sites get a
//! synthesized proxy class that implements the functional interface, stores the captured
//! values in fields and forwards its one method to the target method handle; the call site
//! itself allocates the proxy.

use crate::{
    classfile::{
        constant_pool::{handle_kind, Loadable, MethodHandle},
        flags::AccessFlags,
    },
    ir::{Instruction, Io, LambdaTarget, MethodRef, Node},
    loader::builder::BodyBuilder,
    model::{
        naming::{is_array_name, qualified_name, sanitize_name},
        types::MethodSignature,
        Class, Field, Method, MethodBody, OBJECT,
    },
    Error, Result,
};

const LAMBDA_FACTORY: &str = "java/lang/invoke/LambdaMetafactory";
const CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";

const FLAG_SERIALIZABLE: i32 = 0x1;
const FLAG_MARKERS: i32 = 0x2;
const FLAG_BRIDGES: i32 = 0x4;

/// Argument tag in string concatenation recipes.
pub const RECIPE_ARGUMENT: char = '\u{1}';
/// Constant tag in string concatenation recipes.
pub const RECIPE_CONSTANT: char = '\u{2}';

fn unsupported(message: impl Into<String>) -> Error {
    Error::UnsupportedInvokeDynamic(message.into())
}

fn int_argument(arguments: &[Loadable], index: usize) -> Result<i32> {
    match arguments.get(index) {
        Some(Loadable::Int(value)) => Ok(*value),
        other => Err(malformed_error!("Expected int bootstrap argument, found {:?}", other)),
    }
}

/// Lower the call site at constant pool entry `index`.
pub(crate) fn lower_invoke_dynamic(builder: &mut BodyBuilder<'_>, index: u16) -> Result<Instruction> {
    let (bootstrap, name, desc) = builder.pool.invoke_dynamic(index)?;
    let bootstrap = builder
        .bootstraps
        .get(usize::from(bootstrap))
        .ok_or_else(|| malformed_error!("Missing bootstrap method {}", bootstrap))?;
    let sig = MethodSignature::parse(desc)?;
    let handle = &bootstrap.handle.member;

    match (handle.owner.as_str(), handle.name.as_str()) {
        (CONCAT_FACTORY, "makeConcatWithConstants") => {
            string_concat(&bootstrap.arguments, sig)
        }
        (CONCAT_FACTORY, "makeConcat") => Ok(Instruction::StringConcat {
            recipe: RECIPE_ARGUMENT.to_string().repeat(sig.params.len()),
            args: sig.params,
        }),
        (LAMBDA_FACTORY, "metafactory") => lambda(builder, name, sig, &bootstrap.arguments, false),
        (LAMBDA_FACTORY, "altMetafactory") => lambda(builder, name, sig, &bootstrap.arguments, true),
        (owner, method) => Err(unsupported(format!("{}.{}", owner, method))),
    }
}

fn string_concat(arguments: &[Loadable], sig: MethodSignature) -> Result<Instruction> {
    let Some(Loadable::String(template)) = arguments.first() else {
        return Err(unsupported("string concatenation without a recipe"));
    };

    let mut constants = arguments[1..].iter();
    let mut recipe = String::with_capacity(template.len());
    for c in template.chars() {
        if c != RECIPE_CONSTANT {
            recipe.push(c);
            continue;
        }
        match constants.next() {
            Some(Loadable::String(value)) => recipe.push_str(value),
            Some(Loadable::Int(value)) => recipe.push_str(&value.to_string()),
            Some(Loadable::Long(value)) => recipe.push_str(&value.to_string()),
            Some(Loadable::Float(value)) => recipe.push_str(&value.to_string()),
            Some(Loadable::Double(value)) => recipe.push_str(&value.to_string()),
            other => {
                return Err(unsupported(format!(
                    "string concatenation constant {:?}",
                    other
                )))
            }
        }
    }

    Ok(Instruction::StringConcat {
        recipe,
        args: sig.params,
    })
}

fn lambda_target(handle: &MethodHandle) -> Result<LambdaTarget> {
    if handle.kind < handle_kind::INVOKE_VIRTUAL {
        return Err(unsupported(format!(
            "lambda handle kind {} for {}.{}",
            handle.kind, handle.member.owner, handle.member.name
        )));
    }

    let owner = if is_array_name(&handle.member.owner) {
        OBJECT.to_string()
    } else {
        sanitize_name(&handle.member.owner)
    };
    Ok(LambdaTarget {
        kind: handle.kind,
        method: MethodRef {
            owner,
            name: handle.member.name.clone(),
            desc: handle.member.descriptor.clone(),
            sig: MethodSignature::parse(&handle.member.descriptor)?,
            interface: handle.member.interface,
        },
    })
}

fn lambda(
    builder: &mut BodyBuilder<'_>,
    name: &str,
    sig: MethodSignature,
    arguments: &[Loadable],
    alternate: bool,
) -> Result<Instruction> {
    let (Some(Loadable::MethodType(sam_desc)), Some(Loadable::MethodHandle(handle))) =
        (arguments.first(), arguments.get(1))
    else {
        return Err(unsupported("lambda factory arguments"));
    };
    let target = lambda_target(handle)?;
    let sam = MethodSignature::parse(sam_desc)?;

    let interface = sig
        .ret
        .class_name()
        .map(sanitize_name)
        .ok_or_else(|| unsupported(format!("lambda returning {}", sig.ret)))?;
    let mut interfaces = vec![interface.clone()];

    if alternate {
        let flags = int_argument(arguments, 3)?;
        let mut next = 4;
        if flags & FLAG_SERIALIZABLE != 0 {
            return Err(unsupported(format!("serializable lambda implementing {}", interface)));
        }
        if flags & FLAG_MARKERS != 0 {
            let count = int_argument(arguments, next)?;
            let count = usize::try_from(count)
                .map_err(|_| malformed_error!("Negative marker interface count {}", count))?;
            next += 1;
            for marker in arguments.iter().skip(next).take(count) {
                if let Loadable::Class(marker) = marker {
                    interfaces.push(sanitize_name(marker));
                }
            }
            next += count;
        }
        if flags & FLAG_BRIDGES != 0 && int_argument(arguments, next)? > 0 {
            return Err(unsupported(format!("bridged lambda implementing {}", interface)));
        }
    }

    let prefix = format!("{}_invoke_{}", builder.class_name, qualified_name(&interface));
    let proxy_name = format!("{}_{}", prefix, builder.context.next_proxy_index(&prefix));

    let mut proxy = Class::new(&proxy_name, Some(OBJECT), &interfaces, AccessFlags::empty());
    for (index, capture) in sig.params.iter().enumerate() {
        proxy.fields.push(Field::new(
            format!("field{}", index),
            capture.descriptor(),
            AccessFlags::empty(),
        )?);
    }

    let mut method = Method::new(name, sam_desc.clone(), AccessFlags::empty())?;
    method.body = Some(MethodBody {
        nodes: vec![Node {
            insn: Instruction::LambdaProxy {
                target,
                captures: sig.params.clone(),
                sam,
            },
            io: Some(Io::default()),
        }],
        ..MethodBody::default()
    });
    proxy.methods.push(method);

    log::debug!("Created lambda proxy {} for {}", proxy_name, interface);
    builder.proxies.push(proxy);

    Ok(Instruction::InvokeDynamic {
        proxy: proxy_name,
        captures: sig.params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::constant_pool::{ConstantPool, MemberRef},
        loader::LoaderContext,
    };

    fn handle(kind: u8) -> MethodHandle {
        MethodHandle {
            kind,
            member: MemberRef {
                owner: "a/Main".to_string(),
                name: "lambda$main$0".to_string(),
                descriptor: "(I)V".to_string(),
                interface: false,
            },
        }
    }

    #[test]
    fn test_string_concat_recipe() {
        let sig = MethodSignature::parse("(ILjava/lang/String;)Ljava/lang/String;").unwrap();
        let arguments = vec![
            Loadable::String("x=\u{1}, \u{2}: \u{1}".to_string()),
            Loadable::String("name".to_string()),
        ];
        match string_concat(&arguments, sig).unwrap() {
            Instruction::StringConcat { recipe, args } => {
                assert_eq!(recipe, "x=\u{1}, name: \u{1}");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_string_concat_missing_constant() {
        let sig = MethodSignature::parse("()Ljava/lang/String;").unwrap();
        let arguments = vec![Loadable::String("\u{2}".to_string())];
        assert!(matches!(
            string_concat(&arguments, sig),
            Err(Error::UnsupportedInvokeDynamic(_))
        ));
    }

    const CONSUMER: &str = "(ILjava/lang/String;)Ljava/util/function/Consumer;";

    fn consumer_arguments() -> Vec<Loadable> {
        vec![
            Loadable::MethodType("(Ljava/lang/Object;)V".to_string()),
            Loadable::MethodHandle(handle(handle_kind::INVOKE_STATIC)),
            Loadable::MethodType("(Ljava/lang/String;)V".to_string()),
        ]
    }

    fn alternate_arguments(extra: &[Loadable]) -> Vec<Loadable> {
        let mut arguments = consumer_arguments();
        arguments.extend_from_slice(extra);
        arguments
    }

    /// Run `lambda` for a `Consumer` call site in `a/Main`, returning the proxies created.
    fn lower(
        context: &mut LoaderContext,
        arguments: &[Loadable],
        alternate: bool,
    ) -> (Result<Instruction>, Vec<Class>) {
        let pool = ConstantPool::default();
        let mut proxies = Vec::new();
        let mut builder = BodyBuilder {
            class_name: "a/Main",
            pool: &pool,
            bootstraps: &[],
            context,
            proxies: &mut proxies,
        };
        let sig = MethodSignature::parse(CONSUMER).unwrap();
        let insn = lambda(&mut builder, "accept", sig, arguments, alternate);
        (insn, proxies)
    }

    #[test]
    fn test_lambda_proxy_class() {
        let mut context = LoaderContext::new();
        let (insn, proxies) = lower(&mut context, &consumer_arguments(), false);

        assert_eq!(proxies.len(), 1);
        let proxy = &proxies[0];
        assert_eq!(proxy.name, "a/Main_invoke_java_util_function_Consumer_0");
        assert_eq!(proxy.interfaces, vec!["java/util/function/Consumer"]);

        let fields: Vec<(&str, &str)> = proxy
            .fields
            .iter()
            .map(|field| (field.name.as_str(), field.descriptor.as_str()))
            .collect();
        assert_eq!(fields, [("field0", "I"), ("field1", "Ljava/lang/String;")]);

        assert_eq!(proxy.methods.len(), 1);
        let method = &proxy.methods[0];
        assert_eq!(method.name, "accept");
        assert_eq!(method.descriptor, "(Ljava/lang/Object;)V");
        assert!(!method.is_static());
        assert!(matches!(
            method.body.as_ref().map(|body| &body.nodes[0].insn),
            Some(Instruction::LambdaProxy { .. })
        ));

        match insn.unwrap() {
            Instruction::InvokeDynamic { proxy, captures } => {
                assert_eq!(proxy, "a/Main_invoke_java_util_function_Consumer_0");
                assert_eq!(captures.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lambda_occurrences_are_numbered() {
        let mut context = LoaderContext::new();
        let (_, first) = lower(&mut context, &consumer_arguments(), false);
        let (_, second) = lower(&mut context, &consumer_arguments(), false);
        assert_eq!(first[0].name, "a/Main_invoke_java_util_function_Consumer_0");
        assert_eq!(second[0].name, "a/Main_invoke_java_util_function_Consumer_1");
    }

    #[test]
    fn test_alternate_factory_markers() {
        let mut context = LoaderContext::new();
        let arguments = alternate_arguments(&[
            Loadable::Int(FLAG_MARKERS),
            Loadable::Int(1),
            Loadable::Class("java/lang/Runnable".to_string()),
        ]);
        let (insn, proxies) = lower(&mut context, &arguments, true);
        assert!(insn.is_ok());
        assert_eq!(
            proxies[0].interfaces,
            vec!["java/util/function/Consumer", "java/lang/Runnable"]
        );
    }

    #[test]
    fn test_alternate_factory_without_bridges() {
        let mut context = LoaderContext::new();
        let arguments = alternate_arguments(&[Loadable::Int(FLAG_BRIDGES), Loadable::Int(0)]);
        let (insn, proxies) = lower(&mut context, &arguments, true);
        assert!(insn.is_ok());
        assert_eq!(proxies.len(), 1);
    }

    #[test]
    fn test_alternate_factory_rejections() {
        let mut context = LoaderContext::new();

        let serializable = alternate_arguments(&[Loadable::Int(FLAG_SERIALIZABLE)]);
        let (insn, proxies) = lower(&mut context, &serializable, true);
        assert!(matches!(insn, Err(Error::UnsupportedInvokeDynamic(_))));
        assert!(proxies.is_empty());

        let bridged = alternate_arguments(&[Loadable::Int(FLAG_BRIDGES), Loadable::Int(1)]);
        let (insn, _) = lower(&mut context, &bridged, true);
        assert!(matches!(insn, Err(Error::UnsupportedInvokeDynamic(_))));

        let negative = alternate_arguments(&[Loadable::Int(FLAG_MARKERS), Loadable::Int(-5)]);
        let (insn, proxies) = lower(&mut context, &negative, true);
        assert!(matches!(insn, Err(Error::Malformed { .. })));
        assert!(proxies.is_empty());

        let missing_flags = consumer_arguments();
        let (insn, _) = lower(&mut context, &missing_flags, true);
        assert!(matches!(insn, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_lambda_handle_kind() {
        assert!(lambda_target(&handle(handle_kind::INVOKE_STATIC)).is_ok());
        assert!(matches!(
            lambda_target(&handle(handle_kind::PUT_STATIC)),
            Err(Error::UnsupportedInvokeDynamic(_))
        ));

        let mut array = handle(handle_kind::INVOKE_VIRTUAL);
        array.member.owner = "[I".to_string();
        assert_eq!(lambda_target(&array).unwrap().method.owner, OBJECT);
    }
}
