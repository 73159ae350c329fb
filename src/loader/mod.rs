//! Loading of class files into the class model.
//!
//! [`ClassLoader::load`] turns one class file into a [`Class`] with lowered, resolved
//! method bodies. Method bodies go through four steps: bytecode lowering, insertion of
//! exception region markers and frame locations, dataflow resolution of the operand stack
//! and, when optimizations are enabled, grouping of straight-line runs. Lambda call sites
//! synthesize proxy classes, which are returned next to the loaded class.
//!
//! # Key Components
//!
//! - [`ClassLoader`] - Loads class files, one at a time
//! - [`LoaderContext`] - State shared across the classes of one run
//! - [`frames`] - Exception region markers and frame locations
//! - [`resolver`] - Operand stack dataflow resolution
//!
//! # Examples
//!
//! ```rust,no_run
//! use clearwing::loader::ClassLoader;
//!
//! let data = std::fs::read("Main.class")?;
//! let mut loader = ClassLoader::new(false);
//! for class in loader.load(&data)? {
//!     println!("{} ({} methods)", class.name, class.methods.len());
//! }
//! # Ok::<(), clearwing::Error>(())
//! ```

pub(crate) mod builder;
pub mod frames;
pub(crate) mod invokedynamic;
pub mod resolver;

use rustc_hash::FxHashMap;

use crate::{
    classfile::{
        attributes::{
            names, read_annotation_default, read_annotations, read_bootstrap_methods,
            read_inner_classes, CodeAttribute,
        },
        constant_pool::ConstantPool,
        ClassFile, MemberInfo,
    },
    file::parser::Parser,
    ir::group_instructions,
    loader::builder::BodyBuilder,
    model::{annotation::Annotation, Class, Field, FieldValue, Method, OBJECT},
    Result,
};

pub use invokedynamic::{RECIPE_ARGUMENT, RECIPE_CONSTANT};

/// State shared by all classes loaded in one run.
#[derive(Debug, Default)]
pub struct LoaderContext {
    proxy_counters: FxHashMap<String, u32>,
}

impl LoaderContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next free occurrence index for proxy classes named with `prefix`.
    pub fn next_proxy_index(&mut self, prefix: &str) -> u32 {
        let counter = self.proxy_counters.entry(prefix.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

/// Loads class files into [`Class`] values.
#[derive(Debug, Default)]
pub struct ClassLoader {
    context: LoaderContext,
    optimize: bool,
}

fn read_utf8_index(data: &[u8], pool: &ConstantPool) -> Result<String> {
    let index = Parser::new(data).read_be::<u16>()?;
    Ok(pool.utf8(index)?.to_string())
}

fn member_signature(member: &MemberInfo<'_>, pool: &ConstantPool) -> Result<Option<String>> {
    member
        .attribute(names::SIGNATURE)
        .map(|attribute| read_utf8_index(attribute.data, pool))
        .transpose()
}

fn member_annotations(member: &MemberInfo<'_>, pool: &ConstantPool) -> Result<Vec<Annotation>> {
    match member.attribute(names::RUNTIME_VISIBLE_ANNOTATIONS) {
        Some(attribute) => read_annotations(attribute.data, pool),
        None => Ok(Vec::new()),
    }
}

impl ClassLoader {
    /// A loader; `optimize` enables instruction grouping.
    #[must_use]
    pub fn new(optimize: bool) -> Self {
        ClassLoader {
            context: LoaderContext::new(),
            optimize,
        }
    }

    /// Load one class file.
    ///
    /// Returns the class followed by the proxy classes synthesized for its lambda call
    /// sites. The root class `java/lang/Object` is built in and yields nothing.
    ///
    /// # Errors
    /// Returns decoding errors for malformed input, [`crate::Error::Unsupported`] and
    /// [`crate::Error::UnsupportedInvokeDynamic`] for constructs the runtime cannot
    /// express, and dataflow errors for inconsistent method bodies.
    pub fn load(&mut self, data: &[u8]) -> Result<Vec<Class>> {
        let file = ClassFile::parse(data)?;
        if file.this_class == OBJECT {
            return Ok(Vec::new());
        }
        let pool = &file.pool;

        let mut class = Class::new(
            &file.this_class,
            file.super_class.as_deref(),
            &file.interfaces,
            file.access,
        );
        if let Some(attribute) = file.attribute(names::SIGNATURE) {
            class.signature = Some(read_utf8_index(attribute.data, pool)?);
        }
        if let Some(attribute) = file.attribute(names::INNER_CLASSES) {
            for entry in read_inner_classes(attribute.data, pool)? {
                if entry.inner == file.this_class {
                    class.anonymous = entry.name.is_none();
                    class.mark_inner(entry.outer.as_deref());
                }
                if entry.outer.as_deref() == Some(file.this_class.as_str()) {
                    class.add_inner_class(&entry.inner);
                }
            }
        }
        if let Some(attribute) = file.attribute(names::RUNTIME_VISIBLE_ANNOTATIONS) {
            class.annotations = read_annotations(attribute.data, pool)?;
        }
        let bootstraps = match file.attribute(names::BOOTSTRAP_METHODS) {
            Some(attribute) => read_bootstrap_methods(attribute.data, pool)?,
            None => Vec::new(),
        };

        for info in &file.fields {
            let mut field = Field::new(info.name.clone(), info.descriptor.clone(), info.access)?;
            field.signature = member_signature(info, pool)?;
            field.annotations = member_annotations(info, pool)?;
            if let Some(attribute) = info.attribute(names::CONSTANT_VALUE) {
                let index = Parser::new(attribute.data).read_be::<u16>()?;
                field.value = FieldValue::from_loadable(pool.loadable(index)?);
            }
            class.fields.push(field);
        }

        let class_name = class.name.clone();
        let mut proxies = Vec::new();
        for info in &file.methods {
            let mut method = Method::new(info.name.clone(), info.descriptor.clone(), info.access)?;
            method.signature = member_signature(info, pool)?;
            method.annotations = member_annotations(info, pool)?;

            if let Some(attribute) = info.attribute(names::ANNOTATION_DEFAULT) {
                let value = read_annotation_default(attribute.data, pool)?;
                if let Some(defaults) = &mut class.default_annotation {
                    defaults.values.push((method.name.clone(), value.clone()));
                }
                method.annotation_default = Some(value);
            }

            if let Some(attribute) = info.attribute(names::CODE) {
                let code = CodeAttribute::read(attribute.data, pool)?;
                let display_name = method.display_name(&class_name);

                let mut builder = BodyBuilder {
                    class_name: &class_name,
                    pool,
                    bootstraps: &bootstraps,
                    context: &mut self.context,
                    proxies: &mut proxies,
                };
                let mut body = builder.build(&code)?;
                frames::materialize(&mut body, &display_name)?;
                resolver::resolve(&mut body, &class_name, &display_name)?;
                if self.optimize {
                    body.nodes = group_instructions(std::mem::take(&mut body.nodes));
                }
                method.body = Some(body);
            }

            class.methods.push(method);
        }

        log::debug!(
            "Loaded {} ({} fields, {} methods, {} proxies)",
            class.name,
            class.fields.len(),
            class.methods.len(),
            proxies.len()
        );

        let mut classes = Vec::with_capacity(proxies.len() + 1);
        classes.push(class);
        classes.extend(proxies);
        Ok(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{constant_pool::tag, MAGIC};

    fn header_only(name: &str, super_name: Option<&str>) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(MAGIC.to_be_bytes());
        data.extend(0_u16.to_be_bytes());
        data.extend(52_u16.to_be_bytes());
        let count: u16 = if super_name.is_some() { 5 } else { 3 };
        data.extend(count.to_be_bytes());
        data.push(tag::UTF8);
        data.extend((name.len() as u16).to_be_bytes());
        data.extend(name.as_bytes());
        data.extend([tag::CLASS, 0, 1]);
        if let Some(super_name) = super_name {
            data.push(tag::UTF8);
            data.extend((super_name.len() as u16).to_be_bytes());
            data.extend(super_name.as_bytes());
            data.extend([tag::CLASS, 0, 3]);
        }
        data.extend(0x0021_u16.to_be_bytes());
        data.extend(2_u16.to_be_bytes());
        data.extend(if super_name.is_some() { 4_u16 } else { 0 }.to_be_bytes());
        for _ in 0..4 {
            data.extend(0_u16.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_proxy_counters() {
        let mut context = LoaderContext::new();
        assert_eq!(context.next_proxy_index("a_Main_invoke_java_lang_Runnable"), 0);
        assert_eq!(context.next_proxy_index("a_Main_invoke_java_lang_Runnable"), 1);
        assert_eq!(context.next_proxy_index("a_Main_invoke_java_util_function_Supplier"), 0);
    }

    #[test]
    fn test_object_is_skipped() {
        let mut loader = ClassLoader::new(false);
        assert!(loader.load(&header_only(OBJECT, None)).unwrap().is_empty());
    }

    #[test]
    fn test_load_header() {
        let mut loader = ClassLoader::new(true);
        let classes = loader.load(&header_only("a/b/Foo$Bar", Some(OBJECT))).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "a/b/Foo$Bar");
        assert_eq!(classes[0].super_name, OBJECT);
        assert!(classes[0].methods.is_empty());
    }
}
