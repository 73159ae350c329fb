//! Native method bodies embedded in Java sources.
//!
//! Java sources can carry the C++ implementation of their `native` methods in a block
//! comment directly after the declaration:
//!
//! ```java
//! public static native int add(int a, int b); /*
//!     return a + b;
//! */
//! ```
//!
//! [`NativeScanner::scan`] walks source directories for such files and
//! [`NativeScanner::translate`] turns
//! each into a `<path>_native.cpp` translation unit defining the generated method symbols.
//! Free standing `/*JNI ... */` sections are copied through unchanged. Buffer, primitive
//! array and string arguments are converted to native pointers before the body runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::{
    dependencies::glob::GlobSet,
    diagnostics::{DiagnosticCategory, Diagnostics},
    model::{
        naming::{method_symbol, qualified_name},
        types::{JavaType, MethodSignature},
        ClassMap,
    },
    Result,
};

const JNI_SECTION: &str = r"(?s)/\*JNI(.*?)\*/";

const NATIVE_METHOD: &str = concat!(
    r"(?P<mods>(?:\b(?:public|protected|private|static|final|synchronized|native|strictfp)\s+)+)",
    r"(?P<ret>[\w.$]+(?:\s*\[\s*\])*)\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)",
    r"\s*(?:throws\s+[\w.$,\s]+)?;",
    r"(?:[ \t]*(?:\r?\n[ \t]*)?/\*(?P<code>(?s:.*?))\*/)?",
);

const PACKAGE: &str = r"(?m)^\s*package\s+([\w.]+)\s*;";

const IMPORT: &str = r"(?m)^\s*import\s+(static\s+)?([\w.]+?)(\.\*)?\s*;";

const ANNOTATION: &str = r"@[\w.]+(?:\([^)]*\))?";

const TYPE_ARGUMENTS: &str = r"<[^<>]*>";

/// `java.lang` types resolved without an import when they are not part of the input.
const JAVA_LANG: [&str; 14] = [
    "Object",
    "String",
    "Class",
    "Boolean",
    "Byte",
    "Character",
    "Short",
    "Integer",
    "Long",
    "Float",
    "Double",
    "Throwable",
    "Runnable",
    "Thread",
];

/// A generated native translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSource {
    /// Output path relative to the `src` directory
    pub path: PathBuf,
    /// C++ source text
    pub content: String,
    /// Internal names of classes the unit includes, to be collected as roots
    pub classes: Vec<String>,
}

/// Compiled patterns recognizing native declarations and the context they need.
#[derive(Debug, Clone)]
pub struct NativeScanner {
    jni_section: Regex,
    native_method: Regex,
    package: Regex,
    import: Regex,
    annotation: Regex,
    type_arguments: Regex,
}

/// Type and import context of one source file.
struct Scope<'a> {
    package: String,
    imports: FxHashMap<String, String>,
    wildcards: Vec<String>,
    classes: &'a ClassMap,
}

impl<'a> Scope<'a> {
    fn new(scanner: &NativeScanner, code: &str, classes: &'a ClassMap) -> Self {
        let package = scanner
            .package
            .captures(code)
            .map(|captures| captures[1].replace('.', "/"))
            .unwrap_or_default();

        let mut imports = FxHashMap::default();
        let mut wildcards = Vec::new();
        for captures in scanner.import.captures_iter(code) {
            if captures.get(1).is_some() {
                continue;
            }
            let path = internal_path(&captures[2]);
            if captures.get(3).is_some() {
                wildcards.push(path);
            } else if let Some(simple) = captures[2].rsplit('.').next() {
                imports.insert(simple.to_string(), path);
            }
        }

        Scope {
            package,
            imports,
            wildcards,
            classes,
        }
    }

    fn in_package(&self, package: &str, name: &str) -> String {
        if package.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", package, name)
        }
    }

    /// Internal name of the class a source type name refers to.
    fn resolve_class(&self, name: &str) -> String {
        if let Some((first, rest)) = name.split_once('.') {
            if let Some(outer) = self.imports.get(first) {
                return format!("{}${}", outer, rest.replace('.', "$"));
            }
            return internal_path(name);
        }

        if let Some(imported) = self.imports.get(name) {
            return imported.clone();
        }
        let local = self.in_package(&self.package, name);
        if self.classes.contains(&local) {
            return local;
        }
        let lang = format!("java/lang/{}", name);
        if self.classes.contains(&lang) || JAVA_LANG.contains(&name) {
            return lang;
        }
        self.wildcards
            .iter()
            .map(|package| self.in_package(package, name))
            .find(|candidate| self.classes.contains(candidate))
            .unwrap_or(local)
    }

    fn resolve_type(&self, source: &str) -> JavaType {
        let mut base = source.trim();
        let mut dims = 0_u8;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end();
            dims += 1;
        }
        if let Some(stripped) = base.strip_suffix("...") {
            base = stripped.trim_end();
            dims += 1;
        }

        let ty = match base {
            "void" => JavaType::Void,
            "boolean" => JavaType::Boolean,
            "byte" => JavaType::Byte,
            "char" => JavaType::Char,
            "short" => JavaType::Short,
            "int" => JavaType::Int,
            "long" => JavaType::Long,
            "float" => JavaType::Float,
            "double" => JavaType::Double,
            class => JavaType::Object(self.resolve_class(class)),
        };
        if dims == 0 {
            ty
        } else {
            ty.array_of(dims)
        }
    }
}

/// Package path with nested classes (capitalized segments after the first) joined by `$`.
fn internal_path(dotted: &str) -> String {
    let mut path = String::with_capacity(dotted.len());
    let mut in_class = false;
    for (index, segment) in dotted.split('.').enumerate() {
        if index > 0 {
            path.push(if in_class { '$' } else { '/' });
        }
        if segment.starts_with(|c: char| c.is_ascii_uppercase()) {
            in_class = true;
        }
        path.push_str(segment);
    }
    path
}

/// How an argument is handed to the native body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    None,
    Buffer(&'static str),
    Array(&'static str),
    String,
}

fn conversion(ty: &JavaType) -> Conversion {
    match ty {
        JavaType::Object(name) if name == "java/lang/String" => Conversion::String,
        JavaType::Object(name) if name.starts_with("java/nio/") && name.ends_with("Buffer") => {
            Conversion::Buffer(match name.as_str() {
                "java/nio/ByteBuffer" => "char*",
                "java/nio/CharBuffer" => "unsigned short*",
                "java/nio/ShortBuffer" => "short*",
                "java/nio/IntBuffer" => "int*",
                "java/nio/LongBuffer" => "long long*",
                "java/nio/FloatBuffer" => "float*",
                "java/nio/DoubleBuffer" => "double*",
                _ => "unsigned char*",
            })
        }
        JavaType::Array { dims: 1, component } => match component.as_ref() {
            JavaType::Boolean => Conversion::Array("bool*"),
            JavaType::Byte => Conversion::Array("char*"),
            JavaType::Char => Conversion::Array("unsigned short*"),
            JavaType::Short => Conversion::Array("short*"),
            JavaType::Int => Conversion::Array("int*"),
            JavaType::Long => Conversion::Array("long long*"),
            JavaType::Float => Conversion::Array("float*"),
            JavaType::Double => Conversion::Array("double*"),
            _ => Conversion::None,
        },
        _ => Conversion::None,
    }
}

struct Parameter {
    name: String,
    ty: JavaType,
}

fn parse_parameters(scanner: &NativeScanner, scope: &Scope<'_>, source: &str) -> Vec<Parameter> {
    let mut source = scanner.annotation.replace_all(source, "").into_owned();
    while scanner.type_arguments.is_match(&source) {
        source = scanner.type_arguments.replace_all(&source, "").into_owned();
    }

    source
        .split(',')
        .filter_map(|parameter| {
            let tokens: Vec<&str> = parameter
                .split_whitespace()
                .filter(|token| *token != "final")
                .collect();
            let (name, ty) = tokens.split_last()?;
            let mut ty = ty.join(" ");
            let mut name = *name;
            while let Some(stripped) = name.strip_suffix("[]") {
                name = stripped;
                ty.push_str("[]");
            }
            Some(Parameter {
                name: name.to_string(),
                ty: scope.resolve_type(&ty),
            })
        })
        .collect()
}

fn trim_body(code: &str) -> &str {
    code.trim_start_matches('\n').trim_end_matches('\t')
}

fn write_method(
    out: &mut String,
    qualified_owner: &str,
    name: &str,
    is_static: bool,
    ret: &JavaType,
    parameters: &[Parameter],
    body: &str,
) -> Result<()> {
    let descriptor: String = parameters.iter().map(|parameter| parameter.ty.descriptor()).collect();
    let sig = MethodSignature::parse(&format!("({}){}", descriptor, ret.descriptor()))?;

    out.push_str(ret.cpp_type());
    out.push(' ');
    out.push_str(&method_symbol(qualified_owner, name, &sig, is_static));
    out.push_str("(jcontext ctx");
    if !is_static {
        out.push_str(", jobject self");
    }
    for parameter in parameters {
        out.push_str(", ");
        out.push_str(parameter.ty.cpp_type());
        out.push(' ');
        out.push_str(&parameter.name);
        if conversion(&parameter.ty) != Conversion::None {
            out.push_str("_object");
        }
    }
    out.push_str(") {\n");

    for parameter in parameters {
        let name = &parameter.name;
        match conversion(&parameter.ty) {
            Conversion::None => {}
            Conversion::Buffer(pointer) => out.push_str(&format!(
                "\tauto {name} = ({pointer})((java_nio_Buffer *){name}_object)->F_address;\n"
            )),
            Conversion::String => out.push_str(&format!(
                "\tauto {name} = stringToNative(ctx, (jstring) {name}_object);\n"
            )),
            Conversion::Array(pointer) => out.push_str(&format!(
                "\tauto {name} = ({pointer})((jarray){name}_object)->data;\n"
            )),
        }
    }
    out.push('\n');
    out.push_str(trim_body(body));
    out.push_str("}\n\n");
    Ok(())
}

enum Segment<'c> {
    Jni(&'c str),
    Method {
        name: &'c str,
        is_static: bool,
        ret: &'c str,
        params: &'c str,
        body: Option<&'c str>,
    },
}

fn find_java_files(root: &Path, dir: &Path, found: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            find_java_files(root, &entry, found)?;
        } else if entry.extension().is_some_and(|extension| extension == "java") {
            let relative = entry
                .strip_prefix(root)
                .unwrap_or(&entry)
                .to_string_lossy()
                .replace('\\', "/");
            found.push((relative, entry));
        }
    }
    Ok(())
}

impl NativeScanner {
    /// Compile the scanner patterns.
    ///
    /// # Errors
    /// Returns [`crate::Error::Pattern`] if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(NativeScanner {
            jni_section: Regex::new(JNI_SECTION)?,
            native_method: Regex::new(NATIVE_METHOD)?,
            package: Regex::new(PACKAGE)?,
            import: Regex::new(IMPORT)?,
            annotation: Regex::new(ANNOTATION)?,
            type_arguments: Regex::new(TYPE_ARGUMENTS)?,
        })
    }

    /// Translate the Java source at `relative_path` (`a/b/Foo.java`).
    ///
    /// Returns `None` when the file declares no native methods and no JNI sections. Methods
    /// without an inline body are skipped with a warning.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a declaration yields an invalid descriptor.
    pub fn translate(
        &self,
        relative_path: &str,
        code: &str,
        classes: &ClassMap,
        diagnostics: &Diagnostics,
    ) -> Result<Option<NativeSource>> {
        if !code.contains("native") {
            return Ok(None);
        }
        let Some(stem) = relative_path.strip_suffix(".java") else {
            return Ok(None);
        };

        let mut segments: Vec<(usize, Segment<'_>)> = Vec::new();
        let mut method_spans = Vec::new();
        for captures in self.native_method.captures_iter(code) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let modifiers = captures.name("mods").map_or("", |m| m.as_str());
            if !modifiers.split_whitespace().any(|modifier| modifier == "native") {
                continue;
            }
            method_spans.push(whole.range());
            segments.push((
                whole.start(),
                Segment::Method {
                    name: captures.name("name").map_or("", |m| m.as_str()),
                    is_static: modifiers.split_whitespace().any(|modifier| modifier == "static"),
                    ret: captures.name("ret").map_or("void", |m| m.as_str()),
                    params: captures.name("params").map_or("", |m| m.as_str()),
                    body: captures.name("code").map(|m| m.as_str()),
                },
            ));
        }
        for captures in self.jni_section.captures_iter(code) {
            let (Some(whole), Some(section)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if method_spans.iter().any(|span| span.contains(&whole.start())) {
                continue;
            }
            segments.push((whole.start(), Segment::Jni(section.as_str())));
        }
        if segments.is_empty() {
            return Ok(None);
        }
        segments.sort_by_key(|(start, _)| *start);

        let scope = Scope::new(self, code, classes);
        let owner = stem.to_string();
        let qualified_owner = qualified_name(&owner);

        let mut out = String::new();
        out.push_str("#include \"Clearwing.h\"\n");
        out.push_str("#include \"java/nio/Buffer.h\"\n");
        out.push_str(&format!("#include <{}.h>\n\n", qualified_owner));

        for (_, segment) in segments {
            match segment {
                Segment::Jni(section) => {
                    out.push_str(&section.replace('\r', ""));
                    out.push('\n');
                }
                Segment::Method {
                    name,
                    is_static,
                    ret,
                    params,
                    body,
                } => {
                    let Some(body) = body else {
                        let message = format!("No native method body for: {}", name);
                        log::warn!("{}", message);
                        diagnostics.warning_for(DiagnosticCategory::NativeSource, owner.as_str(), message);
                        continue;
                    };
                    let ret = scope.resolve_type(ret);
                    let parameters = parse_parameters(self, &scope, params);
                    write_method(
                        &mut out,
                        &qualified_owner,
                        name,
                        is_static,
                        &ret,
                        &parameters,
                        &body.replace('\r', ""),
                    )?;
                }
            }
        }

        Ok(Some(NativeSource {
            path: PathBuf::from(format!("{}_native.cpp", stem)),
            content: out,
            classes: vec![owner],
        }))
    }

    /// Translate every Java source below `dirs` that carries native code.
    ///
    /// Files whose relative path (without `.java`) matches `ignores` are skipped. When the same
    /// relative path exists in several directories the last one wins.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if a directory or file cannot be read.
    pub fn scan(
        &self,
        dirs: &[PathBuf],
        ignores: &GlobSet,
        classes: &ClassMap,
        diagnostics: &Diagnostics,
    ) -> Result<Vec<NativeSource>> {
        let mut files: FxHashMap<String, PathBuf> = FxHashMap::default();
        for dir in dirs {
            let mut found = Vec::new();
            find_java_files(dir, dir, &mut found)?;
            files.extend(found);
        }

        let mut files: Vec<(String, PathBuf)> = files
            .into_iter()
            .filter(|(relative, _)| !ignores.matches(relative.trim_end_matches(".java")))
            .collect();
        files.sort();

        let mut sources = Vec::new();
        for (relative, path) in files {
            let code = fs::read_to_string(&path)?;
            if let Some(source) = self.translate(&relative, &code, classes, diagnostics)? {
                log::debug!("Generated native source {}", source.path.display());
                sources.push(source);
            }
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package a.b;

import java.nio.ByteBuffer;

public class Native {
	/*JNI
	#include <cstring>
	*/

	public static native int add(int a, int b); /*
		return a + b;
	*/

	private native void fill(ByteBuffer buffer, byte[] data, String name); /*
		memcpy(buffer, data, strlen(name));
	*/

	public static native long missing();
}
"#;

    fn translate(code: &str) -> (Option<NativeSource>, Diagnostics) {
        let diagnostics = Diagnostics::new();
        let source = NativeScanner::new()
            .unwrap()
            .translate("a/b/Native.java", code, &ClassMap::new(), &diagnostics).unwrap();
        (source, diagnostics)
    }

    #[test]
    fn test_translate_static_method() {
        let (source, _) = translate(SOURCE);
        let source = source.unwrap();
        assert_eq!(source.path, PathBuf::from("a/b/Native_native.cpp"));
        assert_eq!(source.classes, vec!["a/b/Native".to_string()]);
        assert!(source.content.starts_with("#include \"Clearwing.h\"\n#include \"java/nio/Buffer.h\"\n"));
        assert!(source.content.contains("#include <a_b_Native.h>"));
        assert!(source
            .content
            .contains("jint SM_a_b_Native_add_int_int_R_int(jcontext ctx, jint a, jint b) {\n\n\t\treturn a + b;\n}\n"));
    }

    #[test]
    fn test_translate_converted_arguments() {
        let (source, _) = translate(SOURCE);
        let content = source.unwrap().content;
        assert!(content.contains(
            "void M_a_b_Native_fill_java_nio_ByteBuffer_Array1_byte_java_lang_String(jcontext ctx, jobject self, \
             jobject buffer_object, jobject data_object, jobject name_object) {"
        ));
        assert!(content.contains("\tauto buffer = (char*)((java_nio_Buffer *)buffer_object)->F_address;\n"));
        assert!(content.contains("\tauto data = (char*)((jarray)data_object)->data;\n"));
        assert!(content.contains("\tauto name = stringToNative(ctx, (jstring) name_object);\n"));
    }

    #[test]
    fn test_jni_section_copied() {
        let (source, _) = translate(SOURCE);
        let content = source.unwrap().content;
        let jni = content.find("#include <cstring>").unwrap();
        let add = content.find("SM_a_b_Native_add").unwrap();
        assert!(jni < add);
    }

    #[test]
    fn test_missing_body_warns() {
        let (source, diagnostics) = translate(SOURCE);
        assert!(!source.unwrap().content.contains("missing"));
        let warnings = diagnostics.by_category(DiagnosticCategory::NativeSource);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("No native method body for: missing"));
    }

    #[test]
    fn test_without_native_skipped() {
        let (source, _) = translate("package a; class Plain { int x; }");
        assert!(source.is_none());
    }

    #[test]
    fn test_internal_path() {
        assert_eq!(internal_path("a.b.Outer.Inner"), "a/b/Outer$Inner");
        assert_eq!(internal_path("java.lang.String"), "java/lang/String");
    }

    #[test]
    fn test_scan_sources_respects_ignores() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/Native.java"), SOURCE).unwrap();
        std::fs::create_dir_all(dir.path().join("c")).unwrap();
        std::fs::write(dir.path().join("c/Other.java"), SOURCE.replace("package a.b;", "package c;")).unwrap();

        let diagnostics = Diagnostics::new();
        let ignores = GlobSet::new(&["c.*"]).unwrap();
        let sources = NativeScanner::new()
            .unwrap()
            .scan(&[dir.path().to_path_buf()], &ignores, &ClassMap::new(), &diagnostics)
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, PathBuf::from("a/b/Native_native.cpp"));
    }
}
