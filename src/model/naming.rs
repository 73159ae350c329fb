//! Symbol naming for generated C++.
//!
//! Class names go through two steps: [`sanitize_name`] normalizes a name into internal
//! form and removes characters that can never appear in an identifier, and
//! [`qualified_name`] flattens the package separators so the result can be used as a C++
//! identifier and as the output file name.
//!
//! ```rust
//! use clearwing::model::naming::{method_symbol, qualified_name, sanitize_name};
//! use clearwing::model::types::MethodSignature;
//!
//! assert_eq!(sanitize_name("java.util.Map$Entry"), "java/util/Map$Entry");
//! assert_eq!(qualified_name("java/util/Map$Entry"), "java_util_Map_Entry");
//!
//! let sig = MethodSignature::parse("([Ljava/lang/String;)V")?;
//! assert_eq!(
//!     method_symbol("a_Main", "main", &sig, true),
//!     "SM_a_Main_main_Array1_java_lang_String"
//! );
//! # Ok::<(), clearwing::Error>(())
//! ```

use crate::model::types::MethodSignature;

/// Convert `.` separators to `/` and replace characters that are not identifier
/// characters, `/` or `$` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' => '/',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == '$' => c,
            _ => '_',
        })
        .collect()
}

/// The sanitized name with `/` and `$` flattened to `_`.
///
/// Used for C++ identifiers (`class_<Q>`, `mark_<Q>`) and output file names.
#[must_use]
pub fn qualified_name(name: &str) -> String {
    sanitize_name(name)
        .chars()
        .map(|c| if c == '/' || c == '$' { '_' } else { c })
        .collect()
}

/// The simple name of a class, the part after the last `/`.
#[must_use]
pub fn simple_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// The method name as it appears in generated symbols.
#[must_use]
pub fn sanitize_method_name(name: &str) -> String {
    match name {
        "<init>" => "init".to_string(),
        "<clinit>" => "clinit".to_string(),
        _ => name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect(),
    }
}

/// Method symbol: `M_<Q>_<name>_<params>_R_<ret>`, `SM_` prefixed for static methods.
///
/// Parameter types are appended one by one; the return type only when not `void`.
#[must_use]
pub fn method_symbol(qualified_owner: &str, name: &str, sig: &MethodSignature, is_static: bool) -> String {
    let mut symbol = String::with_capacity(qualified_owner.len() + name.len() + 16);
    symbol.push_str(if is_static { "SM_" } else { "M_" });
    symbol.push_str(qualified_owner);
    symbol.push('_');
    symbol.push_str(&sanitize_method_name(name));
    for param in &sig.params {
        symbol.push('_');
        symbol.push_str(&param.symbol_name());
    }
    if !sig.ret.is_void() {
        symbol.push_str("_R_");
        symbol.push_str(&sig.ret.symbol_name());
    }
    symbol
}

/// The method symbol without its `M_`/`SM_` prefix, used in `VTABLE_`, `INDEX_` and
/// `func_` names.
#[must_use]
pub fn method_suffix(symbol: &str) -> &str {
    symbol
        .strip_prefix("SM_")
        .or_else(|| symbol.strip_prefix("M_"))
        .unwrap_or(symbol)
}

/// Instance field member name.
#[must_use]
pub fn field_symbol(name: &str) -> String {
    format!("F_{}", sanitize_method_name(name))
}

/// Static field storage name.
#[must_use]
pub fn static_field_symbol(qualified_owner: &str, name: &str) -> String {
    format!("SF_{}_{}", qualified_owner, sanitize_method_name(name))
}

/// Name of the C function a JNI native method binds to.
#[must_use]
pub fn jni_symbol(qualified_owner: &str, name: &str) -> String {
    format!("Java_{}_{}", qualified_owner, name.replace('_', "_1"))
}

/// Whether `name` refers to an array class (`[I`, `[La/B;`).
#[must_use]
pub fn is_array_name(name: &str) -> bool {
    name.starts_with('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_name("a.b.C"), "a/b/C");
        assert_eq!(sanitize_name("a/b-c/D$1"), "a/b_c/D$1");
        assert_eq!(sanitize_name("späm"), "sp_m");
        assert_eq!(qualified_name("a/b/C$Inner"), "a_b_C_Inner");
        assert_eq!(simple_name("a/b/C"), "C");
        assert_eq!(simple_name("C"), "C");
    }

    #[test]
    fn test_method_symbols() {
        let sig = MethodSignature::parse("(IJ)Ljava/lang/String;").unwrap();
        let symbol = method_symbol("a_B", "get-thing", &sig, false);
        assert_eq!(symbol, "M_a_B_get_thing_int_long_R_java_lang_String");
        assert_eq!(method_suffix(&symbol), "a_B_get_thing_int_long_R_java_lang_String");

        let ctor = MethodSignature::parse("()V").unwrap();
        assert_eq!(method_symbol("a_B", "<init>", &ctor, false), "M_a_B_init");
        assert_eq!(method_symbol("a_B", "<clinit>", &ctor, true), "SM_a_B_clinit");
        assert_eq!(method_suffix("SM_a_B_clinit"), "a_B_clinit");
    }

    #[test]
    fn test_field_and_jni_symbols() {
        assert_eq!(field_symbol("value"), "F_value");
        assert_eq!(static_field_symbol("a_B", "COUNT"), "SF_a_B_COUNT");
        assert_eq!(jni_symbol("a_B", "do_it"), "Java_a_B_do_1it");
        assert!(is_array_name("[I"));
        assert!(!is_array_name("a/B"));
    }
}
