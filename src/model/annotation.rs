//! Annotation values attached to classes, fields and methods.

use std::collections::BTreeSet;

use crate::model::types::JavaType;

/// A single annotation element value (JVMS 4.7.16.1).
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum AnnotationValue {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    /// Class literal, as a field descriptor (`V` for `void.class`)
    Class(String),
    /// Enum constant: descriptor of the enum type and the constant name
    Enum { type_desc: String, name: String },
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    fn collect_classes(&self, classes: &mut BTreeSet<String>) {
        match self {
            AnnotationValue::Class(desc) => {
                if let Some(name) = JavaType::from_descriptor(desc).and_then(|ty| ty.class_name().map(str::to_owned)) {
                    classes.insert(name.to_string());
                }
            }
            AnnotationValue::Enum { type_desc, .. } => {
                if let Some(name) =
                    JavaType::from_descriptor(type_desc).and_then(|ty| ty.class_name().map(str::to_owned))
                {
                    classes.insert(name.to_string());
                }
            }
            AnnotationValue::Annotation(annotation) => annotation.collect_classes(classes),
            AnnotationValue::Array(values) => {
                for value in values {
                    value.collect_classes(classes);
                }
            }
            _ => {}
        }
    }
}

/// One annotation usage, or the default values of an annotation interface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotation {
    /// Internal name of the annotation interface
    pub type_name: String,
    /// Element values in declaration order
    pub values: Vec<(String, AnnotationValue)>,
}

impl Annotation {
    /// Create an annotation usage without values.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Annotation {
            type_name: type_name.into(),
            values: Vec::new(),
        }
    }

    /// The value of element `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Fill in every element missing from this usage from `defaults`.
    pub fn merge_defaults(&mut self, defaults: &Annotation) {
        for (name, value) in &defaults.values {
            if self.get(name).is_none() {
                self.values.push((name.clone(), value.clone()));
            }
        }
    }

    /// Add the annotation type and every class referenced by its values to `classes`.
    pub fn collect_classes(&self, classes: &mut BTreeSet<String>) {
        classes.insert(self.type_name.clone());
        for (_, value) in &self.values {
            value.collect_classes(classes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_defaults_keeps_explicit() {
        let mut usage = Annotation::new("a/Ann");
        usage
            .values
            .push(("value".to_string(), AnnotationValue::Int(1)));

        let mut defaults = Annotation::new("a/Ann");
        defaults
            .values
            .push(("value".to_string(), AnnotationValue::Int(7)));
        defaults.values.push((
            "name".to_string(),
            AnnotationValue::String("x".to_string()),
        ));

        usage.merge_defaults(&defaults);
        assert_eq!(usage.get("value"), Some(&AnnotationValue::Int(1)));
        assert_eq!(
            usage.get("name"),
            Some(&AnnotationValue::String("x".to_string()))
        );
        assert_eq!(usage.values.len(), 2);
    }

    #[test]
    fn test_collect_classes() {
        let mut annotation = Annotation::new("a/Ann");
        annotation.values.push((
            "types".to_string(),
            AnnotationValue::Array(vec![
                AnnotationValue::Class("La/B;".to_string()),
                AnnotationValue::Class("[[La/C;".to_string()),
                AnnotationValue::Class("I".to_string()),
            ]),
        ));
        annotation.values.push((
            "kind".to_string(),
            AnnotationValue::Enum {
                type_desc: "La/Kind;".to_string(),
                name: "FAST".to_string(),
            },
        ));

        let mut classes = BTreeSet::new();
        annotation.collect_classes(&mut classes);
        let classes: Vec<&str> = classes.iter().map(String::as_str).collect();
        assert_eq!(classes, vec!["a/Ann", "a/B", "a/C", "a/Kind"]);
    }
}
