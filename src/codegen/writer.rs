//! Line-oriented text output and C++ literal spelling.

/// Accumulates generated C++ source one indented line at a time.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    /// An empty writer at indentation level 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` at the current indentation. Empty text produces an empty line.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
        self
    }

    /// Append several lines at the current indentation.
    pub fn lines<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line);
        }
        self
    }

    /// Append an empty line.
    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    /// Append a jump label in the first column.
    pub fn label(&mut self, id: u32) -> &mut Self {
        self.out.push_str(&format!("label_{id}:;\n"));
        self
    }

    /// Append `text` and indent the following lines.
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(text);
        self.indent += 1;
        self
    }

    /// Dedent and append `text`.
    pub fn close(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(text)
    }

    /// Increase the indentation without writing.
    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    /// Decrease the indentation without writing.
    pub fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// The text written so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consume the writer.
    #[must_use]
    pub fn into_string(self) -> String {
        self.out
    }
}

/// A quoted C string literal of the UTF-8 bytes of `value`.
///
/// Control characters and every non-ASCII byte become three digit octal escapes so the
/// literal does not depend on the compiler's source or execution character set.
#[must_use]
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            // Breaks `??x` trigraph sequences
            b'?' => out.push_str("\\?"),
            0x20..=0x7E => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\{byte:03o}")),
        }
    }
    out.push('"');
    out
}

/// Expression creating a `java.lang.String` for a literal.
#[must_use]
pub fn string_object(value: &str) -> String {
    format!("createStringLiteral(ctx, u8{}_j)", string_literal(value))
}

/// An `int` literal.
#[must_use]
pub fn int_literal(value: i32) -> String {
    if value == i32::MIN {
        "INT32_MIN".to_string()
    } else {
        value.to_string()
    }
}

/// A `long` literal.
#[must_use]
pub fn long_literal(value: i64) -> String {
    if value == i64::MIN {
        "INT64_MIN".to_string()
    } else {
        format!("{value}LL")
    }
}

/// A `float` literal; NaN and infinities use the `<cmath>` macros.
#[must_use]
pub fn float_literal(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string()
    } else {
        format!("{value:?}f")
    }
}

/// A `double` literal; NaN and infinities use the `<cmath>` macros.
#[must_use]
pub fn double_literal(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string()
    } else {
        format!("{value:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut writer = CodeWriter::new();
        writer.open("void f() {").line("x();").label(3).close("}");
        assert_eq!(writer.into_string(), "void f() {\n\tx();\nlabel_3:;\n}\n");
    }

    #[test]
    fn test_blank_lines_carry_no_indent() {
        let mut writer = CodeWriter::new();
        writer.indent().line("").line("a");
        assert_eq!(writer.as_str(), "\n\ta\n");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(string_literal("\u{0}1"), "\"\\0001\"");
        assert_eq!(string_literal("é"), "\"\\303\\251\"");
        assert_eq!(string_literal("??="), "\"\\?\\?=\"");
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(int_literal(i32::MIN), "INT32_MIN");
        assert_eq!(int_literal(-5), "-5");
        assert_eq!(long_literal(7), "7LL");
        assert_eq!(long_literal(i64::MIN), "INT64_MIN");
        assert_eq!(float_literal(1.0), "1.0f");
        assert_eq!(float_literal(f32::NEG_INFINITY), "-INFINITY");
        assert_eq!(double_literal(0.5), "0.5");
        assert_eq!(double_literal(f64::NAN), "NAN");
        assert_eq!(double_literal(1e300), "1e300");
    }
}
