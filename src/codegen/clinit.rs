//! Static initialization.
//!
//! A class is initialized at most once. The generated `clinit_<Q>` guards its work with a
//! state word driven through [`InitState`]: a thread that finds the class initialized
//! returns immediately, a recursive request from the initializing thread returns
//! immediately, other threads wait on the class lock, and an initializer that throws
//! resets the state so the next request runs it again.

use crate::{
    codegen::{
        context::ClassContext,
        writer::{double_literal, float_literal, int_literal, long_literal, string_object, CodeWriter},
    },
    model::{naming::qualified_name, FieldValue, OBJECT},
};

/// Initialization progress of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum InitState {
    /// Not started, or a previous attempt failed
    #[default]
    Uninitialized = 0,
    /// The initializer is running
    Initializing = 1,
    /// The initializer completed
    Initialized = 2,
}

/// What a request to initialize a class has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The caller runs the initializer
    Run,
    /// Nothing to do
    AlreadyDone,
    /// The initializer is already running on this thread
    Recursive,
}

impl InitState {
    /// Value of the state word in generated code.
    #[must_use]
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Handle a request to initialize, moving to `Initializing` when the caller must run.
    pub fn begin(&mut self) -> InitOutcome {
        match self {
            InitState::Initialized => InitOutcome::AlreadyDone,
            InitState::Initializing => InitOutcome::Recursive,
            InitState::Uninitialized => {
                *self = InitState::Initializing;
                InitOutcome::Run
            }
        }
    }

    /// The initializer finished.
    pub fn complete(&mut self) {
        *self = InitState::Initialized;
    }

    /// The initializer threw; a later request runs it again.
    pub fn fail(&mut self) {
        *self = InitState::Uninitialized;
    }

    /// Drive one initialization request through `body`.
    ///
    /// # Errors
    /// Returns the error of `body`, leaving the state `Uninitialized`.
    pub fn run<E>(&mut self, body: impl FnOnce() -> Result<(), E>) -> Result<InitOutcome, E> {
        let outcome = self.begin();
        if outcome == InitOutcome::Run {
            match body() {
                Ok(()) => self.complete(),
                Err(error) => {
                    self.fail();
                    return Err(error);
                }
            }
        }
        Ok(outcome)
    }
}

/// C++ initializer expression for a constant field value.
#[must_use]
pub fn constant_expression(value: &FieldValue) -> String {
    match value {
        FieldValue::Int(value) => int_literal(*value),
        FieldValue::Long(value) => long_literal(*value),
        FieldValue::Float(value) => float_literal(*value),
        FieldValue::Double(value) => double_literal(*value),
        FieldValue::String(value) => format!("(jobject) {}", string_object(value)),
    }
}

/// Emit `clinit_<Q>`: superclass initialization, constant fields, then the `<clinit>` body.
pub fn emit(cx: &ClassContext<'_>, w: &mut CodeWriter) {
    let class = cx.class;
    let done = InitState::Initialized.value();

    w.open(format!("void clinit_{}(jcontext ctx) {{", cx.qualified));
    w.line(format!(
        "static std::atomic<int> initState{{{}}};",
        InitState::Uninitialized.value()
    ));
    w.line("static std::recursive_mutex initMutex;");
    w.line(format!("if (initState.load() == {done}) return;"));
    w.line("std::lock_guard<std::recursive_mutex> lock(initMutex);");
    w.line(format!("if (initState.load() == {done}) return;"));
    w.line(format!(
        "if (initState.load() == {}) return;",
        InitState::Initializing.value()
    ));
    w.line(format!("initState.store({});", InitState::Initializing.value()));

    w.open("try {");
    let parent = if class.is_interface() { OBJECT } else { class.super_name.as_str() };
    w.line(format!("CLINIT({});", qualified_name(parent)));
    for field in class.fields.iter().filter(|field| field.is_static()) {
        if let Some(value) = &field.value {
            w.line(format!(
                "{} = {};",
                field.symbol(&cx.qualified),
                constant_expression(value)
            ));
        }
    }
    if let Some(initializer) = class.static_initializer() {
        if initializer.body.is_some() {
            w.line(format!("{}(ctx);", initializer.symbol(&cx.qualified)));
        }
    }
    w.line(format!("initState.store({done});"));
    w.line(format!("initialized_{} = true;", cx.qualified));
    w.close("} catch (...) {");
    w.indent();
    w.line(format!("initState.store({});", InitState::Uninitialized.value()));
    w.line("throw;");
    w.close("}");
    w.close("}");
}
