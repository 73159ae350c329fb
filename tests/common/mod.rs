//! A small class file assembler for integration tests.

#![allow(dead_code)]

use std::{collections::HashMap, io::Cursor, io::Write};

use zip::write::SimpleFileOptions;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

pub const ICONST_1: u8 = 0x04;
pub const BIPUSH: u8 = 0x10;
pub const ALOAD_0: u8 = 0x2A;
pub const POP: u8 = 0x57;
pub const IADD: u8 = 0x60;
pub const IRETURN: u8 = 0xAC;
pub const RETURN: u8 = 0xB1;
pub const INVOKESPECIAL: u8 = 0xB7;
pub const INVOKESTATIC: u8 = 0xB8;
pub const INVOKEINTERFACE: u8 = 0xB9;
pub const INVOKEDYNAMIC: u8 = 0xBA;

pub const REF_INVOKE_STATIC: u8 = 6;

const UTF8: u8 = 1;
const CLASS: u8 = 7;
const STRING: u8 = 8;
const METHODREF: u8 = 10;
const INTERFACE_METHODREF: u8 = 11;
const NAME_AND_TYPE: u8 = 12;
const METHOD_HANDLE: u8 = 15;
const METHOD_TYPE: u8 = 16;
const INVOKE_DYNAMIC: u8 = 18;

/// Deduplicating constant pool writer.
#[derive(Default)]
struct Pool {
    data: Vec<u8>,
    next: u16,
    entries: HashMap<String, u16>,
}

impl Pool {
    fn add(&mut self, key: String, bytes: Vec<u8>) -> u16 {
        if let Some(&index) = self.entries.get(&key) {
            return index;
        }
        self.next += 1;
        self.data.extend(bytes);
        self.entries.insert(key, self.next);
        self.next
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut bytes = vec![UTF8];
        bytes.extend((value.len() as u16).to_be_bytes());
        bytes.extend(value.as_bytes());
        self.add(format!("utf8:{value}"), bytes)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        let mut bytes = vec![CLASS];
        bytes.extend(name.to_be_bytes());
        self.add(format!("class:{name}"), bytes)
    }

    fn string(&mut self, value: &str) -> u16 {
        let value = self.utf8(value);
        let mut bytes = vec![STRING];
        bytes.extend(value.to_be_bytes());
        self.add(format!("string:{value}"), bytes)
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        let mut nat = vec![NAME_AND_TYPE];
        nat.extend(name.to_be_bytes());
        nat.extend(desc.to_be_bytes());
        self.add(format!("nat:{name}:{desc}"), nat)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, desc: &str) -> u16 {
        let owner = self.class(owner);
        let nat = self.name_and_type(name, desc);
        let mut bytes = vec![tag];
        bytes.extend(owner.to_be_bytes());
        bytes.extend(nat.to_be_bytes());
        self.add(format!("member{tag}:{owner}:{nat}"), bytes)
    }

    fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.member_ref(METHODREF, owner, name, desc)
    }

    fn interface_method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.member_ref(INTERFACE_METHODREF, owner, name, desc)
    }

    fn method_handle(&mut self, kind: u8, reference: u16) -> u16 {
        let mut bytes = vec![METHOD_HANDLE, kind];
        bytes.extend(reference.to_be_bytes());
        self.add(format!("handle:{kind}:{reference}"), bytes)
    }

    fn method_type(&mut self, desc: &str) -> u16 {
        let desc = self.utf8(desc);
        let mut bytes = vec![METHOD_TYPE];
        bytes.extend(desc.to_be_bytes());
        self.add(format!("type:{desc}"), bytes)
    }

    fn invoke_dynamic(&mut self, bootstrap: u16, name: &str, desc: &str) -> u16 {
        let nat = self.name_and_type(name, desc);
        let mut bytes = vec![INVOKE_DYNAMIC];
        bytes.extend(bootstrap.to_be_bytes());
        bytes.extend(nat.to_be_bytes());
        self.add(format!("indy:{bootstrap}:{nat}"), bytes)
    }
}

/// Bytecode of one method.
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Code {
            max_stack,
            max_locals,
            code,
        }
    }
}

/// Assembles one class file.
pub struct ClassBuilder {
    pool: Pool,
    access: u16,
    this_class: u16,
    super_class: u16,
    this_name: String,
    super_name: String,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
    bootstraps: Vec<(u16, Vec<u16>)>,
}

/// The two bytes of a constant pool index operand.
pub fn index(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

impl ClassBuilder {
    /// A public class `name` extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        Self::with_super(name, "java/lang/Object")
    }

    pub fn with_super(name: &str, super_name: &str) -> Self {
        let mut pool = Pool::default();
        let this_class = pool.class(name);
        let super_class = pool.class(super_name);
        ClassBuilder {
            pool,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            this_name: name.to_string(),
            super_name: super_name.to_string(),
            fields: Vec::new(),
            field_count: 0,
            methods: Vec::new(),
            method_count: 0,
            bootstraps: Vec::new(),
        }
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.pool.method_ref(owner, name, desc)
    }

    pub fn string(&mut self, value: &str) -> u16 {
        self.pool.string(value)
    }

    pub fn with_access(&mut self, access: u16) -> &mut Self {
        self.access = access;
        self
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.pool.interface_method_ref(owner, name, desc)
    }

    /// A `LambdaMetafactory.metafactory` call site named `name` of type `desc`, forwarding
    /// to the static method `target` with descriptor `sam`.
    pub fn lambda_call_site(&mut self, name: &str, desc: &str, sam: &str, target: (&str, &str)) -> u16 {
        let factory = self.pool.method_ref(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
        );
        let factory = self.pool.method_handle(REF_INVOKE_STATIC, factory);
        let erased = self.pool.method_type(sam);
        let this_name = self.this_name.clone();
        let target = self.pool.method_ref(&this_name, target.0, target.1);
        let target = self.pool.method_handle(REF_INVOKE_STATIC, target);
        let instantiated = self.pool.method_type(sam);

        self.bootstraps.push((factory, vec![erased, target, instantiated]));
        let bootstrap = (self.bootstraps.len() - 1) as u16;
        self.pool.invoke_dynamic(bootstrap, name, desc)
    }

    pub fn field(&mut self, access: u16, name: &str, desc: &str) -> &mut Self {
        let name = self.pool.utf8(name);
        let desc = self.pool.utf8(desc);
        self.fields.extend(access.to_be_bytes());
        self.fields.extend(name.to_be_bytes());
        self.fields.extend(desc.to_be_bytes());
        self.fields.extend(0_u16.to_be_bytes());
        self.field_count += 1;
        self
    }

    pub fn method(&mut self, access: u16, name: &str, desc: &str, code: Option<Code>) -> &mut Self {
        let name = self.pool.utf8(name);
        let desc = self.pool.utf8(desc);
        self.methods.extend(access.to_be_bytes());
        self.methods.extend(name.to_be_bytes());
        self.methods.extend(desc.to_be_bytes());
        match code {
            Some(code) => {
                let attribute = self.pool.utf8("Code");
                self.methods.extend(1_u16.to_be_bytes());
                self.methods.extend(attribute.to_be_bytes());
                self.methods
                    .extend((12 + code.code.len() as u32).to_be_bytes());
                self.methods.extend(code.max_stack.to_be_bytes());
                self.methods.extend(code.max_locals.to_be_bytes());
                self.methods.extend((code.code.len() as u32).to_be_bytes());
                self.methods.extend(&code.code);
                self.methods.extend(0_u16.to_be_bytes());
                self.methods.extend(0_u16.to_be_bytes());
            }
            None => self.methods.extend(0_u16.to_be_bytes()),
        }
        self.method_count += 1;
        self
    }

    /// A default constructor calling `super()`.
    pub fn default_constructor(&mut self) -> &mut Self {
        let super_name = self.super_name.clone();
        let [hi, lo] = index(self.pool.method_ref(&super_name, "<init>", "()V"));
        self.method(
            ACC_PUBLIC,
            "<init>",
            "()V",
            Some(Code::new(1, 1, vec![ALOAD_0, INVOKESPECIAL, hi, lo, RETURN])),
        )
    }

    pub fn build(&mut self) -> Vec<u8> {
        let attributes = self.bootstrap_attribute();
        let mut data = Vec::new();
        data.extend(0xCAFE_BABE_u32.to_be_bytes());
        data.extend(0_u16.to_be_bytes());
        data.extend(52_u16.to_be_bytes());
        data.extend((self.pool.next + 1).to_be_bytes());
        data.extend(&self.pool.data);
        data.extend(self.access.to_be_bytes());
        data.extend(self.this_class.to_be_bytes());
        data.extend(self.super_class.to_be_bytes());
        data.extend(0_u16.to_be_bytes());
        data.extend(self.field_count.to_be_bytes());
        data.extend(&self.fields);
        data.extend(self.method_count.to_be_bytes());
        data.extend(&self.methods);
        data.extend(attributes);
        data
    }

    /// The class attribute table: empty, or a single `BootstrapMethods` attribute.
    fn bootstrap_attribute(&mut self) -> Vec<u8> {
        if self.bootstraps.is_empty() {
            return 0_u16.to_be_bytes().to_vec();
        }
        let mut payload = Vec::new();
        payload.extend((self.bootstraps.len() as u16).to_be_bytes());
        for (handle, arguments) in &self.bootstraps {
            payload.extend(handle.to_be_bytes());
            payload.extend((arguments.len() as u16).to_be_bytes());
            for argument in arguments {
                payload.extend(argument.to_be_bytes());
            }
        }
        let name = self.pool.utf8("BootstrapMethods");
        let mut attributes = Vec::new();
        attributes.extend(1_u16.to_be_bytes());
        attributes.extend(name.to_be_bytes());
        attributes.extend((payload.len() as u32).to_be_bytes());
        attributes.extend(payload);
        attributes
    }
}

/// `app/Main` with `main` calling `helper()I` and an unreferenced `unused()V`.
pub fn main_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("app/Main");
    class.default_constructor();
    let helper = class.method_ref("app/Main", "helper", "()I");
    let [hi, lo] = index(helper);
    class.method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        Some(Code::new(1, 1, vec![INVOKESTATIC, hi, lo, POP, RETURN])),
    );
    class.method(
        ACC_STATIC,
        "helper",
        "()I",
        Some(Code::new(2, 0, vec![ICONST_1, BIPUSH, 41, IADD, IRETURN])),
    );
    class.method(ACC_STATIC, "unused", "()V", Some(Code::new(0, 0, vec![RETURN])));
    class.build()
}

/// The functional interface `app/Task` with `run()V`.
pub fn task_interface() -> Vec<u8> {
    let mut class = ClassBuilder::new("app/Task");
    class.with_access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    class.method(ACC_PUBLIC | ACC_ABSTRACT, "run", "()V", None);
    class.build()
}

/// `app/Lambdas` whose `main` creates an `app/Task` lambda and runs it.
pub fn lambda_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("app/Lambdas");
    let [site_hi, site_lo] = index(class.lambda_call_site(
        "run",
        "()Lapp/Task;",
        "()V",
        ("lambda$main$0", "()V"),
    ));
    let [run_hi, run_lo] = index(class.interface_method_ref("app/Task", "run", "()V"));
    class.method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        Some(Code::new(
            1,
            1,
            vec![
                INVOKEDYNAMIC, site_hi, site_lo, 0, 0,
                INVOKEINTERFACE, run_hi, run_lo, 1, 0,
                RETURN,
            ],
        )),
    );
    class.method(
        ACC_PRIVATE | ACC_STATIC,
        "lambda$main$0",
        "()V",
        Some(Code::new(0, 0, vec![RETURN])),
    );
    class.build()
}

/// A zip archive holding `entries`.
pub fn jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
