//! Declaration-level GLSL parser for the headless device.
//!
//! Only the global scope is understood: precision statements, struct
//! definitions, `uniform`/`in`/`out`/`const` declarations and function
//! definitions. Function bodies are skipped but their identifiers are
//! collected so that static use of varyings can be checked at link time.

use std::collections::{HashMap, HashSet};

use super::preprocessor::Diagnostic;
use crate::backend::types::{ActiveUniform, ShaderStage, UniformKind};

const BUILTIN_TYPES: &[&str] = &[
    "void", "bool", "int", "uint", "float", "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4",
    "uvec2", "uvec3", "uvec4", "bvec2", "bvec3", "bvec4", "mat2", "mat3", "mat4", "mat2x2",
    "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4", "sampler2D",
    "sampler3D", "samplerCube", "sampler2DShadow", "samplerCubeShadow", "sampler2DArray",
    "sampler2DArrayShadow", "isampler2D", "isampler3D", "isamplerCube", "isampler2DArray",
    "usampler2D", "usampler3D", "usamplerCube", "usampler2DArray",
];

const QUALIFIERS: &[&str] = &[
    "uniform", "in", "out", "inout", "const", "flat", "smooth", "centroid", "invariant", "highp",
    "mediump", "lowp",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

/// A global variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: String,
    /// `Some(n)` for arrays
    pub array: Option<u32>,
    pub location: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StructField {
    name: String,
    ty: String,
    array: Option<u32>,
}

/// Interface of one compiled shader stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderInterface {
    pub uniforms: Vec<Variable>,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    structs: HashMap<String, Vec<StructField>>,
    /// Identifiers referenced inside function bodies.
    used: HashSet<String>,
}

impl ShaderInterface {
    /// Whether `name` is referenced by any function body.
    pub fn uses(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

/// Parse a preprocessed shader into its global interface.
pub fn reflect(text: &str, stage: ShaderStage) -> Result<ShaderInterface, Diagnostic> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        stage,
        interface: ShaderInterface::default(),
        constants: HashMap::new(),
        has_main: false,
    };
    parser.parse_translation_unit()?;
    if !parser.has_main {
        let last_line = tokens.last().map_or(1, |t| t.line);
        return Err(Diagnostic::new(last_line, "missing main function"));
    }
    Ok(parser.interface)
}

fn tokenize(text: &str) -> Result<Vec<Spanned>, Diagnostic> {
    let mut tokens = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut line = 1;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Spanned {
                token: Token::Ident(word),
                line,
            });
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() {
                let d = chars[i];
                let exponent_sign = (d == '+' || d == '-')
                    && matches!(chars.get(i.wrapping_sub(1)), Some('e') | Some('E'))
                    && !chars[start..i].iter().any(|x| *x == 'x' || *x == 'X');
                if d.is_ascii_alphanumeric() || d == '.' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            tokens.push(Spanned {
                token: Token::Number(literal),
                line,
            });
        } else {
            match c {
                '(' | '[' | '{' => open.push((c, line)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match open.pop() {
                        Some((opened, _)) if opened == expected => {}
                        _ => {
                            return Err(Diagnostic::new(line, format!("'{c}' : syntax error")));
                        }
                    }
                }
                _ => {}
            }
            tokens.push(Spanned {
                token: Token::Punct(c),
                line,
            });
            i += 1;
        }
    }
    if let Some((opened, at)) = open.pop() {
        return Err(Diagnostic::new(at, format!("'{opened}' : unbalanced delimiter")));
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    stage: ShaderStage,
    interface: ShaderInterface,
    constants: HashMap<String, u32>,
    has_main: bool,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(self.line(), message)
    }

    fn next(&mut self) -> Result<Token, Diagnostic> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.token.clone())
            .ok_or_else(|| self.error("unexpected end of file"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_punct(&mut self, expected: char) -> Result<(), Diagnostic> {
        match self.next()? {
            Token::Punct(c) if c == expected => Ok(()),
            other => Err(self.error(format!("expected '{expected}', found {}", describe(&other)))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    fn eat_punct(&mut self, expected: char) -> bool {
        if self.peek() == Some(&Token::Punct(expected)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_type(&self, name: &str) -> bool {
        BUILTIN_TYPES.contains(&name) || self.interface.structs.contains_key(name)
    }

    fn parse_translation_unit(&mut self) -> Result<(), Diagnostic> {
        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Punct(';') => self.pos += 1,
                Token::Ident(word) if word == "precision" => {
                    self.pos += 1;
                    let _qualifier = self.expect_ident()?;
                    let ty = self.expect_ident()?;
                    if !self.is_type(&ty) {
                        return Err(self.error(format!("'{ty}' : undeclared type")));
                    }
                    self.expect_punct(';')?;
                }
                Token::Ident(word) if word == "struct" => {
                    self.pos += 1;
                    self.parse_struct()?;
                }
                Token::Ident(_) => self.parse_declaration()?,
                other => {
                    return Err(self.error(format!("{} : syntax error", describe(&other))));
                }
            }
        }
        Ok(())
    }

    fn parse_struct(&mut self) -> Result<(), Diagnostic> {
        let name = self.expect_ident()?;
        if self.is_type(&name) {
            return Err(self.error(format!("'{name}' : redefinition")));
        }
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        while !self.eat_punct('}') {
            let mut ty = self.expect_ident()?;
            while QUALIFIERS.contains(&ty.as_str()) {
                ty = self.expect_ident()?;
            }
            if !self.is_type(&ty) {
                return Err(self.error(format!("'{ty}' : undeclared type")));
            }
            loop {
                let field = self.expect_ident()?;
                let array = self.parse_array_suffix()?;
                fields.push(StructField {
                    name: field,
                    ty: ty.clone(),
                    array,
                });
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct(';')?;
        }
        if fields.is_empty() {
            return Err(self.error(format!("'{name}' : structure must have at least one member")));
        }
        self.interface.structs.insert(name, fields);
        self.expect_punct(';')
    }

    fn parse_array_suffix(&mut self) -> Result<Option<u32>, Diagnostic> {
        if !self.eat_punct('[') {
            return Ok(None);
        }
        let size = match self.next()? {
            Token::Number(literal) => parse_int_literal(&literal),
            Token::Ident(name) => self.constants.get(&name).copied(),
            Token::Punct(_) => None,
        };
        let size = size
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                self.error("array size must be a positive constant integer expression")
            })?;
        self.expect_punct(']')?;
        Ok(Some(size))
    }

    fn parse_layout(&mut self) -> Result<Option<u32>, Diagnostic> {
        self.expect_punct('(')?;
        let mut location = None;
        loop {
            let key = self.expect_ident()?;
            if self.eat_punct('=') {
                let value = match self.next()? {
                    Token::Number(literal) => parse_int_literal(&literal),
                    _ => None,
                }
                .ok_or_else(|| self.error(format!("'{key}' : expected an integer value")))?;
                if key == "location" {
                    location = Some(value);
                }
            }
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')')?;
        Ok(location)
    }

    fn parse_declaration(&mut self) -> Result<(), Diagnostic> {
        let mut location = None;
        let mut storage: Option<String> = None;
        let ty = loop {
            let word = self.expect_ident()?;
            match word.as_str() {
                "layout" => location = self.parse_layout()?,
                "uniform" | "in" | "out" | "const" => storage = Some(word),
                _ if QUALIFIERS.contains(&word.as_str()) => {}
                _ => break word,
            }
        };
        if !self.is_type(&ty) {
            return Err(self.error(format!("'{ty}' : undeclared type")));
        }
        let name = self.expect_ident()?;

        if self.peek() == Some(&Token::Punct('(')) {
            if storage.is_some() {
                return Err(self.error(format!(
                    "'{name}' : functions cannot have storage qualifiers"
                )));
            }
            return self.parse_function(&ty, name);
        }

        let mut name = name;
        loop {
            let array = self.parse_array_suffix()?;
            let mut initializer = Vec::new();
            if self.eat_punct('=') {
                let mut depth = 0usize;
                loop {
                    match self.peek() {
                        Some(Token::Punct('(' | '[' | '{')) => depth += 1,
                        Some(Token::Punct(')' | ']' | '}')) => {
                            depth = depth.saturating_sub(1)
                        }
                        Some(Token::Punct(',')) | Some(Token::Punct(';')) if depth == 0 => break,
                        None => return Err(self.error("unexpected end of file in initializer")),
                        _ => {}
                    }
                    initializer.push(self.next()?);
                }
            }
            self.declare(storage.as_deref(), &ty, &name, array, location, &initializer)?;
            if self.eat_punct(',') {
                name = self.expect_ident()?;
                continue;
            }
            return self.expect_punct(';');
        }
    }

    fn declare(
        &mut self,
        storage: Option<&str>,
        ty: &str,
        name: &str,
        array: Option<u32>,
        location: Option<u32>,
        initializer: &[Token],
    ) -> Result<(), Diagnostic> {
        if ty == "void" {
            return Err(self.error(format!("'{name}' : illegal use of type 'void'")));
        }
        let variable = Variable {
            name: name.to_string(),
            ty: ty.to_string(),
            array,
            location,
        };
        match storage {
            Some("uniform") => {
                if self.interface.uniforms.iter().any(|u| u.name == name) {
                    return Err(self.error(format!("'{name}' : redefinition")));
                }
                self.interface.uniforms.push(variable);
            }
            Some("in") => {
                if self.stage == ShaderStage::Vertex && self.interface.structs.contains_key(ty) {
                    return Err(self.error(format!(
                        "'{name}' : vertex input cannot be a structure"
                    )));
                }
                self.interface.inputs.push(variable);
            }
            Some("out") => self.interface.outputs.push(variable),
            Some("const") => {
                if let [Token::Number(literal)] = initializer {
                    if let Some(value) = parse_int_literal(literal) {
                        self.constants.insert(name.to_string(), value);
                    }
                } else if initializer.is_empty() {
                    return Err(self.error(format!(
                        "'{name}' : const variables must be initialized"
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_function(&mut self, return_type: &str, name: String) -> Result<(), Diagnostic> {
        self.expect_punct('(')?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::Punct('(') => depth += 1,
                Token::Punct(')') => depth -= 1,
                Token::Ident(word) => {
                    let next_is_name = matches!(self.peek(), Some(Token::Ident(_)));
                    if next_is_name
                        && !QUALIFIERS.contains(&word.as_str())
                        && !self.is_type(&word)
                    {
                        return Err(self.error(format!("'{word}' : undeclared type")));
                    }
                }
                _ => {}
            }
        }

        if self.eat_punct(';') {
            return Ok(());
        }
        self.expect_punct('{')?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => depth -= 1,
                Token::Ident(word) => {
                    self.interface.used.insert(word);
                }
                _ => {}
            }
        }
        if name == "main" {
            if return_type != "void" {
                return Err(self.error("'main' : function must return void"));
            }
            self.has_main = true;
        }
        Ok(())
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(word) => format!("'{word}'"),
        Token::Number(literal) => format!("'{literal}'"),
        Token::Punct(c) => format!("'{c}'"),
    }
}

fn parse_int_literal(literal: &str) -> Option<u32> {
    let digits = literal.trim_end_matches(['u', 'U']);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if digits.len() > 1 && digits.starts_with('0') {
        u32::from_str_radix(&digits[1..], 8).ok()
    } else {
        digits.parse().ok()
    }
}

/// Map a basic GLSL type name to the uniform kind the uploader table handles.
pub fn uniform_kind(ty: &str) -> UniformKind {
    match ty {
        "float" => UniformKind::Float,
        "vec2" => UniformKind::Vec2,
        "vec3" => UniformKind::Vec3,
        "vec4" => UniformKind::Vec4,
        "int" => UniformKind::Int,
        "ivec2" => UniformKind::IVec2,
        "ivec3" => UniformKind::IVec3,
        "ivec4" => UniformKind::IVec4,
        "uint" => UniformKind::UInt,
        "bool" => UniformKind::Bool,
        "mat2" | "mat2x2" => UniformKind::Mat2,
        "mat3" | "mat3x3" => UniformKind::Mat3,
        "mat4" | "mat4x4" => UniformKind::Mat4,
        "sampler2D" => UniformKind::Sampler2D,
        "samplerCube" => UniformKind::SamplerCube,
        _ => UniformKind::Unsupported,
    }
}

/// Number of attribute locations a vertex input of this type occupies.
pub fn attribute_slots(ty: &str) -> u32 {
    match ty {
        "mat2" | "mat2x2" | "mat2x3" | "mat2x4" => 2,
        "mat3" | "mat3x2" | "mat3x3" | "mat3x4" => 3,
        "mat4" | "mat4x2" | "mat4x3" | "mat4x4" => 4,
        _ => 1,
    }
}

/// Flatten a uniform declaration into the names a GL driver reports.
///
/// Struct members become `outer.member`, arrays of structs are unrolled as
/// `outer[i].member` and arrays of basic types are reported once as
/// `outer[0]` with their length as size.
pub fn flatten_uniform(
    interface: &ShaderInterface,
    variable: &Variable,
    out: &mut Vec<ActiveUniform>,
) {
    flatten(interface, &variable.name, &variable.ty, variable.array, out);
}

fn flatten(
    interface: &ShaderInterface,
    prefix: &str,
    ty: &str,
    array: Option<u32>,
    out: &mut Vec<ActiveUniform>,
) {
    match (interface.structs.get(ty), array) {
        (Some(fields), Some(len)) => {
            for i in 0..len {
                for field in fields {
                    let name = format!("{prefix}[{i}].{}", field.name);
                    flatten(interface, &name, &field.ty, field.array, out);
                }
            }
        }
        (Some(fields), None) => {
            for field in fields {
                let name = format!("{prefix}.{}", field.name);
                flatten(interface, &name, &field.ty, field.array, out);
            }
        }
        (None, Some(len)) => out.push(ActiveUniform {
            name: format!("{prefix}[0]"),
            kind: uniform_kind(ty),
            size: len as i32,
        }),
        (None, None) => out.push(ActiveUniform {
            name: prefix.to_string(),
            kind: uniform_kind(ty),
            size: 1,
        }),
    }
}

/// Structural type of a uniform including struct layouts, used to compare
/// declarations of the same name across stages.
pub fn type_signature(interface: &ShaderInterface, ty: &str) -> String {
    match interface.structs.get(ty) {
        Some(fields) => {
            let members: Vec<String> = fields
                .iter()
                .map(|f| {
                    let inner = type_signature(interface, &f.ty);
                    match f.array {
                        Some(n) => format!("{inner} {}[{n}]", f.name),
                        None => format!("{inner} {}", f.name),
                    }
                })
                .collect();
            format!("struct {{{}}}", members.join(";"))
        }
        None => ty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(interface: &ShaderInterface) -> Vec<String> {
        let mut out = Vec::new();
        for uniform in &interface.uniforms {
            flatten_uniform(interface, uniform, &mut out);
        }
        out.into_iter().map(|u| u.name).collect()
    }

    #[test]
    fn test_struct_array_uniforms_are_unrolled() {
        let source = "
            precision highp float;
            struct PointLight { vec3 position; vec3 color; float intensity; };
            uniform PointLight lights[2];
            out vec4 color;
            void main() { color = vec4(lights[0].color, 1.0); }
        ";
        let interface = reflect(source, ShaderStage::Fragment).unwrap();
        assert_eq!(
            names(&interface),
            vec![
                "lights[0].position",
                "lights[0].color",
                "lights[0].intensity",
                "lights[1].position",
                "lights[1].color",
                "lights[1].intensity",
            ]
        );
    }

    #[test]
    fn test_basic_array_reports_first_element() {
        let source = "uniform float weights[3]; uniform mat4 view; void main() {}";
        let interface = reflect(source, ShaderStage::Vertex).unwrap();
        let mut out = Vec::new();
        for uniform in &interface.uniforms {
            flatten_uniform(&interface, uniform, &mut out);
        }
        assert_eq!(out[0].name, "weights[0]");
        assert_eq!(out[0].size, 3);
        assert_eq!(out[1].kind, UniformKind::Mat4);
    }

    #[test]
    fn test_const_array_size() {
        let source = "const int N = 3; uniform vec3 points[N]; void main() {}";
        let interface = reflect(source, ShaderStage::Vertex).unwrap();
        assert_eq!(interface.uniforms[0].array, Some(3));
    }

    #[test]
    fn test_missing_main() {
        let err = reflect("uniform float x;\n", ShaderStage::Vertex).unwrap_err();
        assert!(err.message.contains("main"));
    }

    #[test]
    fn test_unknown_type() {
        let err = reflect("uniform vec5 x;\nvoid main() {}", ShaderStage::Vertex).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("vec5"));
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = reflect("void main() {\n", ShaderStage::Vertex).unwrap_err();
        assert!(err.message.contains("unbalanced"));
    }

    #[test]
    fn test_inputs_outputs_and_layout() {
        let source = "
            layout(location = 2) in vec3 in_position;
            in vec2 in_uv;
            out vec2 vUv;
            void main() { vUv = in_uv; gl_Position = vec4(in_position, 1.0); }
        ";
        let interface = reflect(source, ShaderStage::Vertex).unwrap();
        assert_eq!(interface.inputs.len(), 2);
        assert_eq!(interface.inputs[0].location, Some(2));
        assert_eq!(interface.outputs[0].name, "vUv");
        assert!(interface.uses("in_uv"));
        assert!(!interface.uses("vNormal"));
    }

    #[test]
    fn test_function_with_in_parameters() {
        let source = "
            vec4 toLinear(in vec4 value) { return value; }
            float helper(float a, float b);
            void main() { }
        ";
        assert!(reflect(source, ShaderStage::Fragment).is_ok());
    }

    #[test]
    fn test_float_literals_with_exponent() {
        let source = "const float EPS = 1.0e-6; void main() { float x = 3.5e+2 * EPS; }";
        assert!(reflect(source, ShaderStage::Fragment).is_ok());
    }
}
