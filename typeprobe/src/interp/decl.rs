//! Local namespace declarations
//!
//! ```toml
//! [[class]]
//! name = "Vector"
//! fields = ["x", "y"]
//! operators = ["+", "=="]
//!
//! [[class.method]]
//! name = "scale"
//! params = [{ name = "self" }, { name = "factor", type = "float" }]
//! returns = "Vector"
//!
//! [[class.attribute]]
//! name = "ORIGIN"
//! type = "Vector"
//!
//! [[function]]
//! name = "dot"
//! text = "(a, b, /)"
//!
//! [[value]]
//! name = "UNIT"
//! type = "Vector"
//! ```
//!
//! A callable with `params` or `returns` exposes a structured signature;
//! otherwise only its `text` signature and `doc` are available.

use std::path::Path;

use serde::Deserialize;

use super::{AttrDef, ClassDef, Constructor, FunctionDef, SignatureSource};
use crate::error::{ProbeError, Result};
use crate::runtime::{Annotation, BinaryOp, Param, ParamKind, Signature, Wrapper};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declarations {
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassDecl>,
    #[serde(default, rename = "function")]
    pub functions: Vec<CallableDecl>,
    #[serde(default, rename = "value")]
    pub values: Vec<ValueDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Operators defined between two instances of this class.
    #[serde(default)]
    pub operators: Vec<BinaryOp>,
    #[serde(default, rename = "method")]
    pub methods: Vec<CallableDecl>,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<ValueDecl>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclBinding {
    #[default]
    Instance,
    Class,
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallableDecl {
    pub name: String,
    /// Ignored for free functions.
    #[serde(default)]
    pub binding: DeclBinding,
    /// Formal parameters, receiver included.
    pub params: Option<Vec<ParamDecl>>,
    pub returns: Option<String>,
    pub text: Option<String>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub kind: Option<ParamKind>,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Declarations {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ProbeError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let decls: Declarations =
            toml::from_str(text).map_err(|e| ProbeError::declaration(e.to_string()))?;
        decls.validate()?;
        Ok(decls)
    }

    fn validate(&self) -> Result<()> {
        let names = self
            .classes
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.functions.iter().map(|f| f.name.as_str()))
            .chain(self.values.iter().map(|v| v.name.as_str()));
        for name in names {
            if name.is_empty() {
                return Err(ProbeError::declaration("empty name"));
            }
        }
        for class in &self.classes {
            for member in class.methods.iter().map(|m| m.name.as_str()) {
                if member.is_empty() {
                    return Err(ProbeError::declaration(format!(
                        "class '{}' has a method without a name",
                        class.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ClassDecl {
    pub(super) fn to_class_def(&self) -> ClassDef {
        let mut params = vec![Param::positional("self")];
        params.extend(self.fields.iter().map(Param::positional));
        let mut class = ClassDef::new(
            &self.name,
            Constructor::Record {
                fields: self.fields.clone(),
            },
            SignatureSource::Structured(Signature::new(params)),
        );
        for method in &self.methods {
            let wrapper = match method.binding {
                DeclBinding::Instance => Wrapper::Plain,
                DeclBinding::Class => Wrapper::ClassLevel,
                DeclBinding::Static => Wrapper::ReceiverFree,
            };
            class = class.with(AttrDef::wrapped(wrapper, method.to_function_def()));
        }
        for attr in &self.attributes {
            class = class.with(AttrDef::data(&attr.name, &attr.type_name));
        }
        class
    }
}

fn annotation(type_name: Option<&str>) -> Annotation {
    match type_name {
        None | Some("") => Annotation::Empty,
        Some(name) => Annotation::named(name),
    }
}

impl CallableDecl {
    pub(super) fn to_function_def(&self) -> FunctionDef {
        let source = if self.params.is_some() || self.returns.is_some() {
            let params = self
                .params
                .iter()
                .flatten()
                .map(|p| {
                    let mut param = Param::new(&p.name, p.kind.unwrap_or(ParamKind::PositionalOrKeyword))
                        .annotated(annotation(p.type_name.as_deref()));
                    if p.default {
                        param = param.with_default();
                    }
                    param
                })
                .collect();
            SignatureSource::Structured(
                Signature::new(params).returns(annotation(self.returns.as_deref())),
            )
        } else {
            SignatureSource::Missing
        };
        FunctionDef {
            name: self.name.clone(),
            signature: source,
            text_signature: self.text.clone(),
            doc: self.doc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Interpreter, Value};
    use crate::runtime::{AttrValue, Item, Runtime};

    const VECTOR: &str = r#"
        [[class]]
        name = "Vector"
        fields = ["x", "y"]
        operators = ["+", "=="]

        [[class.method]]
        name = "scale"
        params = [{ name = "self" }, { name = "factor", type = "float" }]
        returns = "Vector"

        [[class.method]]
        name = "zero"
        binding = "class"
        text = "($type, /)"

        [[class.attribute]]
        name = "ORIGIN"
        type = "Vector"

        [[function]]
        name = "dot"
        params = [{ name = "a", type = "Vector" }, { name = "b", type = "Vector", kind = "positional-only" }]
        returns = "float"

        [[value]]
        name = "UNIT"
        type = "Vector"
    "#;

    #[test]
    fn test_parse_declarations() {
        let decls = Declarations::from_toml_str(VECTOR).unwrap();
        assert_eq!(decls.classes.len(), 1);
        assert_eq!(decls.classes[0].operators, vec![BinaryOp::Add, BinaryOp::Eq]);
        assert_eq!(decls.classes[0].methods[1].binding, DeclBinding::Class);
        assert_eq!(decls.functions[0].params.as_ref().unwrap()[1].kind, Some(ParamKind::PositionalOnly));
        assert_eq!(decls.values[0].type_name, "Vector");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Declarations::from_toml_str("[[class]]\nname = \"A\"\nbases = []").unwrap_err();
        assert!(matches!(err, ProbeError::Declaration { .. }));
        assert!(Declarations::from_toml_str("[[value]]\nname = \"\"\ntype = \"int\"").is_err());
    }

    #[test]
    fn test_declared_class_is_reflectable() {
        let interp = Interpreter::with_declarations(&Declarations::from_toml_str(VECTOR).unwrap()).unwrap();
        let class = interp.lookup_class("Vector").unwrap();
        let attrs = interp.attributes(&class);
        let names: Vec<_> = attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["scale", "zero", "ORIGIN"]);
        assert_eq!(attrs[1].wrapper, Wrapper::ClassLevel);
        assert!(matches!(&attrs[2].value, AttrValue::Data { type_name } if type_name == "Vector"));

        let sig = interp.constructor_signature(&class).unwrap();
        assert_eq!(sig.params.len(), 3);
        assert!(interp.instantiate(&class, &[]).is_err());
        let v = interp.instantiate(&class, &[Value::None, Value::None]).unwrap();
        assert_eq!(v.type_name(), "Vector");
    }

    #[test]
    fn test_declared_operators_apply_to_same_class_only() {
        let interp = Interpreter::with_declarations(&Declarations::from_toml_str(VECTOR).unwrap()).unwrap();
        let v = Value::instance("Vector", vec![Value::None, Value::None]);
        assert!(interp.apply_binary(BinaryOp::Add, &v, &v).is_ok());
        assert!(interp.apply_binary(BinaryOp::Sub, &v, &v).is_err());
        assert!(interp.apply_binary(BinaryOp::Add, &v, &Value::Int(0)).is_err());
    }

    #[test]
    fn test_locals_listing() {
        let interp = Interpreter::with_declarations(&Declarations::from_toml_str(VECTOR).unwrap()).unwrap();
        let locals = interp.locals();
        let names: Vec<_> = locals.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Vector", "dot", "UNIT"]);
        assert!(matches!(&locals[2].1, Item::Value { type_name } if type_name == "Vector"));
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let decls = Declarations::from_toml_str("[[class]]\nname = \"A\"\n[[class]]\nname = \"A\"").unwrap();
        assert!(Interpreter::with_declarations(&decls).is_err());
    }
}
