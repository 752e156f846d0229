//! Schema-language parser.
//!
//! Parses the merged schema document with `graphql-parser` and lowers the
//! syntax tree into an owned, declaration-ordered [`SchemaIR`]. Type
//! extensions are folded into the declaration they extend.

use crate::aggregator::MergedSchemaDocument;
use crate::error::{CodegenError, SchemaParseError, WeaveResult};
use graphql_parser::schema::{self as ast, Definition, TypeDefinition, TypeExtension};
use std::collections::HashMap;

/// Built-in scalars and the order they are emitted in.
pub const BUILTIN_SCALARS: [&str; 5] = ["ID", "String", "Boolean", "Int", "Float"];

/// Owned view of a parsed schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaIR {
    /// Named types in declaration order.
    pub types: Vec<TypeDecl>,

    /// Root operation type names.
    pub roots: RootOperations,
}

/// Root operation type names.
///
/// Without a `schema { ... }` block the conventional names apply. With one,
/// only the operations it names have a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootOperations {
    pub query: Option<String>,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
}

/// One named type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub description: Option<String>,
    pub kind: TypeKind,
}

/// What kind of type a declaration introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object {
        interfaces: Vec<String>,
        fields: Vec<FieldDecl>,
    },
    Interface {
        interfaces: Vec<String>,
        fields: Vec<FieldDecl>,
    },
    Union {
        members: Vec<String>,
    },
    Enum {
        values: Vec<EnumValueDecl>,
    },
    InputObject {
        fields: Vec<InputValueDecl>,
    },
}

/// A field on an object or interface type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<InputValueDecl>,
    pub ty: TypeRef,
}

/// A field argument or input object field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValueDecl {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub has_default: bool,
}

/// An enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValueDecl {
    pub name: String,
    pub description: Option<String>,
}

/// A type reference with list and non-null wrappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl Default for RootOperations {
    fn default() -> Self {
        Self {
            query: Some("Query".to_string()),
            mutation: Some("Mutation".to_string()),
            subscription: Some("Subscription".to_string()),
        }
    }
}

impl RootOperations {
    /// Whether `name` is one of the root operation types.
    pub fn contains(&self, name: &str) -> bool {
        [&self.query, &self.mutation, &self.subscription]
            .into_iter()
            .any(|root| root.as_deref() == Some(name))
    }
}

impl SchemaIR {
    /// Look up a declaration by name.
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Whether `name` is a declared type or a built-in scalar.
    pub fn is_known(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name) || self.get(name).is_some()
    }
}

impl TypeRef {
    /// The innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    fn lower(ty: &ast::Type<'_, String>) -> Self {
        match ty {
            ast::Type::NamedType(name) => TypeRef::Named(name.clone()),
            ast::Type::ListType(inner) => TypeRef::List(Box::new(TypeRef::lower(inner))),
            ast::Type::NonNullType(inner) => TypeRef::NonNull(Box::new(TypeRef::lower(inner))),
        }
    }
}

/// Parser for merged schema documents.
#[derive(Debug, Clone, Default)]
pub struct SchemaParser;

impl SchemaParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a merged document.
    pub fn parse(&self, document: &MergedSchemaDocument) -> WeaveResult<SchemaIR> {
        self.parse_str(document.as_str())
    }

    /// Parse schema text.
    ///
    /// A document with nothing but whitespace and comments is a valid,
    /// empty schema.
    pub fn parse_str(&self, text: &str) -> WeaveResult<SchemaIR> {
        if is_blank(text) {
            return Ok(SchemaIR::default());
        }

        let document = graphql_parser::parse_schema::<String>(text)
            .map_err(|e| SchemaParseError::from_message(e.to_string()))?;

        lower_document(&document)
    }
}

/// Lower the syntax tree, folding extensions into their base declarations.
fn lower_document(document: &ast::Document<'_, String>) -> WeaveResult<SchemaIR> {
    let mut ir = SchemaIR::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut extensions = Vec::new();

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(schema) => {
                ir.roots = RootOperations {
                    query: schema.query.clone(),
                    mutation: schema.mutation.clone(),
                    subscription: schema.subscription.clone(),
                };
            }
            Definition::TypeDefinition(def) => {
                let decl = lower_type(def);
                if index.contains_key(&decl.name) || BUILTIN_SCALARS.contains(&decl.name.as_str())
                {
                    return Err(CodegenError::DuplicateType { name: decl.name }.into());
                }
                index.insert(decl.name.clone(), ir.types.len());
                ir.types.push(decl);
            }
            Definition::TypeExtension(ext) => extensions.push(ext),
            Definition::DirectiveDefinition(directive) => {
                tracing::trace!(name = %directive.name, "ignoring directive definition");
            }
        }
    }

    for ext in extensions {
        let name = extension_name(ext);
        let slot = index
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::OrphanExtension {
                name: name.to_string(),
            })?;
        apply_extension(&mut ir.types[slot], ext)?;
    }

    Ok(ir)
}

fn lower_type(def: &TypeDefinition<'_, String>) -> TypeDecl {
    match def {
        TypeDefinition::Scalar(scalar) => TypeDecl {
            name: scalar.name.clone(),
            description: scalar.description.clone(),
            kind: TypeKind::Scalar,
        },
        TypeDefinition::Object(object) => TypeDecl {
            name: object.name.clone(),
            description: object.description.clone(),
            kind: TypeKind::Object {
                interfaces: object.implements_interfaces.clone(),
                fields: object.fields.iter().map(lower_field).collect(),
            },
        },
        TypeDefinition::Interface(interface) => TypeDecl {
            name: interface.name.clone(),
            description: interface.description.clone(),
            kind: TypeKind::Interface {
                interfaces: interface.implements_interfaces.clone(),
                fields: interface.fields.iter().map(lower_field).collect(),
            },
        },
        TypeDefinition::Union(union) => TypeDecl {
            name: union.name.clone(),
            description: union.description.clone(),
            kind: TypeKind::Union {
                members: union.types.clone(),
            },
        },
        TypeDefinition::Enum(enumeration) => TypeDecl {
            name: enumeration.name.clone(),
            description: enumeration.description.clone(),
            kind: TypeKind::Enum {
                values: enumeration.values.iter().map(lower_enum_value).collect(),
            },
        },
        TypeDefinition::InputObject(input) => TypeDecl {
            name: input.name.clone(),
            description: input.description.clone(),
            kind: TypeKind::InputObject {
                fields: input.fields.iter().map(lower_input_value).collect(),
            },
        },
    }
}

fn lower_field(field: &ast::Field<'_, String>) -> FieldDecl {
    FieldDecl {
        name: field.name.clone(),
        description: field.description.clone(),
        arguments: field.arguments.iter().map(lower_input_value).collect(),
        ty: TypeRef::lower(&field.field_type),
    }
}

fn lower_input_value(value: &ast::InputValue<'_, String>) -> InputValueDecl {
    InputValueDecl {
        name: value.name.clone(),
        description: value.description.clone(),
        ty: TypeRef::lower(&value.value_type),
        has_default: value.default_value.is_some(),
    }
}

fn lower_enum_value(value: &ast::EnumValue<'_, String>) -> EnumValueDecl {
    EnumValueDecl {
        name: value.name.clone(),
        description: value.description.clone(),
    }
}

fn extension_name<'a>(ext: &'a TypeExtension<'_, String>) -> &'a str {
    match ext {
        TypeExtension::Scalar(e) => &e.name,
        TypeExtension::Object(e) => &e.name,
        TypeExtension::Interface(e) => &e.name,
        TypeExtension::Union(e) => &e.name,
        TypeExtension::Enum(e) => &e.name,
        TypeExtension::InputObject(e) => &e.name,
    }
}

fn apply_extension(decl: &mut TypeDecl, ext: &TypeExtension<'_, String>) -> WeaveResult<()> {
    match (&mut decl.kind, ext) {
        (TypeKind::Scalar, TypeExtension::Scalar(_)) => {}
        (TypeKind::Object { interfaces, fields }, TypeExtension::Object(e)) => {
            interfaces.extend(e.implements_interfaces.iter().cloned());
            fields.extend(e.fields.iter().map(lower_field));
        }
        (TypeKind::Interface { interfaces, fields }, TypeExtension::Interface(e)) => {
            interfaces.extend(e.implements_interfaces.iter().cloned());
            fields.extend(e.fields.iter().map(lower_field));
        }
        (TypeKind::Union { members }, TypeExtension::Union(e)) => {
            members.extend(e.types.iter().cloned());
        }
        (TypeKind::Enum { values }, TypeExtension::Enum(e)) => {
            values.extend(e.values.iter().map(lower_enum_value));
        }
        (TypeKind::InputObject { fields }, TypeExtension::InputObject(e)) => {
            fields.extend(e.fields.iter().map(lower_input_value));
        }
        _ => {
            return Err(CodegenError::unsupported(
                &decl.name,
                "extension kind does not match the declared kind",
            )
            .into());
        }
    }
    Ok(())
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}
