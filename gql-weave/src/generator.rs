//! TypeScript type generator.
//!
//! Maps a parsed schema onto TypeScript declarations: one declaration per
//! named schema type for `#schema-types`, and one resolver signature per
//! object field for `#resolver-types`. Output follows declaration order and
//! carries no timestamps, so the same schema and config always produce the
//! same bytes.

use crate::aggregator::aggregate;
use crate::artifact::{ArtifactId, GeneratedArtifact};
use crate::config::CodegenConfig;
use crate::error::{CodegenError, WeaveResult};
use crate::parser::{
    FieldDecl, InputValueDecl, SchemaIR, SchemaParser, TypeDecl, TypeKind, TypeRef,
    BUILTIN_SCALARS,
};
use crate::pattern::PatternSet;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

const HEADER: &str = "// Auto-generated by gql-weave\n// Do not edit manually\n\n";

/// Identifiers every artifact declares or imports regardless of the schema.
const HELPER_NAMES: [&str; 7] = [
    "Maybe",
    "InputMaybe",
    "Scalars",
    "GraphQLResolveInfo",
    "ResolverFn",
    "NoArgs",
    "Resolvers",
];

/// Where a type reference appears; inputs use `InputMaybe` for nullables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Output,
    Input,
}

/// Generator for `#schema-types` and `#resolver-types`.
#[derive(Debug, Clone)]
pub struct TypeDefGenerator {
    config: CodegenConfig,
}

impl TypeDefGenerator {
    /// Create a new generator with the given codegen options.
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    /// Check that the schema maps onto valid TypeScript.
    ///
    /// Every referenced type must be declared or built in, member names must
    /// be unique within their type, and no schema type may share a name with
    /// a helper the generator emits.
    pub fn validate(&self, schema: &SchemaIR) -> Result<(), CodegenError> {
        for decl in &schema.types {
            match &decl.kind {
                TypeKind::Scalar => {}
                TypeKind::Object { interfaces, fields }
                | TypeKind::Interface { interfaces, fields } => {
                    check_unique(&decl.name, interfaces.iter().map(String::as_str))?;
                    for interface in interfaces {
                        check_known(schema, &decl.name, interface)?;
                    }
                    check_unique(&decl.name, fields.iter().map(|f| f.name.as_str()))?;
                    for field in fields {
                        check_known(schema, &decl.name, field.ty.base_name())?;
                        let owner = format!("{}.{}", decl.name, field.name);
                        check_unique(&owner, field.arguments.iter().map(|a| a.name.as_str()))?;
                        for arg in &field.arguments {
                            check_known(schema, &decl.name, arg.ty.base_name())?;
                        }
                    }
                }
                TypeKind::Union { members } => {
                    if members.is_empty() {
                        return Err(CodegenError::unsupported(&decl.name, "union has no members"));
                    }
                    check_unique(&decl.name, members.iter().map(String::as_str))?;
                    for member in members {
                        check_known(schema, &decl.name, member)?;
                    }
                }
                TypeKind::Enum { values } => {
                    if values.is_empty() {
                        return Err(CodegenError::unsupported(&decl.name, "enum has no values"));
                    }
                    check_unique(&decl.name, values.iter().map(|v| v.name.as_str()))?;
                }
                TypeKind::InputObject { fields } => {
                    check_unique(&decl.name, fields.iter().map(|f| f.name.as_str()))?;
                    for field in fields {
                        check_known(schema, &decl.name, field.ty.base_name())?;
                    }
                }
            }
        }

        check_generated_names(schema)
    }

    /// Render `#schema-types`.
    pub fn schema_types(&self, schema: &SchemaIR) -> Result<String, CodegenError> {
        self.validate(schema)?;

        let mut output = String::from(HEADER);
        output.push_str("export type Maybe<T> = T | null;\n");
        output.push_str("export type InputMaybe<T> = T | null | undefined;\n\n");
        output.push_str(&self.scalars_block(schema));

        for decl in &schema.types {
            output.push('\n');
            output.push_str(&doc_comment(decl.description.as_deref(), ""));
            output.push_str(&self.type_declaration(decl));
        }

        Ok(output)
    }

    /// Render `#resolver-types`.
    pub fn resolver_types(&self, schema: &SchemaIR) -> Result<String, CodegenError> {
        self.validate(schema)?;

        let mut imports = BTreeSet::new();
        let mut body = String::new();
        let mut entries = Vec::new();

        for decl in &schema.types {
            let TypeKind::Object { fields, .. } = &decl.kind else {
                continue;
            };

            for field in fields.iter().filter(|f| !f.arguments.is_empty()) {
                body.push('\n');
                body.push_str(&self.args_type(&decl.name, field, &mut imports));
            }

            let parent = if schema.roots.contains(&decl.name) {
                "{}".to_string()
            } else {
                imports.insert(decl.name.clone());
                decl.name.clone()
            };

            body.push('\n');
            body.push_str(&doc_comment(decl.description.as_deref(), ""));
            body.push_str(&format!(
                "export type {}Resolvers<TContext = {}, TParent = {}> = {{\n",
                decl.name, self.config.context_type, parent
            ));
            for field in fields {
                let result = render_type(&field.ty, Position::Output, &mut imports);
                let args = if field.arguments.is_empty() {
                    "NoArgs".to_string()
                } else {
                    args_type_name(&decl.name, &field.name)
                };
                body.push_str(&doc_comment(field.description.as_deref(), "  "));
                body.push_str(&format!(
                    "  {}?: ResolverFn<{}, TParent, TContext, {}>;\n",
                    field.name, result, args
                ));
            }
            body.push_str("};\n");

            entries.push(decl.name.as_str());
        }

        let mut output = String::from(HEADER);
        output.push_str("import type { GraphQLResolveInfo } from 'graphql';\n");
        if !imports.is_empty() {
            let names: Vec<&str> = imports.iter().map(String::as_str).collect();
            output.push_str(&format!(
                "import type {{ {} }} from '{}';\n",
                names.join(", "),
                ArtifactId::SchemaTypes
            ));
        }
        output.push('\n');

        output.push_str("export type ResolverFn<TResult, TParent, TContext, TArgs> = (\n");
        output.push_str("  parent: TParent,\n");
        output.push_str("  args: TArgs,\n");
        output.push_str("  context: TContext,\n");
        output.push_str("  info: GraphQLResolveInfo\n");
        output.push_str(") => Promise<TResult> | TResult;\n\n");

        if self.config.use_index_signature {
            output.push_str("export type NoArgs = Record<string, unknown>;\n");
        } else {
            output.push_str("export type NoArgs = Record<string, never>;\n");
        }

        output.push_str(&body);

        output.push_str(&format!(
            "\nexport type Resolvers<TContext = {}> = {{\n",
            self.config.context_type
        ));
        for name in entries {
            output.push_str(&format!("  {}?: {}Resolvers<TContext>;\n", name, name));
        }
        output.push_str("};\n");

        Ok(output)
    }

    /// `Scalars` map: built-ins first, then custom scalars in declaration order.
    fn scalars_block(&self, schema: &SchemaIR) -> String {
        let mut output = String::from("export type Scalars = {\n");
        for name in BUILTIN_SCALARS {
            let ts = match name {
                "ID" | "String" => "string",
                "Boolean" => "boolean",
                _ => "number",
            };
            output.push_str(&format!("  {}: {};\n", name, ts));
        }
        for decl in schema
            .types
            .iter()
            .filter(|t| matches!(t.kind, TypeKind::Scalar))
        {
            let ts = self
                .config
                .scalars
                .get(&decl.name)
                .map(String::as_str)
                .unwrap_or("unknown");
            output.push_str(&format!("  {}: {};\n", decl.name, ts));
        }
        output.push_str("};\n");
        output
    }

    fn type_declaration(&self, decl: &TypeDecl) -> String {
        let mut unused = BTreeSet::new();

        match &decl.kind {
            TypeKind::Scalar => {
                format!("export type {} = Scalars['{}'];\n", decl.name, decl.name)
            }
            TypeKind::Object { fields, .. } => {
                let mut output = format!("export type {} = {{\n", decl.name);
                output.push_str(&format!("  __typename?: '{}';\n", decl.name));
                output.push_str(&output_fields(fields, &mut unused));
                output.push_str("};\n");
                output
            }
            TypeKind::Interface { fields, .. } => {
                let mut output = format!("export type {} = {{\n", decl.name);
                output.push_str(&output_fields(fields, &mut unused));
                output.push_str("};\n");
                output
            }
            TypeKind::Union { members } => {
                format!("export type {} = {};\n", decl.name, members.join(" | "))
            }
            TypeKind::Enum { values } => {
                let literals: Vec<String> =
                    values.iter().map(|v| format!("'{}'", v.name)).collect();
                format!("export type {} = {};\n", decl.name, literals.join(" | "))
            }
            TypeKind::InputObject { fields } => {
                let mut output = format!("export type {} = {{\n", decl.name);
                output.push_str(&input_fields(fields, &mut unused));
                output.push_str("};\n");
                output
            }
        }
    }

    /// Argument object type for one field.
    fn args_type(
        &self,
        owner: &str,
        field: &FieldDecl,
        imports: &mut BTreeSet<String>,
    ) -> String {
        let mut output = format!("export type {} = {{\n", args_type_name(owner, &field.name));
        output.push_str(&input_fields(&field.arguments, imports));
        if self.config.use_index_signature {
            output.push_str("  [key: string]: unknown;\n");
        }
        output.push_str("};\n");
        output
    }
}

/// Render `#schema-types` for the current merged schema.
pub async fn generate_types(
    patterns: &PatternSet,
    config: &CodegenConfig,
    root: &Path,
) -> WeaveResult<GeneratedArtifact> {
    let document = aggregate(patterns, root).await?;
    let schema = SchemaParser::new().parse(&document)?;
    let content = TypeDefGenerator::new(config.clone()).schema_types(&schema)?;
    Ok(GeneratedArtifact::new(ArtifactId::SchemaTypes, content))
}

/// Render `#resolver-types` for the current merged schema.
pub async fn generate_resolver_types(
    patterns: &PatternSet,
    config: &CodegenConfig,
    root: &Path,
) -> WeaveResult<GeneratedArtifact> {
    let document = aggregate(patterns, root).await?;
    let schema = SchemaParser::new().parse(&document)?;
    let content = TypeDefGenerator::new(config.clone()).resolver_types(&schema)?;
    Ok(GeneratedArtifact::new(ArtifactId::ResolverTypes, content))
}

fn check_known(schema: &SchemaIR, owner: &str, name: &str) -> Result<(), CodegenError> {
    if schema.is_known(name) {
        Ok(())
    } else {
        Err(CodegenError::unknown_type(owner, name))
    }
}

fn check_unique<'a>(
    owner: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), CodegenError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CodegenError::duplicate_member(owner, name));
        }
    }
    Ok(())
}

/// Reject schema names that would clash with emitted helpers, and emitted
/// names that would clash with each other.
fn check_generated_names(schema: &SchemaIR) -> Result<(), CodegenError> {
    let mut taken: HashSet<String> = HELPER_NAMES.iter().map(|n| n.to_string()).collect();
    for decl in &schema.types {
        if !taken.insert(decl.name.clone()) {
            return Err(CodegenError::ReservedName {
                name: decl.name.clone(),
            });
        }
    }

    for decl in &schema.types {
        let TypeKind::Object { fields, .. } = &decl.kind else {
            continue;
        };
        let generated = fields
            .iter()
            .filter(|f| !f.arguments.is_empty())
            .map(|f| args_type_name(&decl.name, &f.name))
            .chain(std::iter::once(format!("{}Resolvers", decl.name)));
        for name in generated {
            if !taken.insert(name.clone()) {
                return Err(CodegenError::ReservedName { name });
            }
        }
    }

    Ok(())
}

fn output_fields(fields: &[FieldDecl], imports: &mut BTreeSet<String>) -> String {
    let mut output = String::new();
    for field in fields {
        output.push_str(&doc_comment(field.description.as_deref(), "  "));
        let ty = render_type(&field.ty, Position::Output, imports);
        let optional = if field.ty.is_non_null() { "" } else { "?" };
        output.push_str(&format!("  {}{}: {};\n", field.name, optional, ty));
    }
    output
}

fn input_fields(fields: &[InputValueDecl], imports: &mut BTreeSet<String>) -> String {
    let mut output = String::new();
    for field in fields {
        output.push_str(&doc_comment(field.description.as_deref(), "  "));
        let ty = render_type(&field.ty, Position::Input, imports);
        let optional = if field.ty.is_non_null() && !field.has_default {
            ""
        } else {
            "?"
        };
        output.push_str(&format!("  {}{}: {};\n", field.name, optional, ty));
    }
    output
}

/// Render a type reference, recording which schema-types names it uses.
fn render_type(ty: &TypeRef, position: Position, imports: &mut BTreeSet<String>) -> String {
    match ty {
        TypeRef::NonNull(inner) => render_non_null(inner, position, imports),
        nullable => {
            let wrapper = match position {
                Position::Output => "Maybe",
                Position::Input => "InputMaybe",
            };
            imports.insert(wrapper.to_string());
            format!("{}<{}>", wrapper, render_non_null(nullable, position, imports))
        }
    }
}

fn render_non_null(ty: &TypeRef, position: Position, imports: &mut BTreeSet<String>) -> String {
    match ty {
        TypeRef::Named(name) if BUILTIN_SCALARS.contains(&name.as_str()) => {
            imports.insert("Scalars".to_string());
            format!("Scalars['{}']", name)
        }
        TypeRef::Named(name) => {
            imports.insert(name.clone());
            name.clone()
        }
        TypeRef::List(inner) => format!("Array<{}>", render_type(inner, position, imports)),
        TypeRef::NonNull(inner) => render_non_null(inner, position, imports),
    }
}

fn args_type_name(owner: &str, field: &str) -> String {
    let mut chars = field.chars();
    let pascal: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{}{}Args", owner, pascal)
}

/// JSDoc block for a description, or nothing.
fn doc_comment(description: Option<&str>, indent: &str) -> String {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return String::new();
    };
    let description = description.replace("*/", "*\\/");

    let lines: Vec<&str> = description.lines().collect();
    if lines.len() == 1 {
        return format!("{}/** {} */\n", indent, lines[0]);
    }

    let mut output = format!("{}/**\n", indent);
    for line in lines {
        if line.is_empty() {
            output.push_str(&format!("{} *\n", indent));
        } else {
            output.push_str(&format!("{} * {}\n", indent, line));
        }
    }
    output.push_str(&format!("{} */\n", indent));
    output
}
