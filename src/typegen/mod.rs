//! TypeScript declaration generator
//!
//! Renders the collection schema as TypeScript interfaces for frontends:
//! one interface per collection, one per rich-text block, and a `Config`
//! interface mapping collection slugs to their document types.
//!
//! Required fields are non-optional; every other field is `?: T | null`,
//! matching what the backend actually stores.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::schema::{Block, CollectionConfig, Field, FieldType, Schema};

const HEADER: &str = "/* tslint:disable */
/* eslint-disable */
/**
 * This file was automatically generated by pi-lms.
 * DO NOT MODIFY IT BY HAND. Regenerate it with `cargo run --bin generate-types`.
 */
";

/// Generate the complete TypeScript declaration file for `schema`
pub fn generate_typescript(schema: &Schema) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    write_config(&mut out, schema);

    for collection in schema.collections() {
        write_interface(
            &mut out,
            &interface_name(&collection.slug),
            Some("id: number;"),
            &collection.all_fields(),
            schema,
            None,
        );
    }

    for block in collect_blocks(schema).into_values() {
        write_interface(
            &mut out,
            &block_interface_name(&block.slug),
            None,
            &block.fields,
            schema,
            Some(&block.slug),
        );
    }

    out
}

fn write_config(out: &mut String, schema: &Schema) {
    out.push_str("export interface Config {\n");

    if let Some(auth) = schema.collections().iter().find(|c| c.auth) {
        let _ = writeln!(
            out,
            "  user: {} & {{\n    collection: '{}';\n  }};",
            interface_name(&auth.slug),
            auth.slug
        );
    }

    out.push_str("  collections: {\n");
    for collection in schema.collections() {
        let _ = writeln!(
            out,
            "    {}: {};",
            property_name(&collection.slug),
            interface_name(&collection.slug)
        );
    }
    out.push_str("  };\n}\n");
}

fn write_interface(
    out: &mut String,
    name: &str,
    leading: Option<&str>,
    fields: &[Field],
    schema: &Schema,
    block_slug: Option<&str>,
) {
    let _ = writeln!(out, "export interface {} {{", name);
    if let Some(line) = leading {
        let _ = writeln!(out, "  {}", line);
    }

    for field in fields {
        let ty = field_type(field, schema, 1);
        if field.required {
            let _ = writeln!(out, "  {}: {};", property_name(&field.name), ty);
        } else {
            let _ = writeln!(out, "  {}?: {} | null;", property_name(&field.name), ty);
        }
    }

    if let Some(slug) = block_slug {
        out.push_str("  id?: string | null;\n");
        out.push_str("  blockName?: string | null;\n");
        let _ = writeln!(out, "  blockType: '{}';", slug);
    }
    out.push_str("}\n");
}

/// TypeScript type of a field; `depth` is the indentation level of the property
fn field_type(field: &Field, schema: &Schema, depth: usize) -> String {
    match &field.field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Email | FieldType::Date => {
            "string".to_string()
        }
        FieldType::Number => "number".to_string(),
        FieldType::Checkbox => "boolean".to_string(),
        FieldType::Select { options } => {
            let values: Vec<String> = options
                .iter()
                .map(|o| format!("'{}'", escape(&o.value)))
                .collect();
            format!("({})", values.join(" | "))
        }
        FieldType::Relationship { relation_to } | FieldType::Upload { relation_to } => {
            match schema.get(relation_to) {
                Some(target) => format!("(number | {})", interface_name(&target.slug)),
                None => "number".to_string(),
            }
        }
        FieldType::RichText { .. } => rich_text_type(depth),
    }
}

fn rich_text_type(depth: usize) -> String {
    let pad = |n: usize| "  ".repeat(depth + n);
    let mut ty = String::from("{\n");
    let _ = writeln!(ty, "{}root: {{", pad(1));
    let _ = writeln!(ty, "{}type: string;", pad(2));
    let _ = writeln!(ty, "{}children: {{", pad(2));
    let _ = writeln!(ty, "{}type: string;", pad(3));
    let _ = writeln!(ty, "{}[k: string]: unknown;", pad(3));
    let _ = writeln!(ty, "{}}}[];", pad(2));
    let _ = writeln!(ty, "{}[k: string]: unknown;", pad(2));
    let _ = writeln!(ty, "{}}};", pad(1));
    let _ = writeln!(ty, "{}[k: string]: unknown;", pad(1));
    let _ = write!(ty, "{}}}", pad(0));
    ty
}

/// Blocks used by any rich-text field, keyed by slug
fn collect_blocks(schema: &Schema) -> BTreeMap<String, &Block> {
    let mut blocks = BTreeMap::new();
    for collection in schema.collections() {
        collect_blocks_in(collection, &mut blocks);
    }
    blocks
}

fn collect_blocks_in<'a>(collection: &'a CollectionConfig, out: &mut BTreeMap<String, &'a Block>) {
    for field in &collection.fields {
        if let FieldType::RichText { blocks } = &field.field_type {
            for block in blocks {
                out.entry(block.slug.clone()).or_insert(block);
            }
        }
    }
}

/// `enrollments` -> `Enrollment`, `media` -> `Media`
pub fn interface_name(slug: &str) -> String {
    pascal_case(&singular(slug))
}

fn block_interface_name(slug: &str) -> String {
    pascal_case(slug)
}

fn singular(slug: &str) -> String {
    if let Some(stem) = slug.strip_suffix("ies") {
        format!("{}y", stem)
    } else if slug.ends_with("ss") {
        slug.to_string()
    } else if let Some(stem) = slug.strip_suffix('s') {
        stem.to_string()
    } else {
        slug.to_string()
    }
}

fn pascal_case(s: &str) -> String {
    s.split(|c: char| c == '-' || c == '_' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Quote property names that aren't valid identifiers
fn property_name(name: &str) -> String {
    let valid = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        name.to_string()
    } else {
        format!("'{}'", escape(name))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::lms_schema;

    fn interface<'a>(output: &'a str, name: &str) -> &'a str {
        let start = output
            .find(&format!("export interface {} {{", name))
            .unwrap_or_else(|| panic!("interface {} missing", name));
        let end = output[start..].find("\n}\n").expect("unterminated interface");
        &output[start..start + end + 3]
    }

    #[test]
    fn test_names() {
        assert_eq!(interface_name("users"), "User");
        assert_eq!(interface_name("media"), "Media");
        assert_eq!(interface_name("courses"), "Course");
        assert_eq!(interface_name("categories"), "Category");
        assert_eq!(interface_name("access"), "Access");
        assert_eq!(block_interface_name("text-block"), "TextBlock");
        assert_eq!(property_name("firstName"), "firstName");
        assert_eq!(property_name("text-block"), "'text-block'");
    }

    #[test]
    fn test_config_interface() {
        let output = generate_typescript(lms_schema());
        assert!(output.starts_with("/* tslint:disable */"));

        let config = interface(&output, "Config");
        assert!(config.contains("  user: User & {\n    collection: 'users';\n  };"));
        for line in [
            "    users: User;",
            "    media: Media;",
            "    courses: Course;",
            "    lessons: Lesson;",
            "    enrollments: Enrollment;",
        ] {
            assert!(config.contains(line), "missing {}", line);
        }
    }

    #[test]
    fn test_user_interface() {
        let output = generate_typescript(lms_schema());
        let user = interface(&output, "User");
        assert!(user.contains("  id: number;\n  email: string;\n  firstName: string;"));
        assert!(user.contains("  role?: ('student' | 'instructor' | 'admin') | null;"));
        assert!(user.contains("  updatedAt: string;"));
        assert!(user.contains("  createdAt: string;"));
    }

    #[test]
    fn test_lesson_interface() {
        let output = generate_typescript(lms_schema());
        let lesson = interface(&output, "Lesson");
        assert!(lesson.contains("  title: string;"));
        assert!(lesson.contains("  content: {\n    root: {\n      type: string;"));
        assert!(lesson.contains("  published?: boolean | null;"));
        assert!(lesson.contains("  course: (number | Course);"));
        assert!(lesson.contains("  createdAt?: string | null;"));
    }

    #[test]
    fn test_block_interface() {
        let output = generate_typescript(lms_schema());
        let block = interface(&output, "TextBlock");
        assert_eq!(
            block,
            "export interface TextBlock {\n  text: string;\n  id?: string | null;\n  blockName?: string | null;\n  blockType: 'text-block';\n}\n"
        );
    }

    #[test]
    fn test_upload_and_relationship_fields() {
        let output = generate_typescript(lms_schema());
        let course = interface(&output, "Course");
        assert!(course.contains("  instructor?: (number | User) | null;"));
        assert!(course.contains("  thumbnail?: (number | Media) | null;"));

        let media = interface(&output, "Media");
        assert!(media.contains("  alt: string;"));
        assert!(media.contains("  filesize?: number | null;"));
    }

    #[test]
    fn test_output_is_deterministic() {
        assert_eq!(
            generate_typescript(lms_schema()),
            generate_typescript(lms_schema())
        );
    }
}
