//! CLI tool to generate TypeScript declarations for the LMS collections.
//!
//! Usage: `cargo run --bin generate-types`
//!
//! Writes to `typegen.output_file` (default `generated/lms-types.ts`,
//! overridable with `LMS_TYPEGEN_OUTPUT`).

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use pi_lms::config::Config;
use pi_lms::schema::lms_schema;
use pi_lms::typegen::generate_typescript;

fn main() -> Result<()> {
    let config = Config::load_with_env(Path::new("config.yml"))?;

    let schema = lms_schema();
    schema.check().context("Collection schema is inconsistent")?;
    let output = generate_typescript(schema);

    let out_path = &config.typegen.output_file;
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(out_path, &output)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    println!("Generated {} ({} bytes)", out_path.display(), output.len());
    Ok(())
}
