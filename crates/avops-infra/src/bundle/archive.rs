//! ZIP codec for bundles.
//!
//! Layout:
//!
//! ```text
//! manifest.json
//! agents.json          [{name, domain, config_json}]
//! recipes.json         [{name, file}]
//! recipes/<slug>.yaml  one member per recipe
//! workflows.json       [{name, enabled, trigger, interval_minutes, agent_name, recipe_name}]
//! ```
//!
//! Decoding tolerates bundles written by older tools: per-entity directories
//! (`agents/*.json`, `recipes/*.yaml`, `workflows/*.json`) stand in for a
//! missing index, and unreadable members or rows become messages instead of
//! errors. Only an unreadable archive or manifest fails the decode.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use avops_types::bundle::{
    AgentRecord, BundleContents, BundleEntity, BundleManifest, RecipeBundleItem, RecipeIndexEntry,
};
use avops_types::error::BundleError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST: &str = "manifest.json";

fn archive_error(err: impl std::fmt::Display) -> BundleError {
    BundleError::Archive(err.to_string())
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Write `contents` as a deflate-compressed ZIP.
///
/// Entity members are written when the manifest includes them, or always
/// when there is no manifest.
pub fn encode_bundle(contents: &BundleContents) -> Result<Vec<u8>, BundleError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let included = |entity: BundleEntity| match &contents.manifest {
        Some(manifest) => match entity {
            BundleEntity::Agents => manifest.includes.agents.is_some(),
            BundleEntity::Recipes => manifest.includes.recipes.is_some(),
            BundleEntity::Workflows => manifest.includes.workflows.is_some(),
        },
        None => true,
    };

    if let Some(manifest) = &contents.manifest {
        write_json(&mut writer, options, MANIFEST, manifest)?;
    }
    if included(BundleEntity::Agents) {
        write_json(&mut writer, options, BundleEntity::Agents.member_name(), &contents.agents)?;
    }
    if included(BundleEntity::Recipes) {
        let index: Vec<RecipeIndexEntry> = contents
            .recipes
            .iter()
            .map(|r| RecipeIndexEntry {
                name: r.name.clone(),
                file: r.file.clone(),
            })
            .collect();
        write_json(&mut writer, options, BundleEntity::Recipes.member_name(), &index)?;
        for recipe in &contents.recipes {
            write_member(&mut writer, options, &recipe.file, recipe.yaml.as_bytes())?;
        }
    }
    if included(BundleEntity::Workflows) {
        write_json(
            &mut writer,
            options,
            BundleEntity::Workflows.member_name(),
            &contents.workflows,
        )?;
    }

    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}

fn write_json<T: Serialize + ?Sized>(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    name: &str,
    value: &T,
) -> Result<(), BundleError> {
    let json = serde_json::to_vec_pretty(value).map_err(archive_error)?;
    write_member(writer, options, name, &json)
}

fn write_member(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    name: &str,
    bytes: &[u8],
) -> Result<(), BundleError> {
    writer.start_file(name, options).map_err(archive_error)?;
    writer.write_all(bytes).map_err(archive_error)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Read a bundle archive into format-independent contents.
pub fn decode_bundle(bytes: &[u8]) -> Result<BundleContents, BundleError> {
    let mut contents = BundleContents::default();
    let members = read_members(bytes, &mut contents.messages)?;

    if let Some(raw) = members.get(MANIFEST) {
        let manifest: BundleManifest = serde_json::from_str(raw)
            .map_err(|e| BundleError::Manifest(format!("{MANIFEST}: {e}")))?;
        contents.manifest = Some(manifest);
    }

    contents.agents = read_rows(&members, BundleEntity::Agents, &mut contents.messages);
    contents.workflows = read_rows(&members, BundleEntity::Workflows, &mut contents.messages);
    contents.recipes = read_recipes(&members, &mut contents.messages);

    tracing::debug!(
        members = members.len(),
        agents = contents.agents.len(),
        recipes = contents.recipes.len(),
        workflows = contents.workflows.len(),
        "bundle decoded"
    );
    Ok(contents)
}

/// Every file member as UTF-8 text, keyed by its normalized path.
fn read_members(
    bytes: &[u8],
    messages: &mut Vec<String>,
) -> Result<BTreeMap<String, String>, BundleError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    let mut members = BTreeMap::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(archive_error)?;
        if file.is_dir() {
            continue;
        }
        let name = normalize_member(file.name());
        let mut text = String::new();
        match file.read_to_string(&mut text) {
            Ok(_) => {
                members.insert(name, text);
            }
            Err(e) => messages.push(format!("{name} unreadable: {e}")),
        }
    }
    Ok(members)
}

fn normalize_member(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches("./").to_string()
}

/// Rows from the entity's index member, else from `<entity>/*.json`.
fn read_rows<T: DeserializeOwned>(
    members: &BTreeMap<String, String>,
    entity: BundleEntity,
    messages: &mut Vec<String>,
) -> Vec<T> {
    let index = entity.member_name();
    if let Some(raw) = members.get(index) {
        return parse_array(index, raw, messages)
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value(value) {
                Ok(row) => Some(row),
                Err(e) => {
                    messages.push(format!("{index} row {i} invalid: {e}"));
                    None
                }
            })
            .collect();
    }

    let prefix = format!("{}/", entity.as_str());
    members
        .iter()
        .filter(|(name, _)| name.starts_with(&prefix) && has_extension(name, &["json"]))
        .filter_map(|(name, raw)| match serde_json::from_str(raw) {
            Ok(row) => Some(row),
            Err(e) => {
                messages.push(format!("{name} parse error: {e}"));
                None
            }
        })
        .collect()
}

fn parse_array(member: &str, raw: &str, messages: &mut Vec<String>) -> Vec<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(rows)) => rows,
        Ok(_) => {
            messages.push(format!("{member} parse error: expected a list"));
            Vec::new()
        }
        Err(e) => {
            messages.push(format!("{member} parse error: {e}"));
            Vec::new()
        }
    }
}

/// Recipes from `recipes.json`, else every `recipes/*.yaml|yml` member.
///
/// Index entries whose YAML cannot be found are passed on with an empty
/// `file` so the import counts them as skipped.
fn read_recipes(
    members: &BTreeMap<String, String>,
    messages: &mut Vec<String>,
) -> Vec<RecipeBundleItem> {
    let index = BundleEntity::Recipes.member_name();
    if let Some(raw) = members.get(index) {
        let mut items = Vec::new();
        for (i, value) in parse_array(index, raw, messages).into_iter().enumerate() {
            let entry: RecipeIndexEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    messages.push(format!("{index} row {i} invalid: {e}"));
                    continue;
                }
            };
            let file = normalize_member(entry.file.trim());
            let yaml = if file.is_empty() {
                messages.push(format!("Recipe entry '{}' has no file", entry.name));
                None
            } else if let Some(yaml) = members.get(&file) {
                Some(yaml.clone())
            } else {
                messages.push(format!("Recipe entry '{}': {file} not found in bundle", entry.name));
                None
            };
            items.push(match yaml {
                Some(yaml) => RecipeBundleItem {
                    name: entry.name,
                    file,
                    yaml,
                },
                None => RecipeBundleItem {
                    name: entry.name,
                    file: String::new(),
                    yaml: String::new(),
                },
            });
        }
        return items;
    }

    members
        .iter()
        .filter(|(name, _)| name.starts_with("recipes/") && has_extension(name, &["yaml", "yml"]))
        .map(|(file, yaml)| RecipeBundleItem {
            name: recipe_name_from_yaml(yaml).unwrap_or_else(|| recipe_name_from_file(file)),
            file: file.clone(),
            yaml: yaml.clone(),
        })
        .collect()
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn recipe_name_from_yaml(yaml: &str) -> Option<String> {
    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(yaml).ok()?;
    let name = value.get("name")?.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `recipes/room_health-check.yaml` -> `room health check`.
fn recipe_name_from_file(file: &str) -> String {
    let base = file.rsplit('/').next().unwrap_or(file);
    let stem = std::path::Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base);
    let name = stem.replace(['_', '-'], " ").trim().to_string();
    if name.is_empty() { base.to_string() } else { name }
}
