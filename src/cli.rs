//! Minimal CLI: schema + JSON documents → decoded, re-encoded JSON
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde_json::Value;

use dtojson::{JsonDecoder, Native, Schema};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON documents through a schema of declared types and print them back as JSON
#[derive(Parser, Debug)]
#[command(name = "dtojson")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode each input document as the root type and print it re-encoded
    Decode(DecodeOut),
    /// print the merged field table of an object type
    Fields(FieldsOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// schema file describing the types
    #[arg(long)]
    schema: PathBuf,

    /// type every document is decoded as
    #[arg(long)]
    root: String,

    /// pretty-print each output document
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct FieldsOut {
    /// schema file describing the types
    #[arg(long)]
    schema: PathBuf,

    /// object type to introspect
    #[arg(long = "type")]
    ty: String,
}

/// One unit of decoding work: raw text, or an already selected JSON node.
enum Document {
    Text(String),
    Node(Value),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read {}", source_path.display()))?;
            let texts: Vec<String> = if self.ndjson {
                source.lines().filter(|line| !line.trim().is_empty()).map(str::to_string).collect()
            } else {
                vec![source]
            };
            for text in texts {
                documents.push(self.select(text, &source_path)?);
            }
        }
        tracing::debug!(documents = documents.len(), "inputs loaded");
        Ok(documents)
    }

    fn select(&self, text: String, source_path: &std::path::Path) -> Result<Document> {
        let Some(pointer) = self.json_pointer.as_ref() else {
            return Ok(Document::Text(text));
        };
        let value = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("--json-pointer needs JSON input ({})", source_path.display()))?;
        let node = value.pointer(pointer).cloned().unwrap_or(Value::Null);
        Ok(Document::Node(node))
    }
}

impl Document {
    fn decode(&self, decoder: &JsonDecoder) -> dtojson::Result<Native> {
        match self {
            Document::Text(text) => decoder.decode(text),
            Document::Node(value) => decoder.decode_value(value),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Decode(target) => {
                let schema = Schema::load(&target.schema)
                    .with_context(|| format!("failed to load schema {}", target.schema.display()))?;
                // 1) derive once
                let decoder = schema.make_decoder(&target.root)?;
                // 2) decode every document; decoders are shareable across threads
                let documents = target.input_settings.load_documents()?;
                let rendered = documents
                    .par_iter()
                    .enumerate()
                    .map(|(index, document)| {
                        let native = document
                            .decode(&decoder)
                            .map_err(|error| anyhow!("document {index}: {error}"))?;
                        let text = if target.pretty {
                            dtojson::encode::to_json_text_pretty(&native)?
                        } else {
                            dtojson::to_json_text(&native)?
                        };
                        Ok(text)
                    })
                    .collect::<Result<Vec<String>>>()?;
                // 3) write in input order
                let mut output = rendered.join("\n");
                output.push('\n');
                write_output(target.out.as_ref(), &output)
            }
            Command::Fields(target) => {
                let schema = Schema::load(&target.schema)
                    .with_context(|| format!("failed to load schema {}", target.schema.display()))?;
                let fields = schema.fields(&target.ty)?;
                let table: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), Value::String(ty.to_string())))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&table)?);
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&PathBuf>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        print!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
            matched.sort();
            out.extend(matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
