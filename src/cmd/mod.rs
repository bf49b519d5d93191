pub mod compute;
pub mod reconcile;
pub mod rules;
pub mod schema;

use anyhow::Context;
use clap::Args;
use itrc::core::{DocumentExtract, EngineConfig, StructuredTaxProfile, TaxEngine};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Where to load tax rule tables from
#[derive(Args, Debug)]
pub struct RulesSource {
    /// Directory of rule table JSON files, one per financial year
    #[arg(long, env = "ITRC_RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// Do not load the rule tables shipped with itrc
    #[arg(long)]
    no_builtin_rules: bool,
}

impl RulesSource {
    pub fn engine(&self) -> anyhow::Result<TaxEngine> {
        TaxEngine::new(&EngineConfig {
            rules_dir: self.rules_dir.clone(),
            builtin_rules: !self.no_builtin_rules,
        })
    }
}

/// Read every profile, in the order given ("-" reads stdin)
pub fn read_profiles(paths: &[PathBuf]) -> anyhow::Result<Vec<StructuredTaxProfile>> {
    paths
        .iter()
        .map(|path| {
            let reader = open(path)?;
            StructuredTaxProfile::from_json(reader)
                .with_context(|| format!("reading profile {}", path.display()))
        })
        .collect()
}

/// Read a JSON array of document extracts ("-" reads stdin)
pub fn read_extracts(path: &Path) -> anyhow::Result<Vec<DocumentExtract>> {
    let reader = open(path)?;
    let extracts = DocumentExtract::read_all(reader)
        .with_context(|| format!("reading extracts {}", path.display()))?;
    log::info!("Read {} document extracts", extracts.len());
    Ok(extracts)
}

fn open(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        Ok(Box::new(io::Cursor::new(buffer)))
    } else {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
