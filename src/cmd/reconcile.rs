//! Reconcile command - fuse document profiles into one

use super::read_profiles;
use anyhow::Context;
use clap::Args;
use itrc::core::fuse_profiles;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReconcileCommand {
    /// Structured profile JSON files, merged in the order given (Form 16 always leads)
    #[arg(short, long = "profile", num_args = 1.., required = true)]
    profiles: Vec<PathBuf>,
}

impl ReconcileCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let profiles = read_profiles(&self.profiles)?;
        let count = profiles.len();
        let fused = fuse_profiles(profiles).context("at least one profile is required")?;
        log::info!(
            "Reconciled {} profile(s) from {} source document(s)",
            count,
            fused.provenance().len()
        );
        println!("{}", serde_json::to_string_pretty(&fused)?);
        Ok(())
    }
}
