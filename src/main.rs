use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser, Debug)]
#[command(
    name = "itrc",
    version,
    about = "Indian income tax: reconcile Form 16 / 26AS / AIS data and compare the old and new regimes"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute tax under both regimes and recommend the cheaper one
    Compute(cmd::compute::ComputeCommand),
    /// Fuse several document profiles into one and print it
    Reconcile(cmd::reconcile::ReconcileCommand),
    /// List or show the configured tax rule tables
    Rules(cmd::rules::RulesCommand),
    /// Print the expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compute(compute) => compute.exec(),
        Command::Reconcile(reconcile) => reconcile.exec(),
        Command::Rules(rules) => rules.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
