use clap::{Parser, Subcommand};

mod cmd;

/// Cost-basis lot matching, realized gains and income for venue ledgers
#[derive(Parser, Debug)]
#[command(name = "taxlot", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute and display realized gains, income and holdings
    Report(cmd::report::ReportCommand),
    /// Export the computation as CSV or a printable statement
    Export(cmd::export::ExportCommand),
    /// List warnings raised while matching lots
    Validate(cmd::validate::ValidateCommand),
    /// Print the ledger JSON schema or the CSV export columns
    Schema(cmd::schema::SchemaCommand),
    /// Re-run the computation on a fixed interval
    Watch(cmd::watch::WatchCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(report) => report.exec(),
        Command::Export(export) => export.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
        Command::Watch(watch) => watch.exec(),
    }
}
