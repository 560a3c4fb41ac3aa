use crate::cli::CheckArgs;
use crate::common::{SUCCESS_ICON, load_config};
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ProcessRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "COMMAND")]
    command: String,
    #[tabled(rename = "STOP SIGNAL")]
    stop_signal: String,
    #[tabled(rename = "RESTART")]
    restart: String,
    #[tabled(rename = "DIR")]
    dir: String,
}

pub async fn execute(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).await?;
    let specs = config.specs()?;

    let rows: Vec<ProcessRow> = specs
        .iter()
        .map(|spec| ProcessRow {
            name: spec.name().to_string(),
            command: spec.command().to_string(),
            stop_signal: spec.stop_signal().to_string(),
            restart: spec.restart().to_string(),
            dir: spec
                .command()
                .cwd()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    println!(
        "{} {} is valid: {} processes, {:?} output, {:?} grace period",
        SUCCESS_ICON.green(),
        config.name.as_str().bold(),
        specs.len(),
        config.output,
        config.graceful_timeout()
    );
    Ok(())
}
