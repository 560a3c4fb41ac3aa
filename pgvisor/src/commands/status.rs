use crate::cli::StatusArgs;
use crate::common::{RUNNING_ICON, STOPPED_ICON, connect_admin, socket_path};
use anyhow::Context;
use colored::Colorize;
use pgvisor_core::{ProcessState, ProcessStatus};
use pgvisor_ipc::{AdminRequest, AdminResponse};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "")]
    icon: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "RESTARTS")]
    restarts: u32,
    #[tabled(rename = "LAST EXIT")]
    last_exit: String,
    #[tabled(rename = "POLICY")]
    policy: String,
}

impl From<&ProcessStatus> for StatusRow {
    fn from(status: &ProcessStatus) -> Self {
        let label: &str = &status.state.to_string();
        let (icon, state) = match status.state {
            ProcessState::Running => (RUNNING_ICON.green(), label.green()),
            ProcessState::Restarting => (RUNNING_ICON.yellow(), label.yellow()),
            ProcessState::Terminal => (STOPPED_ICON.red(), label.red()),
            ProcessState::Idle | ProcessState::Exited => (STOPPED_ICON.dimmed(), label.dimmed()),
        };

        Self {
            icon: icon.to_string(),
            name: status.name.clone(),
            state: state.to_string(),
            pid: status
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            restarts: status.restarts,
            last_exit: status
                .last_exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "-".to_string()),
            policy: status.restart_policy.clone(),
        }
    }
}

pub async fn execute(args: StatusArgs) -> anyhow::Result<()> {
    let path = socket_path(args.socket);
    let mut client = connect_admin(&path).await?;

    let response = client
        .request(&AdminRequest::Status)
        .await
        .context("Failed to query supervisor status")?;

    match response {
        AdminResponse::Status {
            supervisor,
            processes,
        } => {
            if args.json {
                let doc = serde_json::json!({
                    "supervisor": supervisor,
                    "processes": processes,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("Supervisor: {}", supervisor.as_str().bold());
                let mut table = Table::new(processes.iter().map(StatusRow::from));
                table.with(Style::rounded());
                println!("{}", table);
            }
            Ok(())
        }
        AdminResponse::Error { message } => Err(anyhow::anyhow!(message)),
        other => anyhow::bail!("Unexpected response: {:?}", other),
    }
}
