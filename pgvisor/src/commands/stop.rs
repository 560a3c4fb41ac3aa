use crate::cli::StopArgs;
use crate::common::{SUCCESS_ICON, connect_admin, socket_path};
use anyhow::Context;
use colored::Colorize;
use pgvisor_ipc::{AdminRequest, AdminResponse};

pub async fn execute(args: StopArgs) -> anyhow::Result<()> {
    let path = socket_path(args.socket);
    let mut client = connect_admin(&path).await?;

    match client
        .request(&AdminRequest::Stop)
        .await
        .context("Failed to send stop request")?
    {
        AdminResponse::Success { message } => {
            println!("{} {}", SUCCESS_ICON.green(), message);
            Ok(())
        }
        AdminResponse::Error { message } => Err(anyhow::anyhow!(message)),
        other => anyhow::bail!("Unexpected response: {:?}", other),
    }
}
