//! Session command - create a session and print the token.

use gtilelayer::Session;

use super::common::LayerArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the session command.
pub async fn run(runner: &CliRunner, layer_args: &LayerArgs) -> Result<(), CliError> {
    runner.log_startup("session");
    let layer = runner.create_layer(layer_args)?;

    println!("Creating {} session...", layer.config().map_type);
    let session = layer.acquire_session().await?;

    println!("Token:   {}", session.token);
    println!("Expires: {}", describe_expiry(&session));
    Ok(())
}

fn describe_expiry(session: &Session) -> String {
    match session.expires_at {
        Some(expires_at) => expires_at.to_rfc3339(),
        None => "not reported".to_string(),
    }
}
