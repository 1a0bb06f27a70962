use crate::controller::{AskRequest, TurnController};
use crate::error::RagError;
use tokio::io::AsyncReadExt;

/// Reads one request from stdin and prints the response (or error envelope) as JSON.
pub async fn run(controller: &TurnController) -> anyhow::Result<()> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let result = match serde_json::from_str::<AskRequest>(&input) {
        Ok(request) => controller.handle(&request).await,
        Err(e) => Err(RagError::Validation(e.to_string())),
    };

    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::json!({ "error": err }));
            Err(err.into())
        }
    }
}
