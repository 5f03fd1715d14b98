//! Agent workflow guidance passthrough.

use super::AppContext;
use crate::error::Result;
use tokio::fs;

/// Return the agent guidance document from the knowledge base, verbatim.
pub async fn run(ctx: &AppContext) -> Result<String> {
    let path = ctx.knowledge_base_path("agent.md");
    if !path.is_file() {
        return Ok("Error: Agent guidance document not found.".to_string());
    }
    Ok(fs::read_to_string(&path).await?)
}
