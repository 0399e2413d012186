//! Probe a tool server: connect, list its tools, call one.
//!
//! Run with: cargo run --example list_tools -- <path-or-url>

use mcp::{Target, ToolSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let arg = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    let target = Target::parse(&arg)?;

    println!("Connecting to {target}");
    let mut session = ToolSession::connect(&target).await?;
    let info = session.initialize().await?;
    println!(
        "Server: {} {}",
        info.server_info.name,
        info.server_info.version.as_deref().unwrap_or("")
    );

    let tools = session.list_tools().await?;
    println!("\nDiscovered {} tools:", tools.len());
    for tool in &tools {
        println!("  - {}", tool.name);
        if let Some(desc) = &tool.description {
            println!("    {desc}");
        }
    }

    if tools.iter().any(|t| t.name == "query_adcode") {
        println!("\nCalling query_adcode...");
        let result = session
            .call_tool(
                "query_adcode",
                Some(serde_json::json!({ "region_name": "Haidian" })),
            )
            .await?;
        println!("{}", result.joined_text());
    }

    session.close().await;
    Ok(())
}
