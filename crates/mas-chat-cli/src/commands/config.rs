use anyhow::Result;
use console::style;
use serde_json::json;

use mas_chat::config::Settings;

use crate::render::print_json;

pub fn show(settings: &Settings) -> Result<()> {
    let report = settings.chat.validate();

    if report.valid {
        println!("{}", style("Chat configuration is valid").green());
    } else {
        println!("{}", style("Chat configuration has problems:").red());
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }

    print_json(&json!({
        "backend": {
            "mcpUrl": settings.backend.mcp_url(),
            "healthUrl": settings.backend.health_url(),
            "timeoutSecs": settings.backend.timeout_secs,
        },
        "chat": report,
    }))
}
