use colored::*;

use crate::api::KeyScope;
use crate::config::{AppConfig, KeyStatus};

/// Startup banner printed before the dashboard starts serving.
pub fn print_banner(config: &AppConfig, keys: KeyStatus) {
    println!("{}", "====================================".bright_cyan());
    println!("{}", "       LUMABOT DASHBOARD v0.1.0     ".bright_cyan().bold());
    println!("{}", "====================================".bright_cyan());
    println!("{}", " AI Services Dashboard".bright_white());
    println!(
        " Dashboard: {}",
        format!("http://{}", config.listen_addr()).bright_green()
    );
    println!(" Backend:   {}", config.api_base_url.bright_white());
    print_key_line(KeyScope::ChatAnalysis, keys.chat_analysis, "Chat and Image Analysis");
    print_key_line(KeyScope::ImageGeneration, keys.image_generation, "Image Generation");
    println!("{}\n", " Press Ctrl+C to stop".dimmed());
}

fn print_key_line(scope: KeyScope, present: bool, features: &str) {
    if present {
        println!(
            " {} {} API Key configured",
            "✔".green(),
            scope.provider_name()
        );
    } else {
        println!(
            " {} {} API Key not set ({} will not work; set {})",
            "⚠".yellow(),
            scope.provider_name(),
            features,
            scope.env_var()
        );
    }
}
