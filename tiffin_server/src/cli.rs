use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "TFN_HOST",
        "TFN_PORT",
        "TFN_DATABASE_URL",
        "TFN_SERVICE_AREAS",
        "TFN_DRAFT_TTL_HOURS",
        "TFN_COD_CUTOFF",
        "TFN_COMMISSION_BP",
        "TFN_TAX_BP",
        "TFN_UPI_ENVIRONMENT",
        "TFN_UPI_CLIENT_ID",
        "TFN_APP_VERSIONS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(v) => v,
            Err(VarError::NotPresent) => "(not set)".to_string(),
            Err(VarError::NotUnicode(_)) => "(not valid unicode)".to_string(),
        };
        println!("{name}: {val}");
    });
}
