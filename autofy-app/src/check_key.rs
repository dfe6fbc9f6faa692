use crate::cli::{key_warnings, mask_key};
use crate::load_config;
use std::path::Path;
use std::process::ExitCode;

pub fn execute(config_path: Option<&Path>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };
    let llm = &config.llm;
    println!("Provider: {} ({})", llm.provider_name(), llm.model());

    let Some(var) = llm.api_key_env() else {
        println!("This provider needs no API key.");
        return ExitCode::SUCCESS;
    };

    let Some(key) = llm.api_key() else {
        eprintln!("No API key found. Set {var} or llm.api_key in the config file.");
        return ExitCode::from(1);
    };

    println!("Key loaded: {}", mask_key(&key));
    println!("Length: {} characters", key.chars().count());
    for warning in key_warnings(&key) {
        println!("Warning: {warning}");
    }
    ExitCode::SUCCESS
}
