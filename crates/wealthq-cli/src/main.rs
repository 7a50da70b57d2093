// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use runtime::HttpRuntime;
use std::env;
use std::fs;
use std::path::PathBuf;
use wealthq_app::AppState;
use wealthq_client::Client;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let mut config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `wealthq --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    if let Some(base_url) = options.base_url {
        config.server.base_url = Some(base_url);
    }

    let client = Client::new(config.base_url(), config.timeout()?).with_context(|| {
        format!(
            "invalid [server] config in {}; fix base_url/timeout or pass --base-url",
            options.config_path.display()
        )
    })?;

    let log_path = logging::init(&config)?;
    tracing::info!(
        base_url = client.base_url(),
        log = %log_path.display(),
        "wealthq starting"
    );

    if options.check_only {
        let message = client.ping()?;
        println!("ok: {} ({message})", client.base_url());
        return Ok(());
    }

    if let Some(path) = options.export_path {
        let mut csv = Vec::new();
        let bytes = client.download_export(&mut csv)?;
        fs::write(&path, &csv).with_context(|| format!("write export {}", path.display()))?;
        println!("wrote {bytes} bytes to {}", path.display());
        return Ok(());
    }

    let mut state = AppState {
        screen: config.start_screen(),
        failure_policy: config.failure_policy(),
        ..AppState::default()
    };
    let mut runtime = HttpRuntime::new(client);
    let outcome = wealthq_tui::run_app(&mut state, &mut runtime);
    if let Err(error) = &outcome {
        tracing::error!(error = %format!("{error:#}"), "event loop exited with error");
    } else {
        tracing::info!("wealthq exited");
    }
    outcome
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    base_url: Option<String>,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    export_path: Option<PathBuf>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        base_url: None,
        print_config_path: false,
        print_example: false,
        check_only: false,
        export_path: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--base-url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--base-url requires a URL"))?;
                options.base_url = Some(value.as_ref().to_owned());
            }
            "--export-history" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--export-history requires an output path"))?;
                options.export_path = Some(PathBuf::from(value.as_ref()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("wealthq - terminal client for the wealth query backend");
    println!("  --config <path>          Use a specific config path");
    println!("  --base-url <url>         Override [server].base_url");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and ping the backend");
    println!("  --export-history <path>  Download the query history CSV to <path>");
    println!("  --help                   Show this help");
}
