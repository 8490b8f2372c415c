use clap::{Parser, Subcommand};
use lib::attachment;
use lib::client::RelayClient;
use lib::conversation::ChatController;

#[derive(Parser)]
#[command(name = "deckchat")]
#[command(about = "deckchat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file. Fill in
    /// provider.endpoint and provider.apiKey (or use the AZURE_OPENAI_* env)
    /// before running `serve`.
    Init {
        /// Config file path (default: DECKCHAT_CONFIG_PATH or ~/.deckchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay server (chat endpoint and static app assets).
    Serve {
        /// Config file path (default: DECKCHAT_CONFIG_PATH or ~/.deckchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 5173)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with the assistant through a running relay (interactive).
    Chat {
        /// Config file path (default: DECKCHAT_CONFIG_PATH or ~/.deckchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("deckchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    lib::relay::run_relay(config, &path).await
}

async fn run_chat(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, BufRead, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let client = RelayClient::for_server(
        config.server.bind.trim(),
        lib::config::resolve_port(&config),
    );
    let mut controller = ChatController::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/new") {
            controller.start_new();
            println!("started a new conversation");
            continue;
        }
        if input.eq_ignore_ascii_case("/help") {
            println!("available commands:");
            println!("  /new            start a new conversation");
            println!("  /attach <path>  stage a file for the next message");
            println!("  /exit           quit");
            continue;
        }
        if let Some(path) = input.strip_prefix("/attach ") {
            let paths = vec![std::path::PathBuf::from(path.trim())];
            let (files, failures) = attachment::read_files(&paths).await;
            for (path, e) in &failures {
                eprintln!("could not attach {}: {}", path.display(), e);
            }
            for file in &files {
                println!(
                    "staged {} ({}, {})",
                    file.name,
                    file.media_type,
                    attachment::format_size(file.size)
                );
            }
            controller.stage_files(files);
            continue;
        }

        controller.update_draft(input);
        let Some(wire) = controller.begin_submit() else {
            continue;
        };
        let outcome = client.send(wire).await;
        controller.complete_submit(outcome);
        if let Some(reply) = controller.transcript().last() {
            println!("< {}", reply.content.trim());
        }
    }

    Ok(())
}
