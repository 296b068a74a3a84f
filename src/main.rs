use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing::info;

use pro_language_server::logging::init_logger;
use pro_language_server::lsp::backend::ProBackend;

/// Language server for `.pro` routine files, speaking LSP over stdio.
#[derive(Parser, Debug)]
#[command(name = "pro-language-server", version, about)]
struct Args {
    /// Log level for stderr output (falls back to RUST_LOG, then "info")
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long)]
    no_color: bool,

    /// Disable the session log file in the user cache directory
    #[arg(long)]
    no_file_log: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logger(args.no_color, args.log_level.as_deref(), !args.no_file_log)?;
    info!("Starting pro-language-server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(ProBackend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("Server exited");
    Ok(())
}
