use anyhow::{Context, Result};
use clap::Parser;
use std::net::TcpListener;
use std::path::PathBuf;
use wirerpc_codec::service;
use wirerpc_codec::RpcServer;
use wirerpc_echo::{register_all, AddArgs, AppConfig, EchoArgs, EchoReply, ARITH_ADD, ECHO_CALL};

#[derive(Parser, Debug)]
#[command(name = "wirerpc-echo", about = "Echo/arith service over framed msgpack RPC", version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Serve Echo.Call and Arith.Add until interrupted.
    Serve {
        #[arg(long)]
        listen: Option<String>,
    },
    /// Issue one call against a running server.
    Call {
        #[arg(long)]
        addr: Option<String>,
        #[command(subcommand)]
        call: CallKind,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CallKind {
    Echo {
        text: String,
    },
    #[command(allow_negative_numbers = true)]
    Add {
        a: i64,
        b: i64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("wirerpc-echo error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or(config.server.listen);
            let listener =
                TcpListener::bind(&listen).with_context(|| format!("binding {listen}"))?;
            let server = RpcServer::with_config(config.codec);
            register_all(&server);
            log::info!("serving {}", server.methods().join(", "));
            server.serve(&listener).context("accept loop failed")
        }
        Command::Call { addr, call } => {
            let addr = addr.unwrap_or(config.server.listen);
            let conn = wirerpc_codec::transport::dial("tcp", &addr)
                .with_context(|| format!("connecting to {addr}"))?;
            let client = service::RpcClient::with_config(conn, &config.codec)
                .context("starting rpc client")?;
            let outcome = match call {
                CallKind::Echo { text } => client
                    .call::<_, EchoReply>(ECHO_CALL, &EchoArgs { text })
                    .map(|reply| format!("{} ({} chars)", reply.text, reply.len)),
                CallKind::Add { a, b } => client
                    .call::<_, i64>(ARITH_ADD, &AddArgs { a, b })
                    .map(|sum| sum.to_string()),
            };
            let closed = client.close();
            println!("{}", outcome.context("call failed")?);
            closed.context("closing connection")?;
            Ok(())
        }
    }
}
