use clap::{Parser, Subcommand};
use slog::{error, o, Drain, Logger};
use std::time::Duration;
use tierkreis_client::grpc::{channel_builder_with_timeout, default_channel_builder, CredentialInterceptor};
use tierkreis_client::{ClientConfig, KeyringCredentialStore, RuntimeClient, TaskHandle};

#[derive(Parser, Debug)]
#[command(name = "tierkreis")]
#[command(about = "Inspect and manage tasks on a Tierkreis runtime", long_about = None)]
struct Args {
    /// Runtime host name or address
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Runtime gRPC port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Give up connecting after this many seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Send the worker token and key stored in the system keyring
    #[arg(long)]
    authenticate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the functions and aliases the runtime publishes
    Signature,

    /// List tasks and their status
    Tasks,

    /// Wait for a task and print its outputs
    Await { task_id: String },

    /// Stop and forget a task
    Delete { task_id: String },
}

fn create_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

async fn run(args: Args, logger: Logger) -> tierkreis_client::Result<()> {
    let mut config = ClientConfig::new(args.host, args.port);
    if let Some(seconds) = args.connect_timeout {
        config = config.with_connect_timeout(Duration::from_secs(seconds));
    }

    let client = if args.authenticate {
        let builder = match config.connect_timeout {
            Some(timeout) => channel_builder_with_timeout(timeout),
            None => default_channel_builder(),
        };
        let interceptor = CredentialInterceptor::from_store(&KeyringCredentialStore)?;
        RuntimeClient::connect_with(config.socket_address(), builder, interceptor, logger).await?
    } else {
        RuntimeClient::connect(&config, logger).await?
    };

    match args.command {
        Command::Signature => {
            for (namespace, defs) in client.get_signature().await? {
                let namespace = if namespace.is_empty() { "<root>".to_string() } else { namespace };
                println!("{}", namespace);
                for (name, function) in &defs.functions {
                    println!("  {} : {}", name, function.type_scheme);
                    if !function.docs.is_empty() {
                        println!("      {}", function.docs);
                    }
                }
                for (name, scheme) in &defs.aliases {
                    println!("  type {} = {}", name, scheme);
                }
            }
        }
        Command::Tasks => {
            for (handle, status) in client.list_tasks().await? {
                println!("{}\t{}", handle, status);
            }
        }
        Command::Await { task_id } => {
            let outputs = client.await_task(&TaskHandle::new(task_id)).await?;
            for (name, value) in outputs.values() {
                match value.to_native::<serde_json::Value>() {
                    Ok(json) => println!("{} = {}", name, json),
                    // Graphs have no JSON form
                    Err(_) => println!("{} = {:?}", name, value),
                }
            }
        }
        Command::Delete { task_id } => {
            client.delete_task(&TaskHandle::new(task_id)).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let logger = create_logger();

    if let Err(e) = run(args, logger.clone()).await {
        error!(logger, "Command failed"; "error" => %e);
        // Flush the async drain before exiting
        drop(logger);
        std::process::exit(1);
    }
}
