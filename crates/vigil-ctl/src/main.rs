//! vigil-ctl — command-line interface for a Vigil node.

mod cmd;

use anyhow::{Context, Result};

use cmd::{photo, status};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7113;
const DEFAULT_WAIT_SECS: u64 = 10;

fn print_usage() {
    println!("Usage: vigil-ctl [--host <host>] [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show node identity, clients and capture state");
    println!("  photo [--wait <s>]  Take a photo and wait until it is published");
    println!();
    println!("Options:");
    println!("  --host <host>   Node address (default: {})", DEFAULT_HOST);
    println!("  --port <port>   Post server port (default: {})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;
    let mut wait = DEFAULT_WAIT_SECS;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                host = args.get(i).context("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--wait" => {
                i += 1;
                wait = args
                    .get(i)
                    .context("--wait requires a value")?
                    .parse()
                    .context("--wait must be a number of seconds")?;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => status::cmd_status(&host, port).await,
        ["photo"] => photo::cmd_photo(&host, port, wait).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
