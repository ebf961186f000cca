//! CLI binary hosting a single Chord DHT ring node (spec.md §6).
//!
//! Grounded on `zerotier-system-service/src/main.rs`'s `clap::{Arg, Command}`
//! builder style (not the derive macro) and its direct `println!`/
//! `eprintln!` CLI output; logging initialization follows the wider
//! examples pack's `tracing_subscriber::fmt` convention rather than the
//! teacher's own bespoke file-based `Log` type, since this binary has no
//! equivalent long-lived service-log requirement.

use chord_core::ring::node::Config;
use chord_core::ring::Node;
use clap::{Arg, Command};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

fn cli() -> Command {
    Command::new("chord-node")
        .about("Hosts a single node in a Chord distributed hash table ring")
        .arg(
            Arg::new("addr")
                .long("addr")
                .value_name("IP:PORT")
                .required(true)
                .help("Address to bind this node's UDP socket to"),
        )
        .arg(
            Arg::new("join")
                .long("join")
                .value_name("IP:PORT")
                .help("Address of an existing ring member to join through; omit to create a new ring"),
        )
        .arg(
            Arg::new("ts")
                .long("ts")
                .value_name("MILLIS")
                .default_value("500")
                .help("stabilize() period in milliseconds"),
        )
        .arg(
            Arg::new("tff")
                .long("tff")
                .value_name("MILLIS")
                .default_value("500")
                .help("fix_fingers() period in milliseconds"),
        )
        .arg(
            Arg::new("tcp")
                .long("tcp")
                .value_name("MILLIS")
                .default_value("500")
                .help("check_predecessor() period in milliseconds"),
        )
        .arg(
            Arg::new("r")
                .short('r')
                .value_name("COUNT")
                .default_value("8")
                .help("successor list length"),
        )
        .arg(
            Arg::new("rpc-timeout")
                .long("rpc-timeout")
                .value_name("MILLIS")
                .default_value("1000")
                .help("RPC reply timeout in milliseconds"),
        )
}

fn parse_millis(matches: &clap::ArgMatches, id: &str) -> Result<Duration, String> {
    matches
        .get_one::<String>(id)
        .unwrap()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| format!("invalid --{id}: {e}"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();

    let addr: SocketAddr = match matches.get_one::<String>("addr").unwrap().parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("invalid --addr: {e}");
            std::process::exit(2);
        }
    };

    let config = match build_config(&matches) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let join_addr: Option<SocketAddr> = match matches.get_one::<String>("join") {
        Some(s) => match s.parse() {
            Ok(a) => Some(a),
            Err(e) => {
                eprintln!("invalid --join: {e}");
                std::process::exit(2);
            }
        },
        None => None,
    };

    let node = match join_addr {
        Some(join_addr) => Node::join(addr, join_addr, config).await,
        None => Node::create(addr, config).await,
    };
    let node = match node {
        Ok(n) => n,
        Err(e) => {
            eprintln!("failed to start node: {e}");
            std::process::exit(1);
        }
    };

    println!(
        "chord-node listening on {} (id {:016x})",
        node.local_addr().unwrap(),
        node.id()
    );
    println!("commands: lookup <hex-id>, state, quit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                eprintln!("stdin error: {e}");
                break;
            }
        };
        run_command(&node, line.trim()).await;
    }
}

async fn run_command(node: &Node, line: &str) {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("lookup") => {
            let Some(hex) = parts.next() else {
                eprintln!("usage: lookup <hex-id>");
                return;
            };
            match u64::from_str_radix(hex.trim_start_matches("0x"), 16) {
                Ok(id) => match node.lookup(id).await {
                    Ok(nd) => println!("{:016x} -> {}:{}", id, nd.ip, nd.port),
                    Err(e) => eprintln!("lookup failed: {e}"),
                },
                Err(e) => eprintln!("invalid id: {e}"),
            }
        }
        Some("state") => println!("{}", node.print_state()),
        Some("quit") | Some("exit") => std::process::exit(0),
        Some(other) => eprintln!("unknown command: {other}"),
        None => {}
    }
}

fn build_config(matches: &clap::ArgMatches) -> Result<Config, String> {
    let r = matches
        .get_one::<String>("r")
        .unwrap()
        .parse::<usize>()
        .map_err(|e| format!("invalid -r: {e}"))?;
    if r == 0 {
        return Err("-r must be at least 1".to_string());
    }
    Ok(Config {
        stabilize_period: parse_millis(matches, "ts")?,
        fix_fingers_period: parse_millis(matches, "tff")?,
        check_predecessor_period: parse_millis(matches, "tcp")?,
        rpc_timeout: parse_millis(matches, "rpc-timeout")?,
        successor_list_len: r,
    })
}
