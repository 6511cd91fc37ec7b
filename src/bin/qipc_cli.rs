use clap::Parser;
use std::{error::Error, io};

use qipc::{
    ClientConfig, Command, Value,
    protocol::{Endian, TransportError, connect},
    prompt,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of the kdb+ process, `host:port`
    address: String,

    /// User name sent during the handshake
    #[arg(short, long, default_value = "")]
    user: String,

    #[arg(short, long)]
    password: Option<String>,

    /// Compress large messages sent to remote hosts
    #[arg(short, long)]
    compress: bool,

    /// Send messages in little-endian byte order
    #[arg(long)]
    little_endian: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::new(cli.user)
        .with_compression(cli.compress)
        .with_endian(if cli.little_endian {
            Endian::Little
        } else {
            Endian::Big
        });
    config.password = cli.password;

    let mut transport = connect(cli.address.as_str(), config)?;
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    loop {
        match prompt(&mut stdin, &mut stdout)? {
            Command::Exit => break,
            Command::Empty => continue,
            Command::Query(query) => match transport.query(&Value::string(&query)) {
                Ok(value) => println!("{value}"),
                // remote and codec errors leave the connection usable
                Err(TransportError::Protocol(e)) => eprintln!("error: {e}"),
                Err(e) => return Err(e.into()),
            },
        }
    }

    Ok(())
}
