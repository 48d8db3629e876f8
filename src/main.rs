use anyhow::Context;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use smart_account_connect::{
    App, Command, Config, Flow, RpcAccountProvider, WalletConnectClient,
    app::HELP,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Configuration errors are the only fatal ones
    let config = Config::from_env().context("reading configuration")?;
    let client = WalletConnectClient::from_config(&config)
        .context("setting up the relay connection")?;
    let poll_interval = config.poll_interval;
    let default_chain = config.default_chain;
    let queue_capacity = config.queue_capacity;

    let mut app = App::new(
        RpcAccountProvider::new(config),
        client,
        default_chain,
        queue_capacity,
    );
    info!("wallet started on {default_chain}");

    println!("{HELP}\n");
    print!("{}", app.screen());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(poll_interval);
    let mut last_screen = app.screen();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }

                let flow = match line.parse::<Command>() {
                    Ok(command) => app.dispatch(command).await,
                    Err(e) => Err(e),
                };
                match flow {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Help) => println!("{HELP}"),
                    Ok(Flow::Continue) => {}
                    Err(e) => error!("{e}"),
                }
                last_screen = app.screen();
                print!("{last_screen}");
            }
            _ = ticker.tick() => {
                // failures are recorded in the session snapshot
                let _ = app.tick().await;
                let screen = app.screen();
                if screen != last_screen {
                    print!("{screen}");
                    last_screen = screen;
                }
            }
        }
    }

    Ok(())
}
