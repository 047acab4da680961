use log::error;

use quiz_relay::{Relay, RelayConfig, ServerConfig};

#[tokio::main]
async fn main()
{   env_logger::init();

    let relay = match RelayConfig::from_env().and_then(Relay::new)
    {   Ok(relay) => relay
      , Err(e) => {
          error!("{}", e);
          std::process::exit(2);
        }
    };
    let server = match ServerConfig::from_env()
    {   Ok(server) => server
      , Err(e) => {
          error!("{}", e);
          std::process::exit(2);
        }
    };

    if let Err(e) = quiz_relay::server::serve(server, relay).await
    {   error!("Server error: {}", e);
        std::process::exit(1);
    }
}
