use std::process::ExitCode;

use lifeorg_server::Config;
use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("lifeorg_server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = lifeorg_core::init_logging(&config.log_level, config.log_dir.as_deref()) {
        eprintln!("lifeorg_server: {err}");
        return ExitCode::FAILURE;
    }

    match lifeorg_server::serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=http status=error error={err}");
            ExitCode::FAILURE
        }
    }
}
