use std::{
  env,
  ffi::OsString,
  io::{self, IsTerminal},
  process,
};

use helm_wrapper::Cli;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() {
  let cli = match Cli::from_env() {
    Ok(cli) => cli,
    Err(err) => err.exit(),
  };

  let subscriber = FmtSubscriber::builder()
    .with_env_filter(EnvFilter::new(&cli.log))
    .with_writer(io::stderr)
    .with_ansi(io::stderr().is_terminal())
    .without_time()
    .finish();
  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");
  tracing_log::LogTracer::init().expect("Setting log bridge failed");

  // Everything after the program name belongs to helm
  let args: Vec<OsString> = env::args_os().skip(1).collect();

  let code = match helm_wrapper::run(&cli, &args).await {
    Ok(code) => code,
    Err(err) => {
      eprintln!("helm-wrapper: {err:#}");
      1
    }
  };

  process::exit(code);
}
